pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xflow")]
#[command(about = "Aggregate posts from X sources and scroll them across the terminal", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/xflow/config.toml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single fetch pass and print the accepted posts
    Fetch {
        /// Print posts as JSON
        #[arg(long)]
        json: bool,
    },
    /// Poll continuously and scroll posts across the terminal
    Watch {
        /// Replay posts from a JSON file instead of calling a provider
        #[arg(long)]
        fixture: Option<PathBuf>,

        /// Keep rotation state and cursors in memory only
        #[arg(long)]
        ephemeral: bool,

        /// Override the polling interval (e.g., "30s", "5m", "1h")
        #[arg(short, long)]
        interval: Option<String>,
    },
    /// Show the sources a pass would fetch
    Sources,
    /// Show persisted key rotation and per-source cursors
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_watch_flags() {
        let cli = Cli::parse_from([
            "xflow",
            "--config",
            "/tmp/x.toml",
            "watch",
            "--fixture",
            "posts.json",
            "--ephemeral",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.toml")));
        match cli.command {
            Commands::Watch {
                fixture,
                ephemeral,
                interval,
            } => {
                assert_eq!(fixture, Some(PathBuf::from("posts.json")));
                assert!(ephemeral);
                assert!(interval.is_none());
            }
            _ => panic!("expected watch"),
        }
    }

    #[test]
    fn test_config_flag_is_global() {
        let cli = Cli::parse_from(["xflow", "status", "-c", "alt.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        assert!(matches!(cli.command, Commands::Status));
    }
}
