use std::sync::Mutex;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use xflow::app::AppContext;
use xflow::cli::{commands, Cli, Commands};
use xflow::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Fetch { json } => {
            init_stderr_tracing();
            let ctx = AppContext::new(config, None)?;
            commands::fetch_once(&ctx, json).await?;
        }
        Commands::Watch {
            fixture,
            ephemeral,
            interval,
        } => {
            // Logs go to a file so they don't draw over the stage.
            let log_path = AppContext::data_dir()?.join("xflow.log");
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)?;
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(Mutex::new(log_file))
                        .with_ansi(false),
                )
                .with(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new("xflow=info")),
                )
                .init();

            if let Some(interval) = interval {
                commands::apply_interval(&mut config, &interval)?;
            }

            let ctx = if ephemeral {
                AppContext::in_memory(config)?
            } else {
                AppContext::new(config, None)?
            };
            let ctx = match fixture {
                Some(path) => ctx.with_fixture(path)?,
                None => ctx,
            };

            xflow::tui::run(ctx).await?;
        }
        Commands::Sources => {
            init_stderr_tracing();
            let ctx = AppContext::in_memory(config)?;
            commands::list_sources(&ctx)?;
        }
        Commands::Status => {
            init_stderr_tracing();
            let ctx = AppContext::new(config, None)?;
            commands::show_status(&ctx)?;
        }
    }

    Ok(())
}

fn init_stderr_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();
}
