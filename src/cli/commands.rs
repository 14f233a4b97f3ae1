use chrono::{DateTime, Utc};

use crate::app::{AppContext, Result, XflowError};
use crate::config::{Config, PollingConfig};
use crate::domain::{resolve_sources, Post};
use crate::provider::Provider;
use crate::store::Store;

pub async fn fetch_once(ctx: &AppContext, json: bool) -> Result<()> {
    warn_missing_credentials(&ctx.config);

    let specs = resolve_sources(&ctx.config.sources, ctx.provider.kind());
    if specs.is_empty() {
        println!("No sources configured");
        return Ok(());
    }

    let mut aggregator = ctx.aggregator();
    let outcome = aggregator.run_pass(&ctx.config).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.accepted)?);
    } else {
        let now = Utc::now();
        for post in &outcome.accepted {
            println!("{}", format_post_line(post, now));
        }
        println!("{} posts from {} sources", outcome.accepted.len(), specs.len());
    }

    match outcome.error {
        Some(e) => Err(XflowError::Fetch(e)),
        None => Ok(()),
    }
}

pub fn list_sources(ctx: &AppContext) -> Result<()> {
    let kind = ctx.provider.kind();
    let specs = resolve_sources(&ctx.config.sources, kind);

    println!("Provider: {}", kind);
    if specs.is_empty() {
        println!("No sources configured");
        return Ok(());
    }

    for spec in specs {
        println!("  {}", spec);
    }
    Ok(())
}

pub fn show_status(ctx: &AppContext) -> Result<()> {
    let kind = ctx.config.provider.kind;
    let credentials = ctx.config.provider.credential_set();

    println!("Provider: {}", kind);
    println!(
        "Polling every {}, initial backlog {}",
        PollingConfig::format_interval(ctx.config.polling.interval_secs()),
        ctx.config.polling.initial_backlog
    );
    println!("Keys: {}", credentials.len());

    match ctx.store.load_rotation(kind)? {
        Some(state) if state.keys_fingerprint == credentials.fingerprint() => {
            let active = credentials.with_active_index(state.active_index);
            println!(
                "Active key: #{} ({}), rotated {}",
                active.active_index() + 1,
                active.active_key_fingerprint(),
                state.updated_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
        Some(_) => println!("Active key: #1 (stored rotation was for a different key list)"),
        None => println!("Active key: #1 ({})", credentials.active_key_fingerprint()),
    }

    let cursors = ctx.store.list_source_cursors()?;
    if cursors.is_empty() {
        println!("No sources fetched yet");
        return Ok(());
    }

    println!("Sources:");
    for cursor in cursors {
        let seen = cursor
            .last_seen_at
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "  {:<30} last {} ({}), checked {}",
            cursor.source_key,
            cursor.last_seen_id,
            seen,
            cursor.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

/// Apply a `--interval` override such as "90s" or "5m".
pub fn apply_interval(config: &mut Config, interval: &str) -> Result<()> {
    let secs = PollingConfig::parse_interval(interval).map_err(XflowError::Config)?;
    config.polling.interval = secs;
    config.polling.unit = Default::default();
    Ok(())
}

pub fn format_post_line(post: &Post, now: DateTime<Utc>) -> String {
    let age = post.relative_timestamp(now);
    let age = if age.is_empty() { "-".to_string() } else { age };
    let text = post.text.replace('\n', " ");
    format!("[{:>4}] @{}: {}", age, post.display_handle(), text)
}

fn warn_missing_credentials(config: &Config) {
    if !config.provider.has_credentials() {
        eprintln!(
            "Warning: no credentials configured for {}; set them in the config or via RAPIDAPI_KEY / BEARER_TOKEN",
            config.provider.kind
        );
    }
}
