//! Blackhole - Entry point.
//!
//! This binary reads the router's blacklist configuration, resolves every
//! configured feed, writes one dnsmasq blackhole file per source, purges
//! stale files from earlier runs and reloads the DNS service.

use std::borrow::Cow;

use anyhow::{Context, Result};
use tracing::{info, warn};

use blackhole::Config;
use blackhole::service;

async fn run() -> Result<()> {
    let config_path = std::env::args().nth(1).map(Cow::Owned).unwrap_or_else(|| {
        std::env::var("CONFIG_PATH")
            .map(Cow::Owned)
            .unwrap_or(Cow::Borrowed("/config/blackhole.toml"))
    });
    let config = Config::load(config_path.as_ref()).context("Failed to load configuration")?;
    info!(config = %config_path, nodes = ?config.nodes(), "configuration loaded");

    let summary = config
        .resolve_all()
        .await
        .context("Failed to resolve sources")?;
    info!(
        resolved = summary.resolved,
        failed = summary.failed,
        skipped = summary.skipped,
        entries = summary.entries,
        "sources resolved"
    );

    let selection = config.get_all();
    if config.env().debug {
        print!("{selection}");
    }

    let written = selection
        .save()
        .await
        .context("Failed to write blacklist files")?;
    info!(files = written.len(), "blacklist files written");

    if service::in_session() {
        warn!("configure session in progress; skipping cleanup and DNS reload");
        return Ok(());
    }

    let purged = selection
        .files()
        .purge_stale()
        .await
        .context("Failed to purge stale blacklist files")?;
    if !purged.is_empty() {
        info!(files = purged.len(), "stale blacklist files purged");
    }

    if config.env().dns_service.is_empty() {
        info!("no DNS reload command configured");
        return Ok(());
    }
    let output = service::reload_dns(config.env())
        .await
        .context("Failed to reload DNS service")?;
    if output.status.success() {
        info!("DNS service reloaded");
    } else {
        warn!(
            status = ?output.status.code(),
            stdout = %String::from_utf8_lossy(&output.stdout),
            stderr = %String::from_utf8_lossy(&output.stderr),
            "DNS service reload failed"
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    run().await
}
