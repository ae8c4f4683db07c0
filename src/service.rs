//! Router session detection and DNS service control.

use std::process::Output;

use crate::config::Env;
use crate::error::Result;

/// Environment variable present while a router configure session is open.
pub const SESSION_ENV: &str = "_OFR_CONFIGURE";

/// Whether a configure session is currently open.
///
/// Replacing blacklist files mid-session would race the session's own
/// commit, so runs started inside one skip cleanup and reloading.
#[must_use]
pub fn in_session() -> bool {
    std::env::var_os(SESSION_ENV).is_some()
}

/// Runs the configured DNS reload command through the shell.
///
/// Status, stdout and stderr are returned untouched so the caller can
/// surface them.
pub async fn reload_dns(env: &Env) -> Result<Output> {
    tracing::info!(command = %env.dns_service, "reloading DNS service");
    let output = tokio::process::Command::new(&env.shell)
        .arg("-c")
        .arg(&env.dns_service)
        .output()
        .await?;
    if !output.status.success() {
        tracing::warn!(status = ?output.status.code(), "DNS reload command failed");
    }
    Ok(output)
}
