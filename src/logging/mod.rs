//! Diagnostic logging setup.
//!
//! The tail itself owns stdout, so diagnostics go to a file
//! (`~/.logtail/logtail.log` by default) unless `--verbose` asks for
//! stderr. Filter precedence: `RUST_LOG` > `[logging] level` > `warn`.

use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config;
use crate::config::schema::LoggingConfig;

const FALLBACK_LEVEL: &str = "warn";

/// Install the global `tracing` subscriber. Calling it twice is harmless;
/// the second subscriber is ignored.
pub fn init(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_env_filter(rust_log.as_deref(), &logging.level);

    if verbose {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
        return Ok(());
    }

    let path = config::expand_home(&logging.file);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
    Ok(())
}

/// `rust_log` wins when it parses; then the configured level; then `warn`.
fn build_env_filter(rust_log: Option<&str>, configured: &str) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(configured).ok())
        .unwrap_or_else(|| EnvFilter::new(FALLBACK_LEVEL))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_takes_precedence() {
        let filter = build_env_filter(Some("logtail=trace"), "info");
        assert_eq!(filter.to_string(), "logtail=trace");
    }

    #[test]
    fn configured_level_used_without_rust_log() {
        assert_eq!(build_env_filter(None, "debug").to_string(), "debug");
    }
}
