/// CLI subcommand implementations.
///
/// Each `run_*` function backs one `logtail` subcommand: `watch` drives a
/// live websocket session, `replay` pushes a local file through the same
/// pipeline offline, and `config` manages the configuration files.
pub mod controls;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::{self, LogtailConfig};
use crate::connection::protocol::{Amount, Inbound};
use crate::connection::socket;
use crate::logging;
use crate::render::{self, OutputFormat, TerminalView};
use crate::session::{SessionOptions, TailSession};

/// Command-line overrides shared by `watch` and `replay`.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub file: Option<String>,
    pub amount: Option<Amount>,
    pub follow: Option<bool>,
    pub filter: Option<String>,
    pub errors_only: bool,
    pub verbose: bool,
}

impl Overrides {
    /// Apply the flags that map onto config keys (the highest layer).
    pub fn apply(&self, config: &mut LogtailConfig) {
        if let Some(url) = &self.url {
            config.connection.url = url.clone();
        }
        if let Some(file) = &self.file {
            config.tail.file = file.clone();
        }
        if let Some(amount) = self.amount {
            config.tail.amount = amount.value;
            config.tail.unit = amount.unit;
        }
        if let Some(follow) = self.follow {
            config.tail.follow = follow;
        }
    }

    /// Apply the flags that act on a fresh session.
    fn prime(&self, session: &mut TailSession) {
        if let Some(filter) = &self.filter
            && let Err(e) = session.set_filter_text(filter)
        {
            eprintln!("{} {e}", "warning:".yellow().bold());
        }
        if self.errors_only {
            session.toggle_error_focus();
        }
    }
}

fn load_config(overrides: &Overrides) -> LogtailConfig {
    let mut config = config::load();
    overrides.apply(&mut config);
    if !config.render.color {
        colored::control::set_override(false);
    }
    config
}

// ---------------------------------------------------------------------------
// logtail watch
// ---------------------------------------------------------------------------

/// Tail a log file from the server, rendering entries as they arrive and
/// reading controls from stdin until `q`.
pub fn run_watch(overrides: Overrides) -> Result<()> {
    let config = load_config(&overrides);
    logging::init(&config.logging, overrides.verbose)?;
    info!(url = %config.connection.url, file = %config.tail.file, "watch starting");

    let mut session = TailSession::new(config.session_options());
    overrides.prime(&mut session);

    let amount = config.tail.amount();
    if config.tail.file.is_empty() {
        println!(
            "{}",
            "No file selected. Type `o <file> [amount]` to open one.".dimmed()
        );
    } else {
        session.on_command_needed(&config.tail.file, amount);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let mut view = TerminalView::new(OutputFormat::Text, config.render.show_correlation);
    let result = runtime.block_on(async {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(controls::forward_stdin(tx, amount));
        socket::run(&config.connection.url, &mut session, rx, &mut view).await
    });

    // A blocked stdin read would otherwise hold up shutdown.
    runtime.shutdown_background();
    result
}

// ---------------------------------------------------------------------------
// logtail replay
// ---------------------------------------------------------------------------

/// Feed `bytes` through a fresh session in `chunk_size` pieces, as if they
/// had arrived from the server, and end the stream.
pub fn replay_bytes(
    bytes: &[u8],
    chunk_size: usize,
    name: &str,
    amount: Amount,
    options: SessionOptions,
) -> TailSession {
    let mut session = TailSession::new(options);
    session.on_command_needed(name, amount);
    for chunk in bytes.chunks(chunk_size.max(1)) {
        session.feed_inbound(Inbound::Binary(chunk.to_vec()));
    }
    session.finish_stream();
    session
}

/// Replay a local log file and print the resulting view.
pub fn run_replay(path: &Path, chunk_size: usize, format: OutputFormat, overrides: Overrides) -> Result<()> {
    let config = load_config(&overrides);
    logging::init(&config.logging, overrides.verbose)?;

    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), chunk_size, "replaying");

    let name = path.display().to_string();
    let mut session = replay_bytes(
        &bytes,
        chunk_size,
        &name,
        config.tail.amount(),
        config.session_options(),
    );
    overrides.prime(&mut session);

    render::print_snapshot(&session, format, config.render.show_correlation)
}

// ---------------------------------------------------------------------------
// logtail config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective logtail Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source(global_exists, "~/.logtail/config.toml");
    print_source(project_exists, ".logtail.toml");
    println!(
        "  {} {}",
        "·".dimmed(),
        "LOGTAIL_* environment variables".dimmed()
    );
    println!("  {} {}", "·".dimmed(), "command-line flags".dimmed());

    Ok(())
}

fn print_source(exists: bool, name: &str) {
    if exists {
        println!("  {} {}", "✓".green(), name.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{name} (not found)").dimmed());
    }
}

/// Initialize a default config file at `~/.logtail/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    println!("  {}", "Edit the file to customize logtail.".dimmed());
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::EntryKind;
    use crate::connection::protocol::SizeUnit;

    #[test]
    fn overrides_beat_config() {
        let mut config = LogtailConfig::default();
        Overrides {
            url: Some("ws://override".into()),
            file: Some("x.log".into()),
            amount: Some(Amount::new(64.0, SizeUnit::Kb)),
            follow: Some(false),
            ..Overrides::default()
        }
        .apply(&mut config);
        assert_eq!(config.connection.url, "ws://override");
        assert_eq!(config.tail.file, "x.log");
        assert_eq!(config.tail.amount(), Amount::new(64.0, SizeUnit::Kb));
        assert!(!config.tail.follow);
    }

    #[test]
    fn replay_is_independent_of_chunk_size() {
        let log = b"2024 *ERROR* boom\n\tat foo\nplain\nt [1] -> GET / HTTP/1.1\ntrailing";
        let texts = |chunk: usize| -> Vec<String> {
            let session = replay_bytes(log, chunk, "a.log", Amount::default(), SessionOptions::default());
            session.main_view().map(|e| e.text.clone()).collect()
        };
        let whole = texts(log.len());
        assert_eq!(
            whole,
            vec!["2024 *ERROR* boom\n\tat foo", "plain", "t [1] -> GET / HTTP/1.1", "trailing"]
        );
        for chunk in [1, 2, 3, 7, 16] {
            assert_eq!(texts(chunk), whole, "chunk size {chunk}");
        }
    }

    #[test]
    fn replay_primes_error_focus() {
        let mut session = replay_bytes(
            b"ok\n2024 *ERROR* bad\n",
            4,
            "a.log",
            Amount::default(),
            SessionOptions::default(),
        );
        Overrides {
            errors_only: true,
            ..Overrides::default()
        }
        .prime(&mut session);
        let view = session.active_view();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].kind, EntryKind::ErrorSectionHead);
    }
}
