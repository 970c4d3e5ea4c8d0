/// Configuration schema and defaults for logtail.
///
/// Defines the TOML-serializable configuration structure with all sections:
/// `[connection]`, `[tail]`, `[filter]`, `[render]`, and `[logging]`.
///
/// Every field has a built-in default. Users only set the values they want
/// to override.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classifier::ClassifierMode;
use crate::connection::ConnectionPolicy;
use crate::connection::protocol::{Amount, SizeUnit};
use crate::filter::FilterMode;
use crate::scrollback::DEFAULT_BYTES_PER_LINE;
use crate::session::SessionOptions;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level logtail configuration.
///
/// Maps directly to the `~/.logtail/config.toml` and `.logtail.toml` file
/// schemas. All sections and fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogtailConfig {
    pub connection: ConnectionConfig,
    pub tail: TailConfig,
    pub filter: FilterConfig,
    pub render: RenderConfig,
    pub logging: LoggingConfig,
}

impl LogtailConfig {
    /// Session parameters derived from the `[tail]`, `[filter]`, and
    /// `[connection]` sections.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            classifier_mode: self.tail.classifier,
            filter_mode: self.filter.mode,
            case_insensitive: self.filter.case_insensitive,
            filter_debounce: Duration::from_millis(self.filter.debounce_ms),
            bytes_per_line: self.tail.bytes_per_line.max(1),
            follow: self.tail.follow,
            policy: self.connection.policy(),
        }
    }
}

// ---------------------------------------------------------------------------
// [connection]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Websocket endpoint of the log-viewer server.
    pub url: String,
    pub heartbeat_interval_ms: u64,
    pub reconnect_delay_ms: u64,
    /// Ceiling for the doubling reconnect delay. Equal to
    /// `reconnect_delay_ms` for a fixed delay.
    pub max_reconnect_delay_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/logviewer/tail".to_string(),
            heartbeat_interval_ms: 10_000,
            reconnect_delay_ms: 3_000,
            max_reconnect_delay_ms: 3_000,
        }
    }
}

impl ConnectionConfig {
    pub fn policy(&self) -> ConnectionPolicy {
        ConnectionPolicy {
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms.max(1)),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            max_reconnect_delay: Duration::from_millis(self.max_reconnect_delay_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// [tail]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TailConfig {
    /// Log file to open on start. Empty means none.
    pub file: String,
    pub amount: f64,
    pub unit: SizeUnit,
    pub follow: bool,
    /// Assumed average line length, used to turn the amount into a line
    /// capacity.
    pub bytes_per_line: u64,
    pub classifier: ClassifierMode,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            file: String::new(),
            amount: 1.0,
            unit: SizeUnit::Mb,
            follow: true,
            bytes_per_line: DEFAULT_BYTES_PER_LINE,
            classifier: ClassifierMode::ErrorOnly,
        }
    }
}

impl TailConfig {
    pub fn amount(&self) -> Amount {
        Amount::new(self.amount, self.unit)
    }
}

// ---------------------------------------------------------------------------
// [filter]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub mode: FilterMode,
    pub case_insensitive: bool,
    /// Quiet period before typed filter text is applied.
    pub debounce_ms: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            mode: FilterMode::Regex,
            case_insensitive: false,
            debounce_ms: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// [render]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub color: bool,
    /// Append request/response cross-references to request log lines.
    pub show_correlation: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            color: true,
            show_correlation: true,
        }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Diagnostic logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `"warn"` or `"logtail=debug"`.
    /// `RUST_LOG` takes precedence.
    pub level: String,
    /// Diagnostic log file. `~` is expanded to the home directory.
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: "~/.logtail/logtail.log".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default TOML content
// ---------------------------------------------------------------------------

impl LogtailConfig {
    /// Annotated default config, written by `logtail config init`.
    pub fn default_toml() -> String {
        r#"# logtail configuration
#
# Configuration hierarchy (highest precedence wins):
#   1. Command-line flags
#   2. Environment variables (LOGTAIL_*)
#   3. Project config (.logtail.toml in current directory)
#   4. User global config (~/.logtail/config.toml)
#   5. Built-in defaults

[connection]
url = "ws://localhost:8080/logviewer/tail"
heartbeat_interval_ms = 10000
reconnect_delay_ms = 3000
max_reconnect_delay_ms = 3000         # Raise above reconnect_delay_ms for exponential backoff

[tail]
file = ""                             # Log file to open on start
amount = 1.0
unit = "mb"                           # kb | mb
follow = true
bytes_per_line = 100                  # Used to size the scrollback from the amount
classifier = "error-only"             # error-only | multi-level

[filter]
mode = "regex"                        # regex | literal
case_insensitive = false
debounce_ms = 300

[render]
color = true
show_correlation = true

[logging]
level = "warn"
file = "~/.logtail/logtail.log"
"#
        .to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
