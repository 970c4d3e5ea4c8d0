//! Wire protocol spoken with the log-viewer socket.
//!
//! Client → server messages are plain text:
//!
//! | Message                           | Meaning                                     |
//! |-----------------------------------|---------------------------------------------|
//! | `tail:<amount><unit>:<file>`      | send the last `<amount>` of `<file>`        |
//! | `follow:<amount><unit>:<file>`    | as `tail`, then keep pushing appended data  |
//! | `stop`                            | stop pushing data for the current file      |
//! | `ping`                            | heartbeat, answered with `pong`             |
//!
//! Server → client messages are either binary frames (raw log bytes) or text
//! frames: `pong`, or a human-readable notice such as `file rotated`.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const PING: &str = "ping";
pub const PONG: &str = "pong";
pub const STOP: &str = "stop";

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeUnit {
    Kb,
    #[default]
    Mb,
}

impl SizeUnit {
    pub fn bytes(self) -> u64 {
        match self {
            Self::Kb => 1024,
            Self::Mb => 1024 * 1024,
        }
    }
}

impl fmt::Display for SizeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kb => write!(f, "kb"),
            Self::Mb => write!(f, "mb"),
        }
    }
}

impl FromStr for SizeUnit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "kb" => Ok(Self::Kb),
            "mb" => Ok(Self::Mb),
            other => bail!("unknown size unit '{other}', expected kb or mb"),
        }
    }
}

/// How much of a log file to fetch, e.g. `0.5mb`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    pub value: f64,
    pub unit: SizeUnit,
}

impl Amount {
    pub fn new(value: f64, unit: SizeUnit) -> Self {
        Self { value, unit }
    }

    /// The amount in bytes, rounded to the nearest byte.
    pub fn bytes(self) -> u64 {
        (self.value.max(0.0) * self.unit.bytes() as f64).round() as u64
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::new(1.0, SizeUnit::Mb)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}

impl FromStr for Amount {
    type Err = anyhow::Error;

    /// Parse `<number><unit>`, e.g. `1mb`, `0.25mb`, `512kb`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_alphabetic())
            .with_context(|| format!("amount '{s}' is missing a unit (kb or mb)"))?;
        let (number, unit) = s.split_at(split);
        let value: f64 = number
            .parse()
            .with_context(|| format!("invalid amount '{number}'"))?;
        if !value.is_finite() || value <= 0.0 {
            bail!("amount must be a positive number, got '{number}'");
        }
        Ok(Self::new(value, unit.parse()?))
    }
}

// ---------------------------------------------------------------------------
// Tail command
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TailMode {
    /// One-off excerpt.
    Tail,
    /// Excerpt, then keep streaming new data.
    Follow,
}

impl fmt::Display for TailMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tail => write!(f, "tail"),
            Self::Follow => write!(f, "follow"),
        }
    }
}

/// A `tail:` or `follow:` request for one log file.
#[derive(Debug, Clone, PartialEq)]
pub struct TailCommand {
    pub mode: TailMode,
    pub amount: Amount,
    pub file: String,
}

impl TailCommand {
    pub fn new(mode: TailMode, amount: Amount, file: impl Into<String>) -> Self {
        Self {
            mode,
            amount,
            file: file.into(),
        }
    }

    pub fn with_mode(&self, mode: TailMode) -> Self {
        Self {
            mode,
            ..self.clone()
        }
    }
}

impl fmt::Display for TailCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.mode, self.amount, self.file)
    }
}

impl FromStr for TailCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (mode, rest) = s
            .split_once(':')
            .with_context(|| format!("command '{s}' is missing ':'"))?;
        let mode = match mode {
            "tail" => TailMode::Tail,
            "follow" => TailMode::Follow,
            other => bail!("unknown command '{other}'"),
        };
        // The file path may itself contain ':' (e.g. Windows drive letters).
        let (amount, file) = rest
            .split_once(':')
            .with_context(|| format!("command '{s}' is missing the file"))?;
        if file.is_empty() {
            bail!("command '{s}' names no file");
        }
        Ok(Self::new(mode, amount.parse()?, file))
    }
}

// ---------------------------------------------------------------------------
// Inbound payloads
// ---------------------------------------------------------------------------

/// One message received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Raw log bytes.
    Binary(Vec<u8>),
    /// `pong` or a server notice.
    Text(String),
    /// Anything else the transport delivered; carries a short description.
    Unsupported(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
