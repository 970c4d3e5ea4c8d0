//! The rendered unit of output shared by every view.

use std::fmt;

use serde::Serialize;

/// Identity of a [`LogEntry`] within one classifier's lifetime.
///
/// Ids are handed out in strictly increasing order, so arrival order and id
/// order agree. Views use them to cross-reference each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    Plain,
    ErrorSectionHead,
    /// Never stored on its own: it carries the id of the open section and
    /// is folded into that section's text.
    ErrorSectionContinuation,
    RequestStart,
    RequestEnd,
    /// Synthetic connection or status message.
    Info,
}

/// Log level taken from a bracketed `*LEVEL*` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Severity {
    /// Every level, paired with the marker that announces it.
    pub const MARKERS: [(Severity, &'static str); 5] = [
        (Severity::Error, "*ERROR*"),
        (Severity::Warn, "*WARN*"),
        (Severity::Info, "*INFO*"),
        (Severity::Debug, "*DEBUG*"),
        (Severity::Trace, "*TRACE*"),
    ];

    pub fn marker(self) -> &'static str {
        match self {
            Self::Trace => "*TRACE*",
            Self::Debug => "*DEBUG*",
            Self::Info => "*INFO*",
            Self::Warn => "*WARN*",
            Self::Error => "*ERROR*",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One rendered unit of output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub id: EntryId,
    pub kind: EntryKind,
    /// Set for section heads only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Literal content. Error sections hold every folded line, joined by
    /// `\n`.
    pub text: String,
    /// Numeric request id, for `RequestStart` / `RequestEnd` only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<u64>,
    /// The matching request or response, once both have been seen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterpart: Option<EntryId>,
    pub visible: bool,
}

impl LogEntry {
    pub(crate) fn new(id: EntryId, kind: EntryKind, text: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            severity: None,
            text: text.into(),
            correlation_id: None,
            counterpart: None,
            visible: true,
        }
    }

    pub fn is_error_section(&self) -> bool {
        self.kind == EntryKind::ErrorSectionHead
    }

    /// Whether the error-focus view should collect this entry.
    pub fn is_error(&self) -> bool {
        self.is_error_section() && self.severity == Some(Severity::Error)
    }

    /// Fold one continuation line into this section.
    pub fn append_line(&mut self, line: &str) {
        self.text.push('\n');
        self.text.push_str(line);
    }

    /// Number of physical lines in this entry.
    pub fn line_count(&self) -> usize {
        self.text.split('\n').count()
    }
}
