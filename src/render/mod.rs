//! Terminal rendering of session views.
//!
//! The terminal is append-only, so [`TerminalView`] prints entries as they
//! arrive, prints only the new lines when an error section grows, and
//! reprints the whole active view on a redraw.

pub mod sanitize;

use anyhow::Result;
use colored::{ColoredString, Colorize};

use crate::classifier::{EntryId, EntryKind, LogEntry, Severity};
use crate::connection::ConnectionState;
use crate::connection::socket::ViewSink;
use crate::session::{Counterpart, TailSession, ViewUpdate};

/// Output format for entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    /// One JSON object per entry. A grown section is emitted again with
    /// the same id.
    Json,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry formatting
// ---------------------------------------------------------------------------

/// Format one entry for the terminal, with its correlation hint when
/// `show_correlation` is set.
pub fn format_entry(session: &TailSession, entry: &LogEntry, show_correlation: bool) -> String {
    let mut lines = entry.text.split('\n');
    let head = lines.next().unwrap_or_default();
    let mut out = colorize_head(entry, &sanitize::strip_ansi(head)).to_string();

    if show_correlation && let Some(hint) = correlation_hint(session, entry) {
        out.push_str("  ");
        out.push_str(&hint.dimmed().to_string());
    }
    for line in lines {
        out.push('\n');
        out.push_str(&colorize_continuation(entry, &sanitize::strip_ansi(line)).to_string());
    }
    out
}

/// Describe where a request's response (or a response's request) is.
pub fn correlation_hint(session: &TailSession, entry: &LogEntry) -> Option<String> {
    let id = entry.correlation_id?;
    let hint = match (entry.kind, session.counterpart_of(entry)) {
        (EntryKind::RequestStart, Counterpart::Found(response)) => {
            format!("[{id}] answered by {}", response.id)
        }
        (EntryKind::RequestStart, Counterpart::Evicted(response)) => {
            format!("[{id}] answered by {response} (no longer in view)")
        }
        (EntryKind::RequestStart, Counterpart::Missing) => format!("[{id}] response not logged yet"),
        (EntryKind::RequestEnd, Counterpart::Found(request)) => {
            format!("[{id}] request {}", request.id)
        }
        (EntryKind::RequestEnd, Counterpart::Evicted(request)) => {
            format!("[{id}] request {request} no longer in view")
        }
        (EntryKind::RequestEnd, Counterpart::Missing) => {
            format!("[{id}] no matching request seen")
        }
        _ => return None,
    };
    Some(hint)
}

fn colorize_head(entry: &LogEntry, text: &str) -> ColoredString {
    match entry.kind {
        EntryKind::ErrorSectionHead => colorize_severity(entry.severity, text).bold(),
        EntryKind::RequestStart => text.cyan(),
        EntryKind::RequestEnd => colorize_status(text),
        EntryKind::Info => text.dimmed().italic(),
        EntryKind::Plain | EntryKind::ErrorSectionContinuation => text.normal(),
    }
}

fn colorize_continuation(entry: &LogEntry, text: &str) -> ColoredString {
    if entry.is_error_section() {
        colorize_severity(entry.severity, text)
    } else {
        text.normal()
    }
}

fn colorize_severity(severity: Option<Severity>, text: &str) -> ColoredString {
    match severity {
        Some(Severity::Error) => text.red(),
        Some(Severity::Warn) => text.yellow(),
        Some(Severity::Info) => text.normal(),
        Some(Severity::Debug | Severity::Trace) => text.dimmed(),
        None => text.normal(),
    }
}

/// Color a response line by its HTTP status class.
fn colorize_status(text: &str) -> ColoredString {
    let status = crate::classifier::patterns::match_request_end(text).map(|end| end.status);
    match status {
        Some(500..) => text.red(),
        Some(400..=499) => text.yellow(),
        Some(_) => text.green(),
        None => text.normal(),
    }
}

// ---------------------------------------------------------------------------
// Status line
// ---------------------------------------------------------------------------

/// One-line summary: connection, file, mode, error count, filter state.
pub fn status_line(session: &TailSession) -> String {
    let state = match session.connection_state() {
        ConnectionState::Open => "open".green(),
        ConnectionState::Connecting => "connecting".yellow(),
        ConnectionState::Closed => "closed".red(),
    };
    let mut parts = vec![format!("[{state}]")];

    if let Some(selection) = session.selection() {
        let mode = if session.follow() { "follow" } else { "tail" };
        parts.push(format!("{mode} {} ({})", selection.file.bold(), selection.amount));
    }

    let errors = session.error_count();
    let errors = if errors > 0 {
        format!("errors: {errors}").red().to_string()
    } else {
        "errors: 0".to_string()
    };
    parts.push(errors);

    if session.is_error_focus() {
        parts.push("error focus".magenta().to_string());
    }

    if let Some(e) = session.filter_error() {
        parts.push(format!("filter disabled: {e}").red().to_string());
    } else if let Some(pattern) = session.filter_pattern() {
        parts.push(format!("filter: {pattern}"));
    }

    parts.join(" | ")
}

// ---------------------------------------------------------------------------
// Terminal sink
// ---------------------------------------------------------------------------

/// Prints session changes to stdout.
#[derive(Debug)]
pub struct TerminalView {
    format: OutputFormat,
    show_correlation: bool,
    /// The section most recently printed, with how many of its lines are
    /// already on screen (zero while hidden by the filter).
    last_section: Option<(EntryId, usize)>,
    last_status: Option<String>,
}

impl TerminalView {
    pub fn new(format: OutputFormat, show_correlation: bool) -> Self {
        Self {
            format,
            show_correlation,
            last_section: None,
            last_status: None,
        }
    }

    /// Render `updates` into printable chunks, in order.
    pub fn render(&mut self, session: &TailSession, updates: &[ViewUpdate]) -> Vec<String> {
        let mut out = Vec::new();
        for update in updates {
            match *update {
                ViewUpdate::Redraw => {
                    self.last_section = None;
                    if self.format == OutputFormat::Text {
                        out.push(format!("{}", "-".repeat(60).dimmed()));
                    }
                    for entry in session.active_view() {
                        self.emit_entry(session, entry, &mut out);
                    }
                }
                ViewUpdate::Appended(id) => {
                    if let Some(entry) = session.active_entry(id) {
                        self.emit_entry(session, entry, &mut out);
                    }
                }
                ViewUpdate::Patched(id) => {
                    if let Some(entry) = session.active_entry(id) {
                        self.emit_patch(session, entry, &mut out);
                    }
                }
            }
        }

        if self.format == OutputFormat::Text {
            let status = status_line(session);
            if updates.contains(&ViewUpdate::Redraw) || self.last_status.as_ref() != Some(&status) {
                out.push(status.clone());
                self.last_status = Some(status);
            }
        }
        out
    }

    fn emit_entry(&mut self, session: &TailSession, entry: &LogEntry, out: &mut Vec<String>) {
        let shown = if entry.visible { entry.line_count() } else { 0 };
        if entry.is_error_section() {
            self.last_section = Some((entry.id, shown));
        }
        if entry.visible {
            out.push(self.format_one(session, entry));
        }
    }

    fn emit_patch(&mut self, session: &TailSession, entry: &LogEntry, out: &mut Vec<String>) {
        let shown = match self.last_section {
            Some((id, shown)) if id == entry.id => shown,
            _ => 0,
        };
        if !entry.visible {
            return;
        }

        if shown == 0 || self.format == OutputFormat::Json {
            out.push(self.format_one(session, entry));
        } else {
            for line in entry.text.split('\n').skip(shown) {
                out.push(colorize_continuation(entry, &sanitize::strip_ansi(line)).to_string());
            }
        }
        self.last_section = Some((entry.id, entry.line_count()));
    }

    fn format_one(&self, session: &TailSession, entry: &LogEntry) -> String {
        match self.format {
            OutputFormat::Text => format_entry(session, entry, self.show_correlation),
            OutputFormat::Json => serde_json::to_string(entry).unwrap_or_default(),
        }
    }
}

impl ViewSink for TerminalView {
    fn refresh(&mut self, session: &TailSession, updates: &[ViewUpdate]) {
        for chunk in self.render(session, updates) {
            println!("{chunk}");
        }
    }
}

/// Print every visible entry of the active view, then the status line.
pub fn print_snapshot(session: &TailSession, format: OutputFormat, show_correlation: bool) -> Result<()> {
    for entry in session.active_view().into_iter().filter(|e| e.visible) {
        match format {
            OutputFormat::Text => println!("{}", format_entry(session, entry, show_correlation)),
            OutputFormat::Json => println!("{}", serde_json::to_string(entry)?),
        }
    }
    if format == OutputFormat::Text {
        println!("{}", status_line(session));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
