//! Tail session — one live view onto one log-viewer socket.
//!
//! [`TailSession`] wires the pipeline together:
//!
//! ```text
//! inbound payload
//!   -> LineAssembler   complete lines
//!   -> LineClassifier  tagged entries
//!   -> ScrollbackStore (+ ErrorFocus for error sections)
//!   -> FilterEngine    visibility
//! ```
//!
//! The session never performs I/O. Messages destined for the server are
//! queued and drained with [`TailSession::take_outbound`]; changes to the
//! active view are queued as [`ViewUpdate`]s and drained with
//! [`TailSession::take_updates`]. A driver (the websocket loop, or the
//! offline replay) owns the session and moves data in and out.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::assembler::LineAssembler;
use crate::classifier::{ClassifierMode, EntryId, EntryKind, LineClassifier, LogEntry};
use crate::connection::protocol::{Amount, Inbound, PONG, TailCommand, TailMode};
use crate::connection::{ConnectionManager, ConnectionPolicy, ConnectionState};
use crate::filter::debounce::Debouncer;
use crate::filter::{FilterEngine, FilterMode, PatternError};
use crate::focus::ErrorFocus;
use crate::scrollback::{self, ScrollbackStore};

/// Construction parameters for a [`TailSession`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub classifier_mode: ClassifierMode,
    pub filter_mode: FilterMode,
    pub case_insensitive: bool,
    pub filter_debounce: Duration,
    pub bytes_per_line: u64,
    pub follow: bool,
    pub policy: ConnectionPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            classifier_mode: ClassifierMode::default(),
            filter_mode: FilterMode::default(),
            case_insensitive: false,
            filter_debounce: Duration::from_millis(300),
            bytes_per_line: scrollback::DEFAULT_BYTES_PER_LINE,
            follow: true,
            policy: ConnectionPolicy::default(),
        }
    }
}

/// A change to the currently active view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewUpdate {
    /// A new entry was added at the end.
    Appended(EntryId),
    /// An existing entry (an error section) grew.
    Patched(EntryId),
    /// The view must be rebuilt from scratch.
    Redraw,
}

/// Where a request/response entry's partner is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counterpart<'a> {
    /// Still in the scrollback.
    Found(&'a LogEntry),
    /// Was seen, but has been evicted.
    Evicted(EntryId),
    /// Never seen (yet).
    Missing,
}

/// A user action, as delivered by whatever front end is attached.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    /// Start tailing a file.
    Open { file: String, amount: Amount },
    /// Filter text as typed; applied after the debounce period.
    FilterInput(String),
    ToggleErrorFocus,
    ToggleFollow,
    Stop,
    Reload,
    Quit,
}

/// The log file and amount the user selected.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub file: String,
    pub amount: Amount,
}

#[derive(Debug)]
pub struct TailSession {
    assembler: LineAssembler,
    classifier: LineClassifier,
    scrollback: ScrollbackStore,
    focus: ErrorFocus,
    filter: FilterEngine,
    filter_input: Debouncer<String>,
    connection: ConnectionManager,
    bytes_per_line: u64,
    follow: bool,
    selection: Option<Selection>,
    outbound: Vec<String>,
    updates: Vec<ViewUpdate>,
}

impl TailSession {
    pub fn new(options: SessionOptions) -> Self {
        let capacity = scrollback::capacity_for(Amount::default(), options.bytes_per_line);
        Self {
            assembler: LineAssembler::new(),
            classifier: LineClassifier::new(options.classifier_mode),
            scrollback: ScrollbackStore::new(capacity),
            focus: ErrorFocus::new(),
            filter: FilterEngine::new(options.filter_mode, options.case_insensitive),
            filter_input: Debouncer::new(options.filter_debounce),
            connection: ConnectionManager::new(options.policy),
            bytes_per_line: options.bytes_per_line,
            follow: options.follow,
            selection: None,
            outbound: Vec::new(),
            updates: Vec::new(),
        }
    }

    // -- Commands from the UI --

    /// Start tailing `file`. Discards the current view and any partial
    /// state from the previous file, then sends `tail:` or `follow:`
    /// depending on follow mode.
    pub fn on_command_needed(&mut self, file: &str, amount: Amount) {
        let mode = if self.follow {
            TailMode::Follow
        } else {
            TailMode::Tail
        };
        let command = TailCommand::new(mode, amount, file);
        info!(command = %command, "tail command issued");

        self.selection = Some(Selection {
            file: file.to_string(),
            amount,
        });
        self.reset_view();
        self.scrollback
            .set_capacity(scrollback::capacity_for(amount, self.bytes_per_line));

        if let Some(wire) = self.connection.issue(command) {
            self.outbound.push(wire);
        }
    }

    /// Re-issue the current selection, if any.
    pub fn reload(&mut self) {
        if let Some(selection) = self.selection.clone() {
            self.on_command_needed(&selection.file, selection.amount);
        }
    }

    /// Ask the server to stop pushing data. The view is kept; partial
    /// stream state is discarded so nothing bleeds into the next command.
    pub fn on_stop(&mut self) {
        self.follow = false;
        self.reset_stream();
        if let Some(wire) = self.connection.stop() {
            self.outbound.push(wire);
        }
    }

    /// Flip follow mode. Turning it on restarts the current selection in
    /// `follow:` mode; turning it off stops the stream. Returns the new
    /// state.
    pub fn toggle_follow(&mut self) -> bool {
        if self.follow {
            self.on_stop();
        } else {
            self.follow = true;
            self.reload();
        }
        self.follow
    }

    /// Switch between the main view and the error-focus view. Returns
    /// whether error focus is now active.
    pub fn toggle_error_focus(&mut self) -> bool {
        let active = self.focus.toggle();
        self.updates.push(ViewUpdate::Redraw);
        active
    }

    /// Compile and apply a filter immediately.
    ///
    /// On error every entry becomes visible and the error stays available
    /// through [`filter_error`](Self::filter_error).
    pub fn set_filter_text(&mut self, raw: &str) -> Result<(), PatternError> {
        self.filter_input.cancel();
        let result = self.filter.set_pattern(raw);
        if let Err(e) = &result {
            debug!(error = %e, "filter pattern rejected");
        }
        self.filter.apply_to(self.scrollback.iter_mut());
        self.filter.apply_to(self.focus.sections_mut());
        self.updates.push(ViewUpdate::Redraw);
        result
    }

    /// Record a keystroke-level filter change; it is applied by
    /// [`poll_filter`](Self::poll_filter) once input pauses.
    pub fn filter_input(&mut self, raw: impl Into<String>, now: Instant) {
        self.filter_input.push(raw.into(), now);
    }

    /// When the pending filter change is due.
    pub fn filter_deadline(&self) -> Option<Instant> {
        self.filter_input.deadline()
    }

    /// Apply the pending filter change if its quiet period has elapsed.
    /// Returns `None` when nothing was applied.
    pub fn poll_filter(&mut self, now: Instant) -> Option<Result<(), PatternError>> {
        let raw = self.filter_input.poll(now)?;
        Some(self.set_filter_text(&raw))
    }

    /// Apply one user action. [`Control::Quit`] is left to the driver.
    pub fn handle(&mut self, control: Control, now: Instant) {
        match control {
            Control::Open { file, amount } => self.on_command_needed(&file, amount),
            Control::FilterInput(raw) => self.filter_input(raw, now),
            Control::ToggleErrorFocus => {
                self.toggle_error_focus();
            }
            Control::ToggleFollow => {
                self.toggle_follow();
            }
            Control::Stop => self.on_stop(),
            Control::Reload => self.reload(),
            Control::Quit => {}
        }
    }

    // -- Events from the transport --

    /// The socket connected. On a reconnect with an active command the
    /// view restarts from scratch before the command is replayed.
    pub fn on_open(&mut self) {
        let reconnect = self.connection.is_reconnect();
        if reconnect && self.connection.last_command().is_some() {
            self.reset_view();
        }
        info!(reconnect, "connection open");
        let messages = self.connection.on_open();
        self.outbound.extend(messages);
    }

    /// The socket is about to be dialed.
    pub fn on_connecting(&mut self) {
        self.connection.on_connecting();
    }

    /// The socket closed or failed. Adds an `Info` entry and returns the
    /// delay before the next connection attempt.
    pub fn on_closed(&mut self, reason: &str) -> Duration {
        let delay = self.connection.on_closed();
        warn!(reason, delay_ms = delay.as_millis() as u64, "connection closed");
        self.push_info(format!(
            "connection closed ({reason}), reconnecting in {:.1}s",
            delay.as_secs_f64()
        ));
        delay
    }

    /// Heartbeat tick: queues `ping` while the socket is open.
    pub fn heartbeat(&mut self) {
        if let Some(ping) = self.connection.heartbeat() {
            self.outbound.push(ping.to_string());
        }
    }

    /// Route one inbound message.
    pub fn feed_inbound(&mut self, payload: Inbound) {
        match payload {
            Inbound::Binary(bytes) => {
                for line in self.assembler.feed(&bytes) {
                    self.ingest_line(&line);
                }
            }
            Inbound::Text(text) if text == PONG => {}
            Inbound::Text(text) => self.push_info(text),
            Inbound::Unsupported(kind) => {
                warn!(kind = %kind, "ignoring unsupported payload");
            }
        }
    }

    /// Classify any pending partial line as if it had been terminated.
    /// Used when a finite stream ends.
    pub fn finish_stream(&mut self) {
        if let Some(line) = self.assembler.flush() {
            self.ingest_line(&line);
        }
    }

    /// Add a synthetic status entry to the main view.
    pub fn push_info(&mut self, text: impl Into<String>) {
        let mut entry = self.classifier.info(text);
        self.filter.apply(&mut entry);
        let id = entry.id;
        self.scrollback.append(entry);
        if !self.focus.is_active() {
            self.updates.push(ViewUpdate::Appended(id));
        }
    }

    // -- Queries --

    pub fn take_outbound(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outbound)
    }

    pub fn take_updates(&mut self) -> Vec<ViewUpdate> {
        std::mem::take(&mut self.updates)
    }

    pub fn main_view(&self) -> impl Iterator<Item = &LogEntry> {
        self.scrollback.iter()
    }

    pub fn focus_view(&self) -> &[LogEntry] {
        self.focus.sections()
    }

    pub fn is_error_focus(&self) -> bool {
        self.focus.is_active()
    }

    /// Entries of whichever view is active, visible or not.
    pub fn active_view(&self) -> Vec<&LogEntry> {
        if self.focus.is_active() {
            self.focus.sections().iter().collect()
        } else {
            self.scrollback.iter().collect()
        }
    }

    /// Look `id` up in the active view.
    pub fn active_entry(&self, id: EntryId) -> Option<&LogEntry> {
        if self.focus.is_active() {
            self.focus.get(id)
        } else {
            self.scrollback.get(id)
        }
    }

    /// Whether `id` is still held by the scrollback.
    pub fn in_scrollback(&self, id: EntryId) -> bool {
        self.scrollback.get(id).is_some()
    }

    pub fn counterpart_of(&self, entry: &LogEntry) -> Counterpart<'_> {
        match entry.counterpart {
            Some(id) => match self.scrollback.get(id) {
                Some(found) => Counterpart::Found(found),
                None => Counterpart::Evicted(id),
            },
            None => Counterpart::Missing,
        }
    }

    pub fn filter_error(&self) -> Option<&PatternError> {
        self.filter.error()
    }

    pub fn filter_pattern(&self) -> Option<&str> {
        self.filter.pattern()
    }

    pub fn error_count(&self) -> usize {
        self.focus.len()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.connection.policy().heartbeat_interval
    }

    pub fn follow(&self) -> bool {
        self.follow
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn capacity(&self) -> usize {
        self.scrollback.capacity()
    }

    // -- Internal --

    fn ingest_line(&mut self, line: &str) {
        let mut entry = self.classifier.classify(line);

        if entry.kind == EntryKind::ErrorSectionContinuation {
            self.extend_section(entry.id, line);
            return;
        }

        self.filter.apply(&mut entry);
        let id = entry.id;
        let is_error = entry.is_error();
        let link = match entry.kind {
            EntryKind::RequestEnd => entry.counterpart,
            _ => None,
        };

        if is_error {
            self.focus.on_error_opened(&entry);
        }
        self.scrollback.append(entry);
        if let Some(request) = link {
            self.scrollback.link(request, id);
        }

        if !self.focus.is_active() || is_error {
            self.updates.push(ViewUpdate::Appended(id));
        }
    }

    fn extend_section(&mut self, id: EntryId, line: &str) {
        if let Some(head) = self.scrollback.extend_section(id, line) {
            self.filter.apply(head);
            if !self.focus.is_active() {
                self.updates.push(ViewUpdate::Patched(id));
            }
        }

        if self.focus.on_error_updated(id, line) {
            if let Some(section) = self.focus.sections_mut().last_mut()
                && section.id == id
            {
                self.filter.apply(section);
            }
            if self.focus.is_active() {
                self.updates.push(ViewUpdate::Patched(id));
            }
        }
    }

    fn reset_stream(&mut self) {
        self.assembler.clear();
        self.classifier.reset();
    }

    fn reset_view(&mut self) {
        self.reset_stream();
        self.scrollback.clear();
        self.focus.clear();
        self.updates.push(ViewUpdate::Redraw);
    }
}

impl Default for TailSession {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
