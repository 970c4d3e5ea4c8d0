//! Line classification — decide what each complete log line is.
//!
//! Every line becomes exactly one [`LogEntry`]. The classifier carries a
//! little state from line to line:
//!
//! - the **open error section**, which keeps absorbing continuation lines
//!   (stack-trace frames) until a line arrives that cannot be one;
//! - the **detected stream kind**, which stops request-log detection once
//!   the stream has shown itself to be an error log;
//! - the **unanswered requests**, used to link a response back to its
//!   request.
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. open section + continuation line → `ErrorSectionContinuation`
//!    (otherwise the section closes and evaluation continues);
//! 2. level marker → new `ErrorSectionHead`;
//! 3. request-start shape (unless the stream is an error log) →
//!    `RequestStart`;
//! 4. request-end shape → `RequestEnd`;
//! 5. anything else → `Plain`.

pub mod entry;
pub mod patterns;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use entry::{EntryId, EntryKind, LogEntry, Severity};

/// Upper bound on requests kept waiting for their response.
const MAX_PENDING_REQUESTS: usize = 4096;

/// Which markers open an error section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassifierMode {
    /// Only `*ERROR*` opens a section.
    #[default]
    ErrorOnly,
    /// Any of `*TRACE*`, `*DEBUG*`, `*INFO*`, `*WARN*`, `*ERROR*` opens a
    /// section tagged with that level.
    MultiLevel,
}

impl std::fmt::Display for ClassifierMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ErrorOnly => write!(f, "error-only"),
            Self::MultiLevel => write!(f, "multi-level"),
        }
    }
}

/// What the stream has turned out to contain so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamKind {
    #[default]
    Unknown,
    Error,
    Request,
}

#[derive(Debug)]
pub struct LineClassifier {
    mode: ClassifierMode,
    next_id: u64,
    open_section: Option<EntryId>,
    stream_kind: StreamKind,
    pending_requests: HashMap<u64, EntryId>,
}

impl LineClassifier {
    pub fn new(mode: ClassifierMode) -> Self {
        Self {
            mode,
            next_id: 0,
            open_section: None,
            stream_kind: StreamKind::Unknown,
            pending_requests: HashMap::new(),
        }
    }

    pub fn mode(&self) -> ClassifierMode {
        self.mode
    }

    pub fn stream_kind(&self) -> StreamKind {
        self.stream_kind
    }

    pub fn open_section(&self) -> Option<EntryId> {
        self.open_section
    }

    /// Classify one complete line.
    ///
    /// A returned `ErrorSectionContinuation` carries the id of the section
    /// it belongs to and holds only the new line; callers fold it into that
    /// section instead of storing it.
    pub fn classify(&mut self, line: &str) -> LogEntry {
        if let Some(section) = self.open_section {
            if patterns::is_continuation(line) {
                return LogEntry::new(section, EntryKind::ErrorSectionContinuation, line);
            }
            self.open_section = None;
        }

        if let Some(severity) = self.section_marker(line) {
            let mut entry = LogEntry::new(self.allocate(), EntryKind::ErrorSectionHead, line);
            entry.severity = Some(severity);
            self.open_section = Some(entry.id);
            self.stream_kind = StreamKind::Error;
            return entry;
        }

        if matches!(self.stream_kind, StreamKind::Unknown | StreamKind::Request)
            && let Some(start) = patterns::match_request_start(line)
        {
            let mut entry = LogEntry::new(self.allocate(), EntryKind::RequestStart, line);
            entry.correlation_id = Some(start.id);
            self.remember_request(start.id, entry.id);
            self.stream_kind = StreamKind::Request;
            return entry;
        }

        if let Some(end) = patterns::match_request_end(line) {
            let mut entry = LogEntry::new(self.allocate(), EntryKind::RequestEnd, line);
            entry.correlation_id = Some(end.id);
            entry.counterpart = self.pending_requests.remove(&end.id);
            return entry;
        }

        LogEntry::new(self.allocate(), EntryKind::Plain, line)
    }

    /// Create a synthetic status entry (connection state, server notices).
    pub fn info(&mut self, text: impl Into<String>) -> LogEntry {
        LogEntry::new(self.allocate(), EntryKind::Info, text)
    }

    /// Forget all per-stream state. Ids keep increasing across resets.
    pub fn reset(&mut self) {
        self.open_section = None;
        self.stream_kind = StreamKind::Unknown;
        self.pending_requests.clear();
    }

    fn section_marker(&self, line: &str) -> Option<Severity> {
        match self.mode {
            ClassifierMode::ErrorOnly => line
                .contains(Severity::Error.marker())
                .then_some(Severity::Error),
            ClassifierMode::MultiLevel => patterns::find_level_marker(line),
        }
    }

    fn remember_request(&mut self, correlation_id: u64, entry: EntryId) {
        self.pending_requests.insert(correlation_id, entry);
        if self.pending_requests.len() > MAX_PENDING_REQUESTS
            && let Some(oldest) = self
                .pending_requests
                .iter()
                .min_by_key(|&(_, id)| *id)
                .map(|(key, _)| *key)
        {
            self.pending_requests.remove(&oldest);
        }
    }

    fn allocate(&mut self) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self::new(ClassifierMode::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_line() {
        let mut classifier = LineClassifier::default();
        let entry = classifier.classify("just text");
        assert_eq!(entry.kind, EntryKind::Plain);
        assert_eq!(classifier.stream_kind(), StreamKind::Unknown);
    }

    #[test]
    fn error_marker_opens_section() {
        let mut classifier = LineClassifier::default();
        let head = classifier.classify("2024-01-01 *ERROR* [main] boom");
        assert_eq!(head.kind, EntryKind::ErrorSectionHead);
        assert_eq!(head.severity, Some(Severity::Error));
        assert_eq!(classifier.open_section(), Some(head.id));
        assert_eq!(classifier.stream_kind(), StreamKind::Error);
    }

    #[test]
    fn continuations_reference_the_open_section() {
        let mut classifier = LineClassifier::default();
        let head = classifier.classify("2024 *ERROR* boom");
        let frame = classifier.classify("\tat foo");
        let digit = classifier.classify("2024 next timestamped line");
        let empty = classifier.classify("");
        for entry in [&frame, &digit, &empty] {
            assert_eq!(entry.kind, EntryKind::ErrorSectionContinuation);
            assert_eq!(entry.id, head.id);
        }
    }

    #[test]
    fn letter_leading_line_closes_section() {
        let mut classifier = LineClassifier::default();
        classifier.classify("2024 *ERROR* boom");
        let next = classifier.classify("plain next line");
        assert_eq!(next.kind, EntryKind::Plain);
        assert_eq!(classifier.open_section(), None);
        // A later tab line is no longer a continuation.
        assert_eq!(classifier.classify("\tstray").kind, EntryKind::Plain);
    }

    #[test]
    fn new_error_closes_previous_section() {
        let mut classifier = LineClassifier::default();
        let first = classifier.classify("2024 *ERROR* one");
        let second = classifier.classify("*ERROR* two");
        assert_eq!(second.kind, EntryKind::ErrorSectionHead);
        assert_ne!(first.id, second.id);
        assert_eq!(classifier.open_section(), Some(second.id));
    }

    #[test]
    fn error_only_mode_ignores_other_levels() {
        let mut classifier = LineClassifier::new(ClassifierMode::ErrorOnly);
        assert_eq!(
            classifier.classify("2024 *WARN* careful").kind,
            EntryKind::Plain
        );
    }

    #[test]
    fn multi_level_mode_tags_severity() {
        let mut classifier = LineClassifier::new(ClassifierMode::MultiLevel);
        let warn = classifier.classify("2024 *WARN* careful");
        assert_eq!(warn.kind, EntryKind::ErrorSectionHead);
        assert_eq!(warn.severity, Some(Severity::Warn));
        assert!(!warn.is_error());
        let error = classifier.classify("app *ERROR* broken");
        assert_eq!(error.kind, EntryKind::ErrorSectionHead);
        assert!(error.is_error());
        assert_ne!(error.id, warn.id);
    }

    #[test]
    fn digit_leading_marker_line_continues_open_section() {
        let mut classifier = LineClassifier::new(ClassifierMode::MultiLevel);
        let warn = classifier.classify("2024 *WARN* careful");
        let next = classifier.classify("2024 *ERROR* broken");
        assert_eq!(next.kind, EntryKind::ErrorSectionContinuation);
        assert_eq!(next.id, warn.id);
        assert_eq!(classifier.open_section(), Some(warn.id));
    }

    #[test]
    fn request_pair_is_correlated() {
        let mut classifier = LineClassifier::default();
        let start = classifier.classify("01/Jan/2024:00:00:00 +0000 [7] -> GET /a HTTP/1.1");
        assert_eq!(start.kind, EntryKind::RequestStart);
        assert_eq!(start.correlation_id, Some(7));
        assert_eq!(classifier.stream_kind(), StreamKind::Request);

        let end = classifier.classify("01/Jan/2024:00:00:01 +0000 [7] <- 200 text/html 3ms");
        assert_eq!(end.kind, EntryKind::RequestEnd);
        assert_eq!(end.correlation_id, Some(7));
        assert_eq!(end.counterpart, Some(start.id));
    }

    #[test]
    fn response_without_request_has_no_counterpart() {
        let mut classifier = LineClassifier::default();
        let end = classifier.classify("x [9] <- 404 text/html 1ms");
        assert_eq!(end.kind, EntryKind::RequestEnd);
        assert_eq!(end.counterpart, None);
    }

    #[test]
    fn error_stream_disables_request_start_detection() {
        let mut classifier = LineClassifier::default();
        classifier.classify("2024 *ERROR* boom");
        let line = classifier.classify("x [1] -> GET /a HTTP/1.1");
        assert_eq!(line.kind, EntryKind::Plain);
        // Responses are still recognized.
        assert_eq!(
            classifier.classify("x [1] <- 200 ok").kind,
            EntryKind::RequestEnd
        );
    }

    #[test]
    fn reset_forgets_stream_state_but_not_ids() {
        let mut classifier = LineClassifier::default();
        let head = classifier.classify("2024 *ERROR* boom");
        classifier.reset();
        assert_eq!(classifier.open_section(), None);
        assert_eq!(classifier.stream_kind(), StreamKind::Unknown);
        let next = classifier.classify("\tat foo");
        assert_eq!(next.kind, EntryKind::Plain);
        assert!(next.id > head.id);
    }

    #[test]
    fn info_entries_get_fresh_ids() {
        let mut classifier = LineClassifier::default();
        let a = classifier.info("connected");
        let b = classifier.info("closed");
        assert_eq!(a.kind, EntryKind::Info);
        assert!(b.id > a.id);
    }
}
