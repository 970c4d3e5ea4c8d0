//! Line shapes recognized by the classifier.

use regex::Regex;
use std::sync::LazyLock;

use super::entry::Severity;

/// `<prefix> [<id>] -> <METHOD> <rest>`, as written by request loggers.
static REQUEST_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<prefix>.*?)\[(?P<id>\d+)\] -> (?P<method>[A-Z]+) (?P<rest>.*)$")
        .expect("request start regex must compile")
});

/// `<prefix> [<id>] <- <status> <rest>`.
static REQUEST_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<prefix>.*?)\[(?P<id>\d+)\] <- (?P<status>\d{3}) (?P<rest>.*)$")
        .expect("request end regex must compile")
});

/// Parsed request-start line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestStart<'a> {
    pub id: u64,
    pub method: &'a str,
}

/// Parsed request-end line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnd {
    pub id: u64,
    pub status: u16,
}

pub fn match_request_start(line: &str) -> Option<RequestStart<'_>> {
    let caps = REQUEST_START_RE.captures(line)?;
    let id = caps.name("id")?.as_str().parse().ok()?;
    let method = caps.name("method")?.as_str();
    Some(RequestStart { id, method })
}

pub fn match_request_end(line: &str) -> Option<RequestEnd> {
    let caps = REQUEST_END_RE.captures(line)?;
    let id = caps.name("id")?.as_str().parse().ok()?;
    let status = caps.name("status")?.as_str().parse().ok()?;
    Some(RequestEnd { id, status })
}

/// Earliest `*LEVEL*` marker in the line, if any.
pub fn find_level_marker(line: &str) -> Option<Severity> {
    Severity::MARKERS
        .iter()
        .filter_map(|&(severity, marker)| line.find(marker).map(|pos| (pos, severity)))
        .min_by_key(|&(pos, _)| pos)
        .map(|(_, severity)| severity)
}

/// Stack-trace continuation test.
///
/// A line continues the open error section when it starts with a tab or a
/// digit, or is empty. Continuation frames are tab-indented, and ordinary
/// log lines start with a timestamp whose first character is a digit (the
/// year), so anything else marks the start of unrelated output. The empty
/// line counts as a continuation. A leading space does not: space-indented
/// lines close the section.
pub fn is_continuation(line: &str) -> bool {
    match line.chars().next() {
        None => true,
        Some('\t') => true,
        Some(c) => c.is_ascii_digit(),
    }
}
