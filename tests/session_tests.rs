//! End-to-end session tests.
//!
//! Drives a `TailSession` the way the websocket driver does: raw byte
//! chunks in, entries and outbound messages out. Socket I/O itself is
//! covered in `socket_tests.rs`.

use logtail::classifier::{EntryKind, LogEntry, Severity};
use logtail::connection::protocol::{Amount, Inbound, SizeUnit};
use logtail::session::{Counterpart, SessionOptions, TailSession, ViewUpdate};

fn open(options: SessionOptions, file: &str, amount: Amount) -> TailSession {
    let mut session = TailSession::new(options);
    session.on_open();
    session.on_command_needed(file, amount);
    session.take_outbound();
    session.take_updates();
    session
}

fn feed(session: &mut TailSession, chunks: &[&str]) {
    for chunk in chunks {
        session.feed_inbound(Inbound::Binary(chunk.as_bytes().to_vec()));
    }
}

fn texts(session: &TailSession) -> Vec<String> {
    session.main_view().map(|e| e.text.clone()).collect()
}

// ---------------------------------------------------------------------------
// Assembly and classification
// ---------------------------------------------------------------------------

#[test]
fn error_section_split_across_chunks_mid_line() {
    let mut session = open(SessionOptions::default(), "error.log", Amount::default());
    feed(
        &mut session,
        &["2024*ERROR* boom\n\tat f", "oo\n\tat bar\nplain next line\n"],
    );

    let view: Vec<&LogEntry> = session.main_view().collect();
    assert_eq!(view.len(), 2);
    assert_eq!(view[0].kind, EntryKind::ErrorSectionHead);
    assert_eq!(view[0].line_count(), 3);
    assert_eq!(view[1].kind, EntryKind::Plain);
    assert_eq!(view[1].text, "plain next line");
}

#[test]
fn chunking_does_not_change_the_result() {
    let log = "10:00 *ERROR* one\r\n\tat a\r\n42 frames omitted\nnext\n\u{1b}[31mred\u{1b}[0m\nx [3] <- 200 ok\n";
    let whole = {
        let mut session = open(SessionOptions::default(), "a.log", Amount::default());
        feed(&mut session, &[log]);
        texts(&session)
    };
    assert_eq!(
        whole,
        vec![
            "10:00 *ERROR* one\n\tat a\n42 frames omitted",
            "next",
            "\u{1b}[31mred\u{1b}[0m",
            "x [3] <- 200 ok"
        ]
    );

    let bytes = log.as_bytes();
    for size in 1..bytes.len() {
        let mut session = open(SessionOptions::default(), "a.log", Amount::default());
        for chunk in bytes.chunks(size) {
            session.feed_inbound(Inbound::Binary(chunk.to_vec()));
        }
        assert_eq!(texts(&session), whole, "chunk size {size}");
    }
}

#[test]
fn multi_level_sections_only_feed_error_focus_for_errors() {
    let options = SessionOptions {
        classifier_mode: logtail::classifier::ClassifierMode::MultiLevel,
        ..SessionOptions::default()
    };
    let mut session = open(options, "app.log", Amount::default());
    feed(
        &mut session,
        &["app *WARN* slow\n\tdetail\napp *ERROR* broken\n\tat x\nok\n"],
    );

    let view: Vec<&LogEntry> = session.main_view().collect();
    assert_eq!(view[0].severity, Some(Severity::Warn));
    assert_eq!(view[0].text, "app *WARN* slow\n\tdetail");
    assert_eq!(session.error_count(), 1);
    assert_eq!(session.focus_view()[0].text, "app *ERROR* broken\n\tat x");
}

// ---------------------------------------------------------------------------
// Request correlation
// ---------------------------------------------------------------------------

#[test]
fn request_and_response_reference_each_other() {
    let mut session = open(SessionOptions::default(), "request.log", Amount::default());
    feed(
        &mut session,
        &[
            "01/Jan/2024:10:00:00 +0000 [7] -> GET /content.html HTTP/1.1\n",
            "01/Jan/2024:10:00:00 +0000 [7] <- 200 text/html 12ms\n",
        ],
    );
    let view: Vec<&LogEntry> = session.main_view().collect();
    assert_eq!(view[0].kind, EntryKind::RequestStart);
    assert_eq!(view[1].kind, EntryKind::RequestEnd);
    assert_eq!(view[0].counterpart, Some(view[1].id));
    assert_eq!(view[1].counterpart, Some(view[0].id));
}

#[test]
fn evicted_request_is_reported_not_dereferenced() {
    let options = SessionOptions {
        bytes_per_line: 1024,
        ..SessionOptions::default()
    };
    // Room for exactly one entry.
    let mut session = open(options, "request.log", Amount::new(1.0, SizeUnit::Kb));
    feed(&mut session, &["x [1] -> GET / HTTP/1.1\nx [1] <- 200 ok\n"]);

    let response = session.main_view().next().cloned().unwrap();
    assert_eq!(response.kind, EntryKind::RequestEnd);
    assert!(matches!(
        session.counterpart_of(&response),
        Counterpart::Evicted(_)
    ));
}

// ---------------------------------------------------------------------------
// Scrollback and views
// ---------------------------------------------------------------------------

#[test]
fn eviction_is_oldest_first_and_bounded() {
    let options = SessionOptions {
        bytes_per_line: 1024,
        ..SessionOptions::default()
    };
    let mut session = open(options, "a.log", Amount::new(3.0, SizeUnit::Kb));
    assert_eq!(session.capacity(), 3);
    for i in 0..10 {
        feed(&mut session, &[&format!("line {i}\n")]);
        assert!(session.main_view().count() <= 3);
    }
    assert_eq!(texts(&session), vec!["line 7", "line 8", "line 9"]);
}

#[test]
fn fractional_amount_sizes_the_scrollback() {
    let session = open(SessionOptions::default(), "a.log", Amount::new(0.5, SizeUnit::Kb));
    // 512 bytes at 100 bytes per line, rounded up.
    assert_eq!(session.capacity(), 6);
}

#[test]
fn error_focus_with_no_errors_is_empty() {
    let mut session = open(SessionOptions::default(), "a.log", Amount::default());
    feed(&mut session, &["one\ntwo\n"]);
    assert!(session.toggle_error_focus());
    assert!(session.active_view().is_empty());
    assert!(!session.toggle_error_focus());
    assert_eq!(session.active_view().len(), 2);
}

#[test]
fn error_focus_receives_live_updates_only_while_active() {
    let mut session = open(SessionOptions::default(), "a.log", Amount::default());
    session.toggle_error_focus();
    session.take_updates();

    feed(&mut session, &["plain\n2024 *ERROR* boom\n\tat foo\n"]);
    let updates = session.take_updates();
    assert_eq!(updates.len(), 2);
    assert!(matches!(updates[0], ViewUpdate::Appended(_)));
    assert!(matches!(updates[1], ViewUpdate::Patched(_)));
    assert_eq!(session.active_view()[0].text, "2024 *ERROR* boom\n\tat foo");
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

#[test]
fn invalid_filter_reveals_everything_and_keeps_last_valid_pattern() {
    let mut session = open(SessionOptions::default(), "a.log", Amount::default());
    feed(&mut session, &["GET /a\nPOST /b\n"]);

    session.set_filter_text("^GET").unwrap();
    assert_eq!(session.main_view().filter(|e| e.visible).count(), 1);

    let err = session.set_filter_text("[").unwrap_err();
    assert_eq!(err.pattern, "[");
    assert_eq!(session.main_view().filter(|e| e.visible).count(), 2);
    assert_eq!(session.filter_pattern(), Some("^GET"));

    // New entries are not hidden while the filter is in error either.
    feed(&mut session, &["PUT /c\n"]);
    assert!(session.main_view().all(|e| e.visible));

    session.set_filter_text("").unwrap();
    assert!(session.filter_error().is_none());
}

#[test]
fn filter_applies_to_entries_arriving_later() {
    let mut session = open(SessionOptions::default(), "a.log", Amount::default());
    session.set_filter_text("keep").unwrap();
    feed(&mut session, &["keep me\ndrop me\n"]);
    let visible: Vec<&str> = session
        .main_view()
        .filter(|e| e.visible)
        .map(|e| e.text.as_str())
        .collect();
    assert_eq!(visible, vec!["keep me"]);
}

// ---------------------------------------------------------------------------
// Commands and connection lifecycle
// ---------------------------------------------------------------------------

#[test]
fn switching_files_restarts_cleanly() {
    let mut session = open(SessionOptions::default(), "a.log", Amount::default());
    feed(&mut session, &["2024 *ERROR* a\n\tat x\npartial"]);
    assert!(!session.take_updates().is_empty());
    session.on_command_needed("b.log", Amount::new(2.0, SizeUnit::Mb));
    assert_eq!(session.take_outbound(), vec!["follow:2mb:b.log"]);
    assert_eq!(session.take_updates(), vec![ViewUpdate::Redraw]);
    assert_eq!(session.main_view().count(), 0);
    assert_eq!(session.error_count(), 0);

    feed(&mut session, &["\tat y\n"]);
    assert_eq!(session.main_view().next().map(|e| e.kind), Some(EntryKind::Plain));
}

#[test]
fn server_notices_are_info_entries() {
    let mut session = open(SessionOptions::default(), "gone.log", Amount::default());
    session.feed_inbound(Inbound::Text("file not found".into()));
    session.feed_inbound(Inbound::Text("pong".into()));
    let view: Vec<&LogEntry> = session.main_view().collect();
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].kind, EntryKind::Info);
}

#[test]
fn stop_is_not_resumed_after_reconnect() {
    let mut session = open(SessionOptions::default(), "a.log", Amount::default());
    session.on_stop();
    assert_eq!(session.take_outbound(), vec!["stop"]);
    session.on_closed("network");
    session.on_open();
    assert!(session.take_outbound().is_empty());
}
