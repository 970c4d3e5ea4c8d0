//! Websocket driver — moves bytes between the server and a [`TailSession`].
//!
//! One `tokio::select!` loop multiplexes the socket, the heartbeat timer,
//! user controls, and the filter debounce deadline. When the socket drops,
//! the loop waits out the reconnect delay (still serving controls) and dials
//! again. The session decides everything; this module only does I/O.

use std::future::pending;
use std::time::Duration;

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tracing::{debug, info, warn};

use super::protocol::Inbound;
use crate::session::{Control, TailSession, ViewUpdate};

/// Receives the session after every batch of changes.
pub trait ViewSink {
    fn refresh(&mut self, session: &TailSession, updates: &[ViewUpdate]);
}

/// Why the inner loop returned.
#[derive(Debug, PartialEq)]
enum Exit {
    Quit,
    Closed(String),
}

/// Map a websocket data frame onto the session's inbound payload. Ping and
/// pong are answered by the library and yield `None`; close frames end the
/// connection in the driver and never reach here.
pub fn to_inbound(message: Message) -> Option<Inbound> {
    match message {
        Message::Binary(bytes) => Some(Inbound::Binary(bytes)),
        Message::Text(text) => Some(Inbound::Text(text)),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) => None,
        Message::Frame(_) => Some(Inbound::Unsupported("raw frame".to_string())),
    }
}

/// Drive `session` against the server at `url` until a [`Control::Quit`]
/// arrives.
pub async fn run(
    url: &str,
    session: &mut TailSession,
    mut controls: UnboundedReceiver<Control>,
    sink: &mut impl ViewSink,
) -> Result<()> {
    let mut controls_open = true;

    loop {
        session.on_connecting();
        refresh(session, sink);
        info!(url, "connecting");

        let reason = match tokio_tungstenite::connect_async(url).await {
            Ok((stream, _response)) => {
                info!(url, "websocket connection established");
                session.on_open();
                let (mut write, mut read) = stream.split();
                let exit = pump(session, &mut write, &mut read, &mut controls, &mut controls_open, sink).await;
                match exit {
                    Exit::Quit => {
                        if let Err(e) = write.close().await {
                            debug!(error = %e, "close handshake failed");
                        }
                        return Ok(());
                    }
                    Exit::Closed(reason) => reason,
                }
            }
            Err(e) => e.to_string(),
        };

        let delay = session.on_closed(&reason);
        refresh(session, sink);
        if wait_to_reconnect(session, delay, &mut controls, &mut controls_open, sink).await {
            return Ok(());
        }
    }
}

async fn pump<W, R>(
    session: &mut TailSession,
    write: &mut W,
    read: &mut R,
    controls: &mut UnboundedReceiver<Control>,
    controls_open: &mut bool,
    sink: &mut impl ViewSink,
) -> Exit
where
    W: futures::Sink<Message> + Unpin,
    W::Error: std::fmt::Display,
    R: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let period = session.heartbeat_interval();
    let mut heartbeat = time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if let Err(reason) = send_outbound(session, write).await {
            return Exit::Closed(reason);
        }
        refresh(session, sink);

        let deadline = session.filter_deadline();
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Close(frame))) => return Exit::Closed(close_reason(frame.as_ref())),
                Some(Ok(message)) => {
                    if let Some(inbound) = to_inbound(message) {
                        session.feed_inbound(inbound);
                    }
                }
                Some(Err(e)) => return Exit::Closed(e.to_string()),
                None => return Exit::Closed("closed by server".to_string()),
            },
            _ = heartbeat.tick() => session.heartbeat(),
            control = controls.recv(), if *controls_open => match control {
                Some(Control::Quit) => return Exit::Quit,
                Some(control) => session.handle(control, std::time::Instant::now()),
                None => *controls_open = false,
            },
            _ = until(deadline) => apply_filter(session),
        }
    }
}

/// Sit out the reconnect delay while still serving controls. Returns `true`
/// when the user quit.
async fn wait_to_reconnect(
    session: &mut TailSession,
    delay: Duration,
    controls: &mut UnboundedReceiver<Control>,
    controls_open: &mut bool,
    sink: &mut impl ViewSink,
) -> bool {
    let wake = Instant::now() + delay;
    loop {
        let deadline = session.filter_deadline();
        tokio::select! {
            _ = time::sleep_until(wake) => return false,
            control = controls.recv(), if *controls_open => match control {
                Some(Control::Quit) => return true,
                Some(control) => session.handle(control, std::time::Instant::now()),
                None => *controls_open = false,
            },
            _ = until(deadline) => apply_filter(session),
        }
        // Nothing can be sent while closed; commands are replayed on open.
        session.take_outbound();
        refresh(session, sink);
    }
}

fn close_reason(frame: Option<&CloseFrame<'_>>) -> String {
    match frame {
        Some(frame) if !frame.reason.is_empty() => {
            format!("closed by server: {} {}", u16::from(frame.code), frame.reason)
        }
        Some(frame) => format!("closed by server: {}", u16::from(frame.code)),
        None => "closed by server".to_string(),
    }
}

async fn send_outbound<W>(session: &mut TailSession, write: &mut W) -> Result<(), String>
where
    W: futures::Sink<Message> + Unpin,
    W::Error: std::fmt::Display,
{
    for text in session.take_outbound() {
        debug!(message = %text, "sending");
        write
            .send(Message::Text(text))
            .await
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}

async fn until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(due) => time::sleep_until(Instant::from_std(due)).await,
        None => pending().await,
    }
}

fn apply_filter(session: &mut TailSession) {
    if let Some(Err(e)) = session.poll_filter(std::time::Instant::now()) {
        warn!(error = %e, "filter disabled");
    }
}

fn refresh(session: &mut TailSession, sink: &mut impl ViewSink) {
    let updates = session.take_updates();
    sink.refresh(session, &updates);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_and_text_frames_map_to_payloads() {
        assert_eq!(
            to_inbound(Message::Binary(b"a\n".to_vec())),
            Some(Inbound::Binary(b"a\n".to_vec()))
        );
        assert_eq!(
            to_inbound(Message::Text("pong".to_string())),
            Some(Inbound::Text("pong".to_string()))
        );
    }

    #[test]
    fn control_frames_are_swallowed() {
        assert_eq!(to_inbound(Message::Ping(Vec::new())), None);
        assert_eq!(to_inbound(Message::Pong(Vec::new())), None);
    }

    #[test]
    fn close_reason_includes_code_and_text() {
        use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

        assert_eq!(close_reason(None), "closed by server");
        let frame = CloseFrame {
            code: CloseCode::Away,
            reason: "restarting".into(),
        };
        assert_eq!(close_reason(Some(&frame)), "closed by server: 1001 restarting");
    }

    struct NoView;

    impl ViewSink for NoView {
        fn refresh(&mut self, _session: &TailSession, _updates: &[ViewUpdate]) {}
    }

    #[tokio::test]
    async fn close_frame_ends_the_connection_while_tcp_stays_up() {
        // The stream never ends after the close frame, like a peer that keeps
        // the socket open after the handshake.
        let frames: Vec<Result<Message, tokio_tungstenite::tungstenite::Error>> = vec![
            Ok(Message::Binary(b"before\n".to_vec())),
            Ok(Message::Close(None)),
        ];
        let mut read = futures::stream::iter(frames).chain(futures::stream::pending());
        let mut write = futures::sink::drain::<Message>();
        let (_tx, mut controls) = tokio::sync::mpsc::unbounded_channel();
        let mut controls_open = true;
        let mut session = TailSession::default();
        session.on_open();

        let exit = time::timeout(
            Duration::from_secs(5),
            pump(&mut session, &mut write, &mut read, &mut controls, &mut controls_open, &mut NoView),
        )
        .await
        .expect("close frame should end the pump");

        assert_eq!(exit, Exit::Closed("closed by server".to_string()));
        assert_eq!(session.main_view().next().map(|e| e.text.as_str()), Some("before"));
    }
}
