//! Connection management for the log-viewer socket.
//!
//! [`ConnectionManager`] is a sans-IO state machine: it decides *what* to
//! send and *when* to reconnect, while [`socket`] performs the actual
//! websocket I/O. Keeping the two apart lets the lifecycle rules be tested
//! without a server.
//!
//! ```text
//! Connecting --open--> Open --close/error--> Closed --(delay)--> Connecting
//! ```
//!
//! On every `Open` the last issued tail/follow command is (re)sent, so a
//! reconnect resumes the view where the user left it.
//!
//! # Configuration Defaults
//!
//! | Parameter          | Default | Description                          |
//! |--------------------|---------|--------------------------------------|
//! | Heartbeat          | 10s     | Interval between `ping` messages     |
//! | Reconnect delay    | 3s      | Delay before the first reconnect     |
//! | Max reconnect delay| 3s      | Ceiling for the growing delay        |

pub mod protocol;
pub mod socket;

use std::fmt;
use std::time::Duration;

use protocol::{PING, STOP, TailCommand};

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Reconnect and heartbeat timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionPolicy {
    pub heartbeat_interval: Duration,
    pub reconnect_delay: Duration,
    /// The delay doubles per failed attempt up to this ceiling. Equal to
    /// `reconnect_delay` for a fixed delay.
    pub max_reconnect_delay: Duration,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl ConnectionPolicy {
    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.reconnect_delay.saturating_mul(1 << exponent);
        delay.min(self.max_reconnect_delay.max(self.reconnect_delay))
    }
}

#[derive(Debug)]
pub struct ConnectionManager {
    state: ConnectionState,
    policy: ConnectionPolicy,
    last_command: Option<TailCommand>,
    /// Consecutive closes without a successful open in between.
    failed_attempts: u32,
    /// Whether the socket has been open at least once.
    opened_before: bool,
}

impl ConnectionManager {
    pub fn new(policy: ConnectionPolicy) -> Self {
        Self {
            state: ConnectionState::Connecting,
            policy,
            last_command: None,
            failed_attempts: 0,
            opened_before: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn policy(&self) -> &ConnectionPolicy {
        &self.policy
    }

    pub fn last_command(&self) -> Option<&TailCommand> {
        self.last_command.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Whether the next `on_open` is a reconnect rather than the first
    /// connection.
    pub fn is_reconnect(&self) -> bool {
        self.opened_before
    }

    /// The transport is about to dial.
    pub fn on_connecting(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// The transport connected. Returns the messages to send, in order.
    pub fn on_open(&mut self) -> Vec<String> {
        self.state = ConnectionState::Open;
        self.failed_attempts = 0;
        self.opened_before = true;
        self.last_command
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    /// The transport closed or failed. Returns how long to wait before the
    /// next connection attempt.
    pub fn on_closed(&mut self) -> Duration {
        self.state = ConnectionState::Closed;
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        self.policy.backoff(self.failed_attempts)
    }

    /// Heartbeat tick. Yields `ping` only while open.
    pub fn heartbeat(&self) -> Option<&'static str> {
        self.is_open().then_some(PING)
    }

    /// Remember `command` as the one to replay and return it for sending if
    /// the socket is open. While closed it is sent on the next open.
    pub fn issue(&mut self, command: TailCommand) -> Option<String> {
        let wire = command.to_string();
        self.last_command = Some(command);
        self.is_open().then_some(wire)
    }

    /// Forget the current command so a reconnect does not resume it, and
    /// return `stop` for sending if open.
    pub fn stop(&mut self) -> Option<String> {
        self.last_command = None;
        self.is_open().then(|| STOP.to_string())
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(ConnectionPolicy::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{Amount, TailMode};

    fn follow(file: &str) -> TailCommand {
        TailCommand::new(TailMode::Follow, Amount::default(), file)
    }

    #[test]
    fn starts_connecting() {
        let manager = ConnectionManager::default();
        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert_eq!(manager.heartbeat(), None);
    }

    #[test]
    fn command_issued_before_open_is_sent_on_open() {
        let mut manager = ConnectionManager::default();
        assert_eq!(manager.issue(follow("error.log")), None);
        assert_eq!(manager.on_open(), vec!["follow:1mb:error.log".to_string()]);
        assert_eq!(manager.heartbeat(), Some("ping"));
    }

    #[test]
    fn command_issued_while_open_is_sent_immediately() {
        let mut manager = ConnectionManager::default();
        assert!(manager.on_open().is_empty());
        assert_eq!(
            manager.issue(follow("a.log")).as_deref(),
            Some("follow:1mb:a.log")
        );
    }

    #[test]
    fn reconnect_replays_last_command() {
        let mut manager = ConnectionManager::default();
        manager.on_open();
        manager.issue(follow("a.log"));
        manager.issue(follow("b.log"));
        manager.on_closed();
        assert_eq!(manager.heartbeat(), None);
        manager.on_connecting();
        assert!(manager.is_reconnect());
        assert_eq!(manager.on_open(), vec!["follow:1mb:b.log".to_string()]);
    }

    #[test]
    fn stop_forgets_the_command() {
        let mut manager = ConnectionManager::default();
        manager.on_open();
        manager.issue(follow("a.log"));
        assert_eq!(manager.stop().as_deref(), Some("stop"));
        manager.on_closed();
        assert!(manager.on_open().is_empty());
    }

    #[test]
    fn stop_while_closed_sends_nothing() {
        let mut manager = ConnectionManager::default();
        assert_eq!(manager.stop(), None);
    }

    #[test]
    fn fixed_delay_by_default() {
        let mut manager = ConnectionManager::default();
        assert_eq!(manager.on_closed(), DEFAULT_RECONNECT_DELAY);
        assert_eq!(manager.on_closed(), DEFAULT_RECONNECT_DELAY);
    }

    #[test]
    fn backoff_grows_to_ceiling_and_resets_on_open() {
        let mut manager = ConnectionManager::new(ConnectionPolicy {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(5),
        });
        let delays: Vec<u64> = (0..5).map(|_| manager.on_closed().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);
        manager.on_open();
        assert_eq!(manager.on_closed(), Duration::from_secs(1));
    }
}
