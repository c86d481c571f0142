//! Types shared between a private stream session and its consumers.
//!
//! A session publishes [`SessionEvent`]s onto an unbounded channel. Consumers
//! observe the session's [`SessionState`] and ask it to close through
//! [`SessionControl`].

use common::BinanceEnvironment;
use execution_core::UserDataMessage;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// Close code sent when a close frame carries no status (RFC 6455, 1005).
pub const CLOSE_CODE_NO_STATUS: u16 = 1005;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectorError {
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Listen key error: {0}")]
    ListenKey(String),

    #[error("Connection timeout after {0:?}")]
    ConnectTimeout(Duration),

    #[error("Channel closed")]
    ChannelClosed,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Closed on request, or by the server without a status code.
    Clean,
    /// Closed by the server or the transport with a status, or dropped.
    Unexpected { code: Option<u16>, reason: String },
    /// The session never opened (token request or handshake failed).
    ConnectFailed(String),
}

impl CloseReason {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "closed cleanly"),
            Self::Unexpected {
                code: Some(code),
                reason,
            } => write!(f, "unexpected close (code {code}): {reason}"),
            Self::Unexpected { code: None, reason } => write!(f, "unexpected close: {reason}"),
            Self::ConnectFailed(reason) => write!(f, "connect failed: {reason}"),
        }
    }
}

/// Classify a transport closure.
///
/// `close_code` is the status of the close frame, `None` when the stream ended
/// without one. Anything this side asked for, or a close frame without a
/// status, counts as clean.
pub fn classify_close(
    close_code: Option<u16>,
    reason: &str,
    locally_initiated: bool,
) -> CloseReason {
    match close_code {
        _ if locally_initiated => CloseReason::Clean,
        Some(CLOSE_CODE_NO_STATUS) => CloseReason::Clean,
        code => CloseReason::Unexpected {
            code,
            reason: if reason.is_empty() {
                "connection dropped".to_string()
            } else {
                reason.to_string()
            },
        },
    }
}

/// Events published by a stream session, in the order they happen.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The transport is connected and frames will follow.
    Started,
    /// A parsed inbound frame and the local wall-clock time it arrived.
    Data {
        message: UserDataMessage,
        received_at_ms: i64,
    },
    /// A connection-level error. The session stays up.
    Error(ConnectorError),
    /// Published exactly once per session, as its last event.
    Closed(CloseReason),
}

/// Lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "IDLE",
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Stream endpoint root, e.g. `wss://testnet.binance.vision`.
    pub stream_base_url: String,
    /// Interval of the keepalive tick that sends a liveness frame.
    pub keepalive_interval: Duration,
    /// Token age after which a keepalive tick renews the listen key.
    pub renewal_interval: Duration,
    pub connect_timeout: Duration,
}

impl SessionConfig {
    pub fn for_environment(environment: BinanceEnvironment) -> Self {
        Self {
            stream_base_url: environment.ws_base_url().to_string(),
            ..Self::default()
        }
    }

    /// Combined-stream URL carrying the listen key.
    pub fn stream_url(&self, listen_key: &str) -> String {
        format!(
            "{}/stream?streams={}",
            self.stream_base_url.trim_end_matches('/'),
            listen_key
        )
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stream_base_url: BinanceEnvironment::default().ws_base_url().to_string(),
            keepalive_interval: Duration::from_secs(60),
            renewal_interval: Duration::from_secs(30 * 60),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// What a consumer can do to a running session.
pub trait SessionControl: Send + Sync {
    fn state(&self) -> SessionState;

    /// Ask the session to close. Idempotent.
    fn request_close(&self);

    fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }
}

/// Shared handle between a session task and its owner.
///
/// The session side publishes state changes and watches for a close request;
/// the owner side reads the state and requests the close.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    state: Arc<watch::Sender<SessionState>>,
    close: Arc<watch::Sender<bool>>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        let (close, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
            close: Arc::new(close),
        }
    }

    pub fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    pub fn close_requested(&self) -> bool {
        *self.close.borrow()
    }

    /// Receiver that flips to `true` when a close is requested.
    pub fn close_signal(&self) -> watch::Receiver<bool> {
        self.close.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}

impl SessionControl for SessionHandle {
    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn request_close(&self) {
        self.close.send_replace(true);
    }
}

pub type EventSender<E = SessionEvent> = mpsc::UnboundedSender<E>;
pub type EventReceiver<E = SessionEvent> = mpsc::UnboundedReceiver<E>;

/// Unbounded so that publishing never blocks the socket reader.
pub fn create_event_channel<E>() -> (EventSender<E>, EventReceiver<E>) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_status_close_is_clean() {
        assert_eq!(classify_close(Some(1005), "", false), CloseReason::Clean);
    }

    #[test]
    fn test_local_close_is_clean_whatever_the_code() {
        assert_eq!(classify_close(Some(1000), "bye", true), CloseReason::Clean);
        assert_eq!(classify_close(None, "", true), CloseReason::Clean);
    }

    #[test]
    fn test_server_close_with_code_is_unexpected() {
        let reason = classify_close(Some(1008), "policy", false);
        assert_eq!(
            reason,
            CloseReason::Unexpected {
                code: Some(1008),
                reason: "policy".into()
            }
        );
        assert!(!reason.is_clean());
        assert_eq!(reason.to_string(), "unexpected close (code 1008): policy");
    }

    #[test]
    fn test_dropped_connection_is_unexpected() {
        assert_eq!(
            classify_close(None, "", false),
            CloseReason::Unexpected {
                code: None,
                reason: "connection dropped".into()
            }
        );
    }

    #[test]
    fn test_stream_url() {
        let config = SessionConfig {
            stream_base_url: "wss://testnet.binance.vision/".into(),
            ..SessionConfig::default()
        };
        assert_eq!(
            config.stream_url("abc"),
            "wss://testnet.binance.vision/stream?streams=abc"
        );
    }

    #[test]
    fn test_default_timers() {
        let config = SessionConfig::default();
        assert_eq!(config.keepalive_interval, Duration::from_secs(60));
        assert_eq!(config.renewal_interval, Duration::from_secs(1800));
        assert_eq!(
            SessionConfig::for_environment(BinanceEnvironment::Production).stream_base_url,
            "wss://stream.binance.com:9443"
        );
    }

    #[test]
    fn test_handle_close_and_state() {
        let handle = SessionHandle::new();
        let observer = handle.clone();
        assert_eq!(observer.state(), SessionState::Idle);

        handle.set_state(SessionState::Open);
        assert!(observer.is_open());

        let signal = handle.close_signal();
        observer.request_close();
        assert!(*signal.borrow());
        assert!(handle.close_requested());
    }
}
