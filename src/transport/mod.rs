//! WebSocket transport layer.
//!
//! This module defines the socket abstraction the WebSocket subscription
//! talks to, the tokio-tungstenite implementation, an in-memory
//! implementation for tests, and the connection manager that shares one
//! socket per URL.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐        ┌──────────────────────────────┐
//! │  WebSocketClient sub │───────►│  ConnectionManager           │
//! │  (per subscription)  │        │  url → ConnectionRecord      │
//! └──────────────────────┘        │        ├─ Arc<dyn Socket>    │
//!                                 │        └─ registrations      │
//!                                 └──────────────┬───────────────┘
//!                                                │ Connector
//!                                 ┌──────────────▼───────────────┐
//!                                 │  WsSocket     │ MemorySocket │
//!                                 └──────────────────────────────┘
//! ```
//!
//! # Socket Lifecycle
//!
//! 1. `Connector::connect` - Socket created in [`ReadyState::Connecting`]
//! 2. Open notification - deferred callbacks run once, state is `Open`
//! 3. Message / error notifications - delivered to registered listeners
//! 4. `Socket::close` - state moves to `Closing`, then `Closed`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | tokio-tungstenite socket and event loop |
//! | `listeners` | Listener bookkeeping shared by socket implementations |
//! | `manager` | URL-keyed connection sharing |
//! | `memory` | Caller-driven socket for tests |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identifiers::ListenerId;

// ============================================================================
// Submodules
// ============================================================================

/// tokio-tungstenite socket and event loop.
pub mod connection;

/// Listener bookkeeping.
pub mod listeners;

/// URL-keyed connection sharing.
pub mod manager;

/// In-memory socket for tests.
pub mod memory;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{WsConnector, WsSocket};
pub use listeners::ListenerSet;
pub use manager::{ConnectionManager, Unsubscribe};
pub use memory::{MemoryConnector, MemorySocket};

// ============================================================================
// ReadyState
// ============================================================================

/// Connection state of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadyState {
    /// Handshake in progress.
    Connecting,
    /// Frames may be sent.
    Open,
    /// Close requested, not yet complete.
    Closing,
    /// Closed or failed to connect.
    Closed,
}

impl ReadyState {
    /// Numeric value as exposed by browser sockets.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Open => 1,
            Self::Closing => 2,
            Self::Closed => 3,
        }
    }

    /// Returns `true` once the socket can no longer be used.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        })
    }
}

// ============================================================================
// SocketMessage
// ============================================================================

/// A single WebSocket data frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum SocketMessage {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

impl SocketMessage {
    /// Returns the text payload, if this is a text frame.
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Returns the raw payload bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) => data,
        }
    }

    /// Decodes the payload as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the payload is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(self.as_bytes())?)
    }
}

impl From<String> for SocketMessage {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for SocketMessage {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for SocketMessage {
    fn from(data: Vec<u8>) -> Self {
        Self::Binary(data)
    }
}

// ============================================================================
// SocketError
// ============================================================================

/// Error notification emitted by a socket.
///
/// The socket stays registered after an error; subscriptions decide
/// whether to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketError {
    /// Socket URL.
    pub url: String,
    /// Description of the failure.
    pub message: String,
}

impl SocketError {
    /// Creates an error notification.
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.url, self.message)
    }
}

// ============================================================================
// Listener
// ============================================================================

/// Called for each incoming frame.
pub type MessageHandler = Arc<dyn Fn(SocketMessage) + Send + Sync>;

/// Called for each error notification.
pub type ErrorHandler = Arc<dyn Fn(SocketError) + Send + Sync>;

/// Runs once when the socket opens.
pub type OpenCallback = Box<dyn FnOnce() + Send>;

/// A removable listener.
#[derive(Clone)]
pub enum Listener {
    /// Incoming frame listener.
    Message(MessageHandler),
    /// Error notification listener.
    Error(ErrorHandler),
}

impl Listener {
    /// Creates a message listener.
    #[inline]
    pub fn message(f: impl Fn(SocketMessage) + Send + Sync + 'static) -> Self {
        Self::Message(Arc::new(f))
    }

    /// Creates an error listener.
    #[inline]
    pub fn error(f: impl Fn(SocketError) + Send + Sync + 'static) -> Self {
        Self::Error(Arc::new(f))
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(_) => f.write_str("Listener::Message(..)"),
            Self::Error(_) => f.write_str("Listener::Error(..)"),
        }
    }
}

// ============================================================================
// Socket / Connector
// ============================================================================

/// A WebSocket connection as seen by subscriptions.
///
/// Implementations must be usable from any thread and invoke listeners
/// without holding internal locks.
pub trait Socket: Send + Sync {
    /// URL the socket was opened for.
    fn url(&self) -> &str;

    /// Current connection state.
    fn ready_state(&self) -> ReadyState;

    /// Sends a frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SocketNotOpen`](crate::Error::SocketNotOpen) unless the socket is open.
    fn send(&self, message: SocketMessage) -> Result<()>;

    /// Registers a listener and returns its removal handle.
    fn add_listener(&self, listener: Listener) -> ListenerId;

    /// Removes a listener. Returns `false` if it was not registered.
    fn remove_listener(&self, id: ListenerId) -> bool;

    /// Runs `callback` on the open notification if the socket is still
    /// connecting.
    ///
    /// The state check and the registration are atomic. If the socket is
    /// not connecting the callback is handed back so the caller can run it
    /// right away.
    fn defer_until_open(&self, callback: OpenCallback) -> std::result::Result<(), OpenCallback>;

    /// Begins the handshake.
    ///
    /// The connection manager calls this once the first subscription's
    /// listeners are attached, so no notification can precede them.
    /// Repeated calls are ignored.
    fn start(&self) {}

    /// Closes the socket. Idempotent.
    fn close(&self);
}

/// Opens sockets for the connection manager.
pub trait Connector: Send + Sync {
    /// Starts connecting to `url`.
    ///
    /// Returns immediately with a socket in [`ReadyState::Connecting`].
    /// The socket emits nothing until [`Socket::start`] is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot even be started.
    fn connect(&self, url: &str, protocols: &[String]) -> Result<Arc<dyn Socket>>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_ready_state_values() {
        assert_eq!(ReadyState::Connecting.as_u8(), 0);
        assert_eq!(ReadyState::Open.as_u8(), 1);
        assert_eq!(ReadyState::Closing.as_u8(), 2);
        assert_eq!(ReadyState::Closed.as_u8(), 3);
        assert!(ReadyState::Closed.is_terminal());
        assert!(!ReadyState::Open.is_terminal());
    }

    #[test]
    fn test_message_json() {
        let message = SocketMessage::from(r#"{"price": 42}"#);
        let value: serde_json::Value = message.json().expect("valid json");
        assert_eq!(value, json!({ "price": 42 }));
        assert!(SocketMessage::Binary(vec![0xff]).json::<u8>().is_err());
    }

    #[test]
    fn test_message_serde_shape() {
        let message = SocketMessage::Text("hi".into());
        assert_eq!(
            serde_json::to_value(&message).expect("serialize"),
            json!({ "type": "text", "data": "hi" })
        );
        let parsed: SocketMessage =
            serde_json::from_value(json!({ "type": "binary", "data": [1, 2] })).expect("parse");
        assert_eq!(parsed, SocketMessage::Binary(vec![1, 2]));
    }

    #[test]
    fn test_socket_error_display() {
        let err = SocketError::new("ws://example.test", "reset");
        assert_eq!(err.to_string(), "ws://example.test: reset");
    }
}
