//! Error types for webfx.
//!
//! One enum covers setup failures and the failures effects report back.
//!
//! # Usage
//!
//! Fallible setup operations return [`Result<T>`] which uses [`Error`].
//! Failures that happen while an effect runs are never returned to the
//! caller; they are delivered to the application through its error action.
//!
//! ```ignore
//! use webfx::{Error, Result};
//!
//! fn subscribe(runtime: &Runtime<Msg>) -> Result<Unsubscribe> {
//!     runtime.subscribe(websocket_client(props))
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Input | [`Error::InvalidUrl`], [`Error::InvalidArgument`] |
//! | HTTP | [`Error::HttpStatus`], [`Error::BodyExtraction`], [`Error::Http`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::SocketNotOpen`] |
//! | External | [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::fx::http::{FailedResponse, ResponseKind};
use crate::transport::ReadyState;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Error type for webfx.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Runtime configuration was rejected by the builder.
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong.
        message: String,
    },

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// URL could not be parsed or has an unsupported scheme.
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        message: String,
    },

    /// Malformed effect or subscription property (method, header, protocol).
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Offending property.
        message: String,
    },

    // ========================================================================
    // HTTP Errors
    // ========================================================================
    /// Server answered with a non-2xx status.
    ///
    /// Carries the captured response so the application can inspect it.
    #[error("HTTP {} from {}", .0.status, .0.url)]
    HttpStatus(FailedResponse),

    /// Response body could not be read with the requested method.
    #[error("Failed to extract {kind} body: {message}")]
    BodyExtraction {
        /// Extraction method that failed.
        kind: ResponseKind,
        /// Underlying failure.
        message: String,
    },

    /// HTTP transport error (DNS, connect, TLS, request building).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Socket could not be started.
    #[error("Connection failed: {message}")]
    Connection {
        /// Cause.
        message: String,
    },

    /// Socket event loop is gone.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Attempted to send on a socket that is not open.
    #[error("Socket for {url} is not open (state: {state})")]
    SocketNotOpen {
        /// Socket URL.
        url: String,
        /// State at the time of the send.
        state: ReadyState,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// Payload did not decode into the requested type.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Handshake request could not be built.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid URL error.
    #[inline]
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a non-ok status error.
    #[inline]
    pub fn http_status(response: FailedResponse) -> Self {
        Self::HttpStatus(response)
    }

    /// Creates a body extraction error.
    #[inline]
    pub fn body_extraction(kind: ResponseKind, message: impl Into<String>) -> Self {
        Self::BodyExtraction {
            kind,
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a socket-not-open error.
    #[inline]
    pub fn socket_not_open(url: impl Into<String>, state: ReadyState) -> Self {
        Self::SocketNotOpen {
            url: url.into(),
            state,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error came from an HTTP request.
    #[inline]
    #[must_use]
    pub fn is_http_error(&self) -> bool {
        matches!(
            self,
            Self::HttpStatus(_) | Self::BodyExtraction { .. } | Self::Http(_)
        )
    }

    /// Returns `true` if the server answered with a non-2xx status.
    #[inline]
    #[must_use]
    pub fn is_status_error(&self) -> bool {
        matches!(self, Self::HttpStatus(_))
    }

    /// Returns the captured response for a non-2xx status.
    #[inline]
    #[must_use]
    pub fn failed_response(&self) -> Option<&FailedResponse> {
        match self {
            Self::HttpStatus(response) => Some(response),
            _ => None,
        }
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::SocketNotOpen { .. }
                | Self::WebSocket(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
