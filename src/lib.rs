//! webfx - Declarative effects and shared WebSocket subscriptions.
//!
//! This library lets a message-driven application describe its side
//! effects as plain data and have them executed for it. Results come back
//! as typed application messages on a channel.
//!
//! # Architecture
//!
//! The application owns its update loop; webfx owns the I/O:
//!
//! - **Effects**: one-shot descriptors ([`console`], [`http`], [`batch`],
//!   [`Effect::custom`]) run by [`Runtime::run`]
//! - **Subscriptions**: long-lived descriptors ([`websocket_client`])
//!   started by [`Runtime::subscribe`] and stopped with [`Unsubscribe`]
//! - **Dispatch**: every result is mapped through an application
//!   [`Action`] and posted on the [`Dispatch`] channel
//!
//! Key design principles:
//!
//! - Descriptors are strongly typed records, never open property bags
//! - One WebSocket per URL, shared by every subscription to it
//! - Connection state lives in an explicitly owned [`ConnectionManager`]
//! - Failures reach the application as messages, not panics
//!
//! # Quick Start
//!
//! ```no_run
//! use webfx::{Action, HttpProps, HttpResult, Runtime, batch, console, http};
//!
//! #[derive(Debug)]
//! enum Msg {
//!     Loaded(HttpResult),
//! }
//!
//! #[tokio::main]
//! async fn main() -> webfx::Result<()> {
//!     let (runtime, mut messages) = Runtime::<Msg>::channel()?;
//!
//!     runtime.run(batch([
//!         console(["loading"]),
//!         http(HttpProps::new("https://example.com/data.json", Action::new(Msg::Loaded))),
//!     ]));
//!
//!     if let Some(Msg::Loaded(result)) = messages.recv().await {
//!         println!("{result:?}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`dispatch`] | [`Dispatch`] channel and [`Action`] mapping |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`fx`] | Effect descriptors: console, HTTP, batch, custom |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`runtime`] | [`Runtime`] and [`RuntimeBuilder`] |
//! | [`subs`] | Subscription descriptors: WebSocket client |
//! | [`transport`] | Sockets, connectors and the [`ConnectionManager`] |

// ============================================================================
// Modules
// ============================================================================

/// Message dispatch back into the application.
pub mod dispatch;

/// Error types and result aliases.
///
/// Fallible setup operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Effect descriptors.
///
/// - [`console`] - Log values to a sink
/// - [`http`] - Send an HTTP request
/// - [`batch`] - Run several effects in order
pub mod fx;

/// Type-safe identifiers for listeners and subscriptions.
pub mod identifiers;

/// Effect runtime and its configuration.
pub mod runtime;

/// Subscription descriptors.
pub mod subs;

/// WebSocket transport layer.
///
/// Socket abstraction, network and in-memory implementations, and the
/// URL-keyed connection manager.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Dispatch types
pub use dispatch::{Action, Dispatch};

// Effect types
pub use fx::{
    ConsoleProps, Effect, EffectFn, FailedResponse, HttpOptions, HttpProps, HttpResult, LogSink,
    MemorySink, RequestBody, ResponseBody, ResponseKind, StdoutSink, TracingSink, batch, console,
    http,
};

// Subscription types
pub use subs::{Subscription, Unsubscribe, WebSocketProps, websocket_client};

// Runtime types
pub use runtime::{Runtime, RuntimeBuilder};

// Transport types
pub use transport::{
    ConnectionManager, Connector, MemoryConnector, MemorySocket, ReadyState, Socket, SocketError,
    SocketMessage, WsConnector, WsSocket,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ListenerId, SubscriptionId};
