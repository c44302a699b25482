//! Effect runtime.
//!
//! The [`Runtime`] executes effect descriptors and starts subscriptions on
//! behalf of one application. It owns everything effects need: the
//! dispatch channel, the HTTP client, the log sink and the connection
//! manager.
//!
//! # Example
//!
//! ```ignore
//! use webfx::{Action, HttpProps, Runtime, batch, console, http};
//!
//! #[tokio::main]
//! async fn main() -> webfx::Result<()> {
//!     let (runtime, mut messages) = Runtime::<Msg>::channel()?;
//!
//!     runtime.run(batch([
//!         console(["loading todos"]),
//!         http(HttpProps::new("https://api.example.com/todos", Action::new(Msg::Loaded))),
//!     ]));
//!
//!     while let Some(message) = messages.recv().await {
//!         // update state, run the effects it returns...
//!     }
//!     Ok(())
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use reqwest::Client;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::dispatch::Dispatch;
use crate::error::{Error, Result};
use crate::fx::{Effect, LogSink, http};
use crate::subs::{Subscription, Unsubscribe};
use crate::transport::ConnectionManager;

// ============================================================================
// Submodules
// ============================================================================

/// Runtime configuration builder.
pub mod builder;

pub use builder::RuntimeBuilder;

// ============================================================================
// Runtime
// ============================================================================

/// Executes effects and subscriptions for one application.
///
/// Cloning is cheap; clones share the same dispatch, client, sink and
/// connection manager.
pub struct Runtime<M> {
    /// Where effect results are posted.
    dispatch: Dispatch<M>,
    /// HTTP client shared by all requests.
    client: Client,
    /// Destination of console effects.
    sink: Arc<dyn LogSink>,
    /// Shared WebSocket connections.
    connections: Arc<ConnectionManager>,
}

impl<M> Clone for Runtime<M> {
    fn clone(&self) -> Self {
        Self {
            dispatch: self.dispatch.clone(),
            client: self.client.clone(),
            sink: Arc::clone(&self.sink),
            connections: Arc::clone(&self.connections),
        }
    }
}

impl<M> fmt::Debug for Runtime<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("dispatch", &self.dispatch)
            .field("connections", &self.connections)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Runtime - Constructor
// ============================================================================

impl<M> Runtime<M> {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> RuntimeBuilder<M> {
        RuntimeBuilder::new()
    }

    /// Creates a default runtime and the receiver its messages arrive on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the default
    /// configuration cannot be built.
    pub fn channel() -> Result<(Self, mpsc::UnboundedReceiver<M>)> {
        let (dispatch, rx) = Dispatch::channel();
        let runtime = RuntimeBuilder::new().build(dispatch)?;
        Ok((runtime, rx))
    }

    /// Assembles a runtime from validated parts.
    pub(crate) fn from_parts(
        dispatch: Dispatch<M>,
        client: Client,
        sink: Arc<dyn LogSink>,
        connections: Arc<ConnectionManager>,
    ) -> Self {
        Self {
            dispatch,
            client,
            sink,
            connections,
        }
    }

    /// The dispatch effects post to.
    #[inline]
    #[must_use]
    pub fn dispatch(&self) -> &Dispatch<M> {
        &self.dispatch
    }

    /// The connection manager.
    #[inline]
    #[must_use]
    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    /// Closes every WebSocket connection.
    pub fn shutdown(&self) {
        self.connections.shutdown();
    }
}

// ============================================================================
// Runtime - Execution
// ============================================================================

impl<M: Send + 'static> Runtime<M> {
    /// Runs an effect.
    ///
    /// Console and custom effects run synchronously. HTTP effects are
    /// spawned on the current Tokio runtime and report back through
    /// dispatch. Outside a runtime an HTTP effect dispatches
    /// [`Error::Connection`] to its error action instead.
    pub fn run(&self, effect: Effect<M>) {
        trace!(kind = effect.kind(), "Running effect");

        match effect {
            Effect::Console(props) => self.sink.write(&props.args),

            Effect::Http(props) => match Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(http::perform(
                        self.client.clone(),
                        props,
                        self.dispatch.clone(),
                    ));
                }
                Err(e) => {
                    warn!(url = %props.url, "HTTP effect run outside a Tokio runtime");
                    let error = Error::connection(format!("No Tokio runtime available: {e}"));
                    self.dispatch.action(props.error_action(), Err(error));
                }
            },

            Effect::Batch(effects) => {
                for effect in effects {
                    self.run(effect);
                }
            }

            Effect::Custom { handler, props } => handler(&props, &self.dispatch),
        }
    }

    /// Starts a subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be started, for example
    /// [`Error::InvalidUrl`](crate::Error::InvalidUrl).
    pub fn subscribe(&self, subscription: Subscription<M>) -> Result<Unsubscribe> {
        match subscription {
            Subscription::WebSocket(props) => self.connections.subscribe(props, &self.dispatch),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
