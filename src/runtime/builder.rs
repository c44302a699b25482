//! Builder pattern for runtime configuration.
//!
//! Provides a fluent API for configuring and creating [`Runtime`] instances.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use webfx::{Dispatch, Runtime, TracingSink};
//!
//! let (dispatch, messages) = Dispatch::<Msg>::channel();
//! let runtime = Runtime::builder()
//!     .sink(Arc::new(TracingSink))
//!     .build(dispatch)?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use reqwest::Client;
use tracing::debug;

use crate::dispatch::Dispatch;
use crate::error::{Error, Result};
use crate::fx::{LogSink, StdoutSink};
use crate::transport::{ConnectionManager, Connector, WsConnector};

use super::Runtime;

// ============================================================================
// RuntimeBuilder
// ============================================================================

/// Builder for configuring a [`Runtime`].
///
/// Use [`Runtime::builder()`] to create a new builder. Unset parts get
/// defaults: a fresh `reqwest` client, [`StdoutSink`], and a connection
/// manager backed by network WebSockets. `M` is the application message
/// type of the runtime being built.
pub struct RuntimeBuilder<M> {
    /// HTTP client.
    client: Option<Client>,
    /// Log sink for console effects.
    sink: Option<Arc<dyn LogSink>>,
    /// Connector for a manager created by the builder.
    connector: Option<Arc<dyn Connector>>,
    /// Existing manager to share.
    manager: Option<Arc<ConnectionManager>>,
    _message: PhantomData<fn() -> M>,
}

impl<M> Default for RuntimeBuilder<M> {
    fn default() -> Self {
        Self {
            client: None,
            sink: None,
            connector: None,
            manager: None,
            _message: PhantomData,
        }
    }
}

impl<M> Clone for RuntimeBuilder<M> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            sink: self.sink.clone(),
            connector: self.connector.clone(),
            manager: self.manager.clone(),
            _message: PhantomData,
        }
    }
}

impl<M> fmt::Debug for RuntimeBuilder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeBuilder")
            .field("client", &self.client.is_some())
            .field("sink", &self.sink.is_some())
            .field("connector", &self.connector.is_some())
            .field("manager", &self.manager.is_some())
            .finish()
    }
}

// ============================================================================
// RuntimeBuilder Implementation
// ============================================================================

impl<M> RuntimeBuilder<M> {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP client.
    ///
    /// Use this to configure proxies, default headers or TLS.
    #[inline]
    #[must_use]
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets the log sink for console effects.
    #[inline]
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Sets the connector used by a new connection manager.
    ///
    /// Cannot be combined with [`manager`](Self::manager).
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Shares an existing connection manager.
    ///
    /// Cannot be combined with [`connector`](Self::connector).
    #[inline]
    #[must_use]
    pub fn manager(mut self, manager: Arc<ConnectionManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Builds the runtime with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if both a connector and a manager are set
    /// - [`Error::Config`] if `dispatch`'s receiver is already gone
    pub fn build(self, dispatch: Dispatch<M>) -> Result<Runtime<M>> {
        let connections = self.resolve_connections()?;

        if dispatch.is_closed() {
            return Err(Error::config(
                "Dispatch receiver is already dropped; effects would have nowhere to report.",
            ));
        }

        debug!(
            custom_client = self.client.is_some(),
            custom_sink = self.sink.is_some(),
            "Runtime built"
        );

        Ok(Runtime::from_parts(
            dispatch,
            self.client.unwrap_or_default(),
            self.sink.unwrap_or_else(|| Arc::new(StdoutSink)),
            connections,
        ))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl<M> RuntimeBuilder<M> {
    /// Picks the manager, creating one if needed.
    fn resolve_connections(&self) -> Result<Arc<ConnectionManager>> {
        match (&self.manager, &self.connector) {
            (Some(_), Some(_)) => Err(Error::config(
                "Set either a connector or a manager, not both.\n\
                 The manager already owns its connector.",
            )),
            (Some(manager), None) => Ok(Arc::clone(manager)),
            (None, Some(connector)) => Ok(ConnectionManager::new(Arc::clone(connector))),
            (None, None) => Ok(ConnectionManager::new(Arc::new(WsConnector))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::MemoryConnector;

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = RuntimeBuilder::<()>::new();
        assert!(builder.client.is_none());
        assert!(builder.sink.is_none());
        assert!(builder.connector.is_none());
        assert!(builder.manager.is_none());
    }

    #[test]
    fn test_build_with_defaults() {
        let (dispatch, _rx) = Dispatch::<()>::channel();
        let runtime = RuntimeBuilder::new().build(dispatch).expect("runtime");
        assert_eq!(runtime.connections().connection_count(), 0);
    }

    #[test]
    fn test_build_shares_manager() {
        let manager = ConnectionManager::new(Arc::new(MemoryConnector::new()));
        let (dispatch, _rx) = Dispatch::<()>::channel();

        let runtime = RuntimeBuilder::new()
            .manager(Arc::clone(&manager))
            .build(dispatch)
            .expect("runtime");

        assert!(Arc::ptr_eq(runtime.connections(), &manager));
    }

    #[test]
    fn test_build_fails_with_connector_and_manager() {
        let connector: Arc<dyn Connector> = Arc::new(MemoryConnector::new());
        let (dispatch, _rx) = Dispatch::<()>::channel();

        let result = RuntimeBuilder::new()
            .connector(Arc::clone(&connector))
            .manager(ConnectionManager::new(connector))
            .build(dispatch);

        let err = result.expect_err("conflicting configuration");
        assert!(err.to_string().contains("either a connector or a manager"));
    }

    #[test]
    fn test_build_fails_with_closed_dispatch() {
        let (dispatch, rx) = Dispatch::<()>::channel();
        drop(rx);

        let result = RuntimeBuilder::new().build(dispatch);
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_builder_is_clone() {
        let builder = RuntimeBuilder::<()>::new().sink(Arc::new(StdoutSink));
        let cloned = builder.clone();
        assert!(cloned.sink.is_some());
    }
}
