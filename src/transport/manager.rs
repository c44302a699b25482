//! Connection sharing for WebSocket subscriptions.
//!
//! Keeps at most one socket per URL. Every subscription to a URL adds a
//! registration to that URL's record; the socket is closed and the record
//! removed when the last registration is released.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │              ConnectionManager                │
//! │  ┌─────────────────────────────────────────┐  │
//! │  │ ws://a → socket A, [sub-1, sub-4]       │  │
//! │  │ ws://b → socket B, [sub-2]              │  │
//! │  └─────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, info, trace};
use url::Url;

use crate::dispatch::Dispatch;
use crate::error::{Error, Result};
use crate::identifiers::{ListenerId, SubscriptionId};
use crate::subs::WebSocketProps;

use super::{Connector, Socket, WsConnector};

// ============================================================================
// Types
// ============================================================================

/// One subscription's stake in a connection.
struct Registration {
    /// Subscription that owns the listeners.
    id: SubscriptionId,
    /// Listeners it added to the socket.
    listeners: Vec<ListenerId>,
}

/// Shared state for one URL.
struct ConnectionRecord {
    /// Live socket.
    socket: Arc<dyn Socket>,
    /// Active registrations in subscription order.
    registrations: Vec<Registration>,
}

impl ConnectionRecord {
    fn listener_count(&self) -> usize {
        self.registrations.iter().map(|r| r.listeners.len()).sum()
    }
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// URL-keyed registry of shared sockets.
///
/// Create one per application and hand it to the runtime. Thread-safe.
///
/// # Example
///
/// ```ignore
/// let manager = ConnectionManager::with_websockets();
///
/// let first = manager.subscribe(WebSocketProps::new(url).listen(on_quote), &dispatch)?;
/// let second = manager.subscribe(WebSocketProps::new(url).error(on_error), &dispatch)?;
/// assert_eq!(manager.connection_count(), 1);
///
/// first.unsubscribe();
/// second.unsubscribe();
/// assert_eq!(manager.connection_count(), 0);
/// ```
pub struct ConnectionManager {
    /// Opens new sockets.
    connector: Arc<dyn Connector>,

    /// Active connections by URL.
    connections: Mutex<FxHashMap<String, ConnectionRecord>>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connection_count", &self.connection_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionManager - Constructor
// ============================================================================

impl ConnectionManager {
    /// Creates a manager that opens sockets through `connector`.
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>) -> Arc<Self> {
        Arc::new(Self {
            connector,
            connections: Mutex::new(FxHashMap::default()),
        })
    }

    /// Creates a manager backed by network WebSockets.
    #[inline]
    #[must_use]
    pub fn with_websockets() -> Arc<Self> {
        Self::new(Arc::new(WsConnector))
    }
}

// ============================================================================
// ConnectionManager - Public API
// ============================================================================

impl ConnectionManager {
    /// Subscribes to a WebSocket URL.
    ///
    /// Reuses the URL's socket if one is live, otherwise connects a new one.
    /// Then sends the optional payload (deferred until open if the socket is
    /// still connecting) and registers the optional message and error
    /// listeners, which post their actions through `dispatch`.
    ///
    /// # Arguments
    ///
    /// * `props` - Subscription configuration
    /// * `dispatch` - Where listener messages are posted
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if the URL is malformed or not `ws`/`wss`
    /// - Any error from the connector when a new socket is needed
    pub fn subscribe<M>(self: &Arc<Self>, props: WebSocketProps<M>, dispatch: &Dispatch<M>) -> Result<Unsubscribe>
    where
        M: Send + 'static,
    {
        validate_url(&props.url)?;

        let url = props.url.clone();
        let id = SubscriptionId::next();

        let mut connections = self.connections.lock();
        let (record, created) = match connections.entry(url.clone()) {
            Entry::Occupied(entry) => {
                trace!(url = %url, "Reusing connection");
                (entry.into_mut(), false)
            }
            Entry::Vacant(entry) => {
                let socket = self.connector.connect(&url, &props.protocols)?;
                debug!(url = %url, "Connection created");
                let record = entry.insert(ConnectionRecord {
                    socket,
                    registrations: Vec::new(),
                });
                (record, true)
            }
        };

        let listeners = props.attach(&record.socket, dispatch);
        debug!(url = %url, subscription = %id, listeners = listeners.len(), "Subscribed");
        record.registrations.push(Registration { id, listeners });

        // Listeners are in place; a new socket may now report.
        if created {
            record.socket.start();
        }

        Ok(Unsubscribe {
            manager: Arc::downgrade(self),
            url,
            id,
        })
    }

    /// Returns the number of live connections.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Returns `true` if a connection for `url` is live.
    #[inline]
    #[must_use]
    pub fn is_connected(&self, url: &str) -> bool {
        self.connections.lock().contains_key(url)
    }

    /// Returns the number of active subscriptions for `url`.
    #[must_use]
    pub fn subscription_count(&self, url: &str) -> usize {
        self.connections
            .lock()
            .get(url)
            .map_or(0, |record| record.registrations.len())
    }

    /// Returns the number of message and error listeners registered for `url`.
    #[must_use]
    pub fn listener_count(&self, url: &str) -> usize {
        self.connections
            .lock()
            .get(url)
            .map_or(0, ConnectionRecord::listener_count)
    }

    /// Returns the live socket for `url`.
    #[must_use]
    pub fn socket(&self, url: &str) -> Option<Arc<dyn Socket>> {
        self.connections
            .lock()
            .get(url)
            .map(|record| Arc::clone(&record.socket))
    }
}

// ============================================================================
// ConnectionManager - Lifecycle
// ============================================================================

impl ConnectionManager {
    /// Releases one subscription.
    fn release(&self, url: &str, id: SubscriptionId) {
        let mut connections = self.connections.lock();

        let Some(record) = connections.get_mut(url) else {
            trace!(url, subscription = %id, "Connection already gone");
            return;
        };

        // A newer connection for the same URL does not know this id.
        let Some(position) = record.registrations.iter().position(|r| r.id == id) else {
            trace!(url, subscription = %id, "Subscription not registered");
            return;
        };

        let registration = record.registrations.remove(position);
        for listener in registration.listeners {
            record.socket.remove_listener(listener);
        }

        debug!(
            url,
            subscription = %id,
            remaining = record.registrations.len(),
            "Unsubscribed"
        );

        if record.registrations.is_empty()
            && let Some(record) = connections.remove(url)
        {
            record.socket.close();
            debug!(url, "Connection closed");
        }
    }

    /// Closes every connection and clears the registry.
    ///
    /// Outstanding [`Unsubscribe`] handles become no-ops.
    pub fn shutdown(&self) {
        let connections: Vec<_> = {
            let mut map = self.connections.lock();
            map.drain().collect()
        };

        let count = connections.len();
        for (url, record) in connections {
            record.socket.close();
            debug!(url = %url, "Connection closed during shutdown");
        }

        info!(count, "ConnectionManager shutdown complete");
    }
}

// ============================================================================
// Unsubscribe
// ============================================================================

/// Handle that tears one subscription down.
///
/// Dropping it without calling [`Unsubscribe::unsubscribe`] leaves the
/// subscription active until the manager shuts down.
#[must_use = "the subscription stays active until `unsubscribe` is called"]
pub struct Unsubscribe {
    manager: Weak<ConnectionManager>,
    url: String,
    id: SubscriptionId,
}

impl Unsubscribe {
    /// Removes this subscription's listeners and releases its connection.
    ///
    /// Closes the socket if this was the URL's last subscription.
    pub fn unsubscribe(self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.release(&self.url, self.id);
        }
    }

    /// URL of the subscribed connection.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Subscription identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("url", &self.url)
            .field("id", &self.id)
            .finish()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Accepts only absolute `ws` and `wss` URLs.
fn validate_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url).map_err(|e| Error::invalid_url(url, e.to_string()))?;

    match parsed.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(Error::invalid_url(
            url,
            format!("unsupported scheme `{other}`"),
        )),
    }
}

// ============================================================================
// Tests
// ============================================================================
