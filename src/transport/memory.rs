//! Caller-driven sockets for tests.
//!
//! [`MemorySocket`] never touches the network. The test moves it through
//! its states with [`MemorySocket::open`], feeds it frames with
//! [`MemorySocket::receive`] and inspects what was sent and whether it
//! was closed.
//!
//! ```ignore
//! let connector = Arc::new(MemoryConnector::new());
//! let manager = ConnectionManager::new(connector.clone());
//!
//! let sub = manager.subscribe(props, dispatch)?;
//! let socket = connector.last().unwrap();
//! socket.open();
//! socket.receive("hello");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{Error, Result};
use crate::identifiers::ListenerId;

use super::{
    Connector, Listener, ListenerSet, OpenCallback, ReadyState, Socket, SocketError, SocketMessage,
};

// ============================================================================
// MemorySocket
// ============================================================================

struct MemoryState {
    ready_state: ReadyState,
    listeners: ListenerSet,
    sent: Vec<SocketMessage>,
    started: bool,
    close_calls: usize,
}

/// In-process socket driven by the caller.
pub struct MemorySocket {
    url: String,
    protocols: Vec<String>,
    state: Mutex<MemoryState>,
}

impl MemorySocket {
    /// Creates a socket in [`ReadyState::Connecting`].
    #[must_use]
    pub fn new(url: impl Into<String>, protocols: Vec<String>) -> Self {
        Self {
            url: url.into(),
            protocols,
            state: Mutex::new(MemoryState {
                ready_state: ReadyState::Connecting,
                listeners: ListenerSet::new(),
                sent: Vec::new(),
                started: false,
                close_calls: 0,
            }),
        }
    }

    /// Sub-protocols requested at connect time.
    #[inline]
    #[must_use]
    pub fn protocols(&self) -> &[String] {
        &self.protocols
    }

    /// Completes the handshake and runs deferred open callbacks.
    ///
    /// Does nothing unless the socket is connecting.
    pub fn open(&self) {
        let callbacks = {
            let mut state = self.state.lock();
            if state.ready_state != ReadyState::Connecting {
                return;
            }
            state.ready_state = ReadyState::Open;
            state.listeners.take_open()
        };

        trace!(url = %self.url, deferred = callbacks.len(), "Memory socket opened");

        for callback in callbacks {
            callback();
        }
    }

    /// Delivers an incoming frame to message listeners.
    pub fn receive(&self, message: impl Into<SocketMessage>) {
        let message = message.into();
        let handlers = self.state.lock().listeners.message_handlers();
        for handler in handlers {
            handler(message.clone());
        }
    }

    /// Emits an error notification. The socket state is unchanged.
    pub fn fail(&self, message: impl Into<String>) {
        let error = SocketError::new(&self.url, message);
        let handlers = self.state.lock().listeners.error_handlers();
        for handler in handlers {
            handler(error.clone());
        }
    }

    /// Frames sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SocketMessage> {
        self.state.lock().sent.clone()
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Returns `true` once `start` has been called.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    /// Returns `true` once `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().ready_state == ReadyState::Closed
    }

    /// Number of `close` calls, including repeated ones.
    #[must_use]
    pub fn close_calls(&self) -> usize {
        self.state.lock().close_calls
    }
}

impl Socket for MemorySocket {
    fn url(&self) -> &str {
        &self.url
    }

    fn ready_state(&self) -> ReadyState {
        self.state.lock().ready_state
    }

    fn send(&self, message: SocketMessage) -> Result<()> {
        let mut state = self.state.lock();
        if state.ready_state != ReadyState::Open {
            return Err(Error::socket_not_open(&self.url, state.ready_state));
        }
        state.sent.push(message);
        Ok(())
    }

    fn add_listener(&self, listener: Listener) -> ListenerId {
        self.state.lock().listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.state.lock().listeners.remove(id)
    }

    fn defer_until_open(&self, callback: OpenCallback) -> std::result::Result<(), OpenCallback> {
        let mut state = self.state.lock();
        if state.ready_state == ReadyState::Connecting {
            state.listeners.defer_open(callback);
            Ok(())
        } else {
            Err(callback)
        }
    }

    fn start(&self) {
        self.state.lock().started = true;
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.close_calls += 1;
        state.ready_state = ReadyState::Closed;
        state.listeners.clear();
    }
}

// ============================================================================
// MemoryConnector
// ============================================================================

/// Connector that hands out [`MemorySocket`]s and remembers them.
#[derive(Default)]
pub struct MemoryConnector {
    sockets: Mutex<Vec<Arc<MemorySocket>>>,
}

impl MemoryConnector {
    /// Creates a connector with no sockets.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every socket created so far, oldest first.
    #[must_use]
    pub fn sockets(&self) -> Vec<Arc<MemorySocket>> {
        self.sockets.lock().clone()
    }

    /// The most recently created socket.
    #[must_use]
    pub fn last(&self) -> Option<Arc<MemorySocket>> {
        self.sockets.lock().last().cloned()
    }

    /// Number of `connect` calls.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.sockets.lock().len()
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, url: &str, protocols: &[String]) -> Result<Arc<dyn Socket>> {
        let socket = Arc::new(MemorySocket::new(url, protocols.to_vec()));
        self.sockets.lock().push(Arc::clone(&socket));
        Ok(socket)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_send_requires_open() {
        let socket = MemorySocket::new("ws://example.test", Vec::new());
        assert!(socket.send("early".into()).is_err());

        socket.open();
        assert!(socket.send("late".into()).is_ok());
        assert_eq!(socket.sent(), vec![SocketMessage::from("late")]);
    }

    #[test]
    fn test_defer_until_open() {
        let socket = MemorySocket::new("ws://example.test", Vec::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let deferred = socket.defer_until_open(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(deferred.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        socket.open();
        socket.open();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let handed_back = socket.defer_until_open(Box::new(|| {}));
        assert!(handed_back.is_err());
    }

    #[test]
    fn test_receive_and_fail_reach_listeners() {
        let socket = MemorySocket::new("ws://example.test", Vec::new());
        let messages = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));

        let m = Arc::clone(&messages);
        socket.add_listener(Listener::message(move |_| {
            m.fetch_add(1, Ordering::SeqCst);
        }));
        let e = Arc::clone(&errors);
        let error_id = socket.add_listener(Listener::error(move |_| {
            e.fetch_add(1, Ordering::SeqCst);
        }));

        socket.receive("one");
        socket.fail("boom");
        assert!(socket.remove_listener(error_id));
        socket.fail("ignored");

        assert_eq!(messages.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_connector_tracks_sockets() {
        let connector = MemoryConnector::new();
        connector
            .connect("ws://a.test", &["chat".to_string()])
            .expect("connect");
        connector.connect("ws://b.test", &[]).expect("connect");

        assert_eq!(connector.connect_count(), 2);
        let last = connector.last().expect("socket");
        assert_eq!(last.url(), "ws://b.test");
        assert_eq!(connector.sockets()[0].protocols(), ["chat".to_string()]);
    }
}
