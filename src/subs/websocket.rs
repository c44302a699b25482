//! WebSocketClient subscription.
//!
//! Opens (or joins) the shared connection for a URL, optionally sends one
//! payload once the connection is open, and posts incoming frames and
//! error notifications to the application.
//!
//! # Example
//!
//! ```ignore
//! use webfx::{Action, websocket_client, WebSocketProps};
//!
//! let sub = websocket_client(
//!     WebSocketProps::new("wss://stream.example.com/quotes")
//!         .protocol("quotes.v1")
//!         .send(r#"{"subscribe":"BTC"}"#)
//!         .listen(Action::new(Msg::Quote))
//!         .error(Action::new(Msg::StreamFailed)),
//! );
//! let unsubscribe = runtime.subscribe(sub)?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::dispatch::{Action, Dispatch};
use crate::identifiers::ListenerId;
use crate::transport::{Listener, OpenCallback, Socket, SocketError, SocketMessage};

use super::Subscription;

// ============================================================================
// WebSocketProps
// ============================================================================

/// Configuration of one WebSocket subscription.
pub struct WebSocketProps<M> {
    /// URL to connect to; also the sharing key.
    pub url: String,
    /// Sub-protocols offered when this subscription opens the connection.
    pub protocols: Vec<String>,
    /// Frame to send once connected.
    pub send: Option<SocketMessage>,
    /// Action for each incoming frame.
    pub listen: Option<Action<M, SocketMessage>>,
    /// Action for each error notification.
    pub error: Option<Action<M, SocketError>>,
}

impl<M> WebSocketProps<M> {
    /// Creates a subscription to `url` with nothing attached.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            protocols: Vec::new(),
            send: None,
            listen: None,
            error: None,
        }
    }

    /// Adds a sub-protocol.
    #[inline]
    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    /// Adds several sub-protocols.
    #[inline]
    #[must_use]
    pub fn protocols(mut self, protocols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.protocols.extend(protocols.into_iter().map(Into::into));
        self
    }

    /// Sets the frame sent once the connection is open.
    #[inline]
    #[must_use]
    pub fn send(mut self, message: impl Into<SocketMessage>) -> Self {
        self.send = Some(message.into());
        self
    }

    /// Sets the action for incoming frames.
    #[inline]
    #[must_use]
    pub fn listen(mut self, action: impl Into<Action<M, SocketMessage>>) -> Self {
        self.listen = Some(action.into());
        self
    }

    /// Sets the action for error notifications.
    #[inline]
    #[must_use]
    pub fn error(mut self, action: impl Into<Action<M, SocketError>>) -> Self {
        self.error = Some(action.into());
        self
    }
}

impl<M: Send + 'static> WebSocketProps<M> {
    /// Applies this subscription to `socket`.
    ///
    /// Returns the listeners it registered, in registration order.
    pub(crate) fn attach(self, socket: &Arc<dyn Socket>, dispatch: &Dispatch<M>) -> Vec<ListenerId> {
        if let Some(payload) = self.send {
            let target = Arc::clone(socket);
            let deliver: OpenCallback = Box::new(move || {
                if let Err(e) = target.send(payload) {
                    warn!(url = %target.url(), error = %e, "Failed to send subscription payload");
                }
            });

            match socket.defer_until_open(deliver) {
                Ok(()) => trace!(url = %self.url, "Send deferred until open"),
                Err(deliver_now) => deliver_now(),
            }
        }

        let mut listeners = Vec::with_capacity(2);

        if let Some(listen) = self.listen {
            let dispatch = dispatch.clone();
            listeners.push(socket.add_listener(Listener::message(move |message| {
                dispatch.action(&listen, message);
            })));
        }

        if let Some(error) = self.error {
            let dispatch = dispatch.clone();
            listeners.push(socket.add_listener(Listener::error(move |event| {
                dispatch.action(&error, event);
            })));
        }

        listeners
    }
}

impl<M> Clone for WebSocketProps<M> {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            protocols: self.protocols.clone(),
            send: self.send.clone(),
            listen: self.listen.clone(),
            error: self.error.clone(),
        }
    }
}

impl<M> fmt::Debug for WebSocketProps<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketProps")
            .field("url", &self.url)
            .field("protocols", &self.protocols)
            .field("send", &self.send)
            .field("listen", &self.listen.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

// ============================================================================
// Constructor
// ============================================================================

/// Describes a WebSocket subscription.
///
/// The connection stays open until the last subscription for its URL is
/// unsubscribed.
#[inline]
#[must_use]
pub fn websocket_client<M>(props: WebSocketProps<M>) -> Subscription<M> {
    Subscription::WebSocket(props)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::{ConnectionManager, MemoryConnector, ReadyState};

    const URL: &str = "ws://example.test/chat";

    #[derive(Debug, PartialEq)]
    enum Msg {
        Chat(SocketMessage),
        Broken(String),
    }

    fn setup() -> (Arc<MemoryConnector>, Arc<ConnectionManager>, Dispatch<Msg>, tokio::sync::mpsc::UnboundedReceiver<Msg>) {
        let connector = Arc::new(MemoryConnector::new());
        let manager = ConnectionManager::new(connector.clone());
        let (dispatch, rx) = Dispatch::channel();
        (connector, manager, dispatch, rx)
    }

    #[test]
    fn test_builder() {
        let props: WebSocketProps<Msg> = WebSocketProps::new(URL)
            .protocol("a")
            .protocols(["b", "c"])
            .send("hi");

        assert_eq!(props.protocols, ["a", "b", "c"]);
        assert_eq!(props.send, Some(SocketMessage::from("hi")));
        assert!(props.listen.is_none());
        assert!(props.error.is_none());
        assert!(matches!(websocket_client(props), Subscription::WebSocket(_)));
    }

    #[test]
    fn test_send_while_connecting_is_deferred_once() {
        let (connector, manager, dispatch, _rx) = setup();

        let sub = manager
            .subscribe(WebSocketProps::new(URL).send("hello"), &dispatch)
            .expect("subscribe");
        let socket = connector.last().expect("socket");

        assert_eq!(socket.ready_state(), ReadyState::Connecting);
        assert!(socket.sent().is_empty());

        socket.open();
        assert_eq!(socket.sent(), vec![SocketMessage::from("hello")]);

        socket.open();
        assert_eq!(socket.sent().len(), 1);

        sub.unsubscribe();
    }

    #[test]
    fn test_send_on_open_socket_is_immediate() {
        let (connector, manager, dispatch, _rx) = setup();

        let first = manager
            .subscribe(
                WebSocketProps::new(URL).listen(Action::new(Msg::Chat)),
                &dispatch,
            )
            .expect("subscribe");
        let socket = connector.last().expect("socket");
        socket.open();

        let second = manager
            .subscribe(WebSocketProps::new(URL).send(vec![1u8, 2, 3]), &dispatch)
            .expect("subscribe");

        assert_eq!(socket.sent(), vec![SocketMessage::Binary(vec![1, 2, 3])]);

        second.unsubscribe();
        first.unsubscribe();
    }

    #[test]
    fn test_listen_and_error_dispatch() {
        let (connector, manager, dispatch, mut rx) = setup();

        let sub = manager
            .subscribe(
                WebSocketProps::new(URL)
                    .listen(Action::new(Msg::Chat))
                    .error(|event: SocketError| Msg::Broken(event.message)),
                &dispatch,
            )
            .expect("subscribe");
        let socket = connector.last().expect("socket");
        socket.open();

        socket.receive("one");
        socket.fail("reset by peer");
        socket.receive("two");

        assert_eq!(rx.try_recv().ok(), Some(Msg::Chat("one".into())));
        assert_eq!(rx.try_recv().ok(), Some(Msg::Broken("reset by peer".into())));
        assert_eq!(rx.try_recv().ok(), Some(Msg::Chat("two".into())));
        assert!(!socket.is_closed());

        sub.unsubscribe();
        socket.receive("three");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_no_handlers_registers_nothing() {
        let (connector, manager, dispatch, _rx) = setup();

        let sub = manager
            .subscribe(WebSocketProps::new(URL), &dispatch)
            .expect("subscribe");
        let socket = connector.last().expect("socket");

        assert_eq!(socket.listener_count(), 0);
        assert_eq!(manager.subscription_count(URL), 1);

        sub.unsubscribe();
        assert!(socket.is_closed());
    }

    #[test]
    fn test_send_on_closed_socket_is_logged_not_dispatched() {
        let (connector, manager, dispatch, mut rx) = setup();

        let first = manager
            .subscribe(
                WebSocketProps::new(URL).error(|e: SocketError| Msg::Broken(e.message)),
                &dispatch,
            )
            .expect("subscribe");
        let socket = connector.last().expect("socket");
        socket.close();

        let second = manager
            .subscribe(WebSocketProps::new(URL).send("late"), &dispatch)
            .expect("subscribe");

        assert!(socket.sent().is_empty());
        assert!(rx.try_recv().is_err());

        first.unsubscribe();
        second.unsubscribe();
    }
}
