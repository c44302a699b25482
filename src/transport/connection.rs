//! WebSocket client socket and event loop.
//!
//! [`WsSocket`] is the network-backed [`Socket`]. Connecting spawns a
//! tokio task that owns the tungstenite stream for the socket's whole
//! life. The task waits for [`Socket::start`] before the handshake.
//!
//! # Event Loop
//!
//! The task handles:
//!
//! - The client handshake, racing it against an early close
//! - The open notification (deferred callbacks run once)
//! - Incoming text and binary frames, fanned out to message listeners
//! - Outgoing frames and close requests from the public API
//! - Error notifications for handshake and stream failures

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::ListenerId;

use super::{
    Connector, Listener, ListenerSet, OpenCallback, ReadyState, Socket, SocketError, SocketMessage,
};

// ============================================================================
// Types
// ============================================================================

/// State shared between the handle and the event loop.
struct SocketState {
    ready_state: ReadyState,
    listeners: ListenerSet,
}

type SharedState = Arc<Mutex<SocketState>>;

/// Internal commands for the event loop.
enum SocketCommand {
    /// Write a frame.
    Send(SocketMessage),
    /// Close the connection.
    Close,
}

// ============================================================================
// WsSocket
// ============================================================================

/// Network WebSocket backed by tokio-tungstenite.
///
/// Dropping the last handle closes the connection.
pub struct WsSocket {
    /// URL the socket connects to.
    url: String,
    /// State shared with the event loop.
    state: SharedState,
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<SocketCommand>,
    /// Releases the handshake; taken by the first `start`.
    start_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl WsSocket {
    /// Starts connecting to `url`.
    ///
    /// Returns immediately in [`ReadyState::Connecting`]. The handshake
    /// runs on the current Tokio runtime after [`Socket::start`].
    ///
    /// # Arguments
    ///
    /// * `url` - `ws://` or `wss://` URL
    /// * `protocols` - Sub-protocols offered in `Sec-WebSocket-Protocol`
    ///
    /// # Errors
    ///
    /// - [`Error::WebSocket`] if `url` cannot form a client request
    /// - [`Error::InvalidArgument`] if a protocol is not a valid header value
    /// - [`Error::Connection`] if called outside a Tokio runtime
    pub fn connect(url: &str, protocols: &[String]) -> Result<Self> {
        let request = build_request(url, protocols)?;
        let handle = Handle::try_current()
            .map_err(|e| Error::connection(format!("No Tokio runtime available: {e}")))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (start_tx, start_rx) = oneshot::channel();
        let state = Arc::new(Mutex::new(SocketState {
            ready_state: ReadyState::Connecting,
            listeners: ListenerSet::new(),
        }));

        handle.spawn(Self::run_event_loop(
            url.to_string(),
            request,
            start_rx,
            command_rx,
            Arc::clone(&state),
        ));

        debug!(url, ?protocols, "WebSocket connecting");

        Ok(Self {
            url: url.to_string(),
            state,
            command_tx,
            start_tx: Mutex::new(Some(start_tx)),
        })
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        url: String,
        request: Request,
        start_rx: oneshot::Receiver<()>,
        mut command_rx: mpsc::UnboundedReceiver<SocketCommand>,
        state: SharedState,
    ) {
        let started = tokio::select! {
            result = start_rx => result.is_ok(),
            _ = command_rx.recv() => false,
        };

        if !started {
            debug!(url = %url, "WebSocket closed before start");
            Self::finish(&state);
            return;
        }

        let ws_stream = tokio::select! {
            result = tokio_tungstenite::connect_async(request) => {
                match result {
                    Ok((stream, _response)) => stream,
                    Err(e) => {
                        warn!(url = %url, error = %e, "WebSocket handshake failed");
                        Self::finish(&state);
                        Self::emit_error(&url, &state, e.to_string());
                        return;
                    }
                }
            }

            // Sends are rejected until open, so only Close can be queued here
            _ = command_rx.recv() => {
                debug!(url = %url, "WebSocket closed before open");
                Self::finish(&state);
                return;
            }
        };

        let callbacks = {
            let mut guard = state.lock();
            if guard.ready_state == ReadyState::Connecting {
                guard.ready_state = ReadyState::Open;
                guard.listeners.take_open()
            } else {
                Vec::new()
            }
        };

        debug!(url = %url, deferred = callbacks.len(), "WebSocket open");

        for callback in callbacks {
            callback();
        }

        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming frames from the server
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::deliver(&state, SocketMessage::Text(text.as_str().to_owned()));
                        }

                        Some(Ok(Message::Binary(data))) => {
                            Self::deliver(&state, SocketMessage::Binary(data.to_vec()));
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!(url = %url, "WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(url = %url, error = %e, "WebSocket error");
                            Self::emit_error(&url, &state, e.to_string());
                            break;
                        }

                        None => {
                            debug!(url = %url, "WebSocket stream ended");
                            break;
                        }

                        // Ignore Ping, Pong, raw Frame
                        _ => {}
                    }
                }

                // Commands from the public API
                command = command_rx.recv() => {
                    match command {
                        Some(SocketCommand::Send(message)) => {
                            let frame = match message {
                                SocketMessage::Text(text) => Message::Text(text.into()),
                                SocketMessage::Binary(data) => Message::Binary(data.into()),
                            };

                            if let Err(e) = ws_write.send(frame).await {
                                warn!(url = %url, error = %e, "Failed to send frame");
                                Self::emit_error(&url, &state, e.to_string());
                                break;
                            }

                            trace!(url = %url, "Frame sent");
                        }

                        Some(SocketCommand::Close) | None => {
                            debug!(url = %url, "Close requested");
                            let _ = ws_write.close().await;
                            break;
                        }
                    }
                }
            }
        }

        Self::finish(&state);

        debug!(url = %url, "Event loop terminated");
    }

    /// Fans an incoming frame out to message listeners.
    fn deliver(state: &SharedState, message: SocketMessage) {
        let handlers = state.lock().listeners.message_handlers();
        trace!(listeners = handlers.len(), "Frame received");

        for handler in handlers {
            handler(message.clone());
        }
    }

    /// Notifies error listeners.
    fn emit_error(url: &str, state: &SharedState, message: String) {
        let error = SocketError::new(url, message);
        let handlers = state.lock().listeners.error_handlers();

        for handler in handlers {
            handler(error.clone());
        }
    }

    /// Marks the socket closed and drops callbacks that can no longer fire.
    fn finish(state: &SharedState) {
        let pending = {
            let mut guard = state.lock();
            guard.ready_state = ReadyState::Closed;
            guard.listeners.take_open()
        };
        drop(pending);
    }
}

impl Socket for WsSocket {
    fn url(&self) -> &str {
        &self.url
    }

    fn ready_state(&self) -> ReadyState {
        self.state.lock().ready_state
    }

    fn send(&self, message: SocketMessage) -> Result<()> {
        let ready_state = self.state.lock().ready_state;
        if ready_state != ReadyState::Open {
            return Err(Error::socket_not_open(&self.url, ready_state));
        }

        self.command_tx
            .send(SocketCommand::Send(message))
            .map_err(|_| Error::ConnectionClosed)
    }

    fn add_listener(&self, listener: Listener) -> ListenerId {
        self.state.lock().listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.state.lock().listeners.remove(id)
    }

    fn defer_until_open(&self, callback: OpenCallback) -> std::result::Result<(), OpenCallback> {
        let mut guard = self.state.lock();
        if guard.ready_state == ReadyState::Connecting {
            guard.listeners.defer_open(callback);
            Ok(())
        } else {
            Err(callback)
        }
    }

    fn start(&self) {
        if let Some(start_tx) = self.start_tx.lock().take() {
            trace!(url = %self.url, "WebSocket handshake released");
            let _ = start_tx.send(());
        }
    }

    fn close(&self) {
        let pending = {
            let mut guard = self.state.lock();
            if guard.ready_state.is_terminal() {
                return;
            }
            guard.ready_state = ReadyState::Closing;
            guard.listeners.take_open()
        };
        drop(pending);

        let _ = self.command_tx.send(SocketCommand::Close);
    }
}

// ============================================================================
// WsConnector
// ============================================================================

/// Connector that opens [`WsSocket`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, url: &str, protocols: &[String]) -> Result<Arc<dyn Socket>> {
        Ok(Arc::new(WsSocket::connect(url, protocols)?))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Builds the client handshake request.
fn build_request(url: &str, protocols: &[String]) -> Result<Request> {
    let mut request = url.into_client_request()?;

    if !protocols.is_empty() {
        let value = HeaderValue::from_str(&protocols.join(", "))
            .map_err(|e| Error::invalid_argument(format!("Invalid sub-protocol: {e}")))?;
        request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
    }

    Ok(request)
}

// ============================================================================
// Tests
// ============================================================================
