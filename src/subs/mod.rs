//! Subscriptions: long-lived effects.
//!
//! A subscription stays active until the [`Unsubscribe`] handle returned
//! when it was started is used.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | Shared WebSocket connection per URL |

use std::fmt;

// ============================================================================
// Submodules
// ============================================================================

/// WebSocketClient subscription.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use crate::transport::Unsubscribe;
pub use websocket::{WebSocketProps, websocket_client};

// ============================================================================
// Subscription
// ============================================================================

/// A subscription descriptor.
pub enum Subscription<M> {
    /// WebSocket connection shared by URL.
    WebSocket(WebSocketProps<M>),
}

impl<M> fmt::Debug for Subscription<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WebSocket(props) => f.debug_tuple("WebSocket").field(props).finish(),
        }
    }
}

impl<M> Clone for Subscription<M> {
    fn clone(&self) -> Self {
        match self {
            Self::WebSocket(props) => Self::WebSocket(props.clone()),
        }
    }
}
