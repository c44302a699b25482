//! Message dispatch back into the application.
//!
//! Effects never call into application code directly. They map their
//! result through an [`Action`] and post the resulting message on the
//! application's channel via [`Dispatch`].
//!
//! ```ignore
//! let (dispatch, mut messages) = Dispatch::<Msg>::channel();
//! let loaded = Action::new(Msg::Loaded);
//!
//! dispatch.action(&loaded, payload);
//! assert!(matches!(messages.recv().await, Some(Msg::Loaded(_))));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

// ============================================================================
// Action
// ============================================================================

/// Maps an effect payload `P` into an application message `M`.
///
/// Cloning is cheap; the mapping function is shared.
pub struct Action<M, P>(Arc<dyn Fn(P) -> M + Send + Sync>);

impl<M, P> Action<M, P> {
    /// Wraps a mapping function.
    #[inline]
    pub fn new(f: impl Fn(P) -> M + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Builds the message for `payload`.
    #[inline]
    pub fn apply(&self, payload: P) -> M {
        (self.0)(payload)
    }
}

impl<M, P> Clone for Action<M, P> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<M, P> fmt::Debug for Action<M, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Action(..)")
    }
}

impl<M, P, F> From<F> for Action<M, P>
where
    F: Fn(P) -> M + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self::new(f)
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Sending half of the application's message channel.
///
/// Shared by every effect a runtime executes.
pub struct Dispatch<M> {
    tx: mpsc::UnboundedSender<M>,
}

impl<M> Clone for Dispatch<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<M> fmt::Debug for Dispatch<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<M> Dispatch<M> {
    /// Wraps an existing sender.
    #[inline]
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<M>) -> Self {
        Self { tx }
    }

    /// Creates a dispatch and the receiver the update loop reads from.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<M>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Posts a message.
    ///
    /// If the receiver has been dropped the message is discarded.
    pub fn send(&self, message: M) {
        if self.tx.send(message).is_err() {
            warn!("Dispatch receiver dropped, message discarded");
        }
    }

    /// Posts `action(payload)`.
    #[inline]
    pub fn action<P>(&self, action: &Action<M, P>, payload: P) {
        self.send(action.apply(payload));
    }

    /// Returns `true` once the receiving side is gone.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Msg {
        Got(u32),
    }

    #[test]
    fn test_action_applies_payload() {
        let action = Action::new(Msg::Got);
        assert_eq!(action.apply(7), Msg::Got(7));
        assert_eq!(action.clone().apply(8), Msg::Got(8));
    }

    #[test]
    fn test_dispatch_action_posts_message() {
        let (dispatch, mut rx) = Dispatch::channel();
        let action = Action::new(Msg::Got);

        dispatch.action(&action, 3);
        dispatch.clone().send(Msg::Got(4));

        assert_eq!(rx.try_recv().ok(), Some(Msg::Got(3)));
        assert_eq!(rx.try_recv().ok(), Some(Msg::Got(4)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (dispatch, rx) = Dispatch::<Msg>::channel();
        drop(rx);

        assert!(dispatch.is_closed());
        dispatch.send(Msg::Got(1));
    }

    #[test]
    fn test_action_from_closure() {
        let action: Action<String, u8> = (|n: u8| format!("n={n}")).into();
        assert_eq!(action.apply(2), "n=2");
    }
}
