//! Listener bookkeeping shared by socket implementations.
//!
//! [`ListenerSet`] is plain data; callers keep it behind their own lock
//! and take snapshots of handlers before invoking them.

// ============================================================================
// Imports
// ============================================================================

use std::mem;

use crate::identifiers::ListenerId;

use super::{ErrorHandler, Listener, MessageHandler, OpenCallback};

// ============================================================================
// ListenerSet
// ============================================================================

/// Registered listeners in registration order, plus pending open callbacks.
#[derive(Default)]
pub struct ListenerSet {
    listeners: Vec<(ListenerId, Listener)>,
    on_open: Vec<OpenCallback>,
}

impl ListenerSet {
    /// Creates an empty set.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener.
    pub fn add(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId::next();
        self.listeners.push((id, listener));
        id
    }

    /// Removes a listener by id.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    /// Queues a one-shot open callback.
    #[inline]
    pub fn defer_open(&mut self, callback: OpenCallback) {
        self.on_open.push(callback);
    }

    /// Takes all pending open callbacks.
    #[inline]
    pub fn take_open(&mut self) -> Vec<OpenCallback> {
        mem::take(&mut self.on_open)
    }

    /// Snapshot of message handlers.
    #[must_use]
    pub fn message_handlers(&self) -> Vec<MessageHandler> {
        self.listeners
            .iter()
            .filter_map(|(_, listener)| match listener {
                Listener::Message(handler) => Some(handler.clone()),
                Listener::Error(_) => None,
            })
            .collect()
    }

    /// Snapshot of error handlers.
    #[must_use]
    pub fn error_handlers(&self) -> Vec<ErrorHandler> {
        self.listeners
            .iter()
            .filter_map(|(_, listener)| match listener {
                Listener::Error(handler) => Some(handler.clone()),
                Listener::Message(_) => None,
            })
            .collect()
    }

    /// Number of registered listeners (open callbacks excluded).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns `true` if no listeners are registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Drops every listener and pending callback.
    pub fn clear(&mut self) {
        self.listeners.clear();
        self.on_open.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_add_and_remove() {
        let mut set = ListenerSet::new();
        let a = set.add(Listener::message(|_| {}));
        let b = set.add(Listener::error(|_| {}));

        assert_eq!(set.len(), 2);
        assert_eq!(set.message_handlers().len(), 1);
        assert_eq!(set.error_handlers().len(), 1);

        assert!(set.remove(a));
        assert!(!set.remove(a));
        assert_eq!(set.message_handlers().len(), 0);
        assert!(set.remove(b));
        assert!(set.is_empty());
    }

    #[test]
    fn test_take_open_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut set = ListenerSet::new();
        let counter = Arc::clone(&calls);
        set.defer_open(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        for callback in set.take_open() {
            callback();
        }
        assert!(set.take_open().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
