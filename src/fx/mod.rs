//! Effect descriptors.
//!
//! An [`Effect`] is plain data describing a side effect. Nothing happens
//! until a [`Runtime`](crate::Runtime) runs it.
//!
//! # Effect Kinds
//!
//! | Variant | Constructor | Dispatches |
//! |---------|-------------|------------|
//! | [`Effect::Console`] | [`console`] | never |
//! | [`Effect::Http`] | [`http`] | once, success or error action |
//! | [`Effect::Batch`] | [`batch`] | whatever the children dispatch |
//! | [`Effect::Custom`] | [`Effect::custom`] | up to the handler |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::dispatch::Dispatch;

// ============================================================================
// Submodules
// ============================================================================

/// Sequencing of several effects.
pub mod batch;

/// Console logging effect and log sinks.
pub mod console;

/// HTTP request effect.
pub mod http;

// ============================================================================
// Re-exports
// ============================================================================

pub use batch::batch;
pub use console::{ConsoleProps, LogSink, MemorySink, StdoutSink, TracingSink, console};
pub use http::{
    FailedResponse, HttpOptions, HttpProps, HttpResult, RequestBody, ResponseBody, ResponseKind,
    http,
};

// ============================================================================
// Types
// ============================================================================

/// Handler of an application-defined effect.
///
/// Receives the effect's own properties and the shared dispatch.
pub type EffectFn<M> = Arc<dyn Fn(&Value, &Dispatch<M>) + Send + Sync>;

// ============================================================================
// Effect
// ============================================================================

/// A side-effect descriptor.
pub enum Effect<M> {
    /// Write values to the log sink.
    Console(ConsoleProps),
    /// Issue an HTTP request.
    Http(HttpProps<M>),
    /// Run several effects in order.
    Batch(Vec<Effect<M>>),
    /// Run an application-defined handler with its properties.
    Custom {
        /// Handler to invoke.
        handler: EffectFn<M>,
        /// Properties passed to the handler.
        props: Value,
    },
}

impl<M> Effect<M> {
    /// Builds an application-defined effect from a (handler, properties) pair.
    #[must_use]
    pub fn custom(handler: impl Fn(&Value, &Dispatch<M>) + Send + Sync + 'static, props: Value) -> Self {
        Self::Custom {
            handler: Arc::new(handler),
            props,
        }
    }

    /// Returns `true` for an empty batch.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Batch(effects) if effects.iter().all(Effect::is_noop))
    }

    /// Short name of the effect kind, used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Console(_) => "console",
            Self::Http(_) => "http",
            Self::Batch(_) => "batch",
            Self::Custom { .. } => "custom",
        }
    }
}

impl<M> Clone for Effect<M> {
    fn clone(&self) -> Self {
        match self {
            Self::Console(props) => Self::Console(props.clone()),
            Self::Http(props) => Self::Http(props.clone()),
            Self::Batch(effects) => Self::Batch(effects.clone()),
            Self::Custom { handler, props } => Self::Custom {
                handler: Arc::clone(handler),
                props: props.clone(),
            },
        }
    }
}

impl<M> fmt::Debug for Effect<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Console(props) => f.debug_tuple("Console").field(props).finish(),
            Self::Http(props) => f.debug_tuple("Http").field(props).finish(),
            Self::Batch(effects) => f.debug_tuple("Batch").field(effects).finish(),
            Self::Custom { props, .. } => f
                .debug_struct("Custom")
                .field("props", props)
                .finish_non_exhaustive(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_kind_names() {
        let console: Effect<()> = console([json!("hi")]);
        let custom: Effect<()> = Effect::custom(|_, _| {}, json!({}));

        assert_eq!(console.kind(), "console");
        assert_eq!(custom.kind(), "custom");
        assert_eq!(batch::<()>([]).kind(), "batch");
    }

    #[test]
    fn test_is_noop() {
        let empty: Effect<()> = batch([]);
        let nested: Effect<()> = batch([batch([]), batch([])]);
        let logging: Effect<()> = batch([console([json!(1)])]);

        assert!(empty.is_noop());
        assert!(nested.is_noop());
        assert!(!logging.is_noop());
    }

    #[test]
    fn test_clone_shares_handler() {
        let effect: Effect<()> = Effect::custom(|_, _| {}, json!({ "n": 1 }));
        let cloned = effect.clone();

        match (&effect, &cloned) {
            (Effect::Custom { handler: a, props: pa }, Effect::Custom { handler: b, props: pb }) => {
                assert!(Arc::ptr_eq(a, b));
                assert_eq!(pa, pb);
            }
            _ => panic!("Expected custom effects"),
        }
    }
}
