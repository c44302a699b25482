//! Sequencing of several effects.
//!
//! A batch starts each child with the same dispatch, in order, without
//! waiting for asynchronous children to finish. Results are not
//! aggregated; every child dispatches on its own schedule.

// ============================================================================
// Imports
// ============================================================================

use super::Effect;

// ============================================================================
// Constructor
// ============================================================================

/// Describes a batch of effects.
///
/// An empty batch does nothing.
#[must_use]
pub fn batch<M>(effects: impl IntoIterator<Item = Effect<M>>) -> Effect<M> {
    Effect::Batch(effects.into_iter().collect())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use parking_lot::Mutex;
    use proptest::prelude::*;
    use serde_json::{Value, json};

    use crate::dispatch::Dispatch;
    use crate::fx::{MemorySink, console};
    use crate::runtime::Runtime;
    use crate::transport::{ConnectionManager, MemoryConnector};

    #[derive(Debug, Clone, PartialEq)]
    enum Msg {
        Ran(Value),
    }

    fn runtime() -> (Runtime<Msg>, tokio::sync::mpsc::UnboundedReceiver<Msg>, Arc<MemorySink>) {
        let (dispatch, rx) = Dispatch::channel();
        let sink = Arc::new(MemorySink::new());
        let runtime = Runtime::builder()
            .sink(sink.clone())
            .manager(ConnectionManager::new(Arc::new(MemoryConnector::new())))
            .build(dispatch)
            .expect("runtime");
        (runtime, rx, sink)
    }

    /// Effect that records its props and echoes them through dispatch.
    fn recording(calls: &Arc<Mutex<Vec<Value>>>, props: Value) -> Effect<Msg> {
        let calls = Arc::clone(calls);
        Effect::custom(
            move |props, dispatch| {
                calls.lock().push(props.clone());
                dispatch.send(Msg::Ran(props.clone()));
            },
            props,
        )
    }

    #[test]
    fn test_empty_batch_dispatches_nothing() {
        let (runtime, mut rx, sink) = runtime();

        runtime.run(batch([]));

        assert!(rx.try_recv().is_err());
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn test_single_effect() {
        let (runtime, mut rx, _sink) = runtime();
        let calls = Arc::new(Mutex::new(Vec::new()));

        runtime.run(batch([recording(&calls, json!({}))]));

        assert_eq!(*calls.lock(), vec![json!({})]);
        assert_eq!(rx.try_recv().ok(), Some(Msg::Ran(json!({}))));
    }

    #[test]
    fn test_multiple_effects_get_own_props_and_shared_dispatch() {
        let (runtime, mut rx, _sink) = runtime();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let first = json!({ "first": "props" });
        let second = json!({ "second": "props" });

        runtime.run(batch([
            recording(&calls, first.clone()),
            recording(&calls, second.clone()),
        ]));

        assert_eq!(*calls.lock(), vec![first.clone(), second.clone()]);
        assert_eq!(rx.try_recv().ok(), Some(Msg::Ran(first)));
        assert_eq!(rx.try_recv().ok(), Some(Msg::Ran(second)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_nested_batches_mix_kinds() {
        let (runtime, mut rx, sink) = runtime();
        let calls = Arc::new(Mutex::new(Vec::new()));

        runtime.run(batch([
            console(["start"]),
            batch([recording(&calls, json!(1)), console(["inner"])]),
            recording(&calls, json!(2)),
        ]));

        assert_eq!(sink.lines(), vec!["start".to_string(), "inner".to_string()]);
        assert_eq!(*calls.lock(), vec![json!(1), json!(2)]);
        assert_eq!(rx.try_recv().ok(), Some(Msg::Ran(json!(1))));
        assert_eq!(rx.try_recv().ok(), Some(Msg::Ran(json!(2))));
    }

    proptest! {
        #[test]
        fn prop_each_handler_runs_once_in_order(props in prop::collection::vec(any::<i64>(), 0..32)) {
            let (runtime, mut rx, _sink) = runtime();
            let calls = Arc::new(Mutex::new(Vec::new()));
            let expected: Vec<Value> = props.iter().map(|n| json!(n)).collect();

            runtime.run(batch(expected.iter().cloned().map(|p| recording(&calls, p))));

            prop_assert_eq!(&*calls.lock(), &expected);

            let mut dispatched = Vec::new();
            while let Ok(Msg::Ran(value)) = rx.try_recv() {
                dispatched.push(value);
            }
            prop_assert_eq!(dispatched, expected);
        }
    }
}
