//! Console logging effect.
//!
//! Writes its arguments to the runtime's [`LogSink`] synchronously. Handy
//! while developing; it never dispatches.
//!
//! # Rendering
//!
//! Arguments are joined with single spaces. Strings are written as-is,
//! every other value as compact JSON:
//!
//! ```ignore
//! console([json!("user"), json!(42), json!({ "admin": true })]);
//! // user 42 {"admin":true}
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::io::{self, Write};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::Effect;

// ============================================================================
// ConsoleProps
// ============================================================================

/// Arguments of a console effect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsoleProps {
    /// Values to log, in order.
    pub args: Vec<Value>,
}

impl ConsoleProps {
    /// Creates props with no arguments.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { args: Vec::new() }
    }

    /// Appends an argument.
    #[inline]
    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Renders the arguments as one line.
    #[must_use]
    pub fn render(&self) -> String {
        render(&self.args)
    }
}

// ============================================================================
// Constructor
// ============================================================================

/// Describes a console effect logging `args`.
#[must_use]
pub fn console<M>(args: impl IntoIterator<Item = impl Into<Value>>) -> Effect<M> {
    Effect::Console(ConsoleProps {
        args: args.into_iter().map(Into::into).collect(),
    })
}

// ============================================================================
// LogSink
// ============================================================================

/// Destination of console effects.
pub trait LogSink: Send + Sync {
    /// Writes one call's arguments.
    fn write(&self, args: &[Value]);
}

/// Writes to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write(&self, args: &[Value]) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{}", render(args));
    }
}

/// Emits an INFO event on target `webfx::console`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, args: &[Value]) {
        info!(target: "webfx::console", "{}", render(args));
    }
}

/// Keeps rendered lines in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines written so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl LogSink for MemorySink {
    fn write(&self, args: &[Value]) {
        self.lines.lock().push(render(args));
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn render(args: &[Value]) -> String {
    args.iter()
        .map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Tests
// ============================================================================
