//! Evaluation Errors
//!
//! A node function may legitimately fail (a missing input, a tool that
//! returned non-zero). Such failures are not graph corruption: they are
//! carried on the node exactly like a value and propagate to dependents
//! through the ordinary signaling path. The engine never inspects the
//! payload beyond presence and transience.
//!
//! Contract violations (double finalization, excess signals, mismatched
//! group sizes, ...) are a different tier entirely: they indicate a bug in
//! the calling evaluator and panic immediately rather than being modeled
//! here.

use thiserror::Error;

/// Whether an evaluation error is expected to persist across builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transience {
    /// The error will recur until an input changes (e.g. a missing file).
    Persistent,

    /// The error may resolve on its own; retry on the next build
    /// (e.g. a flaky remote fetch).
    Transient,
}

/// A structured error produced by a node function.
///
/// Stored on a finalized node in place of a value. Dependents observe that
/// their dependency is done-with-error; how to surface or short-circuit is
/// the evaluator's decision, not the engine's.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EvalError {
    message: String,
    transience: Transience,
}

impl EvalError {
    /// Create an error with an explicit transience classification.
    pub fn new(message: impl Into<String>, transience: Transience) -> Self {
        Self {
            message: message.into(),
            transience,
        }
    }

    /// Create a persistent error.
    pub fn persistent(message: impl Into<String>) -> Self {
        Self::new(message, Transience::Persistent)
    }

    /// Create a transient error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(message, Transience::Transient)
    }

    /// The human-readable failure description.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The transience classification.
    pub fn transience(&self) -> Transience {
        self.transience
    }
}
