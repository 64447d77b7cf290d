//! Evaluation errors, panics, and the control-flow channel.
//!
//! Errors and control signals ride the `Err` arm of [`EvalResult`], so `?`
//! gives every expression and statement the short-circuit propagation the
//! evaluator needs: a `break` deep inside a nested expression unwinds to the
//! enclosing loop exactly like an error unwinds to the driver.
//!
//! Panics are distinct from errors: they carry a user [`Value`] payload,
//! run deferred calls while unwinding, and can be cleared by `recover`.
//! Errors are terminal for the current entry-point invocation.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

pub use argus_syntax::Pos;

use crate::value::Value;

/// Result alias used throughout the evaluator.
pub(crate) type EvalResult<T> = Result<T, Flow>;

/// How many call frames an error snapshot keeps.
pub(crate) const STACK_SNAPSHOT_FRAMES: usize = 16;

/// Error categories, mirroring the failure taxonomy the downstream tools
/// switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Name not found, undefined selector, package not found, ambiguous
    /// promotion.
    Resolution,
    /// Wrong arity, conversion mismatch, non-hashable key, nil dereference,
    /// interface not implemented.
    Type,
    /// Division by zero, index out of range, slice bounds, call depth.
    Runtime,
    /// Inference failure, type-argument arity, constraint violation.
    Generics,
    /// `defer` outside a function, `break`/`continue` outside a loop,
    /// labeled jumps.
    ControlFlow,
    /// Host-callback and value-conversion failures from the foreign bridge.
    Foreign,
    /// Parse failures surfaced while lazily loading a package.
    Syntax,
}

/// One entry of a stack snapshot, innermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub function: String,
    pub file: String,
    pub pos: Pos,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.function, self.file, self.pos)
    }
}

/// A fatal evaluation error.
///
/// Carries the formatted position of the offending node and a snapshot of
/// the innermost call frames at creation time. `recover` does not observe
/// these; only panics are recoverable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalError {
    pub kind: ErrorKind,
    pub message: String,
    pub file: String,
    pub pos: Pos,
    pub stack: Vec<StackFrame>,
}

impl EvalError {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>, file: impl Into<String>, pos: Pos) -> Self {
        Self {
            kind,
            message: message.into(),
            file: file.into(),
            pos,
            stack: Vec::new(),
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}: {}", self.file, self.pos, self.kind, self.message)?;
        for frame in &self.stack {
            write!(f, "\n  at {frame}")?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

/// An in-flight panic: payload plus the site that raised it.
#[derive(Debug, Clone)]
pub(crate) struct Panic {
    pub value: Value,
    pub file: String,
    pub pos: Pos,
    pub stack: Vec<StackFrame>,
}

impl Panic {
    /// Renders an unrecovered panic as the error returned to the host.
    pub(crate) fn into_error(self) -> EvalError {
        let mut err = EvalError::new(
            ErrorKind::Runtime,
            format!("panic: {}", self.value.inspect()),
            self.file,
            self.pos,
        );
        err.stack = self.stack;
        err
    }
}

/// The non-value outcomes of evaluating a node.
///
/// `Return`, `Break` and `Continue` are consumed by the frames and loops
/// they belong to; `Panic` unwinds while running defers; `Err` unwinds
/// unconditionally.
#[derive(Debug, Clone)]
pub(crate) enum Flow {
    /// `Return(None)` is a bare `return` in a function with named results.
    Return(Option<Vec<Value>>),
    Break,
    Continue,
    Panic(Panic),
    Err(EvalError),
}

impl From<EvalError> for Flow {
    fn from(err: EvalError) -> Self {
        Self::Err(err)
    }
}
