//! Evaluation tracing for downstream tools.
//!
//! The interpreter is the engine behind call-graph extraction and
//! orphan-function detection, so every resolved call, unresolved external
//! call, and symbolic-placeholder production is surfaced through a hook
//! trait. All hooks default to no-ops: [`NoopTracer`] costs nothing,
//! [`RecordingTracer`] captures a flat [`TraceEvent`] log the host can walk
//! after evaluation, and [`StderrTracer`] prints a human-readable log while
//! debugging.

use std::{cell::RefCell, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::error::Pos;

/// One event emitted during evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceEvent {
    /// A call resolved to a concrete function body or builtin.
    Call {
        /// Fully qualified callee when known (`pkg/path.Name` or
        /// `(*pkg/path.Type).Method`), bare name otherwise.
        callee: String,
        file: String,
        pos: Pos,
        depth: usize,
    },
    /// A frame was popped.
    Return { depth: usize },
    /// A call target lives in a package the scan policy keeps shallow;
    /// the result became symbolic.
    ExternalCall {
        callee: String,
        file: String,
        pos: Pos,
    },
    /// A symbolic placeholder entered the value flow.
    Symbolic {
        /// Static type of the placeholder when known.
        type_name: Option<String>,
        file: String,
        pos: Pos,
    },
    /// A package was loaded into the cache.
    PackageLoaded { import_path: String },
}

/// Trait for evaluation tracing.
///
/// All methods have default no-op bodies, so implementations only override
/// the hooks they care about.
pub trait EvalTracer {
    /// A call is about to push a frame (or dispatch to a builtin).
    fn on_call(&mut self, _callee: &str, _file: &str, _pos: Pos, _depth: usize) {}

    /// A frame was popped.
    fn on_return(&mut self, _depth: usize) {}

    /// A call resolved into a shallow-scanned package.
    fn on_external_call(&mut self, _callee: &str, _file: &str, _pos: Pos) {}

    /// A symbolic placeholder was produced.
    fn on_symbolic(&mut self, _type_name: Option<&str>, _file: &str, _pos: Pos) {}

    /// A package finished loading.
    fn on_package_loaded(&mut self, _import_path: &str) {}
}

/// A tracer that does nothing; the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl EvalTracer for NoopTracer {}

/// Tracer that records every event into a shared log.
///
/// The log handle is `Rc`-shared: clone it out with [`Self::events`]
/// before handing the tracer to the interpreter, then read it back after
/// evaluation.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Rc<RefCell<Vec<TraceEvent>>>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A shared handle to the event log.
    #[must_use]
    pub fn events(&self) -> Rc<RefCell<Vec<TraceEvent>>> {
        Rc::clone(&self.events)
    }
}

impl EvalTracer for RecordingTracer {
    fn on_call(&mut self, callee: &str, file: &str, pos: Pos, depth: usize) {
        self.events.borrow_mut().push(TraceEvent::Call {
            callee: callee.to_owned(),
            file: file.to_owned(),
            pos,
            depth,
        });
    }

    fn on_return(&mut self, depth: usize) {
        self.events.borrow_mut().push(TraceEvent::Return { depth });
    }

    fn on_external_call(&mut self, callee: &str, file: &str, pos: Pos) {
        self.events.borrow_mut().push(TraceEvent::ExternalCall {
            callee: callee.to_owned(),
            file: file.to_owned(),
            pos,
        });
    }

    fn on_symbolic(&mut self, type_name: Option<&str>, file: &str, pos: Pos) {
        self.events.borrow_mut().push(TraceEvent::Symbolic {
            type_name: type_name.map(str::to_owned),
            file: file.to_owned(),
            pos,
        });
    }

    fn on_package_loaded(&mut self, import_path: &str) {
        self.events.borrow_mut().push(TraceEvent::PackageLoaded {
            import_path: import_path.to_owned(),
        });
    }
}

/// Tracer that prints a human-readable execution log to stderr.
#[derive(Debug, Default)]
pub struct StderrTracer;

impl EvalTracer for StderrTracer {
    fn on_call(&mut self, callee: &str, file: &str, pos: Pos, depth: usize) {
        eprintln!("{:indent$}>>> {callee} ({file}:{pos})", "", indent = depth * 2);
    }

    fn on_return(&mut self, depth: usize) {
        eprintln!("{:indent$}<<<", "", indent = depth * 2);
    }

    fn on_external_call(&mut self, callee: &str, file: &str, pos: Pos) {
        eprintln!("  ext {callee} ({file}:{pos})");
    }

    fn on_symbolic(&mut self, type_name: Option<&str>, file: &str, pos: Pos) {
        eprintln!("  sym {} ({file}:{pos})", type_name.unwrap_or("?"));
    }

    fn on_package_loaded(&mut self, import_path: &str) {
        eprintln!("  pkg {import_path}");
    }
}
