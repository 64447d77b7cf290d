#![doc = include_str!("../../../README.md")]

mod bridge;
mod builtins;
mod env;
mod error;
mod eval;
mod interp;
mod intrinsics;
mod io;
mod methods;
mod packages;
mod resolver;
mod scanner;
mod scope;
mod tracer;
mod types;
mod value;

pub use crate::{
    bridge::{HostFunction, HostParam, HostValue},
    error::{ErrorKind, EvalError, Pos, StackFrame},
    interp::{Interpreter, DEFAULT_MAX_CALL_DEPTH},
    intrinsics::ScopeView,
    io::{CollectStringPrint, NoInput, NoPrint, PrintWriter, QueueInput, ReadInput, StdInput, StdPrint},
    scanner::SourceSet,
    tracer::{EvalTracer, NoopTracer, RecordingTracer, StderrTracer, TraceEvent},
};

pub use argus_syntax::{ast, parse_expr, parse_file, SyntaxError};
