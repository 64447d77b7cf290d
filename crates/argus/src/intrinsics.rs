//! Host-registered callables: regular intrinsics and special forms.
//!
//! Both maps key on fully-qualified names (`net/http.NewServeMux`,
//! `(*net/http.ServeMux).HandleFunc`). Regular intrinsics intercept after
//! argument evaluation; special forms intercept at the call site *before*
//! arguments evaluate and receive the raw argument syntax — that is what
//! lets code-generation DSLs treat function literals as data.
//!
//! Callbacks are stored as `Rc` closures and cloned out of the registry
//! before invocation, so a callback is free to re-enter the interpreter.

use std::{fmt, rc::Rc};

use ahash::AHashMap;

use argus_syntax::ast;

use crate::{
    bridge,
    env::Env,
    error::{ErrorKind, EvalError, EvalResult, Flow, Pos},
    interp::Interpreter,
    value::Value,
    HostValue,
};

/// Internal signature of a regular intrinsic.
pub(crate) type NativeFn = Rc<dyn Fn(&mut Interpreter, Vec<Value>, Pos) -> EvalResult<Value>>;

/// Internal signature of a special form: raw argument syntax plus the
/// call-site scope.
pub(crate) type SpecialFn = Rc<dyn Fn(&mut Interpreter, &[ast::Expr], &Env, Pos) -> EvalResult<Value>>;

/// A host callable carried as a value.
pub(crate) struct IntrinsicFn {
    pub name: String,
    pub f: NativeFn,
}

impl fmt::Debug for IntrinsicFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntrinsicFn").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Read-only view of the scope a special form fires in.
pub struct ScopeView<'a> {
    pub(crate) env: &'a Env,
}

impl ScopeView<'_> {
    /// Looks a name up through the lexical scope chain, converted to the
    /// host value shape.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<HostValue> {
        self.env.lookup(name).map(|v| bridge::value_to_host(&v))
    }
}

/// The two sibling maps of host-registered callables.
#[derive(Default)]
pub(crate) struct IntrinsicRegistry {
    intrinsics: AHashMap<String, NativeFn>,
    specials: AHashMap<String, SpecialFn>,
}

impl fmt::Debug for IntrinsicRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntrinsicRegistry")
            .field("intrinsics", &self.intrinsics.keys().collect::<Vec<_>>())
            .field("specials", &self.specials.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl IntrinsicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, fq_name: &str, f: NativeFn) {
        self.intrinsics.insert(fq_name.to_owned(), f);
    }

    pub fn register_special(&mut self, fq_name: &str, f: SpecialFn) {
        self.specials.insert(fq_name.to_owned(), f);
    }

    /// Clones the intrinsic for `fq_name` out, leaving the registry free
    /// for the callback to mutate.
    pub fn intrinsic(&self, fq_name: &str) -> Option<NativeFn> {
        self.intrinsics.get(fq_name).cloned()
    }

    pub fn special(&self, fq_name: &str) -> Option<SpecialFn> {
        self.specials.get(fq_name).cloned()
    }
}

/// Wraps a public host callback into the internal intrinsic shape: values
/// cross the bridge in both directions, and a `Err(String)` from the host
/// surfaces as a Foreign error at the call site.
pub(crate) fn wrap_host_callback(
    name: String,
    f: impl Fn(Vec<HostValue>) -> Result<HostValue, String> + 'static,
) -> NativeFn {
    Rc::new(move |interp: &mut Interpreter, args: Vec<Value>, pos: Pos| {
        let host_args: Vec<HostValue> = args.iter().map(bridge::value_to_host).collect();
        match f(host_args) {
            Ok(result) => Ok(bridge::host_to_value(&result)),
            Err(message) => Err(Flow::Err(interp.attach_stack(EvalError::new(
                ErrorKind::Foreign,
                format!("{name}: {message}"),
                interp.current_file(),
                pos,
            )))),
        }
    })
}
