//! Call evaluation: special forms, intrinsics, conversions, frames.
//!
//! Ordered evaluation at a call site: special forms intercept on the
//! *syntactic* callee name before anything evaluates; then the callee
//! expression evaluates; a callee that turns out to be a type descriptor
//! reinterprets the call as a conversion; otherwise arguments evaluate
//! left to right (with `...` spreading a slice) and dispatch happens on
//! the callee value, consulting the intrinsic registry by fully-qualified
//! name first.

use std::rc::Rc;

use argus_syntax::ast;

use crate::{
    error::{ErrorKind, EvalError, EvalResult, Flow, Pos},
    eval::EvalScope,
    interp::{Frame, Interpreter},
    types::TypeDescr,
    value::{ArrayValue, FuncValue, Value},
};

impl Interpreter {
    pub(crate) fn eval_call(&mut self, call: &ast::CallExpr, sc: &EvalScope) -> EvalResult<Value> {
        // Special forms fire before argument evaluation.
        for fq in self.syntactic_callee_names(&call.func, sc) {
            if let Some(special) = self.registry.special(&fq) {
                self.tracer.on_call(&fq, &sc.file, call.pos, self.frames.len());
                return special(self, &call.args, &sc.env, call.pos);
            }
        }

        let callee = self.eval_expr(&call.func, sc)?;

        // A type in callee position is a conversion.
        if let Value::Type(ty) = &callee {
            let ty = Rc::clone(ty);
            if call.args.len() != 1 {
                return Err(self.fail(
                    ErrorKind::Type,
                    format!("conversion to {} takes exactly one argument", ty.display_name()),
                    &sc.file,
                    call.pos,
                ));
            }
            let value = self.eval_expr(&call.args[0], sc)?;
            return self.convert_value(&ty, value, sc, call.pos);
        }

        let args = self.eval_call_args(&call.args, call.spread, sc)?;

        // Registered intrinsics intercept resolved callables.
        if let Some(fq) = callee_fq_name(&callee) {
            if let Some(native) = self.registry.intrinsic(&fq) {
                self.tracer.on_call(&fq, &sc.file, call.pos, self.frames.len());
                return native(self, args, call.pos);
            }
        }

        self.call_value(callee, args, sc, call.pos)
    }

    /// Fully-qualified names the *syntax* of a callee could refer to,
    /// for special-form interception before evaluation.
    fn syntactic_callee_names(&self, func: &ast::Expr, sc: &EvalScope) -> Vec<String> {
        match func.unparenthesized() {
            ast::Expr::Ident(ident) => {
                let mut names = Vec::with_capacity(2);
                if let Some(pkg) = &sc.pkg_path {
                    names.push(format!("{pkg}.{}", ident.name));
                }
                names.push(ident.name.clone());
                names
            }
            ast::Expr::Selector { base, sel } => match base.unparenthesized() {
                ast::Expr::Ident(pkg_ident) => {
                    let mut names = Vec::with_capacity(1);
                    if let Some(path) = sc.fs.as_ref().and_then(|fs| fs.alias_path(&pkg_ident.name)) {
                        names.push(format!("{path}.{}", sel.name));
                    }
                    names
                }
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// Evaluates call arguments left to right, spreading a trailing
    /// `...` slice and flattening a single multi-value call.
    fn eval_call_args(&mut self, args: &[ast::Expr], spread: bool, sc: &EvalScope) -> EvalResult<Vec<Value>> {
        let mut out = Vec::with_capacity(args.len());
        for (i, expr) in args.iter().enumerate() {
            let value = self.eval_expr(expr, sc)?;
            let last = i + 1 == args.len();
            if last && spread {
                match value {
                    Value::Array(arr) => {
                        out.extend(arr.borrow().elems.iter().cloned());
                        continue;
                    }
                    Value::Nil | Value::TypedNil(_) => continue,
                    other => {
                        return Err(self.fail(
                            ErrorKind::Type,
                            format!("cannot spread {} with ...", other.type_name()),
                            &sc.file,
                            expr.pos(),
                        ));
                    }
                }
            }
            if let Value::Tuple(values) = value {
                if args.len() == 1 {
                    out.extend(values);
                    continue;
                }
                return Err(self.fail(
                    ErrorKind::Type,
                    "multiple-value call in argument list",
                    &sc.file,
                    expr.pos(),
                ));
            }
            out.push(value);
        }
        Ok(out)
    }

    /// Dispatch on an evaluated callee.
    pub(crate) fn call_value(&mut self, callee: Value, args: Vec<Value>, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        match callee {
            Value::Func(func) => {
                let type_args = if func.sig.type_params.is_empty() {
                    Vec::new()
                } else {
                    self.infer_type_args(&func, &args, sc, pos)?
                };
                self.call_function(&func, None, args, type_args, sc, pos)
            }
            Value::BoundMethod(bound) => {
                let func = Rc::clone(&bound.func);
                let receiver = bound.receiver.clone();
                self.call_function(&func, Some(receiver), args, Vec::new(), sc, pos)
            }
            Value::Builtin(builtin) => {
                self.tracer.on_call(&builtin.to_string(), &sc.file, pos, self.frames.len());
                self.call_builtin(builtin, args, sc, pos)
            }
            Value::Intrinsic(intrinsic) => {
                let f = Rc::clone(&intrinsic.f);
                self.tracer.on_call(&intrinsic.name, &sc.file, pos, self.frames.len());
                f(self, args, pos)
            }
            Value::Type(ty) => {
                if args.len() != 1 {
                    return Err(self.fail(
                        ErrorKind::Type,
                        format!("conversion to {} takes exactly one argument", ty.display_name()),
                        &sc.file,
                        pos,
                    ));
                }
                let mut args = args;
                let value = args.pop().expect("checked length");
                self.convert_value(&ty, value, sc, pos)
            }
            Value::UnresolvedFunc(func) => {
                // Call into a shallow-scanned package: record and go
                // symbolic rather than fail.
                let fq = func.fq_name();
                self.tracer.on_external_call(&fq, &sc.file, pos);
                Ok(self.symbolic(None, sc, pos))
            }
            Value::SymbolicMethod(method) => {
                self.tracer.on_external_call(&method.fq, &sc.file, pos);
                match &method.results {
                    None => Ok(self.symbolic(None, sc, pos)),
                    Some(results) if results.is_empty() => Ok(Value::Nil),
                    Some(results) if results.len() == 1 => Ok(self.symbolic(Some(Rc::clone(&results[0])), sc, pos)),
                    Some(results) => {
                        let mut out = Vec::with_capacity(results.len());
                        for ty in results {
                            let sym = self.symbolic(Some(Rc::clone(ty)), sc, pos);
                            out.push(sym);
                        }
                        Ok(Value::Tuple(out))
                    }
                }
            }
            Value::Symbolic(_) => Ok(self.symbolic(None, sc, pos)),
            Value::Interface(iface) => self.call_value(iface.concrete, args, sc, pos),
            Value::Nil | Value::TypedNil(_) => Err(self.fail(
                ErrorKind::Runtime,
                "call of nil function",
                &sc.file,
                pos,
            )),
            other => Err(self.fail(
                ErrorKind::Type,
                format!("cannot call {}", other.type_name()),
                &sc.file,
                pos,
            )),
        }
    }

    /// Calls a source function: binds receiver, type arguments and
    /// parameters, executes the body, runs deferred calls in LIFO order,
    /// and materializes return values (named returns observe defer-side
    /// mutations).
    pub(crate) fn call_function(
        &mut self,
        func: &Rc<FuncValue>,
        receiver: Option<Value>,
        args: Vec<Value>,
        type_args: Vec<(String, Rc<TypeDescr>)>,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Value> {
        if self.frames.len() >= self.max_depth {
            return Err(self.fail(
                ErrorKind::Runtime,
                format!("call depth exceeded ({})", self.max_depth),
                &sc.file,
                pos,
            ));
        }

        let fq = func.fq_name();
        let fn_env = func.env.child();
        let fn_sc = EvalScope {
            env: fn_env.clone(),
            fs: func.file.clone(),
            file: func.file_name.clone(),
            pkg_path: func.pkg_path.clone(),
        };

        // A bodyless declaration is an external stub: record the call and
        // answer with placeholders shaped by the declared results.
        let Some(body) = &func.body else {
            self.tracer.on_external_call(&fq, &sc.file, pos);
            return self.symbolic_results_for_sig(&func.sig, &fn_sc, pos);
        };

        for (name, ty) in &type_args {
            let _ = fn_env.declare_type(name, Value::Type(Rc::clone(ty)));
        }
        for param in &func.sig.type_params {
            if !type_args.iter().any(|(name, _)| name == &param.name.name) {
                let _ = fn_env.declare_type(
                    &param.name.name,
                    Value::Type(Rc::new(TypeDescr::TypeParam(param.name.name.clone()))),
                );
            }
        }

        if let (Some(recv), Some(receiver)) = (&func.recv, receiver) {
            // Receiver type parameters bind from the instance's type
            // arguments.
            let struct_args = receiver_type_args(&receiver);
            for (param, arg) in recv.type_params.iter().zip(struct_args) {
                let _ = fn_env.declare_type(&param.name, Value::Type(arg));
            }
            if let Some(name) = &recv.name {
                let _ = fn_env.declare(&name.name, receiver, false);
            }
        }

        self.bind_params(func, args, &fn_sc, pos)?;

        let named_returns = if func.sig.has_named_results() {
            let mut names = Vec::with_capacity(func.sig.results.len());
            for result in &func.sig.results {
                if let Some(name) = &result.name {
                    let ty = self.resolve_type_expr(&result.ty, &fn_sc)?;
                    let zero = self.zero_value(&ty, &fn_sc, pos)?;
                    let _ = fn_env.declare(&name.name, zero, false);
                    names.push(name.name.clone());
                } else {
                    names.push(String::new());
                }
            }
            Some((fn_env.clone(), names))
        } else {
            None
        };

        self.frames.push(Frame {
            function: fq.clone(),
            file: func.file_name.clone(),
            pos,
            defers: Vec::new(),
            named_returns,
            panic: None,
            running_defer: false,
        });
        self.tracer.on_call(&fq, &sc.file, pos, self.frames.len());

        let body_result = self.exec_block(body, &fn_sc);

        let mut explicit: Option<Vec<Value>> = None;
        let mut fatal: Option<EvalError> = None;
        match body_result {
            Ok(()) => {}
            Err(Flow::Return(values)) => explicit = values,
            Err(Flow::Panic(panic)) => {
                if let Some(frame) = self.frames.last_mut() {
                    frame.panic = Some(panic);
                }
            }
            Err(Flow::Err(err)) => fatal = Some(err),
            Err(Flow::Break | Flow::Continue) => {
                fatal = Some(self.attach_stack(EvalError::new(
                    ErrorKind::ControlFlow,
                    "break or continue outside a loop",
                    func.file_name.clone(),
                    pos,
                )));
            }
        }

        // Explicit returns in a named-results function land in the named
        // variables first, so deferred mutations are honoured.
        if let Some(values) = explicit.take() {
            if let Some((env, names)) = self.frames.last().and_then(|f| f.named_returns.clone()) {
                if values.len() == names.len() {
                    for (name, value) in names.iter().zip(values) {
                        if !name.is_empty() {
                            let _ = env.assign(name, value.copy_for_assign());
                        }
                    }
                } else {
                    explicit = Some(values);
                }
            } else {
                explicit = Some(values);
            }
        }

        // Deferred calls, last registered first. A defer that panics
        // supersedes the active panic; recover inside a defer clears it.
        if let Some(frame) = self.frames.last_mut() {
            frame.running_defer = true;
        }
        loop {
            let Some(deferred) = self.frames.last_mut().and_then(|f| f.defers.pop()) else {
                break;
            };
            match self.eval_expr(&deferred.call, &deferred.scope) {
                Ok(_) => {}
                Err(Flow::Panic(panic)) => {
                    if let Some(frame) = self.frames.last_mut() {
                        frame.panic = Some(panic);
                    }
                }
                Err(Flow::Err(err)) => {
                    fatal = Some(err);
                    break;
                }
                Err(Flow::Return(_) | Flow::Break | Flow::Continue) => {
                    fatal = Some(self.attach_stack(EvalError::new(
                        ErrorKind::ControlFlow,
                        "invalid control flow escaping a deferred call",
                        func.file_name.clone(),
                        deferred.pos,
                    )));
                    break;
                }
            }
        }

        let frame = self.frames.pop().expect("frame pushed above");
        self.tracer.on_return(self.frames.len());

        if let Some(err) = fatal {
            return Err(Flow::Err(err));
        }
        if let Some(panic) = frame.panic {
            return Err(Flow::Panic(panic));
        }

        // Collect results: named returns from their environment (defers
        // may have written them), otherwise explicit values, otherwise
        // zero values of the declared results.
        let values: Vec<Value> = if let Some((env, names)) = frame.named_returns {
            names
                .iter()
                .map(|name| {
                    if name.is_empty() {
                        Value::Nil
                    } else {
                        env.lookup(name).unwrap_or(Value::Nil)
                    }
                })
                .collect()
        } else if let Some(values) = explicit {
            values
        } else {
            let mut zeros = Vec::with_capacity(func.sig.results.len());
            for result in &func.sig.results {
                let ty = self.resolve_type_expr(&result.ty, &fn_sc)?;
                zeros.push(self.zero_value(&ty, &fn_sc, pos)?);
            }
            zeros
        };

        Ok(wrap_results(values))
    }

    fn bind_params(&mut self, func: &Rc<FuncValue>, mut args: Vec<Value>, fn_sc: &EvalScope, pos: Pos) -> EvalResult<()> {
        let params = &func.sig.params;
        let fixed = if func.sig.variadic { params.len() - 1 } else { params.len() };

        if func.sig.variadic {
            if args.len() < fixed {
                return Err(self.fail(
                    ErrorKind::Type,
                    format!(
                        "wrong number of arguments to {}: want at least {fixed}, got {}",
                        func.fq_name(),
                        args.len()
                    ),
                    &fn_sc.file,
                    pos,
                ));
            }
        } else if args.len() != params.len() {
            return Err(self.fail(
                ErrorKind::Type,
                format!(
                    "wrong number of arguments to {}: want {}, got {}",
                    func.fq_name(),
                    params.len(),
                    args.len()
                ),
                &fn_sc.file,
                pos,
            ));
        }

        let rest = args.split_off(fixed);
        for (param, value) in params.iter().take(fixed).zip(args) {
            if let Some(name) = &param.name {
                let _ = fn_sc.env.declare(&name.name, value.copy_for_assign(), false);
            }
        }
        if func.sig.variadic {
            let last = params.last().expect("variadic signature has a parameter");
            if let Some(name) = &last.name {
                let elem_ty = self.resolve_type_expr(&last.ty, fn_sc).ok();
                let collected = Value::Array(Rc::new(std::cell::RefCell::new(ArrayValue {
                    elem_ty,
                    elems: rest.into_iter().map(|v| v.copy_for_assign()).collect(),
                })));
                let _ = fn_sc.env.declare(&name.name, collected, false);
            }
        }
        Ok(())
    }

    /// Placeholder results shaped by a signature, for external stubs.
    fn symbolic_results_for_sig(&mut self, sig: &ast::FuncSig, fn_sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        if sig.results.is_empty() {
            return Ok(Value::Nil);
        }
        let mut out = Vec::with_capacity(sig.results.len());
        for result in &sig.results {
            let ty = self.resolve_type_expr(&result.ty, fn_sc).ok();
            let sym = self.symbolic(ty, fn_sc, pos);
            out.push(sym);
        }
        Ok(wrap_results(out))
    }

    /// Type conversion: `T(x)`.
    pub(crate) fn convert_value(&mut self, ty: &Rc<TypeDescr>, value: Value, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        if matches!(value, Value::Symbolic(_)) {
            return Ok(self.symbolic(Some(Rc::clone(ty)), sc, pos));
        }
        if value.is_nil() {
            return Ok(Value::TypedNil(Rc::clone(ty)));
        }
        let shape = self.underlying(ty, sc, pos)?;
        match &*shape {
            TypeDescr::Builtin(name) => self.convert_to_builtin(name, value, ty, sc, pos),
            TypeDescr::Array(elem) => {
                let elem_name = elem.as_ref().map(|e| e.display_name());
                match (&value, elem_name.as_deref()) {
                    // string <-> byte/rune slice adjacency.
                    (Value::Str(s), Some("byte" | "uint8")) => Ok(Value::Array(Rc::new(std::cell::RefCell::new(
                        ArrayValue {
                            elem_ty: elem.clone(),
                            elems: s.bytes().map(|b| Value::Int(i64::from(b))).collect(),
                        },
                    )))),
                    (Value::Str(s), Some("rune" | "int32")) => Ok(Value::Array(Rc::new(std::cell::RefCell::new(
                        ArrayValue {
                            elem_ty: elem.clone(),
                            elems: s.chars().map(|c| Value::Int(i64::from(u32::from(c)))).collect(),
                        },
                    )))),
                    (Value::Array(_), _) => Ok(value),
                    _ => Err(self.conversion_error(ty, &value, sc, pos)),
                }
            }
            TypeDescr::Interface(def) => {
                let def = Rc::clone(def);
                if !self.check_implements(&value, &def, sc, pos)? {
                    return Err(self.fail(
                        ErrorKind::Type,
                        format!("{} does not implement {}", value.type_name(), ty.display_name()),
                        &sc.file,
                        pos,
                    ));
                }
                Ok(Value::Interface(Box::new(crate::value::InterfaceValue {
                    def,
                    concrete: value,
                })))
            }
            TypeDescr::Unresolved { .. } => Ok(self.symbolic(Some(Rc::clone(ty)), sc, pos)),
            // Struct, pointer, map, chan, func conversions keep the
            // representation; named types retag without changing it.
            _ => Ok(value),
        }
    }

    fn convert_to_builtin(
        &mut self,
        name: &str,
        value: Value,
        ty: &Rc<TypeDescr>,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Value> {
        match name {
            "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint8" | "uint16" | "uint32" | "uint64"
            | "uintptr" | "byte" | "rune" => match value {
                // Width conversions pass the 64-bit representation
                // through unchanged.
                Value::Int(v) => Ok(Value::Int(v)),
                Value::Float(v) => Ok(Value::Int(v as i64)),
                other => Err(self.conversion_error(ty, &other, sc, pos)),
            },
            "float32" | "float64" => match value {
                Value::Int(v) => Ok(Value::Float(v as f64)),
                Value::Float(v) => Ok(Value::Float(v)),
                other => Err(self.conversion_error(ty, &other, sc, pos)),
            },
            "string" => match &value {
                Value::Str(_) => Ok(value),
                Value::Int(v) => {
                    let ch = u32::try_from(*v).ok().and_then(char::from_u32).unwrap_or('\u{FFFD}');
                    Ok(Value::str(ch.to_string()))
                }
                Value::Array(arr) => {
                    let arr = arr.borrow();
                    let mut out = String::with_capacity(arr.elems.len());
                    for elem in &arr.elems {
                        match elem {
                            Value::Int(v) => {
                                let ch = u32::try_from(*v).ok().and_then(char::from_u32).unwrap_or('\u{FFFD}');
                                out.push(ch);
                            }
                            other => return Err(self.conversion_error(ty, other, sc, pos)),
                        }
                    }
                    Ok(Value::str(out))
                }
                other => Err(self.conversion_error(ty, other, sc, pos)),
            },
            "bool" => match value {
                Value::Bool(_) => Ok(value),
                other => Err(self.conversion_error(ty, &other, sc, pos)),
            },
            "any" | "error" | "comparable" => Ok(value),
            "complex64" | "complex128" => Ok(self.symbolic(Some(Rc::clone(ty)), sc, pos)),
            _ => Ok(value),
        }
    }

    fn conversion_error(&self, ty: &Rc<TypeDescr>, value: &Value, sc: &EvalScope, pos: Pos) -> Flow {
        self.fail(
            ErrorKind::Type,
            format!("cannot convert {} to {}", value.type_name(), ty.display_name()),
            &sc.file,
            pos,
        )
    }
}

/// The fully qualified name a callee value answers to in the intrinsic
/// registry.
fn callee_fq_name(callee: &Value) -> Option<String> {
    match callee {
        Value::Func(func) => Some(func.fq_name()),
        Value::BoundMethod(bound) => Some(bound.func.fq_name()),
        Value::UnresolvedFunc(func) => Some(func.fq_name()),
        Value::SymbolicMethod(method) => Some(method.fq.clone()),
        _ => None,
    }
}

/// The receiver's instantiation arguments, through pointers.
fn receiver_type_args(receiver: &Value) -> Vec<Rc<TypeDescr>> {
    match receiver {
        Value::Struct(sv) => sv.borrow().type_args.clone(),
        Value::Pointer(ptr) => {
            let pointee = ptr.target.borrow();
            match &*pointee {
                Value::Struct(sv) => sv.borrow().type_args.clone(),
                _ => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

/// Zero results collapse to nil, one result stays bare, several ride a
/// tuple.
fn wrap_results(mut values: Vec<Value>) -> Value {
    match values.len() {
        0 => Value::Nil,
        1 => values.pop().expect("checked length"),
        _ => Value::Tuple(values),
    }
}
