//! The tree-walking evaluator: statements and control flow.
//!
//! Expressions live in [`expr`], calls and frames in [`call`], generic
//! inference in [`generics`]. Everything walks the same resolved syntax
//! with an [`EvalScope`] carrying the lexical environment, the file's
//! import scope, the file name for positions, and the owning package path.

pub(crate) mod call;
pub(crate) mod expr;
pub(crate) mod generics;

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use argus_syntax::ast;

use crate::{
    env::Env,
    error::{ErrorKind, EvalResult, Flow, Pos},
    interp::{DeferredCall, Interpreter},
    intrinsics::IntrinsicFn,
    scope::FileScope,
    types::TypeDescr,
    value::{value_eq, Value},
};

/// Everything lexical about the current evaluation point.
#[derive(Debug, Clone)]
pub(crate) struct EvalScope {
    pub env: Env,
    pub fs: Option<Rc<FileScope>>,
    pub file: String,
    pub pkg_path: Option<String>,
}

impl EvalScope {
    /// A child scope: fresh block environment, same file.
    pub fn child(&self) -> Self {
        Self {
            env: self.env.child(),
            fs: self.fs.clone(),
            file: self.file.clone(),
            pkg_path: self.pkg_path.clone(),
        }
    }

    /// The same file context over a specific environment.
    pub fn with_env(&self, env: Env) -> Self {
        Self {
            env,
            fs: self.fs.clone(),
            file: self.file.clone(),
            pkg_path: self.pkg_path.clone(),
        }
    }
}

impl Interpreter {
    /// Executes a block in a fresh child scope.
    pub(crate) fn exec_block(&mut self, block: &ast::Block, sc: &EvalScope) -> EvalResult<()> {
        let block_sc = sc.child();
        for stmt in &block.stmts {
            self.exec_stmt(stmt, &block_sc)?;
        }
        Ok(())
    }

    pub(crate) fn exec_stmt(&mut self, stmt: &ast::Stmt, sc: &EvalScope) -> EvalResult<()> {
        match stmt {
            ast::Stmt::Empty { .. } => Ok(()),
            ast::Stmt::Expr(expr) => {
                self.eval_expr(expr, sc)?;
                Ok(())
            }
            ast::Stmt::Decl(decl) => self.exec_decl(decl, sc),
            ast::Stmt::Assign { lhs, op, rhs, pos } => self.exec_assign(lhs, *op, rhs, sc, *pos),
            ast::Stmt::IncDec { target, inc, pos } => self.exec_inc_dec(target, *inc, sc, *pos),
            ast::Stmt::Return { results, pos } => self.exec_return(results, sc, *pos),
            ast::Stmt::If(stmt) => self.exec_if(stmt, sc),
            ast::Stmt::For(stmt) => self.exec_for(stmt, sc),
            ast::Stmt::Range(stmt) => self.exec_range(stmt, sc),
            ast::Stmt::Switch(stmt) => self.exec_switch(stmt, sc),
            ast::Stmt::TypeSwitch(stmt) => self.exec_type_switch(stmt, sc),
            ast::Stmt::Block(block) => self.exec_block(block, sc),
            ast::Stmt::Defer { call, pos } => self.exec_defer(call, sc, *pos),
            ast::Stmt::Go { call, pos } => {
                // No runtime concurrency: the spawned call evaluates
                // synchronously so it still lands in the trace.
                if !matches!(call.unparenthesized(), ast::Expr::Call(_)) {
                    return Err(self.fail(ErrorKind::ControlFlow, "go requires a function call", &sc.file, *pos));
                }
                self.eval_expr(call, sc)?;
                Ok(())
            }
            ast::Stmt::Break { label: None, .. } => Err(Flow::Break),
            ast::Stmt::Continue { label: None, .. } => Err(Flow::Continue),
            ast::Stmt::Break { label: Some(label), pos } | ast::Stmt::Continue { label: Some(label), pos } => {
                Err(self.fail(
                    ErrorKind::ControlFlow,
                    format!("labeled break/continue is not supported: {}", label.name),
                    &sc.file,
                    *pos,
                ))
            }
            ast::Stmt::Labeled { label, pos, .. } => Err(self.fail(
                ErrorKind::ControlFlow,
                format!("labeled statements are not supported: {}", label.name),
                &sc.file,
                *pos,
            )),
            ast::Stmt::Fallthrough { pos } => Err(self.fail(
                ErrorKind::ControlFlow,
                "fallthrough outside switch",
                &sc.file,
                *pos,
            )),
            ast::Stmt::Send { chan, value, pos } => {
                // Channels are out of scope for execution; operands still
                // evaluate left to right for their effects.
                self.eval_expr(chan, sc)?;
                self.eval_expr(value, sc)?;
                let _ = pos;
                Ok(())
            }
        }
    }

    fn exec_decl(&mut self, decl: &ast::Decl, sc: &EvalScope) -> EvalResult<()> {
        match decl {
            ast::Decl::Var(group) => self.exec_var_group(group, sc, false),
            ast::Decl::Const(group) => self.exec_var_group(group, sc, true),
            ast::Decl::Type(specs) => self.declare_type_specs(specs, sc),
            ast::Decl::Func(func) => Err(self.fail(
                ErrorKind::ControlFlow,
                "function declarations are only valid at package level",
                &sc.file,
                func.pos,
            )),
        }
    }

    /// Executes one `var`/`const` group, with `iota` bound to the spec
    /// index in const groups and value-less const specs repeating the
    /// previous expressions.
    pub(crate) fn exec_var_group(&mut self, group: &ast::VarGroup, sc: &EvalScope, constant: bool) -> EvalResult<()> {
        let mut carried: Vec<ast::Expr> = Vec::new();
        for (spec_idx, spec) in group.specs.iter().enumerate() {
            let exprs: Vec<ast::Expr> = if constant && spec.values.is_empty() && !carried.is_empty() {
                carried.clone()
            } else {
                spec.values.clone()
            };
            if constant && !spec.values.is_empty() {
                carried = spec.values.clone();
            }

            let declared_ty = match &spec.ty {
                Some(ty_expr) => Some(self.resolve_type_expr(ty_expr, sc)?),
                None => None,
            };

            let values: Vec<Value> = if exprs.is_empty() {
                let Some(ty) = &declared_ty else {
                    return Err(self.fail(
                        ErrorKind::Type,
                        "declaration needs a type or an initializer",
                        &sc.file,
                        spec.pos,
                    ));
                };
                let mut out = Vec::with_capacity(spec.names.len());
                for _ in &spec.names {
                    out.push(self.zero_value(ty, sc, spec.pos)?);
                }
                out
            } else {
                let eval_sc = if constant {
                    let iota_sc = sc.with_env(sc.env.child());
                    let _ = iota_sc.env.declare("iota", Value::Int(spec_idx as i64), true);
                    iota_sc
                } else {
                    sc.clone()
                };
                self.eval_rhs_values(&exprs, spec.names.len(), &eval_sc, spec.pos)?
            };

            if values.len() != spec.names.len() {
                return Err(self.fail(
                    ErrorKind::Type,
                    format!(
                        "assignment mismatch: {} names but {} values",
                        spec.names.len(),
                        values.len()
                    ),
                    &sc.file,
                    spec.pos,
                ));
            }

            for (name, value) in spec.names.iter().zip(values) {
                let value = match &declared_ty {
                    Some(ty) => self.coerce_to_type(value, ty, sc, spec.pos)?,
                    None => value,
                };
                sc.env
                    .declare(&name.name, value.copy_for_assign(), constant)
                    .map_err(|msg| self.fail(ErrorKind::Resolution, msg, &sc.file, name.pos))?;
            }
        }
        Ok(())
    }

    /// Applies a declared type to an initializer: nil picks up the type,
    /// interface types check satisfaction and box the value.
    pub(crate) fn coerce_to_type(
        &mut self,
        value: Value,
        ty: &Rc<TypeDescr>,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Value> {
        if matches!(value, Value::Nil) {
            return Ok(Value::TypedNil(Rc::clone(ty)));
        }
        let shape = self.underlying(ty, sc, pos)?;
        if let TypeDescr::Interface(def) = &*shape {
            let def = Rc::clone(def);
            if matches!(value, Value::Interface(_)) {
                return Ok(value);
            }
            if !self.check_implements(&value, &def, sc, pos)? {
                return Err(self.fail(
                    ErrorKind::Type,
                    format!(
                        "{} does not implement {}",
                        value.type_name(),
                        ty.display_name()
                    ),
                    &sc.file,
                    pos,
                ));
            }
            return Ok(Value::Interface(Box::new(crate::value::InterfaceValue {
                def,
                concrete: value,
            })));
        }
        Ok(value)
    }

    fn exec_assign(
        &mut self,
        lhs: &[ast::Expr],
        op: ast::AssignOp,
        rhs: &[ast::Expr],
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<()> {
        if let Some(binary) = op.binary_op() {
            // Compound assignment: single target, read-modify-write.
            let (Some(target), Some(value_expr)) = (lhs.first(), rhs.first()) else {
                return Err(self.fail(ErrorKind::Type, "invalid compound assignment", &sc.file, pos));
            };
            let current = self.eval_expr(target, sc)?;
            let operand = self.eval_expr(value_expr, sc)?;
            let result = self.apply_binary(binary, current, operand, sc, pos)?;
            return self.assign_to(target, result, sc, pos);
        }

        let values = self.eval_rhs_values(rhs, lhs.len(), sc, pos)?;
        if values.len() != lhs.len() {
            return Err(self.fail(
                ErrorKind::Type,
                format!("assignment mismatch: {} targets but {} values", lhs.len(), values.len()),
                &sc.file,
                pos,
            ));
        }

        if op == ast::AssignOp::Define {
            // `:=` declares new names; a name already declared in this
            // exact scope is assigned instead.
            for (target, value) in lhs.iter().zip(values) {
                let ast::Expr::Ident(ident) = target.unparenthesized() else {
                    return Err(self.fail(
                        ErrorKind::Type,
                        "non-name on left side of :=",
                        &sc.file,
                        target.pos(),
                    ));
                };
                sc.env.redeclare(&ident.name, value.copy_for_assign());
            }
            return Ok(());
        }

        // Parallel assignment: all values were computed before any write.
        for (target, value) in lhs.iter().zip(values) {
            self.assign_to(target, value, sc, pos)?;
        }
        Ok(())
    }

    /// Evaluates the right-hand side of an assignment or declaration,
    /// expanding the one-expression multi-value forms (calls, map index
    /// with ok, type assertion with ok).
    pub(crate) fn eval_rhs_values(
        &mut self,
        rhs: &[ast::Expr],
        want: usize,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Vec<Value>> {
        if rhs.len() == 1 && want > 1 {
            let expr = rhs[0].unparenthesized();
            match expr {
                ast::Expr::Index { base, indices, pos } if indices.len() == 1 => {
                    let base_value = self.eval_expr(base, sc)?;
                    if let Value::Map(map) = &base_value {
                        let map = Rc::clone(map);
                        let key = self.eval_expr(&indices[0], sc)?;
                        let (value, ok) = self.map_lookup(&map, &key, sc, *pos)?;
                        return Ok(vec![value, Value::Bool(ok)]);
                    }
                    // Fall through to single-value evaluation below.
                }
                ast::Expr::TypeAssert { base, ty: Some(ty), pos } => {
                    let value = self.eval_expr(base, sc)?;
                    let ty = self.resolve_type_expr(ty, sc)?;
                    let (value, ok) = self.try_type_assert(value, &ty, sc, *pos)?;
                    return Ok(vec![value, Value::Bool(ok)]);
                }
                _ => {}
            }
            let value = self.eval_expr(&rhs[0], sc)?;
            return Ok(match value {
                Value::Tuple(values) => values,
                Value::Symbolic(_) => {
                    let mut out = Vec::with_capacity(want);
                    for _ in 0..want {
                        out.push(self.symbolic(None, sc, pos));
                    }
                    out
                }
                single => vec![single],
            });
        }

        let mut values = Vec::with_capacity(rhs.len());
        for expr in rhs {
            let value = self.eval_expr(expr, sc)?;
            if let Value::Tuple(_) = value {
                if rhs.len() > 1 {
                    return Err(self.fail(
                        ErrorKind::Type,
                        "multiple-value call in single-value context",
                        &sc.file,
                        expr.pos(),
                    ));
                }
                if let Value::Tuple(inner) = value {
                    return Ok(inner);
                }
                unreachable!("matched tuple above");
            }
            values.push(value);
        }
        Ok(values)
    }

    /// Writes `value` through an lvalue expression.
    pub(crate) fn assign_to(&mut self, target: &ast::Expr, value: Value, sc: &EvalScope, pos: Pos) -> EvalResult<()> {
        match target.unparenthesized() {
            ast::Expr::Ident(ident) => {
                if ident.is_blank() {
                    return Ok(());
                }
                match sc.env.assign(&ident.name, value.copy_for_assign()) {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(self.fail(
                        ErrorKind::Resolution,
                        format!("undefined: {}", ident.name),
                        &sc.file,
                        ident.pos,
                    )),
                    Err(msg) => Err(self.fail(ErrorKind::Type, msg, &sc.file, ident.pos)),
                }
            }
            ast::Expr::Unary {
                op: ast::UnaryOp::Deref,
                operand,
                ..
            } => {
                let pointer = self.eval_expr(operand, sc)?;
                match pointer {
                    Value::Pointer(ptr) => {
                        *ptr.target.borrow_mut() = value.copy_for_assign();
                        Ok(())
                    }
                    Value::TypedNil(_) | Value::Nil => Err(self.fail(
                        ErrorKind::Type,
                        "assignment through nil pointer",
                        &sc.file,
                        pos,
                    )),
                    Value::Symbolic(_) => Ok(()),
                    other => Err(self.fail(
                        ErrorKind::Type,
                        format!("cannot assign through {}", other.type_name()),
                        &sc.file,
                        pos,
                    )),
                }
            }
            ast::Expr::Selector { base, sel } => {
                let base_value = self.eval_expr(base, sc)?;
                self.assign_selector(base_value, &sel.name, value, sc, sel.pos)
            }
            ast::Expr::Index { base, indices, pos } if indices.len() == 1 => {
                let base_value = self.eval_expr(base, sc)?;
                let index = self.eval_expr(&indices[0], sc)?;
                self.assign_index(base_value, index, value, sc, *pos)
            }
            other => Err(self.fail(
                ErrorKind::Type,
                "expression is not assignable",
                &sc.file,
                other.pos(),
            )),
        }
    }

    fn assign_selector(&mut self, base: Value, name: &str, value: Value, sc: &EvalScope, pos: Pos) -> EvalResult<()> {
        match base {
            Value::Struct(sv) => {
                if self.set_struct_field(&sv, name, value, sc, pos)? {
                    Ok(())
                } else {
                    Err(self.fail(
                        ErrorKind::Resolution,
                        format!("undefined field {name}"),
                        &sc.file,
                        pos,
                    ))
                }
            }
            Value::Pointer(ptr) => {
                let pointee = ptr.target.borrow().clone();
                self.assign_selector(pointee, name, value, sc, pos)
            }
            Value::Interface(iface) => self.assign_selector(iface.concrete, name, value, sc, pos),
            Value::Package(pkg) => {
                match pkg.env.assign(name, value.copy_for_assign()) {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(self.fail(
                        ErrorKind::Resolution,
                        format!("undefined: {}.{name}", pkg.import_path),
                        &sc.file,
                        pos,
                    )),
                    Err(msg) => Err(self.fail(ErrorKind::Type, msg, &sc.file, pos)),
                }
            }
            Value::Symbolic(_) => Ok(()),
            Value::TypedNil(_) | Value::Nil => Err(self.fail(
                ErrorKind::Type,
                format!("field {name} assignment through nil"),
                &sc.file,
                pos,
            )),
            other => Err(self.fail(
                ErrorKind::Type,
                format!("cannot assign field {name} on {}", other.type_name()),
                &sc.file,
                pos,
            )),
        }
    }

    fn assign_index(&mut self, base: Value, index: Value, value: Value, sc: &EvalScope, pos: Pos) -> EvalResult<()> {
        match base {
            Value::Array(arr) => {
                let len = arr.borrow().elems.len();
                let Value::Int(i) = index else {
                    return Err(self.fail(ErrorKind::Type, "array index must be an integer", &sc.file, pos));
                };
                if i < 0 || (i as usize) >= len {
                    return Err(self.fail(
                        ErrorKind::Runtime,
                        format!("index out of range [{i}] with length {len}"),
                        &sc.file,
                        pos,
                    ));
                }
                arr.borrow_mut().elems[i as usize] = value.copy_for_assign();
                Ok(())
            }
            Value::Map(map) => {
                let Some(hash) = index.hash_key() else {
                    return Err(self.fail(
                        ErrorKind::Type,
                        format!("map key of type {} is not hashable", index.type_name()),
                        &sc.file,
                        pos,
                    ));
                };
                map.borrow_mut().entries.insert(hash, (index, value.copy_for_assign()));
                Ok(())
            }
            Value::Pointer(ptr) => {
                let pointee = ptr.target.borrow().clone();
                self.assign_index(pointee, index, value, sc, pos)
            }
            Value::TypedNil(ty) if matches!(&*ty, TypeDescr::Map(..)) => Err(self.fail(
                ErrorKind::Runtime,
                "assignment to entry in nil map",
                &sc.file,
                pos,
            )),
            Value::Symbolic(_) => Ok(()),
            other => Err(self.fail(
                ErrorKind::Type,
                format!("cannot index-assign {}", other.type_name()),
                &sc.file,
                pos,
            )),
        }
    }

    fn exec_inc_dec(&mut self, target: &ast::Expr, inc: bool, sc: &EvalScope, pos: Pos) -> EvalResult<()> {
        let current = self.eval_expr(target, sc)?;
        let next = match current {
            Value::Int(v) => Value::Int(if inc { v + 1 } else { v - 1 }),
            Value::Float(v) => Value::Float(if inc { v + 1.0 } else { v - 1.0 }),
            // Symbolic propagation: ++ and -- on a placeholder stay
            // symbolic.
            Value::Symbolic(_) => self.symbolic(current.type_descr(), sc, pos),
            other => {
                return Err(self.fail(
                    ErrorKind::Type,
                    format!("invalid operation: {} on {}", if inc { "++" } else { "--" }, other.type_name()),
                    &sc.file,
                    pos,
                ));
            }
        };
        self.assign_to(target, next, sc, pos)
    }

    fn exec_return(&mut self, results: &[ast::Expr], sc: &EvalScope, pos: Pos) -> EvalResult<()> {
        if self.frames.is_empty() {
            return Err(self.fail(ErrorKind::ControlFlow, "return outside a function", &sc.file, pos));
        }
        let has_named = self.frames.last().is_some_and(|f| f.named_returns.is_some());
        if results.is_empty() {
            if has_named {
                return Err(Flow::Return(None));
            }
            return Err(Flow::Return(Some(Vec::new())));
        }
        let mut values = Vec::with_capacity(results.len());
        for expr in results {
            let value = self.eval_expr(expr, sc)?;
            if results.len() == 1 {
                if let Value::Tuple(inner) = value {
                    return Err(Flow::Return(Some(inner)));
                }
            }
            values.push(value);
        }
        Err(Flow::Return(Some(values)))
    }

    fn exec_if(&mut self, stmt: &ast::IfStmt, sc: &EvalScope) -> EvalResult<()> {
        let head_sc = sc.child();
        if let Some(init) = &stmt.init {
            self.exec_stmt(init, &head_sc)?;
        }
        let cond = self.eval_expr(&stmt.cond, &head_sc)?;
        let truthy = cond
            .truthy()
            .map_err(|msg| self.fail(ErrorKind::Type, msg, &sc.file, stmt.cond.pos()))?;
        if truthy {
            self.exec_block(&stmt.then, &head_sc)
        } else if let Some(else_branch) = &stmt.else_branch {
            self.exec_stmt(else_branch, &head_sc)
        } else {
            Ok(())
        }
    }

    fn exec_for(&mut self, stmt: &ast::ForStmt, sc: &EvalScope) -> EvalResult<()> {
        let loop_sc = sc.child();
        if let Some(init) = &stmt.init {
            self.exec_stmt(init, &loop_sc)?;
        }
        // Names declared by a `:=` in the init clause get a fresh
        // per-iteration copy in the body scope, so closures created in the
        // body capture per-iteration state.
        let per_iter: Vec<String> = match &stmt.init {
            Some(ast::Stmt::Assign {
                op: ast::AssignOp::Define,
                lhs,
                ..
            }) => lhs
                .iter()
                .filter_map(|e| match e.unparenthesized() {
                    ast::Expr::Ident(ident) if !ident.is_blank() => Some(ident.name.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        loop {
            if let Some(cond) = &stmt.cond {
                let value = self.eval_expr(cond, &loop_sc)?;
                let truthy = value
                    .truthy()
                    .map_err(|msg| self.fail(ErrorKind::Type, msg, &sc.file, cond.pos()))?;
                if !truthy {
                    break;
                }
            }

            let iter_sc = loop_sc.child();
            for name in &per_iter {
                if let Some(value) = loop_sc.env.lookup(name) {
                    let _ = iter_sc.env.declare(name, value, false);
                }
            }
            let result = self.exec_block(&stmt.body, &iter_sc);
            // Copy per-iteration state back so the post clause and the
            // next condition observe body mutations.
            for name in &per_iter {
                if let Some(value) = iter_sc.env.lookup(name) {
                    let _ = loop_sc.env.assign(name, value);
                }
            }
            match result {
                Ok(()) | Err(Flow::Continue) => {}
                Err(Flow::Break) => break,
                Err(flow) => return Err(flow),
            }

            if let Some(post) = &stmt.post {
                self.exec_stmt(post, &loop_sc)?;
            }
        }
        Ok(())
    }

    fn exec_range(&mut self, stmt: &ast::RangeStmt, sc: &EvalScope) -> EvalResult<()> {
        let subject = self.eval_expr(&stmt.subject, sc)?;
        match subject {
            Value::Int(n) => {
                for i in 0..n.max(0) {
                    match self.run_range_body(stmt, Some(Value::Int(i)), None, sc) {
                        Ok(()) | Err(Flow::Continue) => {}
                        Err(Flow::Break) => break,
                        Err(flow) => return Err(flow),
                    }
                }
                Ok(())
            }
            Value::Str(s) => {
                for (i, ch) in s.char_indices() {
                    let key = Value::Int(i as i64);
                    let value = Value::Int(i64::from(u32::from(ch)));
                    match self.run_range_body(stmt, Some(key), Some(value), sc) {
                        Ok(()) | Err(Flow::Continue) => {}
                        Err(Flow::Break) => break,
                        Err(flow) => return Err(flow),
                    }
                }
                Ok(())
            }
            Value::Array(arr) => {
                let elems = arr.borrow().elems.clone();
                for (i, elem) in elems.into_iter().enumerate() {
                    match self.run_range_body(stmt, Some(Value::Int(i as i64)), Some(elem), sc) {
                        Ok(()) | Err(Flow::Continue) => {}
                        Err(Flow::Break) => break,
                        Err(flow) => return Err(flow),
                    }
                }
                Ok(())
            }
            Value::Map(map) => {
                let entries: Vec<(Value, Value)> = map.borrow().entries.values().cloned().collect();
                for (key, value) in entries {
                    match self.run_range_body(stmt, Some(key), Some(value), sc) {
                        Ok(()) | Err(Flow::Continue) => {}
                        Err(Flow::Break) => break,
                        Err(flow) => return Err(flow),
                    }
                }
                Ok(())
            }
            callable @ (Value::Func(_) | Value::BoundMethod(_)) => self.exec_range_over_func(stmt, callable, sc),
            Value::Nil | Value::TypedNil(_) => Ok(()),
            Value::Symbolic(_) => Ok(()),
            other => Err(self.fail(
                ErrorKind::Type,
                format!("cannot range over {}", other.type_name()),
                &sc.file,
                stmt.subject.pos(),
            )),
        }
    }

    /// One iteration of a data-driven range: bind the loop variables,
    /// run the body.
    fn run_range_body(
        &mut self,
        stmt: &ast::RangeStmt,
        key: Option<Value>,
        value: Option<Value>,
        sc: &EvalScope,
    ) -> EvalResult<()> {
        let iter_sc = sc.child();
        self.bind_range_vars(stmt, key, value, &iter_sc)?;
        self.exec_block(&stmt.body, &iter_sc)
    }

    fn bind_range_vars(
        &mut self,
        stmt: &ast::RangeStmt,
        key: Option<Value>,
        value: Option<Value>,
        iter_sc: &EvalScope,
    ) -> EvalResult<()> {
        let pairs = [(&stmt.key, key), (&stmt.value, value)];
        for (target, bound) in pairs {
            let (Some(target), Some(bound)) = (target, bound) else {
                continue;
            };
            if stmt.define {
                let ast::Expr::Ident(ident) = target.unparenthesized() else {
                    return Err(self.fail(
                        ErrorKind::Type,
                        "non-name on left side of := in range",
                        &iter_sc.file,
                        target.pos(),
                    ));
                };
                let _ = iter_sc.env.declare(&ident.name, bound.copy_for_assign(), false);
            } else {
                self.assign_to(target, bound, iter_sc, target.pos())?;
            }
        }
        Ok(())
    }

    /// Range over a yield-callback function: synthesize a yield intrinsic
    /// that runs the body, then call the subject with it. `break` in the
    /// body makes yield return false; `return`, panics and errors are
    /// stashed and re-raised once the subject returns.
    fn exec_range_over_func(&mut self, stmt: &ast::RangeStmt, callable: Value, sc: &EvalScope) -> EvalResult<()> {
        let pending: Rc<RefCell<Option<Flow>>> = Rc::new(RefCell::new(None));
        let stopped = Rc::new(Cell::new(false));

        let body_stmt = stmt.clone();
        let body_sc = sc.clone();
        let pending_in = Rc::clone(&pending);
        let stopped_in = Rc::clone(&stopped);
        let yield_fn = Value::Intrinsic(Rc::new(IntrinsicFn {
            name: "yield".to_owned(),
            f: Rc::new(move |interp: &mut Interpreter, args: Vec<Value>, _pos: Pos| {
                if stopped_in.get() {
                    return Ok(Value::Bool(false));
                }
                let iter_sc = body_sc.child();
                let mut args = args.into_iter();
                let key = args.next();
                let value = args.next();
                interp.bind_range_vars(&body_stmt, key, value, &iter_sc)?;
                match interp.exec_block(&body_stmt.body, &iter_sc) {
                    Ok(()) | Err(Flow::Continue) => Ok(Value::Bool(true)),
                    Err(Flow::Break) => {
                        stopped_in.set(true);
                        Ok(Value::Bool(false))
                    }
                    Err(flow) => {
                        *pending_in.borrow_mut() = Some(flow);
                        stopped_in.set(true);
                        Ok(Value::Bool(false))
                    }
                }
            }),
        }));

        self.call_value(callable, vec![yield_fn], sc, stmt.pos)?;
        if let Some(flow) = pending.borrow_mut().take() {
            return Err(flow);
        }
        Ok(())
    }

    fn exec_switch(&mut self, stmt: &ast::SwitchStmt, sc: &EvalScope) -> EvalResult<()> {
        let head_sc = sc.child();
        if let Some(init) = &stmt.init {
            self.exec_stmt(init, &head_sc)?;
        }
        let tag = match &stmt.tag {
            Some(tag) => Some(self.eval_expr(tag, &head_sc)?),
            None => None,
        };

        let mut matched: Option<usize> = None;
        let mut default: Option<usize> = None;
        'cases: for (i, case) in stmt.cases.iter().enumerate() {
            if case.exprs.is_empty() {
                default = Some(i);
                continue;
            }
            for expr in &case.exprs {
                let candidate = self.eval_expr(expr, &head_sc)?;
                let hit = match &tag {
                    Some(tag) => value_eq(tag, &candidate),
                    None => candidate
                        .truthy()
                        .map_err(|msg| self.fail(ErrorKind::Type, msg, &sc.file, expr.pos()))?,
                };
                if hit {
                    matched = Some(i);
                    break 'cases;
                }
            }
        }

        let Some(mut idx) = matched.or(default) else {
            return Ok(());
        };
        loop {
            let case = &stmt.cases[idx];
            match self.exec_case_body(&case.body, &head_sc)? {
                CaseExit::Done => return Ok(()),
                CaseExit::FellThrough => {
                    idx += 1;
                    if idx >= stmt.cases.len() {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn exec_type_switch(&mut self, stmt: &ast::TypeSwitchStmt, sc: &EvalScope) -> EvalResult<()> {
        let head_sc = sc.child();
        if let Some(init) = &stmt.init {
            self.exec_stmt(init, &head_sc)?;
        }
        let subject = self.eval_expr(&stmt.subject, &head_sc)?;
        let concrete = match &subject {
            Value::Interface(iface) => iface.concrete.clone(),
            other => other.clone(),
        };
        let dynamic = concrete.type_descr();

        let mut matched: Option<usize> = None;
        let mut default: Option<usize> = None;
        'cases: for (i, case) in stmt.cases.iter().enumerate() {
            if case.exprs.is_empty() {
                default = Some(i);
                continue;
            }
            for expr in &case.exprs {
                if matches!(expr.unparenthesized(), ast::Expr::Ident(ident) if ident.name == "nil") {
                    if concrete.is_nil() {
                        matched = Some(i);
                        break 'cases;
                    }
                    continue;
                }
                let case_ty = self.resolve_type_expr(expr, &head_sc)?;
                if self.type_matches_value(&concrete, dynamic.as_ref(), &case_ty, &head_sc, expr.pos())? {
                    matched = Some(i);
                    break 'cases;
                }
            }
        }

        let Some(idx) = matched.or(default) else {
            return Ok(());
        };
        let case_sc = head_sc.child();
        if let Some(bind) = &stmt.bind {
            let _ = case_sc.env.declare(&bind.name, concrete.copy_for_assign(), false);
        }
        match self.exec_case_body_in(&stmt.cases[idx].body, &case_sc)? {
            CaseExit::Done | CaseExit::FellThrough => Ok(()),
        }
    }

    /// Whether a value (with dynamic type `dynamic`) matches a
    /// type-switch or assertion target type.
    pub(crate) fn type_matches_value(
        &mut self,
        value: &Value,
        dynamic: Option<&Rc<TypeDescr>>,
        target: &Rc<TypeDescr>,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<bool> {
        if matches!(value, Value::Symbolic(_)) {
            return Ok(true);
        }
        let shape = self.underlying(target, sc, pos)?;
        if let TypeDescr::Interface(def) = &*shape {
            let def = Rc::clone(def);
            return self.check_implements(value, &def, sc, pos);
        }
        if shape.is_interface() {
            return Ok(true);
        }
        match dynamic {
            Some(dynamic) => Ok(crate::types::same_type(dynamic, target) || crate::types::same_type(dynamic, &shape)),
            None => Ok(false),
        }
    }

    fn exec_case_body(&mut self, body: &[ast::Stmt], sc: &EvalScope) -> EvalResult<CaseExit> {
        let case_sc = sc.child();
        self.exec_case_body_in(body, &case_sc)
    }

    /// Runs a case clause: `break` exits the switch, a trailing
    /// `fallthrough` transfers to the next clause.
    fn exec_case_body_in(&mut self, body: &[ast::Stmt], case_sc: &EvalScope) -> EvalResult<CaseExit> {
        for stmt in body {
            if matches!(stmt, ast::Stmt::Fallthrough { .. }) {
                return Ok(CaseExit::FellThrough);
            }
            match self.exec_stmt(stmt, case_sc) {
                Ok(()) => {}
                Err(Flow::Break) => return Ok(CaseExit::Done),
                Err(flow) => return Err(flow),
            }
        }
        Ok(CaseExit::Done)
    }

    fn exec_defer(&mut self, call: &ast::Expr, sc: &EvalScope, pos: Pos) -> EvalResult<()> {
        if !matches!(call.unparenthesized(), ast::Expr::Call(_)) {
            return Err(self.fail(ErrorKind::ControlFlow, "defer requires a function call", &sc.file, pos));
        }
        let Some(frame) = self.frames.last_mut() else {
            return Err(self.fail(ErrorKind::ControlFlow, "defer outside a function", &sc.file, pos));
        };
        frame.defers.push(DeferredCall {
            call: call.clone(),
            scope: sc.clone(),
            pos,
        });
        Ok(())
    }
}

enum CaseExit {
    Done,
    FellThrough,
}
