//! Generic call inference and constraint checking.
//!
//! Inference matches parameter shapes (`T`, `[]T`, `map[K]V`, `*T`)
//! against the dynamic types of the value arguments, with a fixed-point
//! pass so a constraint like `S ~[]E` can refine `E` once `S` lands on a
//! concrete slice type. Conflicting bindings for one parameter fail.
//! Constraint checking is deliberately name-based: `~T` compares the
//! resolved underlying names, not structures.

use std::rc::Rc;

use argus_syntax::ast;
use indexmap::IndexMap;

use crate::{
    error::{ErrorKind, EvalResult, Pos},
    eval::EvalScope,
    interp::Interpreter,
    types::{same_type, TypeDescr},
    value::{FuncValue, Value},
};

impl Interpreter {
    /// Infers bindings for every declared type parameter of `func` from
    /// the call's value arguments.
    pub(crate) fn infer_type_args(
        &mut self,
        func: &Rc<FuncValue>,
        args: &[Value],
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Vec<(String, Rc<TypeDescr>)>> {
        let sig = &func.sig;
        let param_names: Vec<String> = sig.type_params.iter().map(|p| p.name.name.clone()).collect();
        let mut bindings: IndexMap<String, Rc<TypeDescr>> = IndexMap::new();

        let arg_types: Vec<Option<Rc<TypeDescr>>> = args.iter().map(Value::type_descr).collect();

        // Fixed-point: later constraints may refine earlier bindings.
        for _round in 0..param_names.len() + 2 {
            let mut changed = false;

            let fixed = if sig.variadic { sig.params.len() - 1 } else { sig.params.len() };
            for (i, param) in sig.params.iter().enumerate() {
                if i < fixed {
                    if let Some(arg_ty) = arg_types.get(i).and_then(Clone::clone) {
                        changed |= self.unify(&param.ty, &arg_ty, &param_names, &mut bindings, sc, pos)?;
                    }
                } else {
                    // Variadic tail: every remaining argument constrains
                    // the element type.
                    for arg_ty in arg_types.iter().skip(fixed).flatten() {
                        let elem = ast::Expr::ArrayType {
                            len: None,
                            elem: Box::new(param.ty.clone()),
                            pos: param.ty.pos(),
                        };
                        let wrapped = Rc::new(TypeDescr::Array(Some(Rc::clone(arg_ty))));
                        changed |= self.unify(&elem, &wrapped, &param_names, &mut bindings, sc, pos)?;
                    }
                }
            }

            // Constraint propagation: `S ~[]E` with S bound to a slice
            // binds E to its element type.
            for tp in &sig.type_params {
                let Some(constraint) = &tp.constraint else { continue };
                let Some(bound) = bindings.get(&tp.name.name).cloned() else {
                    continue;
                };
                for term in constraint_terms(constraint) {
                    if let ast::Expr::TildeTerm { ty, .. } = term {
                        changed |= self.unify_shape(ty, &bound, &param_names, &mut bindings, sc, pos)?;
                    }
                }
            }

            if !changed {
                break;
            }
        }

        let mut out = Vec::with_capacity(param_names.len());
        for tp in &sig.type_params {
            let Some(bound) = bindings.get(&tp.name.name).cloned() else {
                return Err(self.fail(
                    ErrorKind::Generics,
                    format!("cannot infer type argument {}", tp.name.name),
                    &sc.file,
                    pos,
                ));
            };
            if let Some(constraint) = &tp.constraint {
                if !self.constraint_satisfied(constraint, &bound, &bindings, sc, pos)? {
                    return Err(self.fail(
                        ErrorKind::Generics,
                        format!(
                            "{} does not satisfy the constraint of {}",
                            bound.display_name(),
                            tp.name.name
                        ),
                        &sc.file,
                        pos,
                    ));
                }
            }
            out.push((tp.name.name.clone(), bound));
        }
        Ok(out)
    }

    /// Matches one parameter shape against one argument type, binding any
    /// type parameters mentioned. Returns whether a binding changed;
    /// fails on conflict.
    fn unify(
        &mut self,
        param_ty: &ast::Expr,
        arg_ty: &Rc<TypeDescr>,
        param_names: &[String],
        bindings: &mut IndexMap<String, Rc<TypeDescr>>,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<bool> {
        match param_ty {
            ast::Expr::Paren { inner, .. } => self.unify(inner, arg_ty, param_names, bindings, sc, pos),
            ast::Expr::Ident(ident) if param_names.contains(&ident.name) => {
                self.bind(&ident.name, arg_ty, bindings, sc, pos)
            }
            ast::Expr::ArrayType { elem, .. } | ast::Expr::VariadicType { elem: Some(elem), .. } => {
                match &**arg_ty {
                    TypeDescr::Array(Some(inner)) => {
                        let inner = Rc::clone(inner);
                        self.unify(elem, &inner, param_names, bindings, sc, pos)
                    }
                    _ => Ok(false),
                }
            }
            ast::Expr::MapType { key, value, .. } => match &**arg_ty {
                TypeDescr::Map(k, v) => {
                    let mut changed = false;
                    if let Some(k) = k {
                        let k = Rc::clone(k);
                        changed |= self.unify(key, &k, param_names, bindings, sc, pos)?;
                    }
                    if let Some(v) = v {
                        let v = Rc::clone(v);
                        changed |= self.unify(value, &v, param_names, bindings, sc, pos)?;
                    }
                    Ok(changed)
                }
                _ => Ok(false),
            },
            ast::Expr::Unary {
                op: ast::UnaryOp::Deref,
                operand,
                ..
            } => match &**arg_ty {
                TypeDescr::Pointer(inner) => {
                    let inner = Rc::clone(inner);
                    self.unify(operand, &inner, param_names, bindings, sc, pos)
                }
                _ => Ok(false),
            },
            _ => Ok(false),
        }
    }

    /// Unifies a constraint term's shape against an already-bound type,
    /// for propagation (`~[]E` against a bound slice).
    fn unify_shape(
        &mut self,
        term_ty: &ast::Expr,
        bound: &Rc<TypeDescr>,
        param_names: &[String],
        bindings: &mut IndexMap<String, Rc<TypeDescr>>,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<bool> {
        let shape = self.underlying(bound, sc, pos)?;
        self.unify(term_ty, &shape, param_names, bindings, sc, pos)
    }

    fn bind(
        &mut self,
        name: &str,
        arg_ty: &Rc<TypeDescr>,
        bindings: &mut IndexMap<String, Rc<TypeDescr>>,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<bool> {
        if let Some(existing) = bindings.get(name) {
            if same_type(existing, arg_ty) {
                return Ok(false);
            }
            return Err(self.fail(
                ErrorKind::Generics,
                format!(
                    "conflicting inference for {name}: {} vs {}",
                    existing.display_name(),
                    arg_ty.display_name()
                ),
                &sc.file,
                pos,
            ));
        }
        bindings.insert(name.to_owned(), Rc::clone(arg_ty));
        Ok(true)
    }

    /// Constraint check, run before body execution.
    fn constraint_satisfied(
        &mut self,
        constraint: &ast::Expr,
        bound: &Rc<TypeDescr>,
        bindings: &IndexMap<String, Rc<TypeDescr>>,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<bool> {
        match constraint.unparenthesized() {
            ast::Expr::Ident(ident) if ident.name == "any" || ident.name == "comparable" => Ok(true),
            ast::Expr::UnionType { terms, .. } => {
                for term in terms {
                    if self.constraint_satisfied(term, bound, bindings, sc, pos)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            ast::Expr::TildeTerm { ty, .. } => self.term_matches(ty, bound, bindings, sc, pos, true),
            ast::Expr::InterfaceType { elems, .. } => {
                // A constraint interface: every embedded term list must
                // admit the type; declared methods are not compared
                // (deliberate looseness).
                for elem in elems {
                    if let ast::InterfaceElem::Embed(term) = elem {
                        if !self.constraint_satisfied(term, bound, bindings, sc, pos)? {
                            return Ok(false);
                        }
                    }
                }
                Ok(true)
            }
            other => {
                // A named constraint: interfaces admit (loosely), type
                // terms compare by name.
                if let Ok(resolved) = self.resolve_type_expr(other, sc) {
                    let shape = self.underlying(&resolved, sc, pos)?;
                    if let TypeDescr::Interface(def) = &*shape {
                        if def.methods.is_empty() && !def.embeds.is_empty() {
                            let embeds = def.embeds.clone();
                            for embed in &embeds {
                                if !self.constraint_satisfied(embed, bound, bindings, sc, pos)? {
                                    return Ok(false);
                                }
                            }
                        }
                        return Ok(true);
                    }
                }
                self.term_matches(other, bound, bindings, sc, pos, false)
            }
        }
    }

    /// Whether a single type term admits `bound`. With `underlying_ok`
    /// (`~T` terms), names compare after unfolding both sides.
    fn term_matches(
        &mut self,
        term: &ast::Expr,
        bound: &Rc<TypeDescr>,
        bindings: &IndexMap<String, Rc<TypeDescr>>,
        sc: &EvalScope,
        pos: Pos,
        underlying_ok: bool,
    ) -> EvalResult<bool> {
        // Resolve the term with the current inference bindings visible,
        // so `~[]E` resolves E to its inferred type.
        let term_sc = sc.with_env(sc.env.child());
        for (name, ty) in bindings {
            let _ = term_sc.env.declare_type(name, Value::Type(Rc::clone(ty)));
        }
        let Ok(term_ty) = self.resolve_type_expr(term, &term_sc) else {
            return Ok(false);
        };
        if same_type(&term_ty, bound) {
            return Ok(true);
        }
        if underlying_ok {
            let bound_shape = self.underlying(bound, sc, pos)?;
            let term_shape = self.underlying(&term_ty, sc, pos)?;
            return Ok(types_compatible(&bound_shape, &term_shape));
        }
        Ok(false)
    }
}

/// The individual terms of a constraint expression.
fn constraint_terms(constraint: &ast::Expr) -> Vec<&ast::Expr> {
    match constraint.unparenthesized() {
        ast::Expr::UnionType { terms, .. } => terms.iter().flat_map(constraint_terms).collect(),
        ast::Expr::InterfaceType { elems, .. } => elems
            .iter()
            .filter_map(|elem| match elem {
                ast::InterfaceElem::Embed(term) => Some(constraint_terms(term)),
                ast::InterfaceElem::Method { .. } => None,
            })
            .flatten()
            .collect(),
        other => vec![other],
    }
}

/// Name-based compatibility with type-parameter wildcards.
fn types_compatible(a: &TypeDescr, b: &TypeDescr) -> bool {
    match (a, b) {
        (TypeDescr::TypeParam(_), _) | (_, TypeDescr::TypeParam(_)) => true,
        (TypeDescr::Array(Some(x)), TypeDescr::Array(Some(y))) => types_compatible(x, y),
        (TypeDescr::Array(_), TypeDescr::Array(_)) => true,
        (TypeDescr::Pointer(x), TypeDescr::Pointer(y)) => types_compatible(x, y),
        (TypeDescr::Map(xk, xv), TypeDescr::Map(yk, yv)) => {
            let keys = match (xk, yk) {
                (Some(x), Some(y)) => types_compatible(x, y),
                _ => true,
            };
            let values = match (xv, yv) {
                (Some(x), Some(y)) => types_compatible(x, y),
                _ => true,
            };
            keys && values
        }
        _ => same_type(a, b),
    }
}
