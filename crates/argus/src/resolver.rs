//! Type resolution: from type syntax to descriptors.
//!
//! Resolution is lazy and policy-aware: a qualified name into a package
//! the scan policy keeps shallow resolves to an `Unresolved` stub instead
//! of failing, and everything downstream of that stub turns symbolic
//! rather than fatal.

use std::{cell::RefCell, rc::Rc};

use argus_syntax::ast;

use crate::{
    error::{ErrorKind, EvalResult, Pos},
    eval::EvalScope,
    interp::Interpreter,
    types::{AliasDef, FieldDef, FuncTypeDescr, InterfaceDef, MethodReq, StructDef, TypeDescr},
    value::{StructValue, Value},
};

/// Predeclared type names recognized before any environment lookup.
pub(crate) const BUILTIN_TYPE_NAMES: &[&str] = &[
    "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16", "uint32", "uint64", "uintptr", "float32",
    "float64", "complex64", "complex128", "string", "bool", "byte", "rune", "any", "comparable", "error",
];

impl Interpreter {
    /// Resolves a type expression to a descriptor.
    pub(crate) fn resolve_type_expr(&mut self, expr: &ast::Expr, sc: &EvalScope) -> EvalResult<Rc<TypeDescr>> {
        let pos = expr.pos();
        match expr {
            ast::Expr::Paren { inner, .. } => self.resolve_type_expr(inner, sc),
            ast::Expr::Ident(ident) => self.resolve_type_name(ident, sc),
            ast::Expr::Selector { base, sel } => self.resolve_qualified_type(base, sel, sc),
            ast::Expr::Unary {
                op: ast::UnaryOp::Deref,
                operand,
                ..
            } => {
                let inner = self.resolve_type_expr(operand, sc)?;
                Ok(Rc::new(TypeDescr::Pointer(inner)))
            }
            ast::Expr::ArrayType { elem, .. } => {
                let elem = self.resolve_type_expr(elem, sc)?;
                Ok(Rc::new(TypeDescr::Array(Some(elem))))
            }
            ast::Expr::VariadicType { elem, .. } => {
                let elem = match elem {
                    Some(elem) => Some(self.resolve_type_expr(elem, sc)?),
                    None => None,
                };
                Ok(Rc::new(TypeDescr::Array(elem)))
            }
            ast::Expr::MapType { key, value, .. } => {
                let key = self.resolve_type_expr(key, sc)?;
                let value = self.resolve_type_expr(value, sc)?;
                Ok(Rc::new(TypeDescr::Map(Some(key), Some(value))))
            }
            ast::Expr::ChanType { elem, .. } => {
                let elem = self.resolve_type_expr(elem, sc)?;
                Ok(Rc::new(TypeDescr::Chan(elem)))
            }
            ast::Expr::FuncType { sig, .. } => {
                let mut params = Vec::with_capacity(sig.params.len());
                for param in &sig.params {
                    params.push(self.resolve_type_expr(&param.ty, sc)?);
                }
                let mut results = Vec::with_capacity(sig.results.len());
                for result in &sig.results {
                    results.push(self.resolve_type_expr(&result.ty, sc)?);
                }
                Ok(Rc::new(TypeDescr::Func(Rc::new(FuncTypeDescr {
                    params,
                    results,
                    variadic: sig.variadic,
                }))))
            }
            ast::Expr::StructType { fields, .. } => Ok(Rc::new(TypeDescr::Struct(Rc::new(StructDef {
                name: String::new(),
                pkg_path: sc.pkg_path.clone().unwrap_or_default(),
                type_params: Vec::new(),
                fields: self.collect_fields(fields),
                methods: RefCell::default(),
                env: sc.env.clone(),
                file: sc.fs.clone(),
            })))),
            ast::Expr::InterfaceType { elems, .. } => {
                let pkg_path = sc.pkg_path.clone().unwrap_or_default();
                Ok(Rc::new(TypeDescr::Interface(Rc::new(
                    self.build_interface_def("", &pkg_path, elems, sc),
                ))))
            }
            ast::Expr::Index { base, indices, .. } => {
                let generic = self.resolve_type_expr(base, sc)?;
                let mut args = Vec::with_capacity(indices.len());
                for index in indices {
                    args.push(self.resolve_type_expr(index, sc)?);
                }
                self.instantiate(&generic, &args, sc, pos)
            }
            _ => Err(self.fail(ErrorKind::Type, "expression is not a type", &sc.file, pos)),
        }
    }

    fn resolve_type_name(&mut self, ident: &ast::Ident, sc: &EvalScope) -> EvalResult<Rc<TypeDescr>> {
        if BUILTIN_TYPE_NAMES.contains(&ident.name.as_str()) {
            return Ok(Rc::new(TypeDescr::Builtin(ident.name.clone())));
        }
        if let Some(binding) = sc.env.lookup_binding(&ident.name) {
            if binding.is_type {
                if let Value::Type(ty) = binding.slot.borrow().clone() {
                    return Ok(ty);
                }
            }
            return Err(self.fail(
                ErrorKind::Type,
                format!("{} is not a type", ident.name),
                &sc.file,
                ident.pos,
            ));
        }
        // Dot-imported type names.
        if let Some(fs) = sc.fs.clone() {
            for path in fs.dot_imports() {
                let pkg = self.cache.get_or_create(path);
                self.ensure_loaded(&pkg, false)?;
                if pkg.loaded.get() {
                    if let Some(Value::Type(ty)) = pkg.env.lookup(&ident.name) {
                        return Ok(ty);
                    }
                }
            }
        }
        Err(self.fail(
            ErrorKind::Resolution,
            format!("undefined type: {}", ident.name),
            &sc.file,
            ident.pos,
        ))
    }

    fn resolve_qualified_type(&mut self, base: &ast::Expr, sel: &ast::Ident, sc: &EvalScope) -> EvalResult<Rc<TypeDescr>> {
        let pos = sel.pos;
        let ast::Expr::Ident(pkg_ident) = base.unparenthesized() else {
            return Err(self.fail(ErrorKind::Type, "invalid qualified type", &sc.file, pos));
        };
        let Some(path) = sc.fs.as_ref().and_then(|fs| fs.alias_path(&pkg_ident.name)).map(str::to_owned) else {
            return Err(self.fail(
                ErrorKind::Resolution,
                format!("undefined package: {}", pkg_ident.name),
                &sc.file,
                pkg_ident.pos,
            ));
        };
        let pkg = self.cache.get_or_create(&path);
        self.ensure_loaded(&pkg, false)?;
        if !pkg.loaded.get() {
            return Ok(Rc::new(TypeDescr::Unresolved {
                pkg_path: path,
                name: sel.name.clone(),
            }));
        }
        match pkg.env.lookup(&sel.name) {
            Some(Value::Type(ty)) => Ok(ty),
            Some(_) => Err(self.fail(
                ErrorKind::Type,
                format!("{}.{} is not a type", path, sel.name),
                &sc.file,
                pos,
            )),
            None => Err(self.fail(
                ErrorKind::Resolution,
                format!("undefined: {}.{}", path, sel.name),
                &sc.file,
                pos,
            )),
        }
    }

    /// Unfolds aliases and applies generic instantiation until a concrete
    /// shape remains.
    pub(crate) fn underlying(&mut self, ty: &Rc<TypeDescr>, sc: &EvalScope, pos: Pos) -> EvalResult<Rc<TypeDescr>> {
        match &**ty {
            TypeDescr::Alias(def) => {
                let resolved = self.resolve_alias(def, sc, pos)?;
                if matches!(&*resolved, TypeDescr::Alias(other) if Rc::ptr_eq(other, def)) {
                    // Cycle short-circuit: the chain reached itself.
                    return Ok(resolved);
                }
                self.underlying(&resolved, sc, pos)
            }
            TypeDescr::Instantiated { generic, args } => {
                let concrete = self.instantiate_body(generic, args, sc, pos)?;
                if Rc::ptr_eq(&concrete, ty) {
                    Ok(concrete)
                } else {
                    self.underlying(&concrete, sc, pos)
                }
            }
            _ => Ok(Rc::clone(ty)),
        }
    }

    /// Resolves a named non-struct type to its underlying descriptor,
    /// memoizing on the definition. Cycles short-circuit and return the
    /// first alias reached again.
    pub(crate) fn resolve_alias(&mut self, def: &Rc<AliasDef>, sc: &EvalScope, pos: Pos) -> EvalResult<Rc<TypeDescr>> {
        if !def.type_params.is_empty() {
            return Err(self.fail(
                ErrorKind::Generics,
                format!("generic type {} used without instantiation", def.name),
                &sc.file,
                pos,
            ));
        }
        if let Some(resolved) = def.resolved.borrow().clone() {
            return Ok(resolved);
        }
        let key = Rc::as_ptr(def) as usize;
        if self.resolving_aliases.contains(&key) {
            return Ok(Rc::new(TypeDescr::Alias(Rc::clone(def))));
        }
        let def_sc = EvalScope {
            env: def.env.clone(),
            fs: def.file.clone(),
            file: sc.file.clone(),
            pkg_path: Some(def.pkg_path.clone()),
        };
        // The marker stays on the path while the whole chain unfolds, so
        // a cycle anywhere along it is caught.
        self.resolving_aliases.push(key);
        let chained = self.resolve_type_expr(&def.target, &def_sc).and_then(|resolved| match &*resolved {
            TypeDescr::Alias(inner) if !Rc::ptr_eq(inner, def) => {
                let inner = Rc::clone(inner);
                self.resolve_alias(&inner, sc, pos)
            }
            _ => Ok(resolved),
        });
        self.resolving_aliases.pop();
        let resolved = chained?;
        *def.resolved.borrow_mut() = Some(Rc::clone(&resolved));
        Ok(resolved)
    }

    /// Applies type arguments to a generic type, checking arity.
    pub(crate) fn instantiate(
        &mut self,
        generic: &Rc<TypeDescr>,
        args: &[Rc<TypeDescr>],
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Rc<TypeDescr>> {
        let params = generic.type_params();
        if params.is_empty() {
            return Err(self.fail(
                ErrorKind::Generics,
                format!("{} is not a generic type", generic.display_name()),
                &sc.file,
                pos,
            ));
        }
        if params.len() != args.len() {
            return Err(self.fail(
                ErrorKind::Generics,
                format!(
                    "wrong number of type arguments for {}: want {}, got {}",
                    generic.display_name(),
                    params.len(),
                    args.len()
                ),
                &sc.file,
                pos,
            ));
        }
        Ok(Rc::new(TypeDescr::Instantiated {
            generic: Rc::clone(generic),
            args: args.to_vec(),
        }))
    }

    /// Evaluates a generic's underlying expression with its type
    /// parameters bound, yielding the concrete descriptor.
    pub(crate) fn instantiate_body(
        &mut self,
        generic: &Rc<TypeDescr>,
        args: &[Rc<TypeDescr>],
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Rc<TypeDescr>> {
        match &**generic {
            // Generic structs resolve to their definition; the type
            // arguments travel alongside (on instances and on the
            // `Instantiated` descriptor) and bind when field types
            // resolve.
            TypeDescr::Struct(_) => Ok(Rc::clone(generic)),
            TypeDescr::Alias(def) => {
                let bound = def.env.child();
                for (param, arg) in def.type_params.iter().zip(args) {
                    let _ = bound.declare_type(&param.name.name, Value::Type(Rc::clone(arg)));
                }
                let def_sc = EvalScope {
                    env: bound,
                    fs: def.file.clone(),
                    file: sc.file.clone(),
                    pkg_path: Some(def.pkg_path.clone()),
                };
                let resolved = self.resolve_type_expr(&def.target, &def_sc)?;
                // An anonymous struct reached through a true alias takes
                // the alias's name.
                if let TypeDescr::Struct(inner) = &*resolved {
                    if def.is_alias && inner.name.is_empty() && !def.name.is_empty() {
                        return Ok(Rc::new(TypeDescr::Struct(Rc::new(StructDef {
                            name: def.name.clone(),
                            pkg_path: inner.pkg_path.clone(),
                            type_params: Vec::new(),
                            fields: inner.fields.clone(),
                            methods: RefCell::new(def.methods.borrow().clone()),
                            env: inner.env.clone(),
                            file: inner.file.clone(),
                        }))));
                    }
                }
                Ok(resolved)
            }
            _ => Err(self.fail(
                ErrorKind::Generics,
                format!("{} cannot be instantiated", generic.display_name()),
                &sc.file,
                pos,
            )),
        }
    }

    /// The interpreter's zero value for a type.
    ///
    /// Struct fields initialize to `Nil` and are never recursively
    /// constructed, so self-referential types terminate.
    pub(crate) fn zero_value(&mut self, ty: &Rc<TypeDescr>, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        match &**ty {
            TypeDescr::Builtin(name) => Ok(match name.as_str() {
                "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint8" | "uint16" | "uint32" | "uint64"
                | "uintptr" | "byte" | "rune" => Value::Int(0),
                "float32" | "float64" => Value::Float(0.0),
                "string" => Value::str(""),
                "bool" => Value::Bool(false),
                _ => Value::TypedNil(Rc::clone(ty)),
            }),
            TypeDescr::Pointer(_)
            | TypeDescr::Array(_)
            | TypeDescr::Map(..)
            | TypeDescr::Chan(_)
            | TypeDescr::Func(_)
            | TypeDescr::Interface(_) => Ok(Value::TypedNil(Rc::clone(ty))),
            TypeDescr::Struct(def) => Ok(new_struct_value(def, Vec::new())),
            TypeDescr::Instantiated { generic, args } => {
                let concrete = self.instantiate_body(generic, args, sc, pos)?;
                if let TypeDescr::Struct(def) = &*concrete {
                    Ok(new_struct_value(def, args.to_vec()))
                } else {
                    self.zero_value(&concrete, sc, pos)
                }
            }
            TypeDescr::Alias(_) => {
                let resolved = self.underlying(ty, sc, pos)?;
                if matches!(&*resolved, TypeDescr::Alias(_)) {
                    // Cyclic alias chain: fall back to typed nil.
                    Ok(Value::TypedNil(Rc::clone(ty)))
                } else {
                    self.zero_value(&resolved, sc, pos)
                }
            }
            TypeDescr::Unresolved { .. } | TypeDescr::TypeParam(_) => {
                Ok(self.symbolic(Some(Rc::clone(ty)), sc, pos))
            }
        }
    }

    /// Flattens struct field syntax: named groups expand, embedded fields
    /// get their base type name.
    pub(crate) fn collect_fields(&self, fields: &[ast::StructField]) -> Vec<FieldDef> {
        let mut out = Vec::new();
        for field in fields {
            if field.embedded {
                if let Some(name) = field.embedded_name() {
                    out.push(FieldDef {
                        name: name.to_owned(),
                        ty: field.ty.clone(),
                        embedded: true,
                        tag: field.tag.clone(),
                    });
                }
            } else {
                for name in &field.names {
                    out.push(FieldDef {
                        name: name.name.clone(),
                        ty: field.ty.clone(),
                        embedded: false,
                        tag: field.tag.clone(),
                    });
                }
            }
        }
        out
    }

    /// Builds an interface definition from its body elements.
    pub(crate) fn build_interface_def(
        &self,
        name: &str,
        pkg_path: &str,
        elems: &[ast::InterfaceElem],
        sc: &EvalScope,
    ) -> InterfaceDef {
        let mut methods = Vec::new();
        let mut embeds = Vec::new();
        for elem in elems {
            match elem {
                ast::InterfaceElem::Method { name, sig } => methods.push(MethodReq {
                    name: name.name.clone(),
                    params: sig.params.len(),
                    results: sig.results.len(),
                    result_types: sig.results.iter().map(|r| r.ty.clone()).collect(),
                }),
                ast::InterfaceElem::Embed(expr) => embeds.push(expr.clone()),
            }
        }
        InterfaceDef {
            name: name.to_owned(),
            pkg_path: pkg_path.to_owned(),
            methods,
            embeds,
            env: sc.env.clone(),
            file: sc.fs.clone(),
        }
    }

    /// All method requirements of an interface, embedded interfaces
    /// included. Constraint-only embeds (`any`, `comparable`, unions,
    /// `~T`) contribute no methods.
    pub(crate) fn interface_requirements(
        &mut self,
        def: &Rc<InterfaceDef>,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Vec<MethodReq>> {
        let mut reqs = def.methods.clone();
        for embed in &def.embeds.clone() {
            if matches!(embed, ast::Expr::UnionType { .. } | ast::Expr::TildeTerm { .. }) {
                continue;
            }
            let def_sc = EvalScope {
                env: def.env.clone(),
                fs: def.file.clone(),
                file: sc.file.clone(),
                pkg_path: Some(def.pkg_path.clone()),
            };
            let Ok(resolved) = self.resolve_type_expr(embed, &def_sc) else {
                continue;
            };
            let resolved = self.underlying(&resolved, sc, pos)?;
            if let TypeDescr::Interface(inner) = &*resolved {
                let inner = Rc::clone(inner);
                reqs.extend(self.interface_requirements(&inner, sc, pos)?);
            }
        }
        Ok(reqs)
    }
}

/// A struct instance with every declared field bound, zero-initialized to
/// `Nil`.
pub(crate) fn new_struct_value(def: &Rc<StructDef>, type_args: Vec<Rc<TypeDescr>>) -> Value {
    let fields = def.fields.iter().map(|f| (f.name.clone(), Value::Nil)).collect();
    Value::Struct(Rc::new(RefCell::new(StructValue {
        def: Rc::clone(def),
        type_args,
        fields,
    })))
}
