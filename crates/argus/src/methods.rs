//! Selector dispatch: fields, methods, promotion, interfaces.
//!
//! All dispatch is one explicit search over the value tag — no vtables.
//! The search order is fixed: packages delegate to the cache, interfaces
//! re-dispatch on their concrete value, structs try exact methods then
//! exact fields then embedded promotion in declaration order, pointers
//! auto-deref with receiver-kind awareness, typed nils produce method
//! values without dereferencing, and unresolved types go symbolic.

use std::{cell::RefCell, rc::Rc};

use argus_syntax::ast;

use crate::{
    error::{ErrorKind, EvalResult, Pos},
    eval::EvalScope,
    interp::Interpreter,
    packages::Package,
    types::{InterfaceDef, StructDef, TypeDescr},
    value::{BoundMethod, FuncValue, PointerValue, StructValue, SymbolicMethod, UnresolvedFunc, Value},
};

/// A resolved method plus the chain of embedded field names leading to its
/// receiver (empty for methods declared directly on the type).
pub(crate) struct FoundMethod {
    pub func: Rc<FuncValue>,
    pub path: Vec<String>,
}

impl FoundMethod {
    pub fn pointer_receiver(&self) -> bool {
        self.func.recv.as_ref().is_some_and(|r| r.pointer)
    }
}

impl Interpreter {
    /// Resolves `base.name`.
    pub(crate) fn select_on_value(&mut self, base: Value, name: &str, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        match base {
            Value::Package(pkg) => self.package_member(&pkg, name, sc, pos),
            Value::Interface(iface) => self.select_on_value(iface.concrete, name, sc, pos),
            Value::Struct(sv) => self.select_on_struct(&sv, name, sc, pos),
            Value::Pointer(ptr) => self.select_on_pointer(&ptr, name, sc, pos),
            Value::TypedNil(ty) => self.select_on_typed_nil(&ty, name, sc, pos),
            Value::Symbolic(sym) => {
                let fq = match &sym.ty {
                    Some(ty) => format!("{}.{name}", ty.display_name()),
                    None => name.to_owned(),
                };
                let results = self.symbolic_method_results(sym.ty.as_deref(), name, sc, pos)?;
                Ok(Value::SymbolicMethod(Rc::new(SymbolicMethod { fq, results })))
            }
            Value::UnresolvedFunc(func) => {
                // Selecting through an unresolved value keeps deferring.
                let fq = format!("{}.{name}", func.fq_name());
                Ok(Value::SymbolicMethod(Rc::new(SymbolicMethod { fq, results: None })))
            }
            other => Err(self.fail(
                ErrorKind::Resolution,
                format!("undefined selector {name} on {}", other.type_name()),
                &sc.file,
                pos,
            )),
        }
    }

    /// Step 1: package members, loading the package when policy allows.
    pub(crate) fn package_member(&mut self, pkg: &Rc<Package>, name: &str, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        self.ensure_loaded(pkg, false)?;
        if !pkg.loaded.get() {
            return Ok(Value::UnresolvedFunc(Rc::new(UnresolvedFunc {
                pkg_path: pkg.import_path.clone(),
                name: name.to_owned(),
            })));
        }
        match pkg.env.lookup(name) {
            Some(value) => Ok(value),
            None => Err(self.fail(
                ErrorKind::Resolution,
                format!("undefined: {}.{name}", pkg.import_path),
                &sc.file,
                pos,
            )),
        }
    }

    fn select_on_struct(&mut self, sv: &Rc<RefCell<StructValue>>, name: &str, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        let def = Rc::clone(&sv.borrow().def);

        // Exact method first.
        if let Some(found) = self.find_method(&def, name, sc, pos)? {
            if found.pointer_receiver() {
                return Err(self.fail(
                    ErrorKind::Type,
                    format!(
                        "cannot call pointer method {name} on value of type {}",
                        struct_type_name(&def)
                    ),
                    &sc.file,
                    pos,
                ));
            }
            let receiver = self.receiver_along_path(Value::Struct(Rc::clone(sv)), &found.path, sc, pos)?;
            return Ok(Value::BoundMethod(Rc::new(BoundMethod {
                func: found.func,
                receiver: receiver.copy_for_assign(),
            })));
        }

        // Fields, explicit shadowing promoted.
        if let Some(value) = self.struct_field_value(sv, name, sc, pos)? {
            return Ok(value);
        }

        Err(self.fail(
            ErrorKind::Resolution,
            format!("undefined field or method {name} on {}", struct_type_name(&def)),
            &sc.file,
            pos,
        ))
    }

    fn select_on_pointer(&mut self, ptr: &PointerValue, name: &str, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        let pointee = ptr.target.borrow().clone();
        match pointee {
            Value::Struct(sv) => {
                let def = Rc::clone(&sv.borrow().def);
                if let Some(found) = self.find_method(&def, name, sc, pos)? {
                    let base = self.receiver_along_path(Value::Struct(Rc::clone(&sv)), &found.path, sc, pos)?;
                    let receiver = if found.pointer_receiver() {
                        // Keep pointer identity so the method observes and
                        // performs mutation. Field writes flow through the
                        // struct's own shared cell.
                        if found.path.is_empty() {
                            Value::Pointer(ptr.clone())
                        } else {
                            Value::Pointer(PointerValue {
                                target: Rc::new(RefCell::new(base)),
                                ty: None,
                            })
                        }
                    } else {
                        base.copy_for_assign()
                    };
                    return Ok(Value::BoundMethod(Rc::new(BoundMethod {
                        func: found.func,
                        receiver,
                    })));
                }
                if let Some(value) = self.struct_field_value(&sv, name, sc, pos)? {
                    return Ok(value);
                }
                Err(self.fail(
                    ErrorKind::Resolution,
                    format!("undefined field or method {name} on *{}", struct_type_name(&def)),
                    &sc.file,
                    pos,
                ))
            }
            Value::Symbolic(sym) => {
                let base = Value::Symbolic(sym);
                self.select_on_value(base, name, sc, pos)
            }
            other => Err(self.fail(
                ErrorKind::Type,
                format!("cannot select {name} through pointer to {}", other.type_name()),
                &sc.file,
                pos,
            )),
        }
    }

    /// Step 6: a typed-nil pointer to a struct yields method values
    /// without dereferencing the absent target.
    fn select_on_typed_nil(&mut self, ty: &Rc<TypeDescr>, name: &str, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        if let TypeDescr::Pointer(inner) = &**ty {
            let inner = self.underlying(&Rc::clone(inner), sc, pos)?;
            match &*inner {
                TypeDescr::Struct(def) => {
                    let def = Rc::clone(def);
                    if let Some(found) = self.find_method(&def, name, sc, pos)? {
                        return Ok(Value::BoundMethod(Rc::new(BoundMethod {
                            func: found.func,
                            receiver: Value::TypedNil(Rc::clone(ty)),
                        })));
                    }
                    return Err(self.fail(
                        ErrorKind::Resolution,
                        format!("undefined method {name} on {}", ty.display_name()),
                        &sc.file,
                        pos,
                    ));
                }
                TypeDescr::Unresolved { .. } => {
                    let fq = format!("{}.{name}", inner.display_name());
                    return Ok(Value::SymbolicMethod(Rc::new(SymbolicMethod { fq, results: None })));
                }
                _ => {}
            }
        }
        if matches!(&**ty, TypeDescr::Unresolved { .. }) {
            let fq = format!("{}.{name}", ty.display_name());
            return Ok(Value::SymbolicMethod(Rc::new(SymbolicMethod { fq, results: None })));
        }
        Err(self.fail(
            ErrorKind::Type,
            format!("selector {name} on nil value of type {}", ty.display_name()),
            &sc.file,
            pos,
        ))
    }

    /// Searches a struct's method table, then embedded field types in
    /// declaration order; the first match wins.
    pub(crate) fn find_method(
        &mut self,
        def: &Rc<StructDef>,
        name: &str,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Option<FoundMethod>> {
        let mut visited = Vec::new();
        self.find_method_inner(def, name, sc, pos, &mut visited)
    }

    fn find_method_inner(
        &mut self,
        def: &Rc<StructDef>,
        name: &str,
        sc: &EvalScope,
        pos: Pos,
        visited: &mut Vec<usize>,
    ) -> EvalResult<Option<FoundMethod>> {
        let key = Rc::as_ptr(def) as usize;
        if visited.contains(&key) {
            return Ok(None);
        }
        visited.push(key);
        if let Some(func) = def.method(name) {
            return Ok(Some(FoundMethod { func, path: Vec::new() }));
        }
        for field in def.fields.clone() {
            if !field.embedded {
                continue;
            }
            let Some(inner) = self.embedded_struct_def(def, &field.ty, sc, pos)? else {
                continue;
            };
            if let Some(mut found) = self.find_method_inner(&inner, name, sc, pos, visited)? {
                found.path.insert(0, field.name.clone());
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Resolves an embedded field's type down to a struct definition, or
    /// `None` when it is unresolvable (shallow scan) or not a struct.
    fn embedded_struct_def(
        &mut self,
        def: &Rc<StructDef>,
        ty: &ast::Expr,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Option<Rc<StructDef>>> {
        let def_sc = EvalScope {
            env: def.env.clone(),
            fs: def.file.clone(),
            file: sc.file.clone(),
            pkg_path: Some(def.pkg_path.clone()),
        };
        let Ok(resolved) = self.resolve_type_expr(ty, &def_sc) else {
            return Ok(None);
        };
        let mut shape = self.underlying(&resolved, sc, pos)?;
        if let TypeDescr::Pointer(inner) = &*shape {
            shape = self.underlying(&Rc::clone(inner), sc, pos)?;
        }
        match &*shape {
            TypeDescr::Struct(inner) => Ok(Some(Rc::clone(inner))),
            _ => Ok(None),
        }
    }

    /// Walks a receiver value down an embedded-field path, materializing
    /// zero values for embedded structs that are still nil.
    fn receiver_along_path(&mut self, base: Value, path: &[String], sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        let mut current = base;
        for segment in path {
            let Value::Struct(sv) = &current else {
                return Err(self.fail(
                    ErrorKind::Resolution,
                    format!("promoted method receiver {segment} is not a struct"),
                    &sc.file,
                    pos,
                ));
            };
            let sv = Rc::clone(sv);
            let next = self.embedded_field_value(&sv, segment, sc, pos)?;
            current = next;
        }
        Ok(current)
    }

    /// Reads (and lazily materializes) the value of an embedded field.
    fn embedded_field_value(
        &mut self,
        sv: &Rc<RefCell<StructValue>>,
        name: &str,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Value> {
        let current = sv.borrow().fields.get(name).cloned();
        match current {
            Some(Value::Nil) | None => {
                let def = Rc::clone(&sv.borrow().def);
                let Some(field) = def.field(name).cloned() else {
                    return Ok(Value::Nil);
                };
                let def_sc = EvalScope {
                    env: def.env.clone(),
                    fs: def.file.clone(),
                    file: sc.file.clone(),
                    pkg_path: Some(def.pkg_path.clone()),
                };
                let Ok(ty) = self.resolve_type_expr(&field.ty, &def_sc) else {
                    return Ok(self.symbolic(None, sc, pos));
                };
                let zero = self.zero_value(&ty, sc, pos)?;
                sv.borrow_mut().fields.insert(name.to_owned(), zero.clone());
                Ok(zero)
            }
            Some(value) => Ok(value),
        }
    }

    /// Field read with promotion: explicit fields shadow promoted ones;
    /// embedded fields themselves read like explicit fields.
    pub(crate) fn struct_field_value(
        &mut self,
        sv: &Rc<RefCell<StructValue>>,
        name: &str,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Option<Value>> {
        let mut visited = Vec::new();
        self.struct_field_value_inner(sv, name, sc, pos, &mut visited)
    }

    fn struct_field_value_inner(
        &mut self,
        sv: &Rc<RefCell<StructValue>>,
        name: &str,
        sc: &EvalScope,
        pos: Pos,
        visited: &mut Vec<usize>,
    ) -> EvalResult<Option<Value>> {
        let def = Rc::clone(&sv.borrow().def);
        let key = Rc::as_ptr(&def) as usize;
        if visited.contains(&key) {
            return Ok(None);
        }
        visited.push(key);
        if def.field(name).is_some() {
            if def.field(name).is_some_and(|f| f.embedded) {
                return Ok(Some(self.embedded_field_value(sv, name, sc, pos)?));
            }
            return Ok(Some(sv.borrow().fields.get(name).cloned().unwrap_or(Value::Nil)));
        }
        // Promotion through embedded fields, declaration order.
        for field in def.fields.clone() {
            if !field.embedded {
                continue;
            }
            let embedded = self.embedded_field_value(sv, &field.name, sc, pos)?;
            let inner = match &embedded {
                Value::Struct(inner) => Some(Rc::clone(inner)),
                Value::Pointer(ptr) => match &*ptr.target.borrow() {
                    Value::Struct(inner) => Some(Rc::clone(inner)),
                    _ => None,
                },
                _ => None,
            };
            if let Some(inner) = inner {
                if let Some(value) = self.struct_field_value_inner(&inner, name, sc, pos, visited)? {
                    return Ok(Some(value));
                }
            }
        }
        Ok(None)
    }

    /// Field write with the same promotion path as reads.
    pub(crate) fn set_struct_field(
        &mut self,
        sv: &Rc<RefCell<StructValue>>,
        name: &str,
        value: Value,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<bool> {
        let mut visited = Vec::new();
        self.set_struct_field_inner(sv, name, value, sc, pos, &mut visited)
    }

    fn set_struct_field_inner(
        &mut self,
        sv: &Rc<RefCell<StructValue>>,
        name: &str,
        value: Value,
        sc: &EvalScope,
        pos: Pos,
        visited: &mut Vec<usize>,
    ) -> EvalResult<bool> {
        let def = Rc::clone(&sv.borrow().def);
        let key = Rc::as_ptr(&def) as usize;
        if visited.contains(&key) {
            return Ok(false);
        }
        visited.push(key);
        if def.field(name).is_some() {
            sv.borrow_mut().fields.insert(name.to_owned(), value.copy_for_assign());
            return Ok(true);
        }
        for field in def.fields.clone() {
            if !field.embedded {
                continue;
            }
            let embedded = self.embedded_field_value(sv, &field.name, sc, pos)?;
            let inner = match &embedded {
                Value::Struct(inner) => Some(Rc::clone(inner)),
                Value::Pointer(ptr) => match &*ptr.target.borrow() {
                    Value::Struct(inner) => Some(Rc::clone(inner)),
                    _ => None,
                },
                _ => None,
            };
            if let Some(inner) = inner {
                if self.set_struct_field_inner(&inner, name, value.clone(), sc, pos, visited)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Declared result types for a method on a symbolic value, when the
    /// static type exposes a signature (interface requirements).
    fn symbolic_method_results(
        &mut self,
        ty: Option<&TypeDescr>,
        name: &str,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Option<Vec<Rc<TypeDescr>>>> {
        let Some(ty) = ty else {
            return Ok(None);
        };
        let shape = self.underlying(&Rc::new(ty.clone()), sc, pos)?;
        let TypeDescr::Interface(def) = &*shape else {
            return Ok(None);
        };
        let def = Rc::clone(def);
        let reqs = self.interface_requirements(&def, sc, pos)?;
        let Some(req) = reqs.into_iter().find(|r| r.name == name) else {
            return Ok(None);
        };
        let def_sc = EvalScope {
            env: def.env.clone(),
            fs: def.file.clone(),
            file: sc.file.clone(),
            pkg_path: Some(def.pkg_path.clone()),
        };
        let mut results = Vec::with_capacity(req.result_types.len());
        for ty_expr in &req.result_types {
            match self.resolve_type_expr(ty_expr, &def_sc) {
                Ok(resolved) => results.push(resolved),
                Err(_) => return Ok(None),
            }
        }
        Ok(Some(results))
    }

    /// Interface satisfaction: required names and arity against the
    /// candidate's method set. Parameter and result types are not
    /// compared. Nil values and symbolic values satisfy any interface.
    pub(crate) fn check_implements(
        &mut self,
        value: &Value,
        def: &Rc<InterfaceDef>,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<bool> {
        if value.is_nil() || matches!(value, Value::Symbolic(_) | Value::SymbolicMethod(_) | Value::UnresolvedFunc(_)) {
            return Ok(true);
        }
        let reqs = self.interface_requirements(def, sc, pos)?;
        for req in reqs {
            let Some(method) = self.method_for_satisfaction(value, &req.name, sc, pos)? else {
                return Ok(false);
            };
            if method.sig.params.len() != req.params || method.sig.results.len() != req.results {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Looks up a method for satisfaction checking: struct values expose
    /// only value-receiver methods, pointers expose all.
    fn method_for_satisfaction(
        &mut self,
        value: &Value,
        name: &str,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Option<Rc<FuncValue>>> {
        match value {
            Value::Interface(iface) => self.method_for_satisfaction(&iface.concrete, name, sc, pos),
            Value::Struct(sv) => {
                let def = Rc::clone(&sv.borrow().def);
                match self.find_method(&def, name, sc, pos)? {
                    Some(found) if !found.pointer_receiver() => Ok(Some(found.func)),
                    _ => Ok(None),
                }
            }
            Value::Pointer(ptr) => {
                let pointee = ptr.target.borrow().clone();
                match pointee {
                    Value::Struct(sv) => {
                        let def = Rc::clone(&sv.borrow().def);
                        Ok(self.find_method(&def, name, sc, pos)?.map(|found| found.func))
                    }
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }
}

fn struct_type_name(def: &Rc<StructDef>) -> String {
    if def.name.is_empty() {
        "struct{...}".to_owned()
    } else {
        def.name.clone()
    }
}
