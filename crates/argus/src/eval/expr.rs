//! Expression evaluation.

use std::{cell::RefCell, rc::Rc};

use argus_syntax::ast;

use crate::{
    error::{ErrorKind, EvalResult, Pos},
    eval::EvalScope,
    interp::Interpreter,
    resolver::BUILTIN_TYPE_NAMES,
    types::TypeDescr,
    value::{value_eq, ArrayValue, FuncValue, MapValue, PointerValue, StructValue, Value},
};

impl Interpreter {
    pub(crate) fn eval_expr(&mut self, expr: &ast::Expr, sc: &EvalScope) -> EvalResult<Value> {
        match expr {
            ast::Expr::Paren { inner, .. } => self.eval_expr(inner, sc),
            ast::Expr::Ident(ident) => self.eval_ident(ident, sc),
            ast::Expr::IntLit { value, .. } => Ok(Value::Int(*value)),
            ast::Expr::FloatLit { value, .. } => Ok(Value::Float(*value)),
            ast::Expr::StringLit { value, .. } => Ok(Value::str(value)),
            ast::Expr::RuneLit { value, .. } => Ok(Value::Int(*value)),
            ast::Expr::Composite { ty, elems, pos } => self.eval_composite_lit(ty.as_deref(), elems, None, sc, *pos),
            ast::Expr::FuncLit(lit) => Ok(Value::Func(Rc::new(FuncValue {
                name: None,
                recv: None,
                sig: lit.sig.clone(),
                body: Some(lit.body.clone()),
                env: sc.env.clone(),
                file: sc.fs.clone(),
                file_name: sc.file.clone(),
                pkg_path: sc.pkg_path.clone(),
            }))),
            ast::Expr::Selector { base, sel } => {
                let base_value = self.eval_expr(base, sc)?;
                self.select_on_value(base_value, &sel.name, sc, sel.pos)
            }
            ast::Expr::Index { base, indices, pos } => self.eval_index(base, indices, sc, *pos),
            ast::Expr::Slice {
                base,
                low,
                high,
                max,
                pos,
            } => self.eval_slice(base, low.as_deref(), high.as_deref(), max.as_deref(), sc, *pos),
            ast::Expr::TypeAssert { base, ty: Some(ty), pos } => {
                let value = self.eval_expr(base, sc)?;
                let target = self.resolve_type_expr(ty, sc)?;
                let (result, ok) = self.try_type_assert(value, &target, sc, *pos)?;
                if !ok {
                    return Err(self.fail(
                        ErrorKind::Type,
                        format!("type assertion to {} failed", target.display_name()),
                        &sc.file,
                        *pos,
                    ));
                }
                Ok(result)
            }
            ast::Expr::TypeAssert { ty: None, pos, .. } => Err(self.fail(
                ErrorKind::ControlFlow,
                "use of .(type) outside a type switch",
                &sc.file,
                *pos,
            )),
            ast::Expr::Call(call) => self.eval_call(call, sc),
            ast::Expr::Unary { op, operand, pos } => self.eval_unary(*op, operand, sc, *pos),
            ast::Expr::Binary { op, lhs, rhs, pos } => self.eval_binary(*op, lhs, rhs, sc, *pos),
            // Type syntax in value position yields the descriptor, for
            // conversions, `make`, and composite literals.
            ast::Expr::ArrayType { .. }
            | ast::Expr::MapType { .. }
            | ast::Expr::ChanType { .. }
            | ast::Expr::FuncType { .. }
            | ast::Expr::StructType { .. }
            | ast::Expr::InterfaceType { .. } => Ok(Value::Type(self.resolve_type_expr(expr, sc)?)),
            ast::Expr::KeyValue { pos, .. } => Err(self.fail(
                ErrorKind::Type,
                "key-value pair outside composite literal",
                &sc.file,
                *pos,
            )),
            ast::Expr::VariadicType { pos, .. } | ast::Expr::UnionType { pos, .. } | ast::Expr::TildeTerm { pos, .. } => {
                Err(self.fail(ErrorKind::Type, "type constraint in value position", &sc.file, *pos))
            }
        }
    }

    /// Identifier lookup order: predeclared names, the lexical chain,
    /// dot-imported packages in import order, package aliases, then the
    /// universe built-ins.
    fn eval_ident(&mut self, ident: &ast::Ident, sc: &EvalScope) -> EvalResult<Value> {
        match ident.name.as_str() {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            "nil" => return Ok(Value::Nil),
            _ => {}
        }
        if BUILTIN_TYPE_NAMES.contains(&ident.name.as_str()) {
            return Ok(Value::Type(Rc::new(TypeDescr::Builtin(ident.name.clone()))));
        }
        if let Some(value) = sc.env.lookup(&ident.name) {
            return Ok(value);
        }
        if let Some(fs) = sc.fs.clone() {
            for path in fs.dot_imports() {
                let pkg = self.cache.get_or_create(path);
                self.ensure_loaded(&pkg, false)?;
                if pkg.loaded.get() {
                    if let Some(value) = pkg.env.lookup(&ident.name) {
                        return Ok(value);
                    }
                }
            }
            if let Some(path) = fs.alias_path(&ident.name) {
                let pkg = self.cache.get_or_create(path);
                return Ok(Value::Package(pkg));
            }
        }
        if let Some(value) = self.universe.lookup(&ident.name) {
            return Ok(value);
        }
        Err(self.fail(
            ErrorKind::Resolution,
            format!("undefined: {}", ident.name),
            &sc.file,
            ident.pos,
        ))
    }

    /// Builds a composite literal. `expected` carries the element type an
    /// enclosing literal imposes on an untyped `{...}`.
    pub(crate) fn eval_composite_lit(
        &mut self,
        ty_expr: Option<&ast::Expr>,
        elems: &[ast::Expr],
        expected: Option<Rc<TypeDescr>>,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Value> {
        let declared = match ty_expr {
            Some(expr) => Some(self.resolve_type_expr(expr, sc)?),
            None => expected,
        };
        let Some(declared) = declared else {
            return Err(self.fail(
                ErrorKind::Type,
                "untyped composite literal outside a typed context",
                &sc.file,
                pos,
            ));
        };

        let shape = self.underlying(&declared, sc, pos)?;
        match &*shape {
            TypeDescr::Struct(def) => {
                let def = Rc::clone(def);
                let type_args = match &*declared {
                    TypeDescr::Instantiated { args, .. } => args.clone(),
                    _ => Vec::new(),
                };
                self.build_struct_literal(&def, type_args, elems, sc, pos)
            }
            TypeDescr::Instantiated { generic, args } => {
                let concrete = self.instantiate_body(generic, args, sc, pos)?;
                if let TypeDescr::Struct(def) = &*concrete {
                    let def = Rc::clone(def);
                    self.build_struct_literal(&def, args.clone(), elems, sc, pos)
                } else {
                    self.eval_composite_lit(None, elems, Some(concrete), sc, pos)
                }
            }
            TypeDescr::Array(elem_ty) => self.build_array_literal(elem_ty.clone(), elems, sc, pos),
            TypeDescr::Map(key_ty, val_ty) => self.build_map_literal(key_ty.clone(), val_ty.clone(), elems, sc, pos),
            TypeDescr::Unresolved { .. } => {
                // Shallow-scan touch point: the literal's type is opaque,
                // so the whole literal goes symbolic. Elements still
                // evaluate for their effects.
                for elem in elems {
                    if !matches!(elem, ast::Expr::KeyValue { .. } | ast::Expr::Composite { ty: None, .. }) {
                        self.eval_expr(elem, sc)?;
                    }
                }
                Ok(self.symbolic(Some(Rc::clone(&declared)), sc, pos))
            }
            other => Err(self.fail(
                ErrorKind::Type,
                format!("invalid composite literal type {}", other.display_name()),
                &sc.file,
                pos,
            )),
        }
    }

    fn build_struct_literal(
        &mut self,
        def: &Rc<crate::types::StructDef>,
        type_args: Vec<Rc<TypeDescr>>,
        elems: &[ast::Expr],
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Value> {
        // Field types resolve against the definition environment, with
        // type parameters bound for instantiated generics.
        let def_env = if type_args.is_empty() {
            def.env.clone()
        } else {
            let bound = def.env.child();
            for (param, arg) in def.type_params.iter().zip(&type_args) {
                let _ = bound.declare_type(&param.name.name, Value::Type(Rc::clone(arg)));
            }
            bound
        };
        let def_sc = EvalScope {
            env: def_env,
            fs: def.file.clone(),
            file: sc.file.clone(),
            pkg_path: Some(def.pkg_path.clone()),
        };

        let mut fields: indexmap::IndexMap<String, Value> =
            def.fields.iter().map(|f| (f.name.clone(), Value::Nil)).collect();

        let keyed = elems.first().is_some_and(|e| matches!(e, ast::Expr::KeyValue { .. }));
        if keyed {
            for elem in elems {
                let ast::Expr::KeyValue { key, value, pos } = elem else {
                    return Err(self.fail(
                        ErrorKind::Type,
                        "mixture of field:value and value elements in struct literal",
                        &sc.file,
                        elem.pos(),
                    ));
                };
                let ast::Expr::Ident(field_name) = key.unparenthesized() else {
                    return Err(self.fail(ErrorKind::Type, "field key must be a name", &sc.file, *pos));
                };
                let Some(field) = def.field(&field_name.name).cloned() else {
                    return Err(self.fail(
                        ErrorKind::Type,
                        format!("unknown field {} in struct literal", field_name.name),
                        &sc.file,
                        *pos,
                    ));
                };
                let field_ty = self.resolve_type_expr(&field.ty, &def_sc).ok();
                let bound = self.eval_elem(value, field_ty, sc, *pos)?;
                fields.insert(field.name, bound.copy_for_assign());
            }
        } else if !elems.is_empty() {
            if elems.len() != def.fields.len() {
                return Err(self.fail(
                    ErrorKind::Type,
                    format!(
                        "wrong number of positional fields: want {}, got {}",
                        def.fields.len(),
                        elems.len()
                    ),
                    &sc.file,
                    pos,
                ));
            }
            for (field, elem) in def.fields.clone().iter().zip(elems) {
                let field_ty = self.resolve_type_expr(&field.ty, &def_sc).ok();
                let bound = self.eval_elem(elem, field_ty, sc, elem.pos())?;
                fields.insert(field.name.clone(), bound.copy_for_assign());
            }
        }

        Ok(Value::Struct(Rc::new(RefCell::new(StructValue {
            def: Rc::clone(def),
            type_args,
            fields,
        }))))
    }

    fn build_array_literal(
        &mut self,
        elem_ty: Option<Rc<TypeDescr>>,
        elems: &[ast::Expr],
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Value> {
        let mut out: Vec<Value> = Vec::with_capacity(elems.len());
        for elem in elems {
            match elem {
                // Indexed element: `[5]int{2: 7}`.
                ast::Expr::KeyValue { key, value, pos } => {
                    let index = self.eval_expr(key, sc)?;
                    let Value::Int(i) = index else {
                        return Err(self.fail(ErrorKind::Type, "array index key must be an integer", &sc.file, *pos));
                    };
                    if i < 0 {
                        return Err(self.fail(ErrorKind::Type, "array index key must not be negative", &sc.file, *pos));
                    }
                    let i = i as usize;
                    while out.len() <= i {
                        let filler = match &elem_ty {
                            Some(ty) => self.zero_value(&Rc::clone(ty), sc, *pos)?,
                            None => Value::Nil,
                        };
                        out.push(filler);
                    }
                    out[i] = self.eval_elem(value, elem_ty.clone(), sc, *pos)?.copy_for_assign();
                }
                _ => {
                    let value = self.eval_elem(elem, elem_ty.clone(), sc, elem.pos())?;
                    out.push(value.copy_for_assign());
                }
            }
        }
        let _ = pos;
        Ok(Value::Array(Rc::new(RefCell::new(ArrayValue {
            elem_ty,
            elems: out,
        }))))
    }

    fn build_map_literal(
        &mut self,
        key_ty: Option<Rc<TypeDescr>>,
        val_ty: Option<Rc<TypeDescr>>,
        elems: &[ast::Expr],
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Value> {
        let mut entries = indexmap::IndexMap::new();
        for elem in elems {
            let ast::Expr::KeyValue { key, value, pos } = elem else {
                return Err(self.fail(ErrorKind::Type, "missing key in map literal", &sc.file, elem.pos()));
            };
            let key_value = self.eval_elem(key, key_ty.clone(), sc, *pos)?;
            let Some(hash) = key_value.hash_key() else {
                return Err(self.fail(
                    ErrorKind::Type,
                    format!("map key of type {} is not hashable", key_value.type_name()),
                    &sc.file,
                    *pos,
                ));
            };
            let bound = self.eval_elem(value, val_ty.clone(), sc, *pos)?;
            entries.insert(hash, (key_value, bound.copy_for_assign()));
        }
        let _ = pos;
        Ok(Value::Map(Rc::new(RefCell::new(MapValue {
            key_ty,
            val_ty,
            entries,
        }))))
    }

    /// Evaluates a composite element, re-typing untyped nested `{...}`
    /// against the expected type and boxing interface-typed elements.
    fn eval_elem(&mut self, expr: &ast::Expr, expected: Option<Rc<TypeDescr>>, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        if let ast::Expr::Composite { ty: None, elems, pos } = expr {
            return self.eval_composite_lit(None, elems, expected, sc, *pos);
        }
        let value = self.eval_expr(expr, sc)?;
        match expected {
            Some(ty) => self.coerce_to_type(value, &ty, sc, pos),
            None => Ok(value),
        }
    }

    fn eval_index(&mut self, base: &ast::Expr, indices: &[ast::Expr], sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        let base_value = self.eval_expr(base, sc)?;

        // Instantiation when the base is a generic type or function.
        if let Value::Type(generic) = &base_value {
            let mut args = Vec::with_capacity(indices.len());
            for index in indices {
                args.push(self.resolve_type_expr(index, sc)?);
            }
            let ty = self.instantiate(generic, &args, sc, pos)?;
            return Ok(Value::Type(ty));
        }
        if let Value::Func(func) = &base_value {
            if !func.sig.type_params.is_empty() {
                let mut args = Vec::with_capacity(indices.len());
                for index in indices {
                    args.push(self.resolve_type_expr(index, sc)?);
                }
                return self.instantiate_func(func, &args, sc, pos);
            }
        }

        if indices.len() != 1 {
            return Err(self.fail(ErrorKind::Type, "multiple indices on a non-generic value", &sc.file, pos));
        }
        let index = self.eval_expr(&indices[0], sc)?;
        self.index_value(base_value, index, sc, pos)
    }

    fn index_value(&mut self, base: Value, index: Value, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        match base {
            Value::Array(arr) => {
                let arr = arr.borrow();
                let Value::Int(i) = index else {
                    return Err(self.fail(ErrorKind::Type, "array index must be an integer", &sc.file, pos));
                };
                if i < 0 || (i as usize) >= arr.elems.len() {
                    return Err(self.fail(
                        ErrorKind::Runtime,
                        format!("index out of range [{i}] with length {}", arr.elems.len()),
                        &sc.file,
                        pos,
                    ));
                }
                Ok(arr.elems[i as usize].clone())
            }
            Value::Str(s) => {
                let Value::Int(i) = index else {
                    return Err(self.fail(ErrorKind::Type, "string index must be an integer", &sc.file, pos));
                };
                let bytes = s.as_bytes();
                if i < 0 || (i as usize) >= bytes.len() {
                    return Err(self.fail(
                        ErrorKind::Runtime,
                        format!("index out of range [{i}] with length {}", bytes.len()),
                        &sc.file,
                        pos,
                    ));
                }
                Ok(Value::Int(i64::from(bytes[i as usize])))
            }
            Value::Map(map) => {
                let (value, _ok) = self.map_lookup(&map, &index, sc, pos)?;
                Ok(value)
            }
            Value::TypedNil(ty) => match &*ty {
                TypeDescr::Map(_, val_ty) => match val_ty {
                    Some(val_ty) => self.zero_value(&Rc::clone(val_ty), sc, pos),
                    None => Ok(Value::Nil),
                },
                TypeDescr::Array(_) => Err(self.fail(
                    ErrorKind::Runtime,
                    "index out of range on nil slice",
                    &sc.file,
                    pos,
                )),
                _ => Err(self.fail(ErrorKind::Type, "invalid index on nil", &sc.file, pos)),
            },
            Value::Pointer(ptr) => {
                let pointee = ptr.target.borrow().clone();
                self.index_value(pointee, index, sc, pos)
            }
            Value::Symbolic(_) => Ok(self.symbolic(None, sc, pos)),
            other => Err(self.fail(
                ErrorKind::Type,
                format!("cannot index {}", other.type_name()),
                &sc.file,
                pos,
            )),
        }
    }

    /// Map read: the stored value, or the zero value of the map's value
    /// type with `ok == false`.
    pub(crate) fn map_lookup(
        &mut self,
        map: &Rc<RefCell<MapValue>>,
        key: &Value,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<(Value, bool)> {
        let Some(hash) = key.hash_key() else {
            return Err(self.fail(
                ErrorKind::Type,
                format!("map key of type {} is not hashable", key.type_name()),
                &sc.file,
                pos,
            ));
        };
        let found = map.borrow().entries.get(&hash).map(|(_, v)| v.clone());
        match found {
            Some(value) => Ok((value, true)),
            None => {
                let val_ty = map.borrow().val_ty.clone();
                let zero = match val_ty {
                    Some(ty) => self.zero_value(&ty, sc, pos)?,
                    None => Value::Nil,
                };
                Ok((zero, false))
            }
        }
    }

    fn eval_slice(
        &mut self,
        base: &ast::Expr,
        low: Option<&ast::Expr>,
        high: Option<&ast::Expr>,
        max: Option<&ast::Expr>,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Value> {
        let base_value = self.eval_expr(base, sc)?;
        let low_value = self.eval_slice_bound(low, sc)?;
        let high_value = self.eval_slice_bound(high, sc)?;
        let max_value = self.eval_slice_bound(max, sc)?;

        match base_value {
            Value::Array(arr) => {
                let arr = arr.borrow();
                let len = arr.elems.len();
                let lo = low_value.unwrap_or(0);
                let hi = high_value.unwrap_or(len as i64);
                let cap = max_value.unwrap_or(len as i64);
                if lo < 0 || hi < lo || cap < hi || (hi as usize) > len || (cap as usize) > len {
                    return Err(self.fail(
                        ErrorKind::Runtime,
                        format!("slice bounds out of range [{lo}:{hi}:{cap}] with length {len}"),
                        &sc.file,
                        pos,
                    ));
                }
                let elems = arr.elems[lo as usize..hi as usize].to_vec();
                Ok(Value::Array(Rc::new(RefCell::new(ArrayValue {
                    elem_ty: arr.elem_ty.clone(),
                    elems,
                }))))
            }
            Value::Str(s) => {
                let len = s.len();
                let lo = low_value.unwrap_or(0);
                let hi = high_value.unwrap_or(len as i64);
                if lo < 0 || hi < lo || (hi as usize) > len {
                    return Err(self.fail(
                        ErrorKind::Runtime,
                        format!("slice bounds out of range [{lo}:{hi}] with length {len}"),
                        &sc.file,
                        pos,
                    ));
                }
                Ok(Value::str(&s[lo as usize..hi as usize]))
            }
            Value::Nil | Value::TypedNil(_) => {
                if low_value.unwrap_or(0) == 0 && high_value.unwrap_or(0) == 0 {
                    Ok(Value::Array(Rc::new(RefCell::new(ArrayValue {
                        elem_ty: None,
                        elems: Vec::new(),
                    }))))
                } else {
                    Err(self.fail(ErrorKind::Runtime, "slice bounds out of range on nil", &sc.file, pos))
                }
            }
            Value::Symbolic(_) => Ok(self.symbolic(None, sc, pos)),
            other => Err(self.fail(
                ErrorKind::Type,
                format!("cannot slice {}", other.type_name()),
                &sc.file,
                pos,
            )),
        }
    }

    fn eval_slice_bound(&mut self, bound: Option<&ast::Expr>, sc: &EvalScope) -> EvalResult<Option<i64>> {
        let Some(expr) = bound else {
            return Ok(None);
        };
        let value = self.eval_expr(expr, sc)?;
        match value {
            Value::Int(i) => Ok(Some(i)),
            Value::Symbolic(_) => Ok(Some(0)),
            other => Err(self.fail(
                ErrorKind::Type,
                format!("slice bound must be an integer, got {}", other.type_name()),
                &sc.file,
                expr.pos(),
            )),
        }
    }

    fn eval_unary(&mut self, op: ast::UnaryOp, operand: &ast::Expr, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        if op == ast::UnaryOp::Addr {
            return self.eval_address_of(operand, sc, pos);
        }
        let value = self.eval_expr(operand, sc)?;
        if matches!(value, Value::Symbolic(_)) && op != ast::UnaryOp::Deref {
            // Symbolic propagation: unary operators keep placeholders
            // symbolic.
            return Ok(self.symbolic(value.type_descr(), sc, pos));
        }
        match op {
            ast::UnaryOp::Not => match value {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(self.fail(
                    ErrorKind::Type,
                    format!("invalid operation: ! on {}", other.type_name()),
                    &sc.file,
                    pos,
                )),
            },
            ast::UnaryOp::Neg => match value {
                Value::Int(v) => Ok(Value::Int(-v)),
                Value::Float(v) => Ok(Value::Float(-v)),
                other => Err(self.fail(
                    ErrorKind::Type,
                    format!("invalid operation: - on {}", other.type_name()),
                    &sc.file,
                    pos,
                )),
            },
            ast::UnaryOp::Plus => match value {
                Value::Int(_) | Value::Float(_) => Ok(value),
                other => Err(self.fail(
                    ErrorKind::Type,
                    format!("invalid operation: + on {}", other.type_name()),
                    &sc.file,
                    pos,
                )),
            },
            ast::UnaryOp::BitNot => match value {
                Value::Int(v) => Ok(Value::Int(!v)),
                other => Err(self.fail(
                    ErrorKind::Type,
                    format!("invalid operation: ^ on {}", other.type_name()),
                    &sc.file,
                    pos,
                )),
            },
            ast::UnaryOp::Deref => match value {
                // `*T` in type position constructs the pointer type.
                Value::Type(ty) => Ok(Value::Type(Rc::new(TypeDescr::Pointer(ty)))),
                Value::Pointer(ptr) => Ok(ptr.target.borrow().clone()),
                Value::Symbolic(_) => Ok(self.symbolic(None, sc, pos)),
                Value::TypedNil(_) | Value::Nil => Err(self.fail(
                    ErrorKind::Runtime,
                    "invalid memory address or nil pointer dereference",
                    &sc.file,
                    pos,
                )),
                other => Err(self.fail(
                    ErrorKind::Type,
                    format!("invalid indirect of {}", other.type_name()),
                    &sc.file,
                    pos,
                )),
            },
            ast::UnaryOp::Recv => Ok(self.symbolic(None, sc, pos)),
            ast::UnaryOp::Addr => unreachable!("handled above"),
        }
    }

    /// `&x`: defined for identifiers (the environment's own storage slot)
    /// and composite literals (a fresh cell).
    fn eval_address_of(&mut self, operand: &ast::Expr, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        match operand.unparenthesized() {
            ast::Expr::Ident(ident) => match sc.env.address_of(&ident.name) {
                Some(Ok(slot)) => {
                    let ty = slot.borrow().type_descr().map(|inner| Rc::new(TypeDescr::Pointer(inner)));
                    Ok(Value::Pointer(PointerValue { target: slot, ty }))
                }
                Some(Err(msg)) => Err(self.fail(ErrorKind::Type, msg, &sc.file, pos)),
                None => Err(self.fail(
                    ErrorKind::Resolution,
                    format!("undefined: {}", ident.name),
                    &sc.file,
                    ident.pos,
                )),
            },
            ast::Expr::Composite { ty, elems, pos } => {
                let value = self.eval_composite_lit(ty.as_deref(), elems, None, sc, *pos)?;
                let pointer_ty = value.type_descr().map(|inner| Rc::new(TypeDescr::Pointer(inner)));
                Ok(Value::Pointer(PointerValue {
                    target: Rc::new(RefCell::new(value)),
                    ty: pointer_ty,
                }))
            }
            other => Err(self.fail(
                ErrorKind::Type,
                "cannot take the address: operand must be an identifier or composite literal",
                &sc.file,
                other.pos(),
            )),
        }
    }

    fn eval_binary(
        &mut self,
        op: ast::BinaryOp,
        lhs: &ast::Expr,
        rhs: &ast::Expr,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Value> {
        // Short-circuit forms never evaluate the right side when the left
        // decides.
        if op == ast::BinaryOp::LogicalAnd || op == ast::BinaryOp::LogicalOr {
            let left = self.eval_expr(lhs, sc)?;
            if matches!(left, Value::Symbolic(_)) {
                return Ok(self.symbolic(Some(Rc::new(TypeDescr::Builtin("bool".to_owned()))), sc, pos));
            }
            let left_true = left
                .truthy()
                .map_err(|msg| self.fail(ErrorKind::Type, msg, &sc.file, lhs.pos()))?;
            if op == ast::BinaryOp::LogicalAnd && !left_true {
                return Ok(Value::Bool(false));
            }
            if op == ast::BinaryOp::LogicalOr && left_true {
                return Ok(Value::Bool(true));
            }
            let right = self.eval_expr(rhs, sc)?;
            if matches!(right, Value::Symbolic(_)) {
                return Ok(self.symbolic(Some(Rc::new(TypeDescr::Builtin("bool".to_owned()))), sc, pos));
            }
            let right_true = right
                .truthy()
                .map_err(|msg| self.fail(ErrorKind::Type, msg, &sc.file, rhs.pos()))?;
            return Ok(Value::Bool(right_true));
        }

        let left = self.eval_expr(lhs, sc)?;
        let right = self.eval_expr(rhs, sc)?;
        self.apply_binary(op, left, right, sc, pos)
    }

    /// The non-short-circuit binary operators, shared with compound
    /// assignment.
    pub(crate) fn apply_binary(
        &mut self,
        op: ast::BinaryOp,
        left: Value,
        right: Value,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Value> {
        use ast::BinaryOp as B;

        if matches!(left, Value::Symbolic(_)) || matches!(right, Value::Symbolic(_)) {
            let ty = match op {
                B::Eq | B::Ne | B::Lt | B::Le | B::Gt | B::Ge => Rc::new(TypeDescr::Builtin("bool".to_owned())),
                _ => match left.type_descr() {
                    Some(ty) => ty,
                    None => return Ok(self.symbolic(None, sc, pos)),
                },
            };
            return Ok(self.symbolic(Some(ty), sc, pos));
        }

        match op {
            B::Eq => return Ok(Value::Bool(value_eq(&left, &right))),
            B::Ne => return Ok(Value::Bool(!value_eq(&left, &right))),
            _ => {}
        }

        if left.is_nil() || right.is_nil() {
            return Err(self.fail(
                ErrorKind::Type,
                "invalid operation: arithmetic on nil",
                &sc.file,
                pos,
            ));
        }

        match (op, &left, &right) {
            // Integer arithmetic, 64-bit representation passed through.
            (B::Add, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
            (B::Sub, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(*b))),
            (B::Mul, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(*b))),
            (B::Div, Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    Err(self.fail(ErrorKind::Runtime, "integer divide by zero", &sc.file, pos))
                } else {
                    Ok(Value::Int(a.wrapping_div(*b)))
                }
            }
            (B::Rem, Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    Err(self.fail(ErrorKind::Runtime, "integer divide by zero", &sc.file, pos))
                } else {
                    Ok(Value::Int(a.wrapping_rem(*b)))
                }
            }
            (B::BitAnd, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a & b)),
            (B::BitOr, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a | b)),
            (B::BitXor, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a ^ b)),
            (B::AndNot, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a & !b)),
            (B::Shl, Value::Int(a), Value::Int(b)) if *b >= 0 => Ok(Value::Int(a.wrapping_shl(*b as u32))),
            (B::Shr, Value::Int(a), Value::Int(b)) if *b >= 0 => Ok(Value::Int(a.wrapping_shr(*b as u32))),
            (B::Shl | B::Shr, Value::Int(_), Value::Int(_)) => {
                Err(self.fail(ErrorKind::Runtime, "negative shift amount", &sc.file, pos))
            }

            // Float arithmetic, with int widening.
            (B::Add, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
            (B::Sub, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a - b)),
            (B::Mul, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a * b)),
            (B::Div, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a / b)),
            (B::Add | B::Sub | B::Mul | B::Div, Value::Int(a), Value::Float(b)) => {
                self.apply_binary(op, Value::Float(*a as f64), Value::Float(*b), sc, pos)
            }
            (B::Add | B::Sub | B::Mul | B::Div, Value::Float(a), Value::Int(b)) => {
                self.apply_binary(op, Value::Float(*a), Value::Float(*b as f64), sc, pos)
            }

            // String concatenation.
            (B::Add, Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{a}{b}"))),

            // Ordering.
            (B::Lt, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a < b)),
            (B::Le, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a <= b)),
            (B::Gt, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a > b)),
            (B::Ge, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a >= b)),
            (B::Lt, Value::Float(a), Value::Float(b)) => Ok(Value::Bool(a < b)),
            (B::Le, Value::Float(a), Value::Float(b)) => Ok(Value::Bool(a <= b)),
            (B::Gt, Value::Float(a), Value::Float(b)) => Ok(Value::Bool(a > b)),
            (B::Ge, Value::Float(a), Value::Float(b)) => Ok(Value::Bool(a >= b)),
            (B::Lt | B::Le | B::Gt | B::Ge, Value::Int(a), Value::Float(b)) => {
                self.apply_binary(op, Value::Float(*a as f64), Value::Float(*b), sc, pos)
            }
            (B::Lt | B::Le | B::Gt | B::Ge, Value::Float(a), Value::Int(b)) => {
                self.apply_binary(op, Value::Float(*a), Value::Float(*b as f64), sc, pos)
            }
            (B::Lt, Value::Str(a), Value::Str(b)) => Ok(Value::Bool(a < b)),
            (B::Le, Value::Str(a), Value::Str(b)) => Ok(Value::Bool(a <= b)),
            (B::Gt, Value::Str(a), Value::Str(b)) => Ok(Value::Bool(a > b)),
            (B::Ge, Value::Str(a), Value::Str(b)) => Ok(Value::Bool(a >= b)),

            _ => Err(self.fail(
                ErrorKind::Type,
                format!(
                    "invalid operation: mismatched types {} and {}",
                    left.type_name(),
                    right.type_name()
                ),
                &sc.file,
                pos,
            )),
        }
    }

    /// Type assertion with the two-value protocol: `(value, true)` on
    /// success, `(zero, false)` on failure.
    pub(crate) fn try_type_assert(
        &mut self,
        value: Value,
        target: &Rc<TypeDescr>,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<(Value, bool)> {
        let concrete = match &value {
            Value::Interface(iface) => iface.concrete.clone(),
            other => other.clone(),
        };
        if let Value::Symbolic(_) = &concrete {
            let sym = self.symbolic(Some(Rc::clone(target)), sc, pos);
            return Ok((sym, true));
        }
        if concrete.is_nil() {
            let zero = self.zero_value(target, sc, pos)?;
            return Ok((zero, false));
        }
        let dynamic = concrete.type_descr();
        if self.type_matches_value(&concrete, dynamic.as_ref(), target, sc, pos)? {
            let result = self.coerce_to_type(concrete, target, sc, pos)?;
            return Ok((result, true));
        }
        let zero = self.zero_value(target, sc, pos)?;
        Ok((zero, false))
    }

    /// Explicit instantiation of a generic function: binds the type
    /// parameters in a child environment and drops them from the
    /// signature.
    pub(crate) fn instantiate_func(
        &mut self,
        func: &Rc<FuncValue>,
        args: &[Rc<TypeDescr>],
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Value> {
        if args.len() > func.sig.type_params.len() {
            return Err(self.fail(
                ErrorKind::Generics,
                format!(
                    "wrong number of type arguments: want {}, got {}",
                    func.sig.type_params.len(),
                    args.len()
                ),
                &sc.file,
                pos,
            ));
        }
        let bound = func.env.child();
        for (param, arg) in func.sig.type_params.iter().zip(args) {
            let _ = bound.declare_type(&param.name.name, Value::Type(Rc::clone(arg)));
        }
        let mut sig = func.sig.clone();
        sig.type_params = sig.type_params.split_off(args.len());
        Ok(Value::Func(Rc::new(FuncValue {
            name: func.name.clone(),
            recv: func.recv.clone(),
            sig,
            body: func.body.clone(),
            env: bound,
            file: func.file.clone(),
            file_name: func.file_name.clone(),
            pkg_path: func.pkg_path.clone(),
        })))
    }
}
