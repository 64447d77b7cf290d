//! The always-present built-in functions.
//!
//! Built-ins are carried as an enum inside [`Value`] and dispatched
//! centrally; they live in the universe scope at the root of every
//! environment chain, so user code can shadow them like any other
//! predeclared identifier.

use std::{cell::RefCell, rc::Rc};

use strum::{Display, EnumIter, IntoStaticStr};

use crate::{
    env::Env,
    error::{ErrorKind, EvalResult, Flow, Pos},
    eval::EvalScope,
    interp::Interpreter,
    types::TypeDescr,
    value::{ArrayValue, MapValue, PointerValue, SymbolicValue, Value},
};

/// Identity of a built-in function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Builtin {
    Len,
    Cap,
    Copy,
    Delete,
    Make,
    Append,
    New,
    Min,
    Max,
    Print,
    Println,
    Panic,
    Recover,
    Close,
    Complex,
    Real,
    Imag,
    Clear,
    Readln,
}

impl Builtin {
    /// Binds every built-in into the universe scope.
    pub fn install(universe: &Env) {
        use strum::IntoEnumIterator;
        for builtin in Self::iter() {
            let name = builtin.to_string();
            let _ = universe.declare(&name, Value::Builtin(builtin), true);
        }
    }
}

impl Interpreter {
    pub(crate) fn call_builtin(
        &mut self,
        builtin: Builtin,
        args: Vec<Value>,
        sc: &EvalScope,
        pos: Pos,
    ) -> EvalResult<Value> {
        match builtin {
            Builtin::Len => self.builtin_len(args, sc, pos),
            Builtin::Cap => self.builtin_cap(args, sc, pos),
            Builtin::Copy => self.builtin_copy(args, sc, pos),
            Builtin::Delete => self.builtin_delete(args, sc, pos),
            Builtin::Make => self.builtin_make(args, sc, pos),
            Builtin::Append => self.builtin_append(args, sc, pos),
            Builtin::New => self.builtin_new(args, sc, pos),
            Builtin::Min => self.builtin_min_max(args, sc, pos, true),
            Builtin::Max => self.builtin_min_max(args, sc, pos, false),
            Builtin::Print => {
                for value in &args {
                    self.writer.stdout_write(&value.display_str());
                }
                Ok(Value::Nil)
            }
            Builtin::Println => {
                for (i, value) in args.iter().enumerate() {
                    if i > 0 {
                        self.writer.stdout_push(' ');
                    }
                    self.writer.stdout_write(&value.display_str());
                }
                self.writer.stdout_push('\n');
                Ok(Value::Nil)
            }
            Builtin::Panic => {
                let value = args.into_iter().next().unwrap_or(Value::Nil);
                Err(self.make_panic(value, &sc.file, pos))
            }
            Builtin::Recover => Ok(self.recover_active_panic()),
            Builtin::Close => Ok(Value::Nil),
            Builtin::Complex => Ok(Value::Symbolic(Rc::new(SymbolicValue {
                ty: Some(Rc::new(TypeDescr::Builtin("complex128".to_owned()))),
            }))),
            Builtin::Real | Builtin::Imag => self.builtin_real_imag(builtin, args, sc, pos),
            Builtin::Clear => self.builtin_clear(args, sc, pos),
            Builtin::Readln => Ok(self.input.read_line().map_or(Value::Nil, Value::str)),
        }
    }

    fn builtin_len(&mut self, args: Vec<Value>, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        let [value] = take_args::<1>(self, args, "len", sc, pos)?;
        match &value {
            Value::Str(s) => Ok(Value::Int(s.len() as i64)),
            Value::Array(arr) => Ok(Value::Int(arr.borrow().elems.len() as i64)),
            Value::Map(map) => Ok(Value::Int(map.borrow().entries.len() as i64)),
            Value::Nil | Value::TypedNil(_) => Ok(Value::Int(0)),
            Value::Symbolic(_) => Ok(self.symbolic(Some(Rc::new(TypeDescr::Builtin("int".to_owned()))), sc, pos)),
            other => Err(self.fail(
                ErrorKind::Type,
                format!("invalid argument to len: {}", other.type_name()),
                &sc.file,
                pos,
            )),
        }
    }

    fn builtin_cap(&mut self, args: Vec<Value>, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        let [value] = take_args::<1>(self, args, "cap", sc, pos)?;
        match &value {
            Value::Array(arr) => Ok(Value::Int(arr.borrow().elems.len() as i64)),
            Value::Nil | Value::TypedNil(_) => Ok(Value::Int(0)),
            Value::Symbolic(_) => Ok(self.symbolic(Some(Rc::new(TypeDescr::Builtin("int".to_owned()))), sc, pos)),
            other => Err(self.fail(
                ErrorKind::Type,
                format!("invalid argument to cap: {}", other.type_name()),
                &sc.file,
                pos,
            )),
        }
    }

    fn builtin_copy(&mut self, args: Vec<Value>, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        let [dst, src] = take_args::<2>(self, args, "copy", sc, pos)?;
        let (Value::Array(dst), Value::Array(src)) = (&dst, &src) else {
            return Err(self.fail(ErrorKind::Type, "copy expects slice arguments", &sc.file, pos));
        };
        if Rc::ptr_eq(dst, src) {
            return Ok(Value::Int(dst.borrow().elems.len() as i64));
        }
        let src = src.borrow();
        let mut dst = dst.borrow_mut();
        let n = dst.elems.len().min(src.elems.len());
        for i in 0..n {
            dst.elems[i] = src.elems[i].copy_for_assign();
        }
        Ok(Value::Int(n as i64))
    }

    fn builtin_delete(&mut self, args: Vec<Value>, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        let [map, key] = take_args::<2>(self, args, "delete", sc, pos)?;
        let Value::Map(map) = &map else {
            return Err(self.fail(ErrorKind::Type, "delete expects a map", &sc.file, pos));
        };
        let Some(hash) = key.hash_key() else {
            return Err(self.fail(
                ErrorKind::Type,
                format!("map key of type {} is not hashable", key.type_name()),
                &sc.file,
                pos,
            ));
        };
        map.borrow_mut().entries.shift_remove(&hash);
        Ok(Value::Nil)
    }

    fn builtin_make(&mut self, mut args: Vec<Value>, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        if args.is_empty() {
            return Err(self.fail(ErrorKind::Type, "make expects a type argument", &sc.file, pos));
        }
        let rest = args.split_off(1);
        let Value::Type(ty) = args.remove(0) else {
            return Err(self.fail(ErrorKind::Type, "make expects a type argument", &sc.file, pos));
        };
        let shape = self.underlying(&ty, sc, pos)?;
        match &*shape {
            TypeDescr::Array(elem) => {
                let n = match rest.first() {
                    Some(Value::Int(n)) if *n >= 0 => *n as usize,
                    None => 0,
                    _ => return Err(self.fail(ErrorKind::Type, "make: length must be a non-negative integer", &sc.file, pos)),
                };
                let mut elems = Vec::with_capacity(n);
                for _ in 0..n {
                    let zero = match elem {
                        Some(elem) => self.zero_value(elem, sc, pos)?,
                        None => Value::Nil,
                    };
                    elems.push(zero);
                }
                Ok(Value::Array(Rc::new(RefCell::new(ArrayValue {
                    elem_ty: elem.clone(),
                    elems,
                }))))
            }
            TypeDescr::Map(key_ty, val_ty) => Ok(Value::Map(Rc::new(RefCell::new(MapValue {
                key_ty: key_ty.clone(),
                val_ty: val_ty.clone(),
                entries: indexmap::IndexMap::new(),
            })))),
            TypeDescr::Chan(_) => Ok(self.symbolic(Some(Rc::clone(&ty)), sc, pos)),
            TypeDescr::Unresolved { .. } => Ok(self.symbolic(Some(Rc::clone(&ty)), sc, pos)),
            other => Err(self.fail(
                ErrorKind::Type,
                format!("cannot make {}", other.display_name()),
                &sc.file,
                pos,
            )),
        }
    }

    fn builtin_append(&mut self, mut args: Vec<Value>, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        if args.is_empty() {
            return Err(self.fail(ErrorKind::Type, "append expects a slice argument", &sc.file, pos));
        }
        let rest = args.split_off(1);
        let base = args.remove(0);
        let (elem_ty, mut elems) = match &base {
            Value::Array(arr) => {
                let arr = arr.borrow();
                (arr.elem_ty.clone(), arr.elems.clone())
            }
            Value::Nil => (None, Vec::new()),
            Value::TypedNil(ty) => match &**ty {
                TypeDescr::Array(elem) => (elem.clone(), Vec::new()),
                _ => (None, Vec::new()),
            },
            Value::Symbolic(_) => return Ok(self.symbolic(base.type_descr(), sc, pos)),
            other => {
                return Err(self.fail(
                    ErrorKind::Type,
                    format!("append expects a slice, got {}", other.type_name()),
                    &sc.file,
                    pos,
                ));
            }
        };
        for value in rest {
            elems.push(value.copy_for_assign());
        }
        Ok(Value::Array(Rc::new(RefCell::new(ArrayValue { elem_ty, elems }))))
    }

    fn builtin_new(&mut self, args: Vec<Value>, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        let [arg] = take_args::<1>(self, args, "new", sc, pos)?;
        let Value::Type(ty) = arg else {
            return Err(self.fail(ErrorKind::Type, "new expects a type argument", &sc.file, pos));
        };
        let zero = self.zero_value(&ty, sc, pos)?;
        Ok(Value::Pointer(PointerValue {
            target: Rc::new(RefCell::new(zero)),
            ty: Some(Rc::new(TypeDescr::Pointer(ty))),
        }))
    }

    fn builtin_min_max(&mut self, args: Vec<Value>, sc: &EvalScope, pos: Pos, min: bool) -> EvalResult<Value> {
        if args.is_empty() {
            let name = if min { "min" } else { "max" };
            return Err(self.fail(ErrorKind::Type, format!("{name} expects at least one argument"), &sc.file, pos));
        }
        let mut best = args[0].clone();
        for value in &args[1..] {
            let keep_new = match (&best, value) {
                (Value::Int(a), Value::Int(b)) => (b < a) == min,
                (Value::Float(a), Value::Float(b)) => (b < a) == min,
                (Value::Int(a), Value::Float(b)) => (*b < *a as f64) == min,
                (Value::Float(a), Value::Int(b)) => ((*b as f64) < *a) == min,
                (Value::Str(a), Value::Str(b)) => (b < a) == min,
                _ => {
                    return Err(self.fail(
                        ErrorKind::Type,
                        "min/max arguments must be ordered values",
                        &sc.file,
                        pos,
                    ));
                }
            };
            if keep_new {
                best = value.clone();
            }
        }
        Ok(best)
    }

    fn builtin_real_imag(&mut self, builtin: Builtin, args: Vec<Value>, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        let name = if builtin == Builtin::Real { "real" } else { "imag" };
        let [value] = take_args::<1>(self, args, name, sc, pos)?;
        match value {
            Value::Float(v) => Ok(Value::Float(if builtin == Builtin::Real { v } else { 0.0 })),
            Value::Int(v) => Ok(Value::Float(if builtin == Builtin::Real { v as f64 } else { 0.0 })),
            Value::Symbolic(_) => {
                Ok(self.symbolic(Some(Rc::new(TypeDescr::Builtin("float64".to_owned()))), sc, pos))
            }
            other => Err(self.fail(
                ErrorKind::Type,
                format!("invalid argument to {name}: {}", other.type_name()),
                &sc.file,
                pos,
            )),
        }
    }

    fn builtin_clear(&mut self, args: Vec<Value>, sc: &EvalScope, pos: Pos) -> EvalResult<Value> {
        let [value] = take_args::<1>(self, args, "clear", sc, pos)?;
        match &value {
            Value::Map(map) => {
                map.borrow_mut().entries.clear();
                Ok(Value::Nil)
            }
            Value::Array(arr) => {
                let mut arr = arr.borrow_mut();
                let zero = match &arr.elem_ty {
                    Some(elem) => self.zero_value(&Rc::clone(elem), sc, pos)?,
                    None => Value::Nil,
                };
                for slot in &mut arr.elems {
                    *slot = zero.copy_for_assign();
                }
                Ok(Value::Nil)
            }
            Value::Nil | Value::TypedNil(_) => Ok(Value::Nil),
            other => Err(self.fail(
                ErrorKind::Type,
                format!("invalid argument to clear: {}", other.type_name()),
                &sc.file,
                pos,
            )),
        }
    }
}

/// Pulls an exact argument count out, with a uniform arity error.
fn take_args<const N: usize>(
    interp: &Interpreter,
    args: Vec<Value>,
    name: &str,
    sc: &EvalScope,
    pos: Pos,
) -> Result<[Value; N], Flow> {
    let got = args.len();
    args.try_into().map_err(|_| {
        interp.fail(
            ErrorKind::Type,
            format!("wrong number of arguments to {name}: want {N}, got {got}"),
            &sc.file,
            pos,
        )
    })
}
