//! The foreign-value bridge.
//!
//! [`HostValue`] is the public value shape that crosses between host code
//! and the value universe. [`HostFunction`] wraps a precompiled host
//! callable so interpreted code can invoke it: arity, variadic-ness and
//! parameter kinds come from the declared signature, argument conversion
//! runs per parameter, and a dedicated path passes an interpreter
//! `Pointer` into a host-struct slot and writes the mutations back into
//! the struct instance field by field, keyed by field tag.
//!
//! Host panics are caught and re-injected as interpreter panics;
//! conversion failures surface as Foreign errors.

use std::{
    cell::RefCell,
    panic::{catch_unwind, AssertUnwindSafe},
    rc::Rc,
};

use serde::{Deserialize, Serialize};

use argus_syntax::Pos;

use crate::{
    error::{ErrorKind, EvalError, EvalResult, Flow},
    interp::Interpreter,
    intrinsics::NativeFn,
    types::TypeDescr,
    value::{ArrayValue, MapValue, StructValue, Value},
};

/// A value as the host sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<HostValue>),
    /// Key/value pairs in iteration order.
    Map(Vec<(HostValue, HostValue)>),
    /// A struct snapshot: type name plus field name/value pairs.
    Struct {
        name: String,
        fields: Vec<(String, HostValue)>,
    },
    /// Multiple return values.
    Tuple(Vec<HostValue>),
    /// A symbolic placeholder that crossed the bridge.
    Symbolic { type_name: Option<String> },
    /// Anything without a faithful host rendering, by its `inspect` text.
    Opaque(String),
}

/// Parameter kinds a host function declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostParam {
    Int,
    Float,
    Str,
    Bool,
    List,
    Map,
    /// Anything, converted with [`value_to_host`].
    Any,
    /// A mutable host-struct slot fed from an interpreter pointer; field
    /// changes write back by tag. The string names the expected struct
    /// type, for diagnostics.
    StructRef(String),
}

type HostCallback = Rc<dyn Fn(&mut [HostValue]) -> Result<HostValue, String>>;

/// A precompiled host function exposed to interpreted code.
pub struct HostFunction {
    name: String,
    params: Vec<HostParam>,
    variadic: bool,
    f: HostCallback,
}

impl HostFunction {
    pub fn new(
        name: impl Into<String>,
        params: Vec<HostParam>,
        variadic: bool,
        f: impl Fn(&mut [HostValue]) -> Result<HostValue, String> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            variadic,
            f: Rc::new(f),
        }
    }
}

/// Converts a runtime value into the host shape.
pub(crate) fn value_to_host(value: &Value) -> HostValue {
    match value {
        Value::Nil | Value::TypedNil(_) => HostValue::Nil,
        Value::Bool(b) => HostValue::Bool(*b),
        Value::Int(v) => HostValue::Int(*v),
        Value::Float(v) => HostValue::Float(*v),
        Value::Str(s) => HostValue::Str(s.to_string()),
        Value::Array(arr) => HostValue::List(arr.borrow().elems.iter().map(value_to_host).collect()),
        Value::Map(map) => HostValue::Map(
            map.borrow()
                .entries
                .values()
                .map(|(k, v)| (value_to_host(k), value_to_host(v)))
                .collect(),
        ),
        Value::Struct(sv) => {
            let sv = sv.borrow();
            HostValue::Struct {
                name: sv.def.name.clone(),
                fields: sv.fields.iter().map(|(name, v)| (name.clone(), value_to_host(v))).collect(),
            }
        }
        Value::Pointer(ptr) => value_to_host(&ptr.target.borrow()),
        Value::Interface(iface) => value_to_host(&iface.concrete),
        Value::Tuple(values) => HostValue::Tuple(values.iter().map(value_to_host).collect()),
        Value::Symbolic(sym) => HostValue::Symbolic {
            type_name: sym.ty.as_ref().map(|t| t.display_name()),
        },
        other => HostValue::Opaque(other.inspect()),
    }
}

/// Converts a host value into the value universe. Host structs come back
/// as opaque symbolic values: the interpreter has no definition to attach
/// them to.
pub(crate) fn host_to_value(hv: &HostValue) -> Value {
    match hv {
        HostValue::Nil => Value::Nil,
        HostValue::Bool(b) => Value::Bool(*b),
        HostValue::Int(v) => Value::Int(*v),
        HostValue::Float(v) => Value::Float(*v),
        HostValue::Str(s) => Value::str(s),
        HostValue::List(items) => Value::Array(Rc::new(RefCell::new(ArrayValue {
            elem_ty: None,
            elems: items.iter().map(host_to_value).collect(),
        }))),
        HostValue::Map(pairs) => {
            let mut entries = indexmap::IndexMap::new();
            for (key, value) in pairs {
                let key_value = host_to_value(key);
                if let Some(hash) = key_value.hash_key() {
                    entries.insert(hash, (key_value, host_to_value(value)));
                }
            }
            Value::Map(Rc::new(RefCell::new(MapValue {
                key_ty: None,
                val_ty: None,
                entries,
            })))
        }
        HostValue::Tuple(values) => Value::Tuple(values.iter().map(host_to_value).collect()),
        HostValue::Struct { name, .. } => Value::Symbolic(Rc::new(crate::value::SymbolicValue {
            ty: Some(Rc::new(TypeDescr::Unresolved {
                pkg_path: "<host>".to_owned(),
                name: name.clone(),
            })),
        })),
        HostValue::Symbolic { .. } | HostValue::Opaque(_) => {
            Value::Symbolic(Rc::new(crate::value::SymbolicValue { ty: None }))
        }
    }
}

/// Wraps a [`HostFunction`] into the internal intrinsic shape.
pub(crate) fn wrap_host_function(host_fn: HostFunction) -> NativeFn {
    Rc::new(move |interp: &mut Interpreter, args: Vec<Value>, pos: Pos| {
        call_host_function(interp, &host_fn, args, pos)
    })
}

fn call_host_function(interp: &mut Interpreter, host_fn: &HostFunction, args: Vec<Value>, pos: Pos) -> EvalResult<Value> {
    let file = interp.current_file();
    let fixed = if host_fn.variadic {
        host_fn.params.len().saturating_sub(1)
    } else {
        host_fn.params.len()
    };
    let arity_ok = if host_fn.variadic {
        args.len() >= fixed
    } else {
        args.len() == host_fn.params.len()
    };
    if !arity_ok {
        return Err(interp.fail(
            ErrorKind::Foreign,
            format!(
                "wrong number of arguments to {}: want {}{}, got {}",
                host_fn.name,
                fixed,
                if host_fn.variadic { "+" } else { "" },
                args.len()
            ),
            &file,
            pos,
        ));
    }

    // Per-parameter conversion; pointer-to-struct params remember the
    // interpreter-side instance for write-back.
    let mut host_args: Vec<HostValue> = Vec::with_capacity(args.len());
    let mut write_backs: Vec<(usize, Rc<RefCell<StructValue>>)> = Vec::new();
    for (i, value) in args.iter().enumerate() {
        let param = host_fn.params.get(i.min(fixed)).unwrap_or(&HostParam::Any);
        match convert_arg(value, param) {
            Ok(ConvertedArg::Plain(hv)) => host_args.push(hv),
            Ok(ConvertedArg::StructSlot(hv, sv)) => {
                write_backs.push((host_args.len(), sv));
                host_args.push(hv);
            }
            Err(message) => {
                return Err(interp.fail(
                    ErrorKind::Foreign,
                    format!("{}: argument {}: {message}", host_fn.name, i + 1),
                    &file,
                    pos,
                ));
            }
        }
    }

    // Host panics re-enter the interpreter as panics, not aborts.
    let f = Rc::clone(&host_fn.f);
    let call_result = catch_unwind(AssertUnwindSafe(|| f(&mut host_args)));
    let result = match call_result {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "host panic".to_owned());
            return Err(interp.make_panic(Value::str(message), &file, pos));
        }
    };

    // Push host-side struct mutations back into the instances, matching
    // fields by tag first, then by name.
    for (index, sv) in write_backs {
        if let Some(HostValue::Struct { fields, .. }) = host_args.get(index) {
            write_back_struct(&sv, fields);
        }
    }

    match result {
        Ok(hv) => Ok(host_to_value(&hv)),
        Err(message) => Err(Flow::Err(interp.attach_stack(EvalError::new(
            ErrorKind::Foreign,
            format!("{}: {message}", host_fn.name),
            file,
            pos,
        )))),
    }
}

enum ConvertedArg {
    Plain(HostValue),
    StructSlot(HostValue, Rc<RefCell<StructValue>>),
}

fn convert_arg(value: &Value, param: &HostParam) -> Result<ConvertedArg, String> {
    let plain = |hv| Ok(ConvertedArg::Plain(hv));
    match param {
        HostParam::Any => plain(value_to_host(value)),
        HostParam::Int => match value {
            Value::Int(v) => plain(HostValue::Int(*v)),
            Value::Float(v) => plain(HostValue::Int(*v as i64)),
            Value::Symbolic(_) => plain(HostValue::Symbolic { type_name: None }),
            other => Err(format!("cannot pass {} as int", other.type_name())),
        },
        HostParam::Float => match value {
            Value::Float(v) => plain(HostValue::Float(*v)),
            // Numeric widening is tolerated on the way out.
            Value::Int(v) => plain(HostValue::Float(*v as f64)),
            Value::Symbolic(_) => plain(HostValue::Symbolic { type_name: None }),
            other => Err(format!("cannot pass {} as float", other.type_name())),
        },
        HostParam::Str => match value {
            Value::Str(s) => plain(HostValue::Str(s.to_string())),
            // Byte-slice/string adjacency.
            Value::Array(arr) => {
                let arr = arr.borrow();
                let mut out = String::with_capacity(arr.elems.len());
                for elem in &arr.elems {
                    match elem {
                        Value::Int(v) => match u32::try_from(*v).ok().and_then(char::from_u32) {
                            Some(ch) => out.push(ch),
                            None => return Err("byte slice holds a non-character value".to_owned()),
                        },
                        other => return Err(format!("cannot pass {} element as byte", other.type_name())),
                    }
                }
                plain(HostValue::Str(out))
            }
            Value::Symbolic(_) => plain(HostValue::Symbolic { type_name: None }),
            other => Err(format!("cannot pass {} as string", other.type_name())),
        },
        HostParam::Bool => match value {
            Value::Bool(b) => plain(HostValue::Bool(*b)),
            Value::Symbolic(_) => plain(HostValue::Symbolic { type_name: None }),
            other => Err(format!("cannot pass {} as bool", other.type_name())),
        },
        HostParam::List => match value {
            Value::Array(_) | Value::Nil | Value::TypedNil(_) => plain(value_to_host(value)),
            other => Err(format!("cannot pass {} as list", other.type_name())),
        },
        HostParam::Map => match value {
            Value::Map(_) | Value::Nil | Value::TypedNil(_) => plain(value_to_host(value)),
            other => Err(format!("cannot pass {} as map", other.type_name())),
        },
        HostParam::StructRef(expected) => match value {
            Value::Pointer(ptr) => {
                let target = ptr.target.borrow();
                let Value::Struct(sv) = &*target else {
                    return Err(format!("pointer does not reference a struct (want {expected})"));
                };
                let sv = Rc::clone(sv);
                let snapshot = {
                    let borrowed = sv.borrow();
                    HostValue::Struct {
                        name: borrowed.def.name.clone(),
                        fields: borrowed
                            .fields
                            .iter()
                            .map(|(name, v)| {
                                let key = borrowed
                                    .def
                                    .field(name)
                                    .and_then(|f| f.tag.as_deref())
                                    .and_then(parse_tag_key)
                                    .unwrap_or_else(|| name.clone());
                                (key, value_to_host(v))
                            })
                            .collect(),
                    }
                };
                Ok(ConvertedArg::StructSlot(snapshot, sv))
            }
            other => Err(format!("want a pointer to {expected}, got {}", other.type_name())),
        },
    }
}

/// Updates interpreter struct fields from a host snapshot, keyed by field
/// tag with a name fallback.
fn write_back_struct(sv: &Rc<RefCell<StructValue>>, host_fields: &[(String, HostValue)]) {
    for (key, hv) in host_fields {
        let field_name = {
            let borrowed = sv.borrow();
            borrowed
                .def
                .fields
                .iter()
                .find(|f| f.tag.as_deref().and_then(parse_tag_key).as_deref() == Some(key) || &f.name == key)
                .map(|f| f.name.clone())
        };
        if let Some(name) = field_name {
            sv.borrow_mut().fields.insert(name, host_to_value(hv));
        }
    }
}

/// Extracts the lookup key from a struct tag: the first quoted value's
/// leading comma-segment (`json:"count,omitempty"` yields `count`), or
/// the raw tag when it has no conventional shape.
fn parse_tag_key(tag: &str) -> Option<String> {
    let start = tag.find(":\"")? + 2;
    let rest = &tag[start..];
    let end = rest.find('"')?;
    let inner = &rest[..end];
    let key = inner.split(',').next().unwrap_or(inner);
    if key.is_empty() { None } else { Some(key.to_owned()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_key_extraction() {
        assert_eq!(parse_tag_key("json:\"count,omitempty\""), Some("count".to_owned()));
        assert_eq!(parse_tag_key("json:\"n\""), Some("n".to_owned()));
        assert_eq!(parse_tag_key("weird"), None);
    }

    #[test]
    fn scalars_round_trip_through_the_bridge() {
        for hv in [
            HostValue::Nil,
            HostValue::Bool(true),
            HostValue::Int(-3),
            HostValue::Float(1.5),
            HostValue::Str("x".to_owned()),
        ] {
            let value = host_to_value(&hv);
            assert_eq!(value_to_host(&value), hv);
        }
    }

    #[test]
    fn host_struct_becomes_opaque_symbolic() {
        let hv = HostValue::Struct {
            name: "Conn".to_owned(),
            fields: vec![],
        };
        let value = host_to_value(&hv);
        assert!(matches!(value, Value::Symbolic(_)), "got {value:?}");
    }
}
