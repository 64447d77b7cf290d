//! The runtime value universe.
//!
//! One tagged enum carries every value the evaluator can produce: scalars,
//! containers, struct instances, pointers, closures, bound methods, type
//! descriptors in value position, packages, host intrinsics, and the
//! symbolic placeholders that stand in for values from shallow-scanned
//! packages. Control signals do NOT live here — they ride the error
//! channel of `EvalResult` (see [`crate::error::Flow`]) so `?` propagates
//! them.
//!
//! Sharing rules: `Pointer` copies share their target cell, `Array` and
//! `Map` share their backing store on assignment, `Struct` deep-copies on
//! assignment and on value-receiver binding (see `copy_for_assign`).

use std::{cell::RefCell, fmt::Write as _, rc::Rc};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::Display;

use argus_syntax::ast;

use crate::{
    builtins::Builtin,
    intrinsics::IntrinsicFn,
    packages::Package,
    scope::FileScope,
    types::{FuncTypeDescr, InterfaceDef, StructDef, TypeDescr},
    env::Env,
};

/// A runtime value.
#[derive(Debug, Clone)]
pub(crate) enum Value {
    /// The untyped nil literal.
    Nil,
    /// A nil carrying a type descriptor (nil pointer, map, slice or
    /// interface of a known type). Selectors on a typed-nil pointer still
    /// resolve to method values.
    TypedNil(Rc<TypeDescr>),
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Array(Rc<RefCell<ArrayValue>>),
    Map(Rc<RefCell<MapValue>>),
    Struct(Rc<RefCell<StructValue>>),
    Pointer(PointerValue),
    Interface(Box<InterfaceValue>),
    Func(Rc<FuncValue>),
    BoundMethod(Rc<BoundMethod>),
    /// One of the always-present built-in functions (`len`, `append`, ...).
    Builtin(Builtin),
    /// A host-registered callable.
    Intrinsic(Rc<IntrinsicFn>),
    /// A type descriptor in value position, for conversions, composite
    /// literals, `make`, and type assertions.
    Type(Rc<TypeDescr>),
    Package(Rc<Package>),
    /// Stands for a value whose concrete content is unknown; the static
    /// type may still be known.
    Symbolic(Rc<SymbolicValue>),
    /// A callable produced by selecting a method on a symbolic value.
    SymbolicMethod(Rc<SymbolicMethod>),
    /// A value-position selector into a shallow-scanned package; resolves
    /// (symbolically) at call time.
    UnresolvedFunc(Rc<UnresolvedFunc>),
    /// Multiple values in flight from a multi-result call.
    Tuple(Vec<Value>),
}

/// Array and slice backing store.
#[derive(Debug)]
pub(crate) struct ArrayValue {
    pub elem_ty: Option<Rc<TypeDescr>>,
    pub elems: Vec<Value>,
}

/// Keys usable in interpreter maps. Values without a hash key cannot be
/// map keys; using one fails with a not-hashable error at the use site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) enum HashKey {
    Int(i64),
    Str(String),
    Bool(bool),
}

/// Map backing store. Entries keep the original key value alongside the
/// stored value; iteration order is insertion order and deliberately
/// unspecified to consumers.
#[derive(Debug)]
pub(crate) struct MapValue {
    pub key_ty: Option<Rc<TypeDescr>>,
    pub val_ty: Option<Rc<TypeDescr>>,
    pub entries: IndexMap<HashKey, (Value, Value)>,
}

/// An instance of a named struct type.
///
/// Invariant: `fields` holds a binding for every declared field, zero
/// initialized at construction.
#[derive(Debug)]
pub(crate) struct StructValue {
    pub def: Rc<StructDef>,
    pub type_args: Vec<Rc<TypeDescr>>,
    pub fields: IndexMap<String, Value>,
}

/// A pointer: shared mutable reference to an interpreter-owned cell.
/// Copying the pointer copies the reference, never the cell.
#[derive(Debug, Clone)]
pub(crate) struct PointerValue {
    pub target: Rc<RefCell<Value>>,
    pub ty: Option<Rc<TypeDescr>>,
}

/// A concrete value boxed against an interface type for method-set
/// tracking.
#[derive(Debug, Clone)]
pub(crate) struct InterfaceValue {
    pub def: Rc<InterfaceDef>,
    pub concrete: Value,
}

/// A function: top-level declarations, methods, and closures alike.
#[derive(Debug)]
pub(crate) struct FuncValue {
    pub name: Option<String>,
    pub recv: Option<ast::Receiver>,
    pub sig: ast::FuncSig,
    /// Absent for bodyless (external stub) declarations.
    pub body: Option<ast::Block>,
    /// Captured lexical environment.
    pub env: Env,
    pub file: Option<Rc<FileScope>>,
    pub file_name: String,
    pub pkg_path: Option<String>,
}

impl FuncValue {
    /// Fully qualified name for intrinsic interception and tracing:
    /// `pkg/path.Name`, `(*pkg/path.Type).Method`, or the bare name for
    /// closures.
    pub fn fq_name(&self) -> String {
        let name = self.name.as_deref().unwrap_or("<func>");
        let Some(pkg) = self.pkg_path.as_deref().filter(|p| !p.is_empty()) else {
            return name.to_owned();
        };
        match &self.recv {
            Some(recv) if recv.pointer => format!("(*{pkg}.{}).{name}", recv.type_name.name),
            Some(recv) => format!("({pkg}.{}).{name}", recv.type_name.name),
            None => format!("{pkg}.{name}"),
        }
    }
}

/// A method captured together with its receiver.
#[derive(Debug)]
pub(crate) struct BoundMethod {
    pub func: Rc<FuncValue>,
    pub receiver: Value,
}

/// A placeholder for an unknown value, optionally typed.
#[derive(Debug)]
pub(crate) struct SymbolicValue {
    pub ty: Option<Rc<TypeDescr>>,
}

/// A callable selector on a symbolic or unresolved-typed value.
///
/// `results` is `None` when the signature could not be obtained (one
/// untyped placeholder on call), `Some(types)` when declared returns are
/// known.
#[derive(Debug)]
pub(crate) struct SymbolicMethod {
    pub fq: String,
    pub results: Option<Vec<Rc<TypeDescr>>>,
}

/// A deferred selector into a shallow-scanned package.
#[derive(Debug)]
pub(crate) struct UnresolvedFunc {
    pub pkg_path: String,
    pub name: String,
}

impl UnresolvedFunc {
    pub fn fq_name(&self) -> String {
        format!("{}.{}", self.pkg_path, self.name)
    }
}

/// Discriminant names exposed by `type_tag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum Tag {
    Nil,
    Bool,
    Int,
    Float,
    String,
    Array,
    Map,
    Struct,
    Pointer,
    Interface,
    Func,
    BoundMethod,
    Builtin,
    Intrinsic,
    Type,
    Package,
    Symbolic,
    SymbolicMethod,
    UnresolvedFunc,
    Tuple,
}

impl Value {
    /// An interned empty-ish string constructor.
    pub fn str(s: impl AsRef<str>) -> Self {
        Self::Str(Rc::from(s.as_ref()))
    }

    pub fn type_tag(&self) -> Tag {
        match self {
            Self::Nil | Self::TypedNil(_) => Tag::Nil,
            Self::Bool(_) => Tag::Bool,
            Self::Int(_) => Tag::Int,
            Self::Float(_) => Tag::Float,
            Self::Str(_) => Tag::String,
            Self::Array(_) => Tag::Array,
            Self::Map(_) => Tag::Map,
            Self::Struct(_) => Tag::Struct,
            Self::Pointer(_) => Tag::Pointer,
            Self::Interface(_) => Tag::Interface,
            Self::Func(_) => Tag::Func,
            Self::BoundMethod(_) => Tag::BoundMethod,
            Self::Builtin(_) => Tag::Builtin,
            Self::Intrinsic(_) => Tag::Intrinsic,
            Self::Type(_) => Tag::Type,
            Self::Package(_) => Tag::Package,
            Self::Symbolic(_) => Tag::Symbolic,
            Self::SymbolicMethod(_) => Tag::SymbolicMethod,
            Self::UnresolvedFunc(_) => Tag::UnresolvedFunc,
            Self::Tuple(_) => Tag::Tuple,
        }
    }

    /// Whether the value is nil of either kind.
    pub fn is_nil(&self) -> bool {
        match self {
            Self::Nil | Self::TypedNil(_) => true,
            Self::Interface(iface) => iface.concrete.is_nil(),
            _ => false,
        }
    }

    /// The hash key for map storage; `None` for unhashable values.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Self::Int(v) => Some(HashKey::Int(*v)),
            Self::Str(s) => Some(HashKey::Str(s.to_string())),
            Self::Bool(b) => Some(HashKey::Bool(*b)),
            Self::Interface(iface) => iface.concrete.hash_key(),
            _ => None,
        }
    }

    /// Human-readable rendering, stable enough for test oracles. Strings
    /// are quoted; use [`Self::display_str`] for `print` output.
    pub fn inspect(&self) -> String {
        match self {
            Self::Str(s) => format!("{s:?}"),
            other => other.display_str(),
        }
    }

    /// The `print`/`println` rendering: strings raw, containers recursive.
    pub fn display_str(&self) -> String {
        match self {
            Self::Nil => "nil".to_owned(),
            Self::TypedNil(ty) => format!("(nil {})", ty.display_name()),
            Self::Bool(b) => b.to_string(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => {
                if v.fract() == 0.0 && v.is_finite() {
                    format!("{v:.0}")
                } else {
                    v.to_string()
                }
            }
            Self::Str(s) => s.to_string(),
            Self::Array(arr) => {
                let arr = arr.borrow();
                let mut out = String::from("[");
                for (i, elem) in arr.elems.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    out.push_str(&elem.display_str());
                }
                out.push(']');
                out
            }
            Self::Map(map) => {
                let map = map.borrow();
                let mut out = String::from("map[");
                for (i, (key, value)) in map.entries.values().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    let _ = write!(out, "{}:{}", key.display_str(), value.display_str());
                }
                out.push(']');
                out
            }
            Self::Struct(st) => {
                let st = st.borrow();
                let mut out = String::new();
                if !st.def.name.is_empty() {
                    out.push_str(&st.def.name);
                }
                out.push('{');
                for (i, (name, value)) in st.fields.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    let _ = write!(out, "{name}:{}", value.display_str());
                }
                out.push('}');
                out
            }
            Self::Pointer(ptr) => format!("&{}", ptr.target.borrow().display_str()),
            Self::Interface(iface) => iface.concrete.display_str(),
            Self::Func(func) => format!("func {}", func.fq_name()),
            Self::BoundMethod(bound) => format!("bound {}", bound.func.fq_name()),
            Self::Builtin(builtin) => format!("builtin {builtin}"),
            Self::Intrinsic(intrinsic) => format!("intrinsic {}", intrinsic.name),
            Self::Type(ty) => ty.display_name(),
            Self::Package(pkg) => format!("package {}", pkg.import_path),
            Self::Symbolic(sym) => match &sym.ty {
                Some(ty) => format!("symbolic<{}>", ty.display_name()),
                None => "symbolic".to_owned(),
            },
            Self::SymbolicMethod(method) => format!("symbolic method {}", method.fq),
            Self::UnresolvedFunc(func) => format!("unresolved {}", func.fq_name()),
            Self::Tuple(values) => {
                let parts: Vec<String> = values.iter().map(Self::display_str).collect();
                format!("({})", parts.join(", "))
            }
        }
    }

    /// Assignment-flow copy.
    ///
    /// Structs copy field-by-field (each field by the same rule); arrays,
    /// maps and pointers share; scalars are `Copy`-like. Applied uniformly
    /// at declarations, assignments, parameter binding and composite
    /// literal elements.
    pub fn copy_for_assign(&self) -> Self {
        match self {
            Self::Struct(st) => {
                let st = st.borrow();
                let fields = st
                    .fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.copy_for_assign()))
                    .collect();
                Self::Struct(Rc::new(RefCell::new(StructValue {
                    def: Rc::clone(&st.def),
                    type_args: st.type_args.clone(),
                    fields,
                })))
            }
            Self::Interface(iface) => Self::Interface(Box::new(InterfaceValue {
                def: Rc::clone(&iface.def),
                concrete: iface.concrete.copy_for_assign(),
            })),
            other => other.clone(),
        }
    }

    /// The value's dynamic type descriptor, when one is known.
    pub fn type_descr(&self) -> Option<Rc<TypeDescr>> {
        match self {
            Self::Nil => None,
            Self::TypedNil(ty) => Some(Rc::clone(ty)),
            Self::Bool(_) => Some(Rc::new(TypeDescr::Builtin("bool".to_owned()))),
            Self::Int(_) => Some(Rc::new(TypeDescr::Builtin("int".to_owned()))),
            Self::Float(_) => Some(Rc::new(TypeDescr::Builtin("float64".to_owned()))),
            Self::Str(_) => Some(Rc::new(TypeDescr::Builtin("string".to_owned()))),
            Self::Array(arr) => Some(Rc::new(TypeDescr::Array(arr.borrow().elem_ty.clone()))),
            Self::Map(map) => {
                let map = map.borrow();
                Some(Rc::new(TypeDescr::Map(map.key_ty.clone(), map.val_ty.clone())))
            }
            Self::Struct(st) => {
                let st = st.borrow();
                let base = Rc::new(TypeDescr::Struct(Rc::clone(&st.def)));
                if st.type_args.is_empty() {
                    Some(base)
                } else {
                    Some(Rc::new(TypeDescr::Instantiated {
                        generic: base,
                        args: st.type_args.clone(),
                    }))
                }
            }
            Self::Pointer(ptr) => match &ptr.ty {
                Some(ty) => Some(Rc::clone(ty)),
                None => {
                    let inner = ptr.target.borrow().type_descr()?;
                    Some(Rc::new(TypeDescr::Pointer(inner)))
                }
            },
            Self::Interface(iface) => Some(Rc::new(TypeDescr::Interface(Rc::clone(&iface.def)))),
            Self::Func(func) => Some(Rc::new(TypeDescr::Func(Rc::new(FuncTypeDescr {
                params: Vec::new(),
                results: Vec::new(),
                variadic: func.sig.variadic,
            })))),
            Self::Symbolic(sym) => sym.ty.clone(),
            _ => None,
        }
    }

    /// The name the value's type prints as in diagnostics.
    pub fn type_name(&self) -> String {
        match self.type_descr() {
            Some(ty) => ty.display_name(),
            None => self.type_tag().to_string(),
        }
    }

    /// Truthiness, defined only for booleans. Symbolic conditions evaluate
    /// as false so evaluation continues down one concrete path.
    pub fn truthy(&self) -> Result<bool, String> {
        match self {
            Self::Bool(b) => Ok(*b),
            Self::Symbolic(_) => Ok(false),
            other => Err(format!("non-boolean condition of type {}", other.type_name())),
        }
    }
}

/// Structural equality for scalars, nil-aware symmetry, identity for
/// reference shapes, field-wise for structs.
pub(crate) fn value_eq(a: &Value, b: &Value) -> bool {
    if a.is_nil() || b.is_nil() {
        return a.is_nil() && b.is_nil();
    }
    match (a, b) {
        (Value::Interface(ia), _) => value_eq(&ia.concrete, b),
        (_, Value::Interface(ib)) => value_eq(a, &ib.concrete),
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => (*x as f64) == *y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Pointer(x), Value::Pointer(y)) => Rc::ptr_eq(&x.target, &y.target),
        (Value::Array(x), Value::Array(y)) => Rc::ptr_eq(x, y),
        (Value::Map(x), Value::Map(y)) => Rc::ptr_eq(x, y),
        (Value::Func(x), Value::Func(y)) => Rc::ptr_eq(x, y),
        (Value::Struct(x), Value::Struct(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.fields.len() == y.fields.len()
                && x.fields
                    .iter()
                    .all(|(name, value)| y.fields.get(name).is_some_and(|other| value_eq(value, other)))
        }
        (Value::Type(x), Value::Type(y)) => crate::types::same_type(x, y),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untyped_and_typed_nil_compare_equal() {
        let typed = Value::TypedNil(Rc::new(TypeDescr::Builtin("int".to_owned())));
        assert!(value_eq(&Value::Nil, &typed));
        assert!(value_eq(&typed, &Value::Nil));
    }

    #[test]
    fn pointer_copies_share_their_target() {
        let cell = Rc::new(RefCell::new(Value::Int(1)));
        let p = Value::Pointer(PointerValue {
            target: Rc::clone(&cell),
            ty: None,
        });
        let q = p.clone();
        if let Value::Pointer(ptr) = &q {
            *ptr.target.borrow_mut() = Value::Int(2);
        }
        assert!(matches!(&*cell.borrow(), Value::Int(2)));
        assert!(value_eq(&p, &q), "copies of one pointer compare equal");
    }

    #[test]
    fn hash_key_defined_only_for_scalars() {
        assert_eq!(Value::Int(3).hash_key(), Some(HashKey::Int(3)));
        assert_eq!(Value::str("k").hash_key(), Some(HashKey::Str("k".into())));
        assert_eq!(Value::Bool(true).hash_key(), Some(HashKey::Bool(true)));
        let arr = Value::Array(Rc::new(RefCell::new(ArrayValue {
            elem_ty: None,
            elems: vec![],
        })));
        assert_eq!(arr.hash_key(), None);
    }

    #[test]
    fn inspect_quotes_strings_display_does_not() {
        let s = Value::str("hi");
        assert_eq!(s.inspect(), "\"hi\"");
        assert_eq!(s.display_str(), "hi");
    }
}
