//! Type descriptors.
//!
//! Descriptors are what the interpreter knows about a type at runtime:
//! enough to construct zero values, dispatch methods, check interface
//! satisfaction, and name the type in diagnostics. They are not a type
//! checker's types — field and underlying types stay as unresolved syntax
//! until something forces them through the resolver, which is what lets
//! self-referential structs and out-of-policy packages work at all.

use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;

use argus_syntax::ast;

use crate::{env::Env, scope::FileScope, value::FuncValue};

/// A method table, keyed by method name in declaration order.
pub(crate) type MethodTable = RefCell<IndexMap<String, Rc<FuncValue>>>;

/// One declared struct field.
#[derive(Debug, Clone)]
pub(crate) struct FieldDef {
    pub name: String,
    /// Field type as written; resolved on demand.
    pub ty: ast::Expr,
    pub embedded: bool,
    pub tag: Option<String>,
}

/// A named (or anonymous) struct definition.
#[derive(Debug)]
pub(crate) struct StructDef {
    /// Empty for anonymous struct types.
    pub name: String,
    /// Empty for structs local to the entry environment.
    pub pkg_path: String,
    pub type_params: Vec<ast::TypeParam>,
    pub fields: Vec<FieldDef>,
    /// Methods attach after the type exists, as function declarations with
    /// receivers are registered.
    pub methods: MethodTable,
    /// Environment the definition was evaluated in; field types resolve
    /// against this, not against the use site.
    pub env: Env,
    pub file: Option<Rc<FileScope>>,
}

impl StructDef {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str) -> Option<Rc<FuncValue>> {
        self.methods.borrow().get(name).cloned()
    }
}

/// A required interface method: name plus arity. Parameter and result
/// types are deliberately not compared during satisfaction checks.
#[derive(Debug, Clone)]
pub(crate) struct MethodReq {
    pub name: String,
    pub params: usize,
    pub results: usize,
    /// Declared result types as written, for symbolic dispatch.
    pub result_types: Vec<ast::Expr>,
}

/// A named (or anonymous) interface definition.
#[derive(Debug)]
pub(crate) struct InterfaceDef {
    pub name: String,
    pub pkg_path: String,
    pub methods: Vec<MethodReq>,
    /// Embedded interfaces and constraint terms, unresolved.
    pub embeds: Vec<ast::Expr>,
    pub env: Env,
    pub file: Option<Rc<FileScope>>,
}

/// A named type whose underlying type is an expression: both true aliases
/// (`type A = B`) and defined types over non-struct shapes
/// (`type Celsius float64`, `type List[T any] []T`).
#[derive(Debug)]
pub(crate) struct AliasDef {
    pub name: String,
    pub pkg_path: String,
    pub type_params: Vec<ast::TypeParam>,
    pub target: ast::Expr,
    /// `type A = B` vs `type A B`.
    pub is_alias: bool,
    pub env: Env,
    pub file: Option<Rc<FileScope>>,
    /// Memoized resolution of the underlying type (non-generic only).
    pub resolved: RefCell<Option<Rc<TypeDescr>>>,
    pub methods: MethodTable,
}

/// A function type's shape.
#[derive(Debug, Clone)]
pub(crate) struct FuncTypeDescr {
    pub params: Vec<Rc<TypeDescr>>,
    pub results: Vec<Rc<TypeDescr>>,
    pub variadic: bool,
}

/// Runtime type descriptors.
#[derive(Debug, Clone)]
pub(crate) enum TypeDescr {
    /// Predeclared names: `int`, `string`, `bool`, `float64`, `any`,
    /// `comparable`, `error`, the sized numerics, `byte`, `rune`.
    Builtin(String),
    Pointer(Rc<TypeDescr>),
    /// Arrays and slices share one descriptor; the element type is absent
    /// for untyped empty literals.
    Array(Option<Rc<TypeDescr>>),
    Map(Option<Rc<TypeDescr>>, Option<Rc<TypeDescr>>),
    Chan(Rc<TypeDescr>),
    Func(Rc<FuncTypeDescr>),
    Struct(Rc<StructDef>),
    Interface(Rc<InterfaceDef>),
    Alias(Rc<AliasDef>),
    /// A generic type applied to arguments. Invariant: `args.len()`
    /// matches the generic's declared type parameter count.
    Instantiated {
        generic: Rc<TypeDescr>,
        args: Vec<Rc<TypeDescr>>,
    },
    /// A type in a package the scan policy keeps shallow.
    Unresolved { pkg_path: String, name: String },
    /// A bound type parameter inside a generic body.
    TypeParam(String),
}

impl TypeDescr {
    /// The declared type parameters, for generics.
    pub fn type_params(&self) -> &[ast::TypeParam] {
        match self {
            Self::Struct(def) => &def.type_params,
            Self::Alias(def) => &def.type_params,
            _ => &[],
        }
    }

    /// Whether the descriptor denotes an interface shape that values are
    /// boxed against.
    pub fn is_interface(&self) -> bool {
        match self {
            Self::Interface(_) => true,
            Self::Builtin(name) => name == "any" || name == "error" || name == "comparable",
            _ => false,
        }
    }

    /// The name used for diagnostics, `inspect` output and the name-based
    /// `~T` constraint comparison.
    pub fn display_name(&self) -> String {
        match self {
            Self::Builtin(name) => name.clone(),
            Self::Pointer(inner) => format!("*{}", inner.display_name()),
            Self::Array(elem) => match elem {
                Some(elem) => format!("[]{}", elem.display_name()),
                None => "[]".to_owned(),
            },
            Self::Map(key, value) => format!(
                "map[{}]{}",
                key.as_ref().map_or_else(|| "?".to_owned(), |k| k.display_name()),
                value.as_ref().map_or_else(|| "?".to_owned(), |v| v.display_name()),
            ),
            Self::Chan(elem) => format!("chan {}", elem.display_name()),
            Self::Func(sig) => {
                let params: Vec<String> = sig.params.iter().map(|p| p.display_name()).collect();
                let mut out = format!("func({})", params.join(", "));
                match sig.results.len() {
                    0 => {}
                    1 => {
                        out.push(' ');
                        out.push_str(&sig.results[0].display_name());
                    }
                    _ => {
                        let results: Vec<String> = sig.results.iter().map(|r| r.display_name()).collect();
                        out.push_str(&format!(" ({})", results.join(", ")));
                    }
                }
                out
            }
            Self::Struct(def) => qualified(&def.pkg_path, &def.name, "struct{...}"),
            Self::Interface(def) => qualified(&def.pkg_path, &def.name, "interface{...}"),
            Self::Alias(def) => qualified(&def.pkg_path, &def.name, "<alias>"),
            Self::Instantiated { generic, args } => {
                let args: Vec<String> = args.iter().map(|a| a.display_name()).collect();
                format!("{}[{}]", generic.display_name(), args.join(", "))
            }
            Self::Unresolved { pkg_path, name } => format!("{pkg_path}.{name}"),
            Self::TypeParam(name) => name.clone(),
        }
    }

    /// The bare declared name, for name-based identity comparison.
    pub fn bare_name(&self) -> Option<&str> {
        match self {
            Self::Builtin(name) => Some(name),
            Self::Struct(def) if !def.name.is_empty() => Some(&def.name),
            Self::Interface(def) if !def.name.is_empty() => Some(&def.name),
            Self::Alias(def) => Some(&def.name),
            Self::Unresolved { name, .. } => Some(name),
            Self::TypeParam(name) => Some(name),
            Self::Instantiated { generic, .. } => generic.bare_name(),
            _ => None,
        }
    }

    /// The package qualifying the name, when the type is named.
    pub fn pkg_path(&self) -> Option<&str> {
        match self {
            Self::Struct(def) => Some(&def.pkg_path),
            Self::Interface(def) => Some(&def.pkg_path),
            Self::Alias(def) => Some(&def.pkg_path),
            Self::Unresolved { pkg_path, .. } => Some(pkg_path),
            Self::Instantiated { generic, .. } => generic.pkg_path(),
            _ => None,
        }
    }
}

impl fmt::Display for TypeDescr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

fn qualified(pkg_path: &str, name: &str, anon: &str) -> String {
    if name.is_empty() {
        anon.to_owned()
    } else if pkg_path.is_empty() {
        name.to_owned()
    } else {
        format!("{pkg_path}.{name}")
    }
}

/// Two named types are the same if their qualified names match; unnamed
/// shapes compare structurally one level deep. This is the deliberate
/// name-based approximation used for type assertions, switch cases, and
/// `~T` constraint terms.
pub(crate) fn same_type(a: &TypeDescr, b: &TypeDescr) -> bool {
    match (a, b) {
        (TypeDescr::Pointer(a), TypeDescr::Pointer(b)) => same_type(a, b),
        (TypeDescr::Array(a), TypeDescr::Array(b)) => match (a, b) {
            (Some(a), Some(b)) => same_type(a, b),
            _ => true,
        },
        (TypeDescr::Map(ak, av), TypeDescr::Map(bk, bv)) => {
            let keys = match (ak, bk) {
                (Some(a), Some(b)) => same_type(a, b),
                _ => true,
            };
            let values = match (av, bv) {
                (Some(a), Some(b)) => same_type(a, b),
                _ => true,
            };
            keys && values
        }
        (TypeDescr::Func(_), TypeDescr::Func(_)) => true,
        (TypeDescr::Instantiated { generic: ga, args: aa }, TypeDescr::Instantiated { generic: gb, args: ab }) => {
            same_type(ga, gb) && aa.len() == ab.len() && aa.iter().zip(ab).all(|(x, y)| same_type(x, y))
        }
        _ => match (a.bare_name(), b.bare_name()) {
            (Some(na), Some(nb)) => {
                na == nb
                    && match (a.pkg_path(), b.pkg_path()) {
                        (Some(pa), Some(pb)) => pa == pb,
                        _ => true,
                    }
            }
            _ => false,
        },
    }
}
