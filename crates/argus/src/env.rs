//! Lexical environments.
//!
//! Scopes form an `Rc`-shared chain: block scopes borrow their parent for
//! the duration of the block, and closures keep captured scopes alive by
//! holding the chain strongly. Each binding owns its storage slot as an
//! `Rc<RefCell<Value>>`, so `address_of` can hand out the slot itself — a
//! pointer produced from `&x` and the binding for `x` are literally the
//! same cell, which is what makes writes through either side visible to
//! the other.

use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::value::Value;

/// One declared name: its storage slot plus the constant/type flags.
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub slot: Rc<RefCell<Value>>,
    pub constant: bool,
    pub is_type: bool,
}

#[derive(Debug)]
struct EnvInner {
    parent: Option<Env>,
    bindings: RefCell<IndexMap<String, Binding>>,
}

/// A lexical scope; cheap to clone (shared reference).
#[derive(Debug, Clone)]
pub(crate) struct Env {
    inner: Rc<EnvInner>,
}

impl Env {
    /// A fresh root scope.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(EnvInner {
                parent: None,
                bindings: RefCell::new(IndexMap::new()),
            }),
        }
    }

    /// A child scope that resolves misses through `self`.
    pub fn child(&self) -> Self {
        Self {
            inner: Rc::new(EnvInner {
                parent: Some(self.clone()),
                bindings: RefCell::new(IndexMap::new()),
            }),
        }
    }

    /// Declares `name` in this scope. The blank identifier is a sink and
    /// never binds. Redeclaration in the same scope fails.
    pub fn declare(&self, name: &str, value: Value, constant: bool) -> Result<(), String> {
        self.declare_binding(name, value, constant, false)
    }

    /// Declares a type name (`type T ...` or a bound type parameter).
    pub fn declare_type(&self, name: &str, value: Value) -> Result<(), String> {
        self.declare_binding(name, value, true, true)
    }

    fn declare_binding(&self, name: &str, value: Value, constant: bool, is_type: bool) -> Result<(), String> {
        if name == "_" {
            return Ok(());
        }
        let mut bindings = self.inner.bindings.borrow_mut();
        if bindings.contains_key(name) {
            return Err(format!("{name} redeclared in this block"));
        }
        bindings.insert(
            name.to_owned(),
            Binding {
                slot: Rc::new(RefCell::new(value)),
                constant,
                is_type,
            },
        );
        Ok(())
    }

    /// Replaces or creates a binding in this scope without the
    /// redeclaration check. Used by `:=` for names already present in the
    /// same scope, which the short-declaration rule treats as assignment.
    pub fn redeclare(&self, name: &str, value: Value) {
        if name == "_" {
            return;
        }
        let bindings = self.inner.bindings.borrow();
        if let Some(binding) = bindings.get(name) {
            *binding.slot.borrow_mut() = value;
            return;
        }
        drop(bindings);
        self.inner.bindings.borrow_mut().insert(
            name.to_owned(),
            Binding {
                slot: Rc::new(RefCell::new(value)),
                constant: false,
                is_type: false,
            },
        );
    }

    /// Looks `name` up through the scope chain and clones its value out.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.lookup_binding(name).map(|b| b.slot.borrow().clone())
    }

    /// Looks `name` up through the scope chain.
    pub fn lookup_binding(&self, name: &str) -> Option<Binding> {
        let mut env = Some(self);
        while let Some(current) = env {
            if let Some(binding) = current.inner.bindings.borrow().get(name) {
                return Some(binding.clone());
            }
            env = current.inner.parent.as_ref();
        }
        None
    }

    /// Whether this scope (not its parents) binds `name`.
    pub fn has_local(&self, name: &str) -> bool {
        self.inner.bindings.borrow().contains_key(name)
    }

    /// Writes to the nearest enclosing scope that binds `name`.
    ///
    /// Returns `false` when no scope binds it, `Err` when the binding is
    /// constant.
    pub fn assign(&self, name: &str, value: Value) -> Result<bool, String> {
        if name == "_" {
            return Ok(true);
        }
        match self.lookup_binding(name) {
            Some(binding) if binding.constant => Err(format!("cannot assign to constant {name}")),
            Some(binding) => {
                *binding.slot.borrow_mut() = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The storage slot for `name`, stable for as long as any scope or
    /// pointer holds it.
    ///
    /// Fails for constants: their address cannot be taken.
    pub fn address_of(&self, name: &str) -> Option<Result<Rc<RefCell<Value>>, String>> {
        let binding = self.lookup_binding(name)?;
        if binding.constant {
            return Some(Err(format!("cannot take the address of constant {name}")));
        }
        Some(Ok(binding.slot))
    }

    /// Enumerates this scope's own bindings in declaration order.
    pub fn get_all(&self) -> Vec<(String, Binding)> {
        self.inner
            .bindings
            .borrow()
            .iter()
            .map(|(name, binding)| (name.clone(), binding.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadowing_does_not_modify_outer_slot() {
        let outer = Env::new();
        outer.declare("x", Value::Int(1), false).unwrap();
        let inner = outer.child();
        inner.declare("x", Value::Int(2), false).unwrap();
        assert!(matches!(outer.lookup("x"), Some(Value::Int(1))));
        assert!(matches!(inner.lookup("x"), Some(Value::Int(2))));
    }

    #[test]
    fn assign_writes_to_nearest_enclosing_scope() {
        let outer = Env::new();
        outer.declare("x", Value::Int(1), false).unwrap();
        let inner = outer.child();
        assert!(inner.assign("x", Value::Int(9)).unwrap());
        assert!(matches!(outer.lookup("x"), Some(Value::Int(9))));
    }

    #[test]
    fn assign_to_unknown_name_reports_false() {
        let env = Env::new();
        assert!(!env.assign("missing", Value::Int(1)).unwrap());
    }

    #[test]
    fn constants_never_reassign() {
        let env = Env::new();
        env.declare("c", Value::Int(1), true).unwrap();
        assert!(env.assign("c", Value::Int(2)).is_err());
    }

    #[test]
    fn address_of_constant_fails() {
        let env = Env::new();
        env.declare("c", Value::Int(1), true).unwrap();
        assert!(env.address_of("c").unwrap().is_err());
    }

    #[test]
    fn writes_through_address_are_observed_by_lookup() {
        let env = Env::new();
        env.declare("x", Value::Int(1), false).unwrap();
        let slot = env.address_of("x").unwrap().unwrap();
        *slot.borrow_mut() = Value::Int(42);
        assert!(matches!(env.lookup("x"), Some(Value::Int(42))));
    }

    #[test]
    fn redeclaration_in_same_scope_fails() {
        let env = Env::new();
        env.declare("x", Value::Int(1), false).unwrap();
        assert!(env.declare("x", Value::Int(2), false).is_err());
    }

    #[test]
    fn blank_identifier_never_binds() {
        let env = Env::new();
        env.declare("_", Value::Int(1), false).unwrap();
        assert!(env.lookup("_").is_none());
    }
}
