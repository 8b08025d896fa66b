//! Lexical scopes for the evaluator.
//!
//! An [`Env`] is a shared handle to one scope; child scopes point at their
//! parent. Closures keep their defining scope alive by holding an `Env`, and
//! every group instance owns one scope holding its fields.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::value::Value;

/// Whether a binding can be reassigned with `:=`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutability {
    Mutable,
    Immutable,
}

impl Mutability {
    pub fn from_flag(mutable: bool) -> Self {
        if mutable {
            Mutability::Mutable
        } else {
            Mutability::Immutable
        }
    }

    #[inline]
    pub fn is_mutable(self) -> bool {
        matches!(self, Mutability::Mutable)
    }
}

/// Why a scope operation was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingError {
    /// The binding exists but is immutable.
    Immutable,
    /// No scope in the chain has the name.
    Undefined,
    /// The name is already bound in this very scope.
    AlreadyDefined,
}

#[derive(Clone)]
struct Binding {
    value: Value,
    mutability: Mutability,
}

#[derive(Default)]
struct Scope {
    bindings: HashMap<String, Binding>,
    parent: Option<Env>,
}

/// Shared handle to a scope.
#[derive(Clone, Default)]
pub struct Env(Rc<RefCell<Scope>>);

impl Env {
    /// A scope with no parent.
    pub fn root() -> Self {
        Env::default()
    }

    /// A fresh scope whose parent is `self`.
    pub fn child(&self) -> Self {
        Env(Rc::new(RefCell::new(Scope {
            bindings: HashMap::new(),
            parent: Some(self.clone()),
        })))
    }

    /// Bind `name` in this scope. Shadowing an outer binding is fine;
    /// rebinding a name already present in this scope is not.
    pub fn define(
        &self,
        name: impl Into<String>,
        value: Value,
        mutability: Mutability,
    ) -> Result<(), BindingError> {
        let name = name.into();
        let mut scope = self.0.borrow_mut();
        if scope.bindings.contains_key(&name) {
            return Err(BindingError::AlreadyDefined);
        }
        scope.bindings.insert(name, Binding { value, mutability });
        Ok(())
    }

    /// Bind `name` in this scope, replacing any binding it already has.
    /// Used for host-provided builtins.
    pub fn define_or_replace(&self, name: impl Into<String>, value: Value, mutability: Mutability) {
        self.0
            .borrow_mut()
            .bindings
            .insert(name.into(), Binding { value, mutability });
    }

    /// Nearest binding of `name`, walking outward.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = self.clone();
        loop {
            let parent = {
                let inner = scope.0.borrow();
                if let Some(binding) = inner.bindings.get(name) {
                    return Some(binding.value.clone());
                }
                inner.parent.clone()
            };
            scope = parent?;
        }
    }

    /// Binding of `name` in this scope only.
    pub fn lookup_local(&self, name: &str) -> Option<Value> {
        self.0
            .borrow()
            .bindings
            .get(name)
            .map(|binding| binding.value.clone())
    }

    /// Update the nearest binding of `name`.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), BindingError> {
        let mut scope = self.clone();
        loop {
            let parent = {
                let mut inner = scope.0.borrow_mut();
                if let Some(binding) = inner.bindings.get_mut(name) {
                    if !binding.mutability.is_mutable() {
                        return Err(BindingError::Immutable);
                    }
                    binding.value = value;
                    return Ok(());
                }
                inner.parent.clone()
            };
            scope = parent.ok_or(BindingError::Undefined)?;
        }
    }

    /// Update `name` in this scope only.
    pub fn assign_local(&self, name: &str, value: Value) -> Result<(), BindingError> {
        let mut scope = self.0.borrow_mut();
        let binding = scope.bindings.get_mut(name).ok_or(BindingError::Undefined)?;
        if !binding.mutability.is_mutable() {
            return Err(BindingError::Immutable);
        }
        binding.value = value;
        Ok(())
    }

    /// Names bound directly in this scope, sorted.
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.borrow().bindings.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn ptr_eq(&self, other: &Env) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Env {
    // Values may hold closures that capture this scope, so only names are shown.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("names", &self.local_names())
            .field("has_parent", &self.0.borrow().parent.is_some())
            .finish()
    }
}
