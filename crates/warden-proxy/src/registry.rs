//! Checker lookup by wrapped type
//!
//! Lets [`make`](crate::make) pick a checker from the value being wrapped
//! instead of taking one explicitly.

use crate::checker::CheckerRef;
use crate::object::TypeName;
use crate::value::Value;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Source of checkers for values that are about to be wrapped
pub trait CheckerSource: Send + Sync {
    /// Checker for `value`, or `None` if it should stay unproxied
    fn checker_for(&self, value: &Value) -> Option<CheckerRef>;
}

/// Registry of checkers keyed by declared type name
#[derive(Debug, Default)]
pub struct CheckerRegistry {
    by_type: RwLock<FxHashMap<TypeName, CheckerRef>>,
}

impl CheckerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `checker` for values of `type_name`, returning the one it
    /// replaces
    pub fn register(&self, type_name: TypeName, checker: CheckerRef) -> Option<CheckerRef> {
        tracing::trace!(type_name = %type_name, "registering checker");
        self.by_type.write().insert(type_name, checker)
    }

    /// Remove the checker for `type_name`
    pub fn unregister(&self, type_name: &TypeName) -> Option<CheckerRef> {
        self.by_type.write().remove(type_name)
    }

    /// Checker registered for `type_name`
    pub fn get(&self, type_name: &TypeName) -> Option<CheckerRef> {
        self.by_type.read().get(type_name).cloned()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.by_type.read().len()
    }

    /// Check if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.by_type.read().is_empty()
    }
}

impl CheckerSource for CheckerRegistry {
    fn checker_for(&self, value: &Value) -> Option<CheckerRef> {
        match value {
            Value::Proxy(_) => None,
            other => self.get(&other.type_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Grants, PolicyChecker};
    use std::sync::Arc;

    #[test]
    fn test_lookup_by_type() {
        let registry = CheckerRegistry::new();
        let checker = PolicyChecker::new(Arc::new(Grants::new())).into_ref();
        assert!(registry.register(TypeName::builtin("list"), checker.clone()).is_none());

        let list = crate::builtins::List::of([1]).into_value();
        let found = registry.checker_for(&list).unwrap();
        assert!(Arc::ptr_eq(&found, &checker));
        assert!(registry.checker_for(&Value::Int(1)).is_none());

        assert!(registry.unregister(&TypeName::builtin("list")).is_some());
        assert!(registry.is_empty());
    }
}
