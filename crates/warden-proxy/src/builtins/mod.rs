//! Builtin heap types
//!
//! Ready-made [`Object`](crate::Object) implementations that cover the common
//! shapes a proxy protects: sequences, mappings, attribute records and
//! callables.

mod dict;
mod function;
mod list;
mod record;

pub use dict::Dict;
pub use function::NativeFunction;
pub use list::{List, ListIterator};
pub use record::Record;

use crate::error::{ProxyError, ProxyResult};
use crate::object::{object_address, Object};
use crate::value::Value;
use rustc_hash::FxHashSet;
use std::cell::RefCell;

/// Resolve a possibly negative sequence index against `len`
pub(crate) fn resolve_index(index: &Value, len: usize) -> ProxyResult<usize> {
    let raw = match index {
        Value::Int(i) => *i,
        Value::Bool(b) => *b as i64,
        other => {
            return Err(ProxyError::TypeMismatch(format!(
                "indices must be integers, not {}",
                other.type_name()
            )))
        }
    };
    let resolved = if raw < 0 { raw + len as i64 } else { raw };
    if resolved < 0 || resolved >= len as i64 {
        return Err(ProxyError::IndexOutOfRange { index: raw, len });
    }
    Ok(resolved as usize)
}

/// Representation of a nested value, never failing
pub(crate) fn nested_repr(value: &Value) -> String {
    crate::host::repr(value).unwrap_or_else(|err| format!("<{} {}>", value.type_name(), err.kind()))
}

/// Recursive walk a container can be part of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Walk {
    Repr,
    Hash,
    Compare,
}

thread_local! {
    static WALKING: RefCell<FxHashSet<(Walk, usize)>> = RefCell::new(FxHashSet::default());
}

/// Marks a container as being walked on this thread
///
/// `enter` returns `None` when the same walk already covers the object,
/// which is how self-containing containers stop recursing.
pub(crate) struct WalkGuard {
    key: (Walk, usize),
}

impl WalkGuard {
    pub(crate) fn enter(walk: Walk, object: &dyn Object) -> Option<Self> {
        let key = (walk, object_address(object));
        WALKING
            .with(|walking| walking.borrow_mut().insert(key))
            .then_some(Self { key })
    }
}

impl Drop for WalkGuard {
    fn drop(&mut self) {
        let _ = WALKING.try_with(|walking| walking.borrow_mut().remove(&self.key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_index() {
        assert_eq!(resolve_index(&Value::Int(0), 3).unwrap(), 0);
        assert_eq!(resolve_index(&Value::Int(-1), 3).unwrap(), 2);
        assert_eq!(
            resolve_index(&Value::Int(3), 3).unwrap_err(),
            ProxyError::IndexOutOfRange { index: 3, len: 3 }
        );
        assert_eq!(
            resolve_index(&Value::Int(-4), 3).unwrap_err(),
            ProxyError::IndexOutOfRange { index: -4, len: 3 }
        );
        assert_eq!(resolve_index(&Value::str("0"), 3).unwrap_err().kind(), "type-mismatch");
    }

    #[test]
    fn test_walk_guard_is_reentrant_once() {
        let list = List::of([1]);
        let outer = WalkGuard::enter(Walk::Repr, &list);
        assert!(outer.is_some());
        assert!(WalkGuard::enter(Walk::Repr, &list).is_none());
        assert!(WalkGuard::enter(Walk::Hash, &list).is_some());
        drop(outer);
        assert!(WalkGuard::enter(Walk::Repr, &list).is_some());
    }
}
