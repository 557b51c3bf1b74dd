//! Ordered mapping

use super::{nested_repr, List, ListIterator, Walk, WalkGuard};
use crate::catalog::Operation;
use crate::error::{ProxyError, ProxyResult};
use crate::host;
use crate::object::{Object, TypeName};
use crate::value::Value;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Mapping from values to values, iterated in key order
#[derive(Debug, Default)]
pub struct Dict {
    entries: RwLock<BTreeMap<Value, Value>>,
}

impl Dict {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mapping from key/value pairs
    pub fn of<K: Into<Value>, V: Into<Value>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            entries: RwLock::new(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }

    /// Move onto the heap as a value
    pub fn into_value(self) -> Value {
        Value::object(self)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the mapping is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Value stored under `key`
    pub fn get(&self, key: &Value) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    /// Store `value` under `key`, returning the previous value
    pub fn insert(&self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        self.entries.write().insert(key.into(), value.into())
    }

    /// Copy of the current entries
    pub fn snapshot(&self) -> BTreeMap<Value, Value> {
        self.entries.read().clone()
    }

    /// Entries of another mapping, read through its item protocol
    fn entries_of(other: &Value) -> ProxyResult<Vec<(Value, Value)>> {
        if let Some(dict) = other.downcast_ref::<Dict>() {
            return Ok(dict.snapshot().into_iter().collect());
        }
        host::collect_iter(other)?
            .into_iter()
            .map(|key| {
                let value = host::apply(other, Operation::GetItem, std::slice::from_ref(&key))?;
                Ok((key, value))
            })
            .collect()
    }
}

impl Object for Dict {
    fn type_name(&self) -> TypeName {
        TypeName::builtin("dict")
    }

    fn dispatch(self: Arc<Self>, op: Operation, args: &[Value]) -> ProxyResult<Value> {
        match op {
            Operation::Len => Ok(Value::from(self.len())),
            Operation::GetItem => {
                let key = host::operand(op, args, 0)?;
                self.get(key)
                    .ok_or_else(|| ProxyError::KeyNotFound(nested_repr(key)))
            }
            Operation::SetItem => {
                let key = host::operand(op, args, 0)?.clone();
                let value = host::operand(op, args, 1)?.clone();
                self.entries.write().insert(key, value);
                Ok(Value::Null)
            }
            Operation::DelItem => {
                let key = host::operand(op, args, 0)?;
                match self.entries.write().remove(key) {
                    Some(_) => Ok(Value::Null),
                    None => Err(ProxyError::KeyNotFound(nested_repr(key))),
                }
            }
            Operation::Contains => {
                let key = host::operand(op, args, 0)?;
                Ok(Value::Bool(self.entries.read().contains_key(key)))
            }
            Operation::Iter => {
                let keys = List::new(self.entries.read().keys().cloned().collect());
                Ok(Value::object(ListIterator::new(Arc::new(keys))))
            }
            Operation::Or => {
                let other = host::operand(op, args, 0)?;
                if other.downcast_ref::<Dict>().is_none() {
                    return Err(ProxyError::unsupported(self.type_name(), op));
                }
                let mut merged = self.snapshot();
                merged.extend(Self::entries_of(other)?);
                Ok(Value::object(Dict {
                    entries: RwLock::new(merged),
                }))
            }
            Operation::Eq | Operation::Ne => {
                let other = host::operand(op, args, 0)?;
                match other.downcast_ref::<Dict>() {
                    Some(other) => {
                        let same = self.snapshot() == other.snapshot();
                        Ok(Value::Bool(same == (op == Operation::Eq)))
                    }
                    None => Err(ProxyError::unsupported(self.type_name(), op)),
                }
            }
            _ => Err(ProxyError::unsupported(self.type_name(), op)),
        }
    }

    fn in_place(self: Arc<Self>, op: Operation, args: &[Value]) -> Option<ProxyResult<Value>> {
        if op != Operation::IOr {
            return None;
        }
        let result = host::operand(op, args, 0)
            .and_then(Self::entries_of)
            .map(|entries| self.entries.write().extend(entries));
        Some(result.map(|()| Value::Object(self)))
    }

    fn repr(&self) -> String {
        let Some(_guard) = WalkGuard::enter(Walk::Repr, self) else {
            return "{...}".to_string();
        };
        let parts: Vec<String> = self
            .snapshot()
            .iter()
            .map(|(k, v)| format!("{}: {}", nested_repr(k), nested_repr(v)))
            .collect();
        format!("{{{}}}", parts.join(", "))
    }

    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_protocol() {
        let value = Dict::of([("a", 1), ("b", 2)]).into_value();
        assert_eq!(host::apply(&value, Operation::GetItem, &[Value::str("b")]).unwrap(), Value::Int(2));
        host::apply(&value, Operation::SetItem, &[Value::str("c"), Value::Int(3)]).unwrap();
        host::apply(&value, Operation::DelItem, &[Value::str("a")]).unwrap();
        assert_eq!(
            host::collect_iter(&value).unwrap(),
            vec![Value::str("b"), Value::str("c")]
        );
    }

    #[test]
    fn test_missing_key() {
        let value = Dict::new().into_value();
        assert_eq!(
            host::apply(&value, Operation::GetItem, &[Value::str("x")]).unwrap_err(),
            ProxyError::KeyNotFound("'x'".to_string())
        );
    }

    #[test]
    fn test_merge() {
        let a = Dict::of([("a", 1)]).into_value();
        let b = Dict::of([("a", 9), ("b", 2)]).into_value();

        let merged = host::apply(&a, Operation::Or, &[b.clone()]).unwrap();
        assert_eq!(host::len(&merged).unwrap(), 2);
        assert_eq!(host::len(&a).unwrap(), 1);

        let same = host::apply(&a, Operation::IOr, &[b]).unwrap();
        assert!(same.is_same(&a));
        assert_eq!(host::repr(&a).unwrap(), "{'a': 9, 'b': 2}");
    }

    #[test]
    fn test_equality() {
        let a = Dict::of([("k", 1)]).into_value();
        let b = Dict::of([("k", 1)]).into_value();
        assert!(host::equals(&a, &b).unwrap());
        assert!(host::apply(&a, Operation::Contains, &[Value::str("k")]).unwrap().is_truthy());
    }

    #[test]
    fn test_self_containing_repr() {
        let dict = Arc::new(Dict::new());
        dict.insert("me", Value::Object(dict.clone()));
        assert_eq!(host::repr(&Value::Object(dict.clone())).unwrap(), "{'me': {...}}");
        dict.entries.write().clear();
    }
}
