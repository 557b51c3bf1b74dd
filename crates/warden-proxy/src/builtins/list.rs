//! Mutable sequence

use super::{nested_repr, resolve_index, Walk, WalkGuard};
use crate::catalog::Operation;
use crate::error::{ProxyError, ProxyResult};
use crate::host;
use crate::object::{Object, TypeName};
use crate::value::Value;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHasher;
use std::any::Any;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Growable list of values
///
/// `inplace-add` and `inplace-mul` mutate the list itself, so a proxy around
/// a list keeps its identity across `+=` and `*=`.
#[derive(Debug, Default)]
pub struct List {
    items: RwLock<Vec<Value>>,
}

impl List {
    /// Create a list from values
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    /// Create a list from anything convertible to values
    pub fn of<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Self::new(items.into_iter().map(Into::into).collect())
    }

    /// Move onto the heap as a value
    pub fn into_value(self) -> Value {
        Value::object(self)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Check if the list is empty
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Element at `index`, if any
    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.read().get(index).cloned()
    }

    /// Append an element
    pub fn push(&self, value: Value) {
        self.items.write().push(value);
    }

    /// Copy of the current elements
    pub fn snapshot(&self) -> Vec<Value> {
        self.items.read().clone()
    }

    fn repeated(op: Operation, items: &[Value], count: &Value) -> ProxyResult<Vec<Value>> {
        let times = count.as_int().ok_or_else(|| {
            ProxyError::TypeMismatch(format!(
                "can't multiply sequence by non-int of type {}",
                count.type_name()
            ))
        })?;
        let len = host::repeat_len(op, items.len(), times)?;
        Ok(items.iter().cycle().take(len).cloned().collect())
    }
}

impl Object for List {
    fn type_name(&self) -> TypeName {
        TypeName::builtin("list")
    }

    fn dispatch(self: Arc<Self>, op: Operation, args: &[Value]) -> ProxyResult<Value> {
        match op {
            Operation::Len => Ok(Value::from(self.len())),
            Operation::GetItem => {
                let items = self.items.read();
                let index = resolve_index(host::operand(op, args, 0)?, items.len())?;
                Ok(items[index].clone())
            }
            Operation::SetItem => {
                let value = host::operand(op, args, 1)?.clone();
                let mut items = self.items.write();
                let index = resolve_index(host::operand(op, args, 0)?, items.len())?;
                items[index] = value;
                Ok(Value::Null)
            }
            Operation::DelItem => {
                let mut items = self.items.write();
                let index = resolve_index(host::operand(op, args, 0)?, items.len())?;
                items.remove(index);
                Ok(Value::Null)
            }
            Operation::Iter => Ok(Value::object(ListIterator::new(self))),
            Operation::Contains => {
                let needle = host::operand(op, args, 0)?;
                for item in self.snapshot() {
                    if host::equals(&item, needle)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            Operation::Add => {
                let other = host::operand(op, args, 0)?;
                match other.downcast_ref::<List>() {
                    Some(other) => {
                        let mut items = self.snapshot();
                        items.extend(other.snapshot());
                        Ok(List::new(items).into_value())
                    }
                    None => Err(ProxyError::unsupported(self.type_name(), op)),
                }
            }
            Operation::Mul | Operation::RMul => {
                let count = host::operand(op, args, 0)?;
                if count.as_int().is_none() {
                    return Err(ProxyError::unsupported(self.type_name(), op));
                }
                Ok(List::new(Self::repeated(op, &self.snapshot(), count)?).into_value())
            }
            _ if op.is_comparison() => {
                let other = host::operand(op, args, 0)?;
                match other.downcast_ref::<List>() {
                    Some(other) => {
                        let ordering = self.snapshot().cmp(&other.snapshot());
                        Ok(Value::Bool(host::comparison_holds(op, ordering)))
                    }
                    None => Err(ProxyError::unsupported(self.type_name(), op)),
                }
            }
            _ => Err(ProxyError::unsupported(self.type_name(), op)),
        }
    }

    fn in_place(self: Arc<Self>, op: Operation, args: &[Value]) -> Option<ProxyResult<Value>> {
        let result = match op {
            Operation::IAdd => host::operand(op, args, 0)
                .and_then(host::collect_iter)
                .map(|extra| self.items.write().extend(extra)),
            Operation::IMul => host::operand(op, args, 0).and_then(|count| {
                let grown = Self::repeated(op, &self.snapshot(), count)?;
                *self.items.write() = grown;
                Ok(())
            }),
            _ => return None,
        };
        Some(result.map(|()| Value::Object(self)))
    }

    fn repr(&self) -> String {
        let Some(_guard) = WalkGuard::enter(Walk::Repr, self) else {
            return "[...]".to_string();
        };
        let parts: Vec<String> = self.snapshot().iter().map(nested_repr).collect();
        format!("[{}]", parts.join(", "))
    }

    fn identity_cmp(&self, other: &dyn Object) -> Option<Ordering> {
        let other = other.as_any().downcast_ref::<List>()?;
        let _guard = WalkGuard::enter(Walk::Compare, self)?;
        Some(self.snapshot().cmp(&other.snapshot()))
    }

    fn hash_code(&self) -> Option<u64> {
        let _guard = WalkGuard::enter(Walk::Hash, self)?;
        let mut hasher = FxHasher::default();
        self.snapshot().hash(&mut hasher);
        Some(hasher.finish())
    }

    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Cursor over a [`List`]
///
/// Reads the list live, so elements appended during iteration are visited.
#[derive(Debug)]
pub struct ListIterator {
    list: Arc<List>,
    position: Mutex<usize>,
}

impl ListIterator {
    /// Create an iterator positioned at the start of `list`
    pub fn new(list: Arc<List>) -> Self {
        Self {
            list,
            position: Mutex::new(0),
        }
    }
}

impl Object for ListIterator {
    fn type_name(&self) -> TypeName {
        TypeName::builtin("list_iterator")
    }

    fn dispatch(self: Arc<Self>, op: Operation, _args: &[Value]) -> ProxyResult<Value> {
        match op {
            Operation::Next => {
                let mut position = self.position.lock();
                match self.list.get(*position) {
                    Some(item) => {
                        *position += 1;
                        Ok(item)
                    }
                    None => Err(ProxyError::StopIteration),
                }
            }
            Operation::Iter => Ok(Value::Object(self)),
            _ => Err(ProxyError::unsupported(self.type_name(), op)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
