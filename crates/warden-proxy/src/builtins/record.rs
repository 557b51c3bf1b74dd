//! Attribute record for application-defined types

use crate::catalog::Operation;
use crate::error::{ProxyError, ProxyResult};
use crate::object::{Object, TypeName};
use crate::value::Value;
use parking_lot::RwLock;
use rustc_hash::FxHasher;
use std::any::Any;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Named-attribute object with a caller-chosen type name
///
/// Stands in for instances of application classes:
///
/// ```ignore
/// let point = Record::new("geometry.Point").with("x", 1).with("y", 2);
/// ```
#[derive(Debug)]
pub struct Record {
    type_name: TypeName,
    fields: RwLock<BTreeMap<String, Value>>,
    order_key: Option<String>,
    display: Option<String>,
}

impl Record {
    /// Create an empty record of type `module.Name`
    pub fn new(type_name: &str) -> Self {
        Self::with_type(TypeName::parse(type_name))
    }

    /// Create an empty record of an already parsed type
    pub fn with_type(type_name: TypeName) -> Self {
        Self {
            type_name,
            fields: RwLock::new(BTreeMap::new()),
            order_key: None,
            display: None,
        }
    }

    /// Add a field
    pub fn with(self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.write().insert(name.to_string(), value.into());
        self
    }

    /// Order and hash records of the same type by the value of `field`
    pub fn ordered_by(mut self, field: &str) -> Self {
        self.order_key = Some(field.to_string());
        self
    }

    /// Fixed text for string conversion
    pub fn displayed_as(mut self, text: &str) -> Self {
        self.display = Some(text.to_string());
        self
    }

    /// Move onto the heap as a value
    pub fn into_value(self) -> Value {
        Value::object(self)
    }

    /// Current value of a field
    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.read().get(name).cloned()
    }

    /// Names of all fields, sorted
    pub fn field_names(&self) -> Vec<String> {
        self.fields.read().keys().cloned().collect()
    }

    fn order_value(&self) -> Option<Value> {
        self.field(self.order_key.as_deref()?)
    }

    fn missing(&self, name: &str) -> ProxyError {
        ProxyError::NoAttribute {
            type_name: self.type_name.clone(),
            name: name.to_string(),
        }
    }
}

impl Object for Record {
    fn type_name(&self) -> TypeName {
        self.type_name.clone()
    }

    fn get_attr(&self, name: &str) -> ProxyResult<Value> {
        self.field(name).ok_or_else(|| self.missing(name))
    }

    fn set_attr(&self, name: &str, value: Value) -> ProxyResult<()> {
        self.fields.write().insert(name.to_string(), value);
        Ok(())
    }

    fn del_attr(&self, name: &str) -> ProxyResult<()> {
        match self.fields.write().remove(name) {
            Some(_) => Ok(()),
            None => Err(self.missing(name)),
        }
    }

    fn dispatch(self: Arc<Self>, op: Operation, args: &[Value]) -> ProxyResult<Value> {
        let Some(own) = self.order_value() else {
            return Err(ProxyError::unsupported(self.type_name(), op));
        };
        if !op.is_comparison() {
            return Err(ProxyError::unsupported(self.type_name(), op));
        }
        let other = crate::host::operand(op, args, 0)?;
        match other.downcast_ref::<Record>() {
            Some(other) if other.type_name == self.type_name => match other.order_value() {
                Some(theirs) => Ok(Value::Bool(crate::host::comparison_holds(op, own.cmp(&theirs)))),
                None => Err(ProxyError::unsupported(self.type_name(), op)),
            },
            _ => Err(ProxyError::unsupported(self.type_name(), op)),
        }
    }

    fn to_str(&self) -> String {
        match &self.display {
            Some(text) => text.clone(),
            None => self.repr(),
        }
    }

    fn identity_cmp(&self, other: &dyn Object) -> Option<Ordering> {
        let other = other.as_any().downcast_ref::<Record>()?;
        if other.type_name != self.type_name {
            return None;
        }
        Some(self.order_value()?.cmp(&other.order_value()?))
    }

    fn hash_code(&self) -> Option<u64> {
        let key = self.order_value()?;
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        Some(hasher.finish())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
