//! Object model for wrapped values
//!
//! Anything a proxy can protect beyond the primitive [`Value`] variants
//! implements [`Object`]. The trait is the type's capability surface. A type
//! implements only the operations it supports, and everything else falls
//! through to [`ProxyError::Unsupported`].

use crate::catalog::Operation;
use crate::error::{ProxyError, ProxyResult};
use crate::value::Value;
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a heap object
pub type ObjectRef = Arc<dyn Object>;

/// Declared type of a value: `module.Name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName {
    module: Arc<str>,
    name: Arc<str>,
}

impl TypeName {
    /// Module that primitive types are declared in
    pub const BUILTIN_MODULE: &'static str = "builtins";

    /// Create a type name from module and bare name
    pub fn new(module: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }

    /// Type declared in the builtin module
    pub fn builtin(name: &str) -> Self {
        Self::new(Self::BUILTIN_MODULE, name)
    }

    /// Parse a dotted name; the last segment is the type, the rest the module
    ///
    /// A name without a dot is treated as a builtin.
    pub fn parse(dotted: &str) -> Self {
        match dotted.rsplit_once('.') {
            Some((module, name)) => Self::new(module, name),
            None => Self::builtin(dotted),
        }
    }

    /// Module part
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Bare type name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

/// Capability surface of a heap object
///
/// Every method has a default that reports the capability as missing, so a
/// type overrides only what it actually supports.
pub trait Object: Send + Sync + 'static {
    /// Declared type of the object
    fn type_name(&self) -> TypeName;

    /// Read a named attribute
    fn get_attr(&self, name: &str) -> ProxyResult<Value> {
        Err(ProxyError::NoAttribute {
            type_name: self.type_name(),
            name: name.to_string(),
        })
    }

    /// Write a named attribute
    fn set_attr(&self, name: &str, _value: Value) -> ProxyResult<()> {
        Err(ProxyError::NoAttribute {
            type_name: self.type_name(),
            name: name.to_string(),
        })
    }

    /// Delete a named attribute
    fn del_attr(&self, name: &str) -> ProxyResult<()> {
        Err(ProxyError::NoAttribute {
            type_name: self.type_name(),
            name: name.to_string(),
        })
    }

    /// Perform a catalog operation
    ///
    /// `str`, `repr` and the identity machinery never reach this method; the
    /// host answers those from [`Object::repr`], [`Object::to_str`],
    /// [`Object::identity_cmp`], [`Object::hash_code`] and
    /// [`Object::is_truthy`].
    fn dispatch(self: Arc<Self>, op: Operation, _args: &[Value]) -> ProxyResult<Value> {
        Err(ProxyError::unsupported(self.type_name(), op))
    }

    /// True in-place form of an in-place operator
    ///
    /// Returns `None` when the type has no in-place form for `op`. The caller
    /// then falls back to the forward operator and produces a new value.
    fn in_place(self: Arc<Self>, _op: Operation, _args: &[Value]) -> Option<ProxyResult<Value>> {
        None
    }

    /// Representation text
    fn repr(&self) -> String {
        format!(
            "<{} object at {:#x}>",
            self.type_name(),
            self as *const Self as *const () as usize
        )
    }

    /// Human-readable text
    fn to_str(&self) -> String {
        self.repr()
    }

    /// Default ordering against another object, if the types are comparable
    fn identity_cmp(&self, _other: &dyn Object) -> Option<Ordering> {
        None
    }

    /// Content hash, if equal objects can be distinct allocations
    fn hash_code(&self) -> Option<u64> {
        None
    }

    /// Truthiness
    fn is_truthy(&self) -> bool {
        true
    }

    /// Get object as Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

impl fmt::Debug for dyn Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("type", &self.type_name().to_string())
            .field("address", &format_args!("{:#x}", object_address(self)))
            .finish()
    }
}

/// Address of an object, used as its stable identity token
pub fn object_address(object: &dyn Object) -> usize {
    object as *const dyn Object as *const () as usize
}
