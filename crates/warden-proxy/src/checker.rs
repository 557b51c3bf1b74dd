//! Checker contract
//!
//! A checker is the policy half of a proxy. The proxy asks it before every
//! checked operation and hands it every result for mediation. Checkers are
//! shared (`Arc`) and immutable for a proxy's lifetime, but the decision they
//! make may depend on mutable state such as a [`Grants`](crate::Grants) set.

use crate::backend::{Backend, BackendKind};
use crate::error::ProxyResult;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Shared checker handle
pub type CheckerRef = Arc<dyn Checker>;

/// Access policy consulted by a proxy
pub trait Checker: Send + Sync + fmt::Debug {
    /// Allow or deny `name` on `wrapped`
    ///
    /// Returns [`ProxyError::Forbidden`](crate::ProxyError::Forbidden) to deny.
    /// Called before the real operation runs.
    fn check(&self, wrapped: &Value, name: &str) -> ProxyResult<()>;

    /// Put the security boundary around a result, if it needs one
    ///
    /// By default primitives and existing proxies pass through unchanged and
    /// heap objects are wrapped with this same checker.
    fn mediate(&self, value: Value, mediator: &Mediator<'_>) -> Value {
        match value {
            Value::Object(_) => mediator.wrap(value),
            other => other,
        }
    }

    /// Diagnostic listing of (name, permission) pairs
    fn permissions(&self) -> Vec<(String, Permission)> {
        Vec::new()
    }
}

/// Wraps mediated results on the backend that produced them
pub struct Mediator<'a> {
    backend: &'a dyn Backend,
    checker: &'a CheckerRef,
}

impl<'a> Mediator<'a> {
    pub(crate) fn new(backend: &'a dyn Backend, checker: &'a CheckerRef) -> Self {
        Self { backend, checker }
    }

    /// Wrap `value` in a new proxy with the current checker
    pub fn wrap(&self, value: Value) -> Value {
        Value::Proxy(self.backend.wrap(value, self.checker.clone()))
    }

    /// Backend new proxies are created on
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }
}

/// Named permission guarding one or more operations
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(String);

impl Permission {
    /// Name of the permission that is always granted
    pub const PUBLIC: &'static str = "public";

    /// Create a permission
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The always-granted permission
    pub fn public() -> Self {
        Self::new(Self::PUBLIC)
    }

    /// Check if this is the always-granted permission
    pub fn is_public(&self) -> bool {
        self.0 == Self::PUBLIC
    }

    /// Permission name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Permission {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_permission() {
        assert!(Permission::public().is_public());
        assert!(!Permission::new("zope.View").is_public());
        assert_eq!(Permission::from("zope.View").to_string(), "zope.View");
    }

    #[test]
    fn test_permission_serializes_as_string() {
        #[derive(Serialize, Deserialize)]
        struct Holder {
            perm: Permission,
        }
        let holder: Holder = toml::from_str("perm = \"zope.View\"").unwrap();
        assert_eq!(holder.perm, Permission::new("zope.View"));
    }
}
