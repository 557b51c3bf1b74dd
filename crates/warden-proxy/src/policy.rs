//! Permission-table checker
//!
//! [`PolicyChecker`] maps operation and attribute names to permissions and
//! consults a shared [`Grants`] set for the current principal. Names missing
//! from the table are denied. The `public` permission is always granted.

use crate::checker::{Checker, CheckerRef, Mediator, Permission};
use crate::error::{ProxyError, ProxyResult};
use crate::object::TypeName;
use crate::value::Value;
use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Permissions held by the current principal
///
/// Shared between checkers; granting or revoking takes effect on the next
/// check through any proxy.
#[derive(Debug, Default)]
pub struct Grants {
    held: RwLock<FxHashSet<Permission>>,
}

impl Grants {
    /// Create an empty grant set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a grant set holding `permissions`
    pub fn with<P: Into<Permission>>(permissions: impl IntoIterator<Item = P>) -> Self {
        Self {
            held: RwLock::new(permissions.into_iter().map(Into::into).collect()),
        }
    }

    /// Grant a permission
    pub fn grant(&self, permission: impl Into<Permission>) {
        self.held.write().insert(permission.into());
    }

    /// Revoke a permission; returns whether it was held
    pub fn revoke(&self, permission: &Permission) -> bool {
        self.held.write().remove(permission)
    }

    /// Check if a permission is held
    pub fn has(&self, permission: &Permission) -> bool {
        permission.is_public() || self.held.read().contains(permission)
    }

    /// Held permissions, sorted
    pub fn snapshot(&self) -> Vec<Permission> {
        let mut held: Vec<_> = self.held.read().iter().cloned().collect();
        held.sort();
        held
    }
}

/// Checker driven by a name-to-permission table
#[derive(Debug, Clone)]
pub struct PolicyChecker {
    names: BTreeMap<String, Permission>,
    grants: Arc<Grants>,
    exempt: FxHashSet<TypeName>,
}

impl PolicyChecker {
    /// Create a checker with an empty table over `grants`
    pub fn new(grants: Arc<Grants>) -> Self {
        Self {
            names: BTreeMap::new(),
            grants,
            exempt: FxHashSet::default(),
        }
    }

    /// Require `permission` for `name`
    pub fn protect(mut self, name: &str, permission: impl Into<Permission>) -> Self {
        self.names.insert(name.to_string(), permission.into());
        self
    }

    /// Always allow `name`
    pub fn public(self, name: &str) -> Self {
        self.protect(name, Permission::public())
    }

    /// Allow every name in `names`
    pub fn public_all<'a>(self, names: impl IntoIterator<Item = &'a str>) -> Self {
        names.into_iter().fold(self, |checker, name| checker.public(name))
    }

    /// Return values of `type_name` unmediated
    pub fn exempt(mut self, type_name: TypeName) -> Self {
        self.exempt.insert(type_name);
        self
    }

    /// Shared grant set
    pub fn grants(&self) -> &Arc<Grants> {
        &self.grants
    }

    /// Permission required for `name`, if the table has one
    pub fn permission_for(&self, name: &str) -> Option<&Permission> {
        self.names.get(name)
    }

    /// Share as a checker handle
    pub fn into_ref(self) -> CheckerRef {
        Arc::new(self)
    }
}

impl Checker for PolicyChecker {
    fn check(&self, wrapped: &Value, name: &str) -> ProxyResult<()> {
        match self.names.get(name) {
            Some(permission) if self.grants.has(permission) => Ok(()),
            Some(permission) => {
                tracing::debug!(
                    operation = name,
                    wrapped = %wrapped.type_name(),
                    permission = %permission,
                    "access denied, permission not granted"
                );
                Err(ProxyError::forbidden(name))
            }
            None => {
                tracing::debug!(
                    operation = name,
                    wrapped = %wrapped.type_name(),
                    "access denied, name not declared"
                );
                Err(ProxyError::forbidden(name))
            }
        }
    }

    fn mediate(&self, value: Value, mediator: &Mediator<'_>) -> Value {
        let exempt = matches!(&value, Value::Object(obj) if self.exempt.contains(&obj.type_name()));
        match value {
            Value::Object(_) if !exempt => mediator.wrap(value),
            other => other,
        }
    }

    fn permissions(&self) -> Vec<(String, Permission)> {
        self.names
            .iter()
            .map(|(name, permission)| (name.clone(), permission.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undeclared_names_are_denied() {
        let checker = PolicyChecker::new(Arc::new(Grants::new())).public("len");
        assert!(checker.check(&Value::Null, "len").is_ok());
        assert_eq!(
            checker.check(&Value::Null, "item-get").unwrap_err(),
            ProxyError::forbidden("item-get")
        );
    }

    #[test]
    fn test_grants_are_live() {
        let grants = Arc::new(Grants::new());
        let checker = PolicyChecker::new(grants.clone()).protect("item-get", "zope.View");

        assert!(checker.check(&Value::Null, "item-get").is_err());
        grants.grant("zope.View");
        assert!(checker.check(&Value::Null, "item-get").is_ok());
        assert!(grants.revoke(&Permission::new("zope.View")));
        assert!(checker.check(&Value::Null, "item-get").is_err());
        assert!(!grants.revoke(&Permission::new("zope.View")));
    }

    #[test]
    fn test_permissions_listing_is_sorted() {
        let checker = PolicyChecker::new(Arc::new(Grants::new()))
            .protect("name", "zope.View")
            .public_all(["len", "iter"]);
        let names: Vec<_> = checker.permissions().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["iter", "len", "name"]);
    }

    #[test]
    fn test_grants_snapshot() {
        let grants = Grants::with(["b", "a"]);
        assert_eq!(grants.snapshot(), vec![Permission::new("a"), Permission::new("b")]);
        assert!(grants.has(&Permission::public()));
    }
}
