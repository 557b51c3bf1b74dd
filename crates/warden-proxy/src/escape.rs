//! Trusted construction and escape operations
//!
//! These bypass the checker entirely. They are meant for the infrastructure
//! that creates proxies and for code that is already trusted, never for the
//! code being protected.

use crate::backend;
use crate::checker::{CheckerRef, Permission};
use crate::error::{ProxyError, ProxyResult};
use crate::object::TypeName;
use crate::registry::CheckerSource;
use crate::value::Value;
use std::any::Any;
use std::sync::Arc;

/// Where [`make`] gets its checker from
#[derive(Clone)]
pub enum Guard {
    /// Use this checker
    Checker(CheckerRef),
    /// Ask a source; values it has no checker for stay unproxied
    Source(Arc<dyn CheckerSource>),
    /// No checker at all; construction fails
    None,
}

impl From<CheckerRef> for Guard {
    fn from(checker: CheckerRef) -> Self {
        Guard::Checker(checker)
    }
}

impl From<Option<CheckerRef>> for Guard {
    fn from(checker: Option<CheckerRef>) -> Self {
        checker.map_or(Guard::None, Guard::Checker)
    }
}

/// Wrap `wrapped` on the active backend
///
/// A value that is already a proxy is returned as is when it carries the
/// same checker, and refused when it carries a different one.
pub fn make(wrapped: impl Into<Value>, guard: impl Into<Guard>) -> ProxyResult<Value> {
    let wrapped = wrapped.into();
    let checker = match guard.into() {
        Guard::Checker(checker) => checker,
        Guard::Source(source) => {
            if wrapped.is_proxy() {
                return Ok(wrapped);
            }
            match source.checker_for(&wrapped) {
                Some(checker) => checker,
                None => return Ok(wrapped),
            }
        }
        Guard::None => return backend::active().construct(wrapped, None).map(Value::Proxy),
    };

    if let Value::Proxy(existing) = &wrapped {
        if Arc::ptr_eq(existing.checker(), &checker) {
            return Ok(wrapped);
        }
        return Err(ProxyError::ProxyCheckerMismatch);
    }
    Ok(Value::Proxy(backend::active().wrap(wrapped, checker)))
}

/// The value inside a proxy, one level deep; other values are returned as is
pub fn unwrap(value: &Value) -> Value {
    match value {
        Value::Proxy(proxy) => proxy.backend().unwrap(proxy),
        other => other.clone(),
    }
}

/// The checker of a proxy
pub fn get_checker(value: &Value) -> ProxyResult<CheckerRef> {
    match value {
        Value::Proxy(proxy) => Ok(proxy.checker().clone()),
        _ => Err(ProxyError::NotAProxy),
    }
}

/// The permissions a proxy's checker declares, sorted by name
pub fn get_permissions(value: &Value) -> ProxyResult<Vec<(String, Permission)>> {
    let mut permissions = get_checker(value)?.permissions();
    permissions.sort();
    Ok(permissions)
}

/// Type test that sees through proxies
pub fn is_instance_of<T: Any>(value: &Value) -> bool {
    fully_unwrapped(value).downcast_ref::<T>().is_some()
}

/// Declared-type test that sees through proxies
pub fn is_instance_of_type(value: &Value, type_name: &TypeName) -> bool {
    fully_unwrapped(value).type_name() == *type_name
}

fn fully_unwrapped(value: &Value) -> Value {
    let mut current = value.clone();
    while let Value::Proxy(proxy) = &current {
        let inner = proxy.wrapped();
        current = inner;
    }
    current
}
