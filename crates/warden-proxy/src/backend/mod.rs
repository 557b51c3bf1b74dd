//! Proxy backends
//!
//! Two interchangeable implementations of the proxy protocol:
//!
//! | Backend       | Strategy lookup                              | Layout      |
//! |---------------|----------------------------------------------|-------------|
//! | `portable`    | name-keyed [`Catalog`] lookup per operation  | Rust layout |
//! | `accelerated` | const table indexed by the operation byte    | `repr(C)`   |
//!
//! Exactly one backend is active per process. It is chosen once, either
//! explicitly through [`install`] or on first use. Both backends stay usable
//! side by side through [`portable`] and [`accelerated`] so their behavior can
//! be compared.
//!
//! [`Catalog`]: crate::catalog::Catalog

#[cfg(feature = "accelerated")]
mod accelerated;
mod portable;

use crate::catalog::{Operation, Strategy};
use crate::checker::{CheckerRef, Mediator};
use crate::error::{ProxyError, ProxyResult};
use crate::host;
use crate::proxy::{redacted_repr, Proxy, RESERVED_FIELDS};
use crate::value::Value;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend implementation in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Name-keyed dispatch
    Portable,
    /// Table-driven dispatch
    Accelerated,
}

impl BackendKind {
    /// Human-readable backend name
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Portable => "portable",
            BackendKind::Accelerated => "accelerated",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Requested backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Accelerated when compiled in, portable otherwise
    #[default]
    Auto,
    /// Always the portable backend
    Portable,
    /// The accelerated backend; portable if it is not compiled in
    Accelerated,
}

/// Proxy protocol implementation
///
/// Call sites only use this contract, never a concrete backend.
pub trait Backend: Send + Sync + fmt::Debug {
    /// Which implementation this is
    fn kind(&self) -> BackendKind;

    /// Create a proxy around `wrapped`
    fn wrap(&self, wrapped: Value, checker: CheckerRef) -> Proxy;

    /// Route a catalog operation through `proxy`
    fn dispatch(&self, proxy: &Proxy, op: Operation, args: &[Value]) -> ProxyResult<Value>;

    /// Create a proxy, refusing to do so without a checker
    fn construct(&self, wrapped: Value, checker: Option<CheckerRef>) -> ProxyResult<Proxy> {
        match checker {
            Some(checker) => Ok(self.wrap(wrapped, checker)),
            None => {
                tracing::warn!(
                    backend = %self.kind(),
                    wrapped = %wrapped.type_name(),
                    "refusing to construct proxy without a checker"
                );
                Err(ProxyError::MissingChecker)
            }
        }
    }

    /// Checked attribute read
    fn get(&self, proxy: &Proxy, name: &str) -> ProxyResult<Value> {
        let wrapped = proxy.wrapped();
        proxy.checker().check(&wrapped, name)?;
        let value = host::get_attr(&wrapped, name)?;
        Ok(mediate(proxy, value))
    }

    /// Unchecked attribute write
    fn set(&self, proxy: &Proxy, name: &str, value: Value) -> ProxyResult<()> {
        host::set_attr(&proxy.wrapped(), name, value)
    }

    /// Unchecked attribute delete; the proxy's own fields cannot be deleted
    fn delete(&self, proxy: &Proxy, name: &str) -> ProxyResult<()> {
        if RESERVED_FIELDS.contains(&name) {
            return Err(ProxyError::ReservedField(name.to_string()));
        }
        host::del_attr(&proxy.wrapped(), name)
    }

    /// Wrapped value, bypassing every check
    fn unwrap(&self, proxy: &Proxy) -> Value {
        proxy.wrapped()
    }
}

/// Run `op` on `proxy` under `strategy`
///
/// Shared by both backends; they differ only in how the strategy is found.
pub(crate) fn execute(
    proxy: &Proxy,
    strategy: Strategy,
    op: Operation,
    args: &[Value],
) -> ProxyResult<Value> {
    match strategy {
        Strategy::Unchecked => host::apply(&proxy.wrapped(), op, args),
        Strategy::CheckedForwarding => forward(proxy, op, args),
        Strategy::CheckedInPlace => in_place(proxy, op, args),
    }
}

fn mediate(proxy: &Proxy, value: Value) -> Value {
    let mediator = Mediator::new(proxy.backend(), proxy.checker());
    proxy.checker().mediate(value, &mediator)
}

fn forward(proxy: &Proxy, op: Operation, args: &[Value]) -> ProxyResult<Value> {
    let wrapped = proxy.wrapped();
    if let Err(err) = proxy.checker().check(&wrapped, op.name()) {
        if op.is_conversion_fallback() && err.is_denial() {
            tracing::debug!(
                operation = op.name(),
                wrapped = %wrapped.type_name(),
                "conversion denied, rendering redacted form"
            );
            return Ok(Value::str(redacted_repr(&wrapped)));
        }
        return Err(err);
    }
    let result = host::apply(&wrapped, op, args)?;
    Ok(mediate(proxy, result))
}

fn in_place(proxy: &Proxy, op: Operation, args: &[Value]) -> ProxyResult<Value> {
    let wrapped = proxy.wrapped();
    proxy.checker().check(&wrapped, op.name())?;

    let true_in_place = match &wrapped {
        Value::Object(obj) => obj.clone().in_place(op, args),
        Value::Proxy(inner) => Some(inner.dispatch(op, args)),
        _ => None,
    };
    if let Some(result) = true_in_place {
        proxy.replace_wrapped(result?);
        return Ok(Value::Proxy(proxy.clone()));
    }

    let forward = op
        .forward()
        .ok_or_else(|| ProxyError::unsupported(wrapped.type_name(), op))?;
    let result = host::binary(forward, &wrapped, host::operand(op, args, 0)?)?;
    Ok(Value::Proxy(proxy.backend().wrap(result, proxy.checker().clone())))
}

/// The portable backend
pub fn portable() -> &'static dyn Backend {
    &portable::PortableBackend
}

/// The accelerated backend, if compiled in
pub fn accelerated() -> Option<&'static dyn Backend> {
    #[cfg(feature = "accelerated")]
    {
        Some(&accelerated::AcceleratedBackend)
    }
    #[cfg(not(feature = "accelerated"))]
    {
        None
    }
}

/// Backend of a given kind, if compiled in
pub fn for_kind(kind: BackendKind) -> Option<&'static dyn Backend> {
    match kind {
        BackendKind::Portable => Some(portable()),
        BackendKind::Accelerated => accelerated(),
    }
}

/// Every compiled-in backend
pub fn available() -> Vec<&'static dyn Backend> {
    std::iter::once(portable()).chain(accelerated()).collect()
}

/// Resolve a preference to a backend
pub fn select(preference: BackendPreference) -> &'static dyn Backend {
    match preference {
        BackendPreference::Portable => portable(),
        BackendPreference::Auto => accelerated().unwrap_or_else(portable),
        BackendPreference::Accelerated => accelerated().unwrap_or_else(|| {
            tracing::warn!("accelerated backend requested but not compiled in, using portable");
            portable()
        }),
    }
}

static ACTIVE: OnceCell<&'static dyn Backend> = OnceCell::new();

fn activate(preference: BackendPreference) -> &'static dyn Backend {
    let backend = select(preference);
    tracing::info!(backend = %backend.kind(), ?preference, "security proxy backend selected");
    backend
}

/// Install the process-wide backend
///
/// Only the first selection takes effect, whether made here or by
/// [`active`]. Returns the backend that is actually active.
pub fn install(preference: BackendPreference) -> BackendKind {
    let backend = *ACTIVE.get_or_init(|| activate(preference));
    if preference != BackendPreference::Auto && backend.kind() != select(preference).kind() {
        tracing::debug!(
            active = %backend.kind(),
            ?preference,
            "backend already selected, ignoring preference"
        );
    }
    backend.kind()
}

/// The process-wide backend, selecting `Auto` if none was installed
pub fn active() -> &'static dyn Backend {
    *ACTIVE.get_or_init(|| activate(BackendPreference::Auto))
}
