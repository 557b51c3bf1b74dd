//! Security proxy handle
//!
//! A [`Proxy`] pairs one wrapped value with one checker. Reads and operator
//! use are checked, writes are forwarded unchecked, and results are mediated
//! so that whatever comes out of a proxy is itself proxied.
//!
//! Equality, ordering, hashing and truthiness never consult the checker; they
//! answer for the wrapped value directly.

use crate::backend::{Backend, BackendKind};
use crate::catalog::Operation;
use crate::checker::CheckerRef;
use crate::error::{ProxyError, ProxyResult};
use crate::host;
use crate::object::TypeName;
use crate::value::Value;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Names of the proxy's own fields; they can never be deleted through it
pub const RESERVED_FIELDS: [&str; 2] = ["_wrapped", "_checker"];

/// Module the proxy type is declared in
const PROXY_MODULE: &str = "warden.proxy";

/// Backend-specific proxy storage
pub(crate) trait ProxyImpl: Send + Sync {
    /// Backend that created this proxy
    fn backend(&self) -> &'static dyn Backend;

    /// Clone of the wrapped value
    fn wrapped(&self) -> Value;

    /// Swap the wrapped value, returning the old one
    fn replace_wrapped(&self, value: Value) -> Value;

    /// The checker
    fn checker(&self) -> &CheckerRef;
}

/// Security proxy around a value
///
/// Cloning the handle shares the proxy; it does not create a new identity.
#[derive(Clone)]
pub struct Proxy {
    inner: Arc<dyn ProxyImpl>,
}

impl Proxy {
    pub(crate) fn from_impl(inner: impl ProxyImpl + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Declared type of every proxy
    pub fn type_name() -> TypeName {
        TypeName::new(PROXY_MODULE, "Proxy")
    }

    pub(crate) fn backend(&self) -> &'static dyn Backend {
        self.inner.backend()
    }

    pub(crate) fn wrapped(&self) -> Value {
        self.inner.wrapped()
    }

    pub(crate) fn replace_wrapped(&self, value: Value) -> Value {
        self.inner.replace_wrapped(value)
    }

    pub(crate) fn checker(&self) -> &CheckerRef {
        self.inner.checker()
    }

    /// Backend this proxy was created on
    pub fn backend_kind(&self) -> BackendKind {
        self.backend().kind()
    }

    /// Check if both handles refer to the same proxy
    pub fn ptr_eq(a: &Proxy, b: &Proxy) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Identity of this proxy, distinct from the wrapped value's
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    /// Checked attribute read
    pub fn get(&self, name: &str) -> ProxyResult<Value> {
        self.backend().get(self, name)
    }

    /// Unchecked attribute write
    pub fn set(&self, name: &str, value: impl Into<Value>) -> ProxyResult<()> {
        self.backend().set(self, name, value.into())
    }

    /// Unchecked attribute delete
    pub fn delete(&self, name: &str) -> ProxyResult<()> {
        self.backend().delete(self, name)
    }

    /// Perform any catalog operation
    pub fn dispatch(&self, op: Operation, args: &[Value]) -> ProxyResult<Value> {
        self.backend().dispatch(self, op, args)
    }

    /// Call the wrapped value
    pub fn call(&self, args: &[Value]) -> ProxyResult<Value> {
        self.dispatch(Operation::Call, args)
    }

    /// `proxy[key]`
    pub fn get_item(&self, key: impl Into<Value>) -> ProxyResult<Value> {
        self.dispatch(Operation::GetItem, &[key.into()])
    }

    /// `proxy[key] = value`
    pub fn set_item(&self, key: impl Into<Value>, value: impl Into<Value>) -> ProxyResult<()> {
        self.dispatch(Operation::SetItem, &[key.into(), value.into()])
            .map(|_| ())
    }

    /// `del proxy[key]`
    pub fn del_item(&self, key: impl Into<Value>) -> ProxyResult<()> {
        self.dispatch(Operation::DelItem, &[key.into()]).map(|_| ())
    }

    /// Length
    pub fn len(&self) -> ProxyResult<usize> {
        host::len(&Value::Proxy(self.clone()))
    }

    /// Membership test
    pub fn contains(&self, item: impl Into<Value>) -> ProxyResult<bool> {
        Ok(self.dispatch(Operation::Contains, &[item.into()])?.is_truthy())
    }

    /// Checked iteration
    pub fn iter(&self) -> ProxyResult<ProxyIter> {
        Ok(ProxyIter {
            iterator: Some(self.dispatch(Operation::Iter, &[])?),
        })
    }

    /// Text conversion; a denial yields the redacted form instead of an error
    pub fn to_str(&self) -> ProxyResult<String> {
        host::to_str(&Value::Proxy(self.clone()))
    }

    /// Representation; a denial yields the redacted form instead of an error
    pub fn repr(&self) -> ProxyResult<String> {
        host::repr(&Value::Proxy(self.clone()))
    }

    /// Apply an in-place operator
    ///
    /// Returns this same proxy when the wrapped value was updated in place,
    /// otherwise a new proxy around the result.
    pub fn in_place(&self, op: Operation, operand: impl Into<Value>) -> ProxyResult<Proxy> {
        match self.dispatch(op, &[operand.into()])? {
            Value::Proxy(proxy) => Ok(proxy),
            other => Err(ProxyError::TypeMismatch(format!(
                "'{}' produced unproxied {}",
                op,
                other.type_name()
            ))),
        }
    }

    /// Truthiness; unchecked
    pub fn is_truthy(&self) -> bool {
        self.wrapped().is_truthy()
    }
}

/// Redacted rendering used when string conversion is denied
pub fn redacted_repr(wrapped: &Value) -> String {
    let type_name = wrapped.type_name();
    format!(
        "<security proxied {}.{} instance at {:#x}>",
        type_name.module(),
        type_name.name(),
        wrapped.identity_token()
    )
}

/// Iterator over a proxied iterable
///
/// Each step is a checked `next`. An error ends the iteration after it is
/// yielded.
pub struct ProxyIter {
    iterator: Option<Value>,
}

impl Iterator for ProxyIter {
    type Item = ProxyResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let iterator = self.iterator.as_ref()?;
        match host::apply(iterator, Operation::Next, &[]) {
            Ok(item) => Some(Ok(item)),
            Err(ProxyError::StopIteration) => {
                self.iterator = None;
                None
            }
            Err(err) => {
                self.iterator = None;
                Some(Err(err))
            }
        }
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.wrapped() == other.wrapped()
    }
}

impl Eq for Proxy {}

impl PartialOrd for Proxy {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Proxy {
    fn cmp(&self, other: &Self) -> Ordering {
        self.wrapped().cmp(&other.wrapped())
    }
}

impl Hash for Proxy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.wrapped().hash(state)
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_str() {
            Ok(text) => f.write_str(&text),
            Err(_) => f.write_str(&redacted_repr(&self.wrapped())),
        }
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Proxy")
            .field(&format_args!("{}", redacted_repr(&self.wrapped())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend;
    use crate::builtins::{List, Record};
    use crate::checker::{Checker, CheckerRef};
    use crate::policy::{Grants, PolicyChecker};

    #[derive(Debug)]
    struct DenyAll;

    impl Checker for DenyAll {
        fn check(&self, _wrapped: &Value, name: &str) -> ProxyResult<()> {
            Err(ProxyError::forbidden(name))
        }
    }

    fn deny_all() -> CheckerRef {
        Arc::new(DenyAll)
    }

    #[test]
    fn test_redacted_repr_format() {
        let record = Record::new("pkg.Type").into_value();
        let proxy = backend::portable().wrap(record.clone(), deny_all());
        let expected = format!(
            "<security proxied pkg.Type instance at {:#x}>",
            record.identity_token()
        );
        assert_eq!(proxy.to_str().unwrap(), expected);
        assert_eq!(proxy.repr().unwrap(), expected);
        assert_eq!(proxy.to_string(), expected);
        assert_eq!(format!("{:?}", proxy), format!("Proxy({})", expected));
    }

    #[test]
    fn test_identity_machinery_ignores_checker() {
        let a = backend::portable().wrap(Value::Int(2), deny_all());
        let b = backend::portable().wrap(Value::Int(1), deny_all());
        let mut proxies = vec![a.clone(), b.clone()];
        proxies.sort();
        assert!(Proxy::ptr_eq(&proxies[0], &b));
        assert!(a.is_truthy());
        assert_ne!(a, b);
        assert_eq!(a, backend::portable().wrap(Value::Int(2), deny_all()));
    }

    #[test]
    fn test_proxy_identity_is_distinct() {
        let list = List::of([1]).into_value();
        let proxy = backend::portable().wrap(list.clone(), deny_all());
        assert_ne!(proxy.id(), list.identity_token());
        assert!(Proxy::ptr_eq(&proxy, &proxy.clone()));
    }

    #[test]
    fn test_reserved_fields() {
        let record = Record::new("pkg.Type").into_value();
        let proxy = backend::portable().wrap(record.clone(), deny_all());
        for name in RESERVED_FIELDS {
            assert_eq!(
                proxy.delete(name).unwrap_err(),
                ProxyError::ReservedField(name.to_string())
            );
        }
        proxy.set("_wrapped", 5).unwrap();
        assert_eq!(host::get_attr(&record, "_wrapped").unwrap(), Value::Int(5));
        assert!(proxy.get("_wrapped").unwrap_err().is_denial());
    }

    #[test]
    fn test_iteration_is_checked() {
        let grants = Arc::new(Grants::new());
        let checker = PolicyChecker::new(grants)
            .public_all(["iter", "next"])
            .into_ref();
        let proxy = backend::portable().wrap(List::of([1, 2]).into_value(), checker);
        let items: ProxyResult<Vec<Value>> = proxy.iter().unwrap().collect();
        assert_eq!(items.unwrap(), vec![Value::Int(1), Value::Int(2)]);
    }
}
