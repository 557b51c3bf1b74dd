//! Portable backend: dynamic, name-keyed dispatch

use super::{execute, Backend, BackendKind};
use crate::catalog::{Catalog, Operation};
use crate::checker::CheckerRef;
use crate::error::{ProxyError, ProxyResult};
use crate::proxy::{Proxy, ProxyImpl};
use crate::value::Value;
use parking_lot::RwLock;

/// Backend that resolves every operation through the catalog by name
#[derive(Debug)]
pub(crate) struct PortableBackend;

impl Backend for PortableBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Portable
    }

    fn wrap(&self, wrapped: Value, checker: CheckerRef) -> Proxy {
        Proxy::from_impl(PortableProxy {
            wrapped: RwLock::new(wrapped),
            checker,
        })
    }

    fn dispatch(&self, proxy: &Proxy, op: Operation, args: &[Value]) -> ProxyResult<Value> {
        let entry = Catalog::global()
            .lookup(op.name())
            .ok_or_else(|| ProxyError::unsupported(Proxy::type_name(), op))?;
        execute(proxy, entry.strategy, op, args)
    }
}

struct PortableProxy {
    wrapped: RwLock<Value>,
    checker: CheckerRef,
}

impl ProxyImpl for PortableProxy {
    fn backend(&self) -> &'static dyn Backend {
        &PortableBackend
    }

    fn wrapped(&self) -> Value {
        self.wrapped.read().clone()
    }

    fn replace_wrapped(&self, value: Value) -> Value {
        std::mem::replace(&mut *self.wrapped.write(), value)
    }

    fn checker(&self) -> &CheckerRef {
        &self.checker
    }
}
