//! Accelerated backend: table-driven dispatch
//!
//! The strategy for every operation is resolved at compile time into a
//! 256-entry table indexed by the operation's byte, so dispatch is one load
//! with no hashing. Proxies use a fixed `repr(C)` layout with the checker
//! first.

use super::{execute, Backend, BackendKind};
use crate::catalog::{Operation, Strategy, OPERATION_COUNT};
use crate::checker::CheckerRef;
use crate::error::ProxyResult;
use crate::proxy::{Proxy, ProxyImpl};
use crate::value::Value;
use parking_lot::RwLock;

const fn build_strategy_table() -> [Strategy; 256] {
    let mut table = [Strategy::CheckedForwarding; 256];
    let mut i = 0;
    while i < OPERATION_COUNT {
        let op = Operation::ALL[i];
        table[op as u8 as usize] = op.strategy();
        i += 1;
    }
    table
}

static STRATEGIES: [Strategy; 256] = build_strategy_table();

/// Backend that resolves strategies through a const table
#[derive(Debug)]
pub(crate) struct AcceleratedBackend;

impl Backend for AcceleratedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Accelerated
    }

    fn wrap(&self, wrapped: Value, checker: CheckerRef) -> Proxy {
        Proxy::from_impl(AcceleratedProxy {
            checker,
            wrapped: RwLock::new(wrapped),
        })
    }

    #[inline]
    fn dispatch(&self, proxy: &Proxy, op: Operation, args: &[Value]) -> ProxyResult<Value> {
        execute(proxy, STRATEGIES[op.to_u8() as usize], op, args)
    }
}

#[repr(C)]
struct AcceleratedProxy {
    checker: CheckerRef,
    wrapped: RwLock<Value>,
}

impl ProxyImpl for AcceleratedProxy {
    fn backend(&self) -> &'static dyn Backend {
        &AcceleratedBackend
    }

    #[inline]
    fn wrapped(&self) -> Value {
        self.wrapped.read().clone()
    }

    fn replace_wrapped(&self, value: Value) -> Value {
        std::mem::replace(&mut *self.wrapped.write(), value)
    }

    #[inline]
    fn checker(&self) -> &CheckerRef {
        &self.checker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    #[test]
    fn test_table_agrees_with_catalog() {
        for op in Operation::ALL {
            assert_eq!(
                Some(STRATEGIES[op.to_u8() as usize]),
                Catalog::global().strategy(op.name()),
                "strategy for {}",
                op
            );
        }
    }
}
