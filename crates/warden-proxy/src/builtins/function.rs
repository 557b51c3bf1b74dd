//! Host-provided callables

use crate::catalog::Operation;
use crate::error::{ProxyError, ProxyResult};
use crate::object::{Object, TypeName};
use crate::value::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

type Body = dyn Fn(&[Value]) -> ProxyResult<Value> + Send + Sync;

/// Function implemented in Rust
pub struct NativeFunction {
    name: String,
    body: Arc<Body>,
}

impl NativeFunction {
    /// Wrap a closure as a callable object
    pub fn new(
        name: &str,
        body: impl Fn(&[Value]) -> ProxyResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            body: Arc::new(body),
        }
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Move onto the heap as a value
    pub fn into_value(self) -> Value {
        Value::object(self)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction").field("name", &self.name).finish()
    }
}

impl Object for NativeFunction {
    fn type_name(&self) -> TypeName {
        TypeName::builtin("builtin_function")
    }

    fn dispatch(self: Arc<Self>, op: Operation, args: &[Value]) -> ProxyResult<Value> {
        match op {
            Operation::Call => (self.body)(args),
            _ => Err(ProxyError::unsupported(self.type_name(), op)),
        }
    }

    fn repr(&self) -> String {
        format!("<built-in function {}>", self.name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host;

    #[test]
    fn test_call() {
        let sum = NativeFunction::new("sum", |args| {
            Ok(Value::Int(args.iter().filter_map(Value::as_int).sum()))
        })
        .into_value();
        let result = host::apply(&sum, Operation::Call, &[Value::Int(2), Value::Int(3)]).unwrap();
        assert_eq!(result, Value::Int(5));
        assert_eq!(host::repr(&sum).unwrap(), "<built-in function sum>");
        assert!(host::apply(&sum, Operation::Len, &[]).unwrap_err().is_unsupported());
    }
}
