//! Conformance scripts
//!
//! A script is a fixture plus a list of steps over numbered registers. The
//! fixture's inputs are wrapped with its checker and become registers `r0..`;
//! every step appends one more register holding its result (`None` when the
//! step fails or has no result).

use crate::trace::{Outcome, Shape, Trace, TraceEntry};
use std::fmt;
use std::sync::Arc;
use warden_proxy::backend::Backend;
use warden_proxy::{host, CheckerRef, Grants, Operation, Proxy, ProxyError, Value};

/// Fresh state for one run of a script
pub struct Fixture {
    /// Values to wrap, in register order
    pub inputs: Vec<Value>,
    /// Grant set the checker consults
    pub grants: Arc<Grants>,
    /// Checker every input is wrapped with
    pub checker: CheckerRef,
}

/// Step argument
#[derive(Debug, Clone)]
pub enum Arg {
    /// Contents of a register
    Reg(usize),
    /// A literal value
    Lit(Value),
}

impl Arg {
    /// Register reference
    pub fn reg(index: usize) -> Self {
        Arg::Reg(index)
    }
}

macro_rules! literal_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Arg {
            fn from(value: $ty) -> Self {
                Arg::Lit(value.into())
            }
        })*
    };
}

literal_from!(Value, bool, i32, i64, f64, &str);

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Reg(index) => write!(f, "r{}", index),
            Arg::Lit(value) if value.is_primitive() => {
                write!(f, "{}", host::repr(value).unwrap_or_default())
            }
            Arg::Lit(value) => write!(f, "<{}>", value.type_name()),
        }
    }
}

/// One scripted action
#[derive(Debug, Clone)]
pub enum Step {
    /// Checked attribute read
    Get {
        /// Register holding the proxy
        target: usize,
        /// Attribute name
        name: String,
    },
    /// Unchecked attribute write
    Set {
        /// Register holding the proxy
        target: usize,
        /// Attribute name
        name: String,
        /// Value written
        value: Arg,
    },
    /// Unchecked attribute delete
    Delete {
        /// Register holding the proxy
        target: usize,
        /// Attribute name
        name: String,
    },
    /// Catalog operation
    Apply {
        /// Register holding the receiver
        target: usize,
        /// Operation
        op: Operation,
        /// Arguments
        args: Vec<Arg>,
    },
    /// Escape to the wrapped value
    Unwrap {
        /// Register holding the proxy
        target: usize,
    },
    /// Grant a permission to the fixture's principal
    Grant(String),
    /// Revoke a permission
    Revoke(String),
}

impl Step {
    /// Attribute read
    pub fn get(target: usize, name: &str) -> Self {
        Step::Get {
            target,
            name: name.to_string(),
        }
    }

    /// Attribute write
    pub fn set(target: usize, name: &str, value: impl Into<Arg>) -> Self {
        Step::Set {
            target,
            name: name.to_string(),
            value: value.into(),
        }
    }

    /// Attribute delete
    pub fn delete(target: usize, name: &str) -> Self {
        Step::Delete {
            target,
            name: name.to_string(),
        }
    }

    /// Operation with arguments
    pub fn apply(target: usize, op: Operation, args: Vec<Arg>) -> Self {
        Step::Apply { target, op, args }
    }

    /// Operation without arguments
    pub fn unary(target: usize, op: Operation) -> Self {
        Step::Apply {
            target,
            op,
            args: Vec::new(),
        }
    }

    /// Operation with one argument
    pub fn with(target: usize, op: Operation, arg: impl Into<Arg>) -> Self {
        Step::Apply {
            target,
            op,
            args: vec![arg.into()],
        }
    }

    /// Escape
    pub fn unwrap(target: usize) -> Self {
        Step::Unwrap { target }
    }

    /// Grant
    pub fn grant(permission: &str) -> Self {
        Step::Grant(permission.to_string())
    }

    /// Revoke
    pub fn revoke(permission: &str) -> Self {
        Step::Revoke(permission.to_string())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Get { target, name } => write!(f, "r{}.{}", target, name),
            Step::Set { target, name, value } => write!(f, "r{}.{} = {}", target, name, value),
            Step::Delete { target, name } => write!(f, "del r{}.{}", target, name),
            Step::Apply { target, op, args } => {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "r{} {}({})", target, op, args.join(", "))
            }
            Step::Unwrap { target } => write!(f, "unwrap(r{})", target),
            Step::Grant(permission) => write!(f, "grant {}", permission),
            Step::Revoke(permission) => write!(f, "revoke {}", permission),
        }
    }
}

/// Named, self-contained conformance script
pub struct Script {
    /// Unique name, used for filtering
    pub name: &'static str,
    /// What the script exercises
    pub description: &'static str,
    /// Builds fresh inputs and policy for each run
    pub setup: fn() -> Fixture,
    /// Steps, in order
    pub steps: Vec<Step>,
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("name", &self.name)
            .field("steps", &self.steps.len())
            .finish()
    }
}

struct Machine<'a> {
    backend: &'a dyn Backend,
    fixture: Fixture,
    registers: Vec<Option<Value>>,
}

impl Machine<'_> {
    fn register(&self, index: usize) -> Result<Value, ProxyError> {
        self.registers
            .get(index)
            .cloned()
            .flatten()
            .ok_or_else(|| ProxyError::TypeMismatch(format!("register r{} is empty", index)))
    }

    fn resolve(&self, arg: &Arg) -> Result<Value, ProxyError> {
        match arg {
            Arg::Reg(index) => self.register(*index),
            Arg::Lit(value) => Ok(value.clone()),
        }
    }

    fn proxy(&self, index: usize) -> Result<Proxy, ProxyError> {
        match self.register(index)? {
            Value::Proxy(proxy) => Ok(proxy),
            _ => Err(ProxyError::NotAProxy),
        }
    }

    fn step(&mut self, step: &Step) -> (Outcome, Option<Value>) {
        let result = match step {
            Step::Get { target, name } => self
                .proxy(*target)
                .and_then(|proxy| proxy.get(name))
                .map(|value| (Shape::of(&value, None), Some(value))),
            Step::Set { target, name, value } => self
                .resolve(value)
                .and_then(|value| self.proxy(*target)?.set(name, value))
                .map(|()| (Shape::Unit, None)),
            Step::Delete { target, name } => self
                .proxy(*target)
                .and_then(|proxy| proxy.delete(name))
                .map(|()| (Shape::Unit, None)),
            Step::Apply { target, op, args } => self.apply(*target, *op, args),
            Step::Unwrap { target } => self.register(*target).map(|value| {
                let raw = warden_proxy::unwrap(&value);
                let original = self.fixture.inputs.get(*target).map(|input| input.is_same(&raw));
                (Shape::raw(&raw, original.unwrap_or(false)), Some(raw))
            }),
            Step::Grant(permission) => {
                self.fixture.grants.grant(permission.as_str());
                Ok((Shape::Unit, None))
            }
            Step::Revoke(permission) => {
                self.fixture.grants.revoke(&permission.as_str().into());
                Ok((Shape::Unit, None))
            }
        };
        match result {
            Ok((shape, value)) => (Outcome::Ok(shape), value),
            Err(err) => (Outcome::from_error(&err), None),
        }
    }

    fn apply(&self, target: usize, op: Operation, args: &[Arg]) -> Result<(Shape, Option<Value>), ProxyError> {
        let receiver = self.register(target)?;
        let args = args
            .iter()
            .map(|arg| self.resolve(arg))
            .collect::<Result<Vec<_>, _>>()?;
        let value = host::apply(&receiver, op, &args)?;
        let same = match (&receiver, &value) {
            (Value::Proxy(a), Value::Proxy(b)) => Some(Proxy::ptr_eq(a, b)),
            _ => None,
        };
        Ok((Shape::of(&value, same), Some(value)))
    }
}

/// Run `script` on `backend` and record what each step did
pub fn run(backend: &dyn Backend, script: &Script) -> Trace {
    let fixture = (script.setup)();
    let registers = fixture
        .inputs
        .iter()
        .map(|input| Some(Value::Proxy(backend.wrap(input.clone(), fixture.checker.clone()))))
        .collect();
    let mut machine = Machine {
        backend,
        fixture,
        registers,
    };

    let mut trace = Trace::new(script.name, machine.backend.kind());
    for (index, step) in script.steps.iter().enumerate() {
        let (outcome, value) = machine.step(step);
        tracing::trace!(
            script = script.name,
            backend = %machine.backend.kind(),
            step = index,
            %outcome,
            "step"
        );
        machine.registers.push(value);
        trace.push(TraceEntry {
            index,
            label: step.to_string(),
            outcome,
        });
    }
    trace
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_proxy::{backend, List, PolicyChecker};

    fn fixture() -> Fixture {
        let grants = Arc::new(Grants::new());
        let checker = PolicyChecker::new(grants.clone())
            .public("len")
            .protect("item-get", "zope.View")
            .into_ref();
        Fixture {
            inputs: vec![List::of([1, 2, 3]).into_value()],
            grants,
            checker,
        }
    }

    #[test]
    fn test_step_labels() {
        assert_eq!(Step::with(0, Operation::GetItem, 1).to_string(), "r0 item-get(1)");
        assert_eq!(Step::get(2, "name").to_string(), "r2.name");
        assert_eq!(Step::set(1, "x", Arg::reg(3)).to_string(), "r1.x = r3");
        assert_eq!(Step::grant("zope.View").to_string(), "grant zope.View");
    }

    #[test]
    fn test_run_records_each_step() {
        let script = Script {
            name: "sample",
            description: "grant toggles item access",
            setup: fixture,
            steps: vec![
                Step::unary(0, Operation::Len),
                Step::with(0, Operation::GetItem, 0),
                Step::grant("zope.View"),
                Step::with(0, Operation::GetItem, 0),
                Step::unwrap(0),
            ],
        };
        let trace = run(backend::portable(), &script);
        let outcomes: Vec<String> = trace.entries().iter().map(|e| e.outcome.to_string()).collect();
        assert_eq!(
            outcomes,
            vec![
                "ok int 3",
                "denied item-get",
                "ok unit",
                "ok int 1",
                "ok raw builtins.list (original)",
            ]
        );
    }

    #[test]
    fn test_empty_register_is_an_error() {
        let script = Script {
            name: "empty",
            description: "failed steps leave empty registers",
            setup: fixture,
            steps: vec![
                Step::with(0, Operation::GetItem, 0),
                Step::unary(1, Operation::Len),
            ],
        };
        let trace = run(backend::portable(), &script);
        assert_eq!(trace.entries()[1].outcome.to_string(), "error type-mismatch");
    }
}
