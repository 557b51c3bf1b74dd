//! Standard conformance scripts
//!
//! Each script builds its own inputs and grant set, so runs never share
//! state. Registers `r0..` are the wrapped inputs; step `i` writes register
//! `inputs + i`.

use crate::script::{Arg, Fixture, Script, Step};
use std::sync::Arc;
use warden_proxy::{Dict, Grants, List, NativeFunction, Operation, PolicyChecker, Record, TypeName, Value};

/// Permission for reading protected content
pub const VIEW: &str = "zope.View";
/// Permission for mutating in place
pub const EDIT: &str = "zope.Edit";

/// Every standard script, in run order
pub fn standard_scripts() -> Vec<Script> {
    vec![mixed(), identity(), in_place(), mediation(), arithmetic()]
}

fn widget() -> Value {
    Record::new("pkg.Type")
        .with("name", "widget")
        .with("rank", 2)
        .ordered_by("rank")
        .displayed_as("widget")
        .into_value()
}

fn mixed_fixture() -> Fixture {
    let grants = Arc::new(Grants::new());
    let checker = PolicyChecker::new(grants.clone())
        .public_all(["len", "iter", "next", "add", "contains"])
        .protect("item-get", VIEW)
        .protect("name", VIEW)
        .protect("str", VIEW)
        .protect("lt", VIEW)
        .protect("inplace-add", EDIT)
        .into_ref();
    Fixture {
        inputs: vec![
            List::of([1, 2, 3]).into_value(),
            widget(),
            Dict::of([("a", 1)]).into_value(),
        ],
        grants,
        checker,
    }
}

/// Twenty steps mixing checked reads, grants, in-place updates and escapes
pub fn mixed() -> Script {
    Script {
        name: "mixed",
        description: "checked reads, grant changes, in-place updates, iteration, writes and escapes",
        setup: mixed_fixture,
        steps: vec![
            Step::unary(0, Operation::Len),
            Step::with(0, Operation::GetItem, 0),
            Step::unary(1, Operation::Str),
            Step::get(1, "name"),
            Step::grant(VIEW),
            Step::with(0, Operation::GetItem, 0),
            Step::get(1, "name"),
            Step::unary(1, Operation::Str),
            Step::with(0, Operation::IAdd, List::of([4]).into_value()),
            Step::grant(EDIT),
            Step::with(0, Operation::IAdd, List::of([4]).into_value()),
            Step::unary(0, Operation::Iter),
            Step::set(1, "name", "gadget"),
            Step::unary(14, Operation::Next),
            Step::unary(1, Operation::Hash),
            Step::with(0, Operation::Add, List::of([9]).into_value()),
            Step::revoke(VIEW),
            Step::with(0, Operation::GetItem, 0),
            Step::delete(2, "_wrapped"),
            Step::unwrap(0),
        ],
    }
}

fn ranked(rank: i64) -> Value {
    Record::new("pkg.Ranked")
        .with("rank", rank)
        .ordered_by("rank")
        .into_value()
}

fn deny_all_fixture() -> Fixture {
    let grants = Arc::new(Grants::new());
    let checker = PolicyChecker::new(grants.clone()).into_ref();
    Fixture {
        inputs: vec![ranked(1), ranked(2)],
        grants,
        checker,
    }
}

/// Identity machinery keeps working when every checked operation is denied
pub fn identity() -> Script {
    Script {
        name: "deny-all-identity",
        description: "hash, truth and ordering bypass a checker that denies everything",
        setup: deny_all_fixture,
        steps: vec![
            Step::unary(0, Operation::Hash),
            Step::unary(0, Operation::Bool),
            Step::with(0, Operation::Compare, Arg::reg(1)),
            Step::with(1, Operation::Compare, Arg::reg(0)),
            Step::with(0, Operation::Eq, Arg::reg(1)),
            Step::unary(0, Operation::Str),
            Step::unary(0, Operation::Repr),
            Step::unary(0, Operation::Len),
            Step::get(0, "rank"),
            Step::set(0, "rank", 5),
            Step::with(0, Operation::Compare, Arg::reg(1)),
            Step::unwrap(0),
        ],
    }
}

fn in_place_fixture() -> Fixture {
    let grants = Arc::new(Grants::new());
    let checker = PolicyChecker::new(grants.clone())
        .public_all(["len", "iter", "next", "inplace-add", "inplace-or", "inplace-mul"])
        .into_ref();
    Fixture {
        inputs: vec![
            List::of([1]).into_value(),
            Dict::of([("a", 1)]).into_value(),
            Value::Int(1),
        ],
        grants,
        checker,
    }
}

/// True in-place updates keep the proxy, fallbacks produce a new one
pub fn in_place() -> Script {
    Script {
        name: "in-place",
        description: "in-place operators on mutable and immutable targets",
        setup: in_place_fixture,
        steps: vec![
            Step::with(0, Operation::IAdd, Arg::reg(0)),
            Step::unary(0, Operation::Len),
            Step::with(1, Operation::IOr, Dict::of([("b", 2)]).into_value()),
            Step::unary(1, Operation::Len),
            Step::with(0, Operation::IMul, 2),
            Step::unary(0, Operation::Len),
            Step::with(0, Operation::ISub, 1),
            Step::with(2, Operation::IAdd, 5),
            Step::unwrap(0),
            Step::unwrap(1),
            Step::unwrap(2),
        ],
    }
}

fn mediation_fixture() -> Fixture {
    let grants = Arc::new(Grants::new());
    let checker = PolicyChecker::new(grants.clone())
        .public_all(["child", "items", "label", "ghost", "item-get", "call", "len"])
        .exempt(TypeName::parse("pkg.Value"))
        .into_ref();
    let child = || Record::new("pkg.Child").with("label", "c").into_value();
    let parent = Record::new("pkg.Parent")
        .with("child", child())
        .with("items", List::new(vec![child()]).into_value())
        .into_value();
    let factory = NativeFunction::new("factory", |_| Ok(Record::new("pkg.Value").into_value()));
    Fixture {
        inputs: vec![parent, factory.into_value()],
        grants,
        checker,
    }
}

/// Results are wrapped with the same checker unless exempt
pub fn mediation() -> Script {
    Script {
        name: "mediation",
        description: "attribute, item and call results come back proxied",
        setup: mediation_fixture,
        steps: vec![
            Step::get(0, "child"),
            Step::get(2, "label"),
            Step::get(0, "items"),
            Step::with(4, Operation::GetItem, 0),
            Step::apply(1, Operation::Call, Vec::new()),
            Step::get(0, "missing"),
            Step::get(0, "ghost"),
            Step::unary(5, Operation::Len),
            Step::unwrap(2),
        ],
    }
}

fn arithmetic_fixture() -> Fixture {
    let grants = Arc::new(Grants::new());
    let checker = PolicyChecker::new(grants.clone())
        .public_all(["add", "sub", "mul", "floordiv", "mod", "truediv", "radd", "inplace-add"])
        .into_ref();
    Fixture {
        inputs: vec![Value::Int(7)],
        grants,
        checker,
    }
}

/// Numeric operators on a proxied integer
pub fn arithmetic() -> Script {
    Script {
        name: "arithmetic",
        description: "forward, reflected and in-place arithmetic on a proxied int",
        setup: arithmetic_fixture,
        steps: vec![
            Step::with(0, Operation::Add, 3),
            Step::with(0, Operation::FloorDiv, 0),
            Step::with(0, Operation::Mod, -2),
            Step::with(0, Operation::IAdd, 1),
            Step::with(4, Operation::Add, 0),
            Step::with(0, Operation::Pow, 2),
            Step::with(0, Operation::RSub, 10),
            Step::with(0, Operation::RAdd, 1),
            Step::unary(0, Operation::Neg),
            Step::unary(0, Operation::Hash),
            Step::with(0, Operation::TrueDiv, 2),
            Step::unwrap(4),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_script_names_are_unique() {
        let scripts = standard_scripts();
        let names: HashSet<_> = scripts.iter().map(|s| s.name).collect();
        assert_eq!(names.len(), scripts.len());
    }

    #[test]
    fn test_mixed_has_twenty_steps() {
        assert_eq!(mixed().steps.len(), 20);
    }

    #[test]
    fn test_registers_refer_backwards() {
        for script in standard_scripts() {
            let inputs = (script.setup)().inputs.len();
            for (index, step) in script.steps.iter().enumerate() {
                let available = inputs + index;
                let target = match step {
                    Step::Get { target, .. }
                    | Step::Set { target, .. }
                    | Step::Delete { target, .. }
                    | Step::Apply { target, .. }
                    | Step::Unwrap { target } => Some(*target),
                    Step::Grant(_) | Step::Revoke(_) => None,
                };
                if let Some(target) = target {
                    assert!(target < available, "{} step {} reads r{}", script.name, index, target);
                }
            }
        }
    }
}
