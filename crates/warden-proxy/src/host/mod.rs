//! Native operation semantics
//!
//! The host layer is what actually runs an operation once a proxy has let it
//! through. Proxies met along the way are dispatched through their own
//! checker, so nesting never bypasses a policy.
//!
//! Binary operators follow the usual two-sided protocol: the left operand is
//! asked first, and if it does not support the operation the right operand
//! gets the reflected form. Rich comparisons swap sides the same way, and
//! `eq`/`ne` finally fall back to identity.

mod numeric;

use crate::catalog::Operation;
use crate::error::{ProxyError, ProxyResult};
use crate::object::ObjectRef;
use crate::value::Value;
use rustc_hash::FxHasher;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::slice;

/// Apply `op` to `target` with full operator semantics
pub fn apply(target: &Value, op: Operation, args: &[Value]) -> ProxyResult<Value> {
    if let Value::Proxy(proxy) = target {
        return proxy.dispatch(op, args);
    }
    if op.is_binary() {
        return binary(op, target, operand(op, args, 0)?);
    }
    if op.is_reflected() {
        if let Some(forward) = op.reflected() {
            return binary(forward, operand(op, args, 0)?, target);
        }
    }
    if op.is_comparison() {
        return compare(op, target, operand(op, args, 0)?);
    }
    apply_direct(target, op, args)
}

/// Evaluate `lhs op rhs`, falling back to the reflected operator on `rhs`
pub fn binary(op: Operation, lhs: &Value, rhs: &Value) -> ProxyResult<Value> {
    if let Value::Proxy(proxy) = lhs {
        return proxy.dispatch(op, slice::from_ref(rhs));
    }
    match apply_direct(lhs, op, slice::from_ref(rhs)) {
        Err(err) if err.is_unsupported() && !rhs.is_primitive() => {
            let Some(reflected) = op.reflected() else {
                return Err(err);
            };
            match apply_side(rhs, reflected, lhs) {
                Err(other) if other.is_unsupported() => Err(err),
                result => result,
            }
        }
        result => result,
    }
}

/// Evaluate a rich comparison, swapping sides before giving up
pub fn compare(op: Operation, lhs: &Value, rhs: &Value) -> ProxyResult<Value> {
    if let Value::Proxy(proxy) = lhs {
        return proxy.dispatch(op, slice::from_ref(rhs));
    }
    match apply_direct(lhs, op, slice::from_ref(rhs)) {
        Err(err) if err.is_unsupported() => {
            if !rhs.is_primitive() {
                match apply_side(rhs, swapped(op), lhs) {
                    Err(other) if other.is_unsupported() => {}
                    result => return result,
                }
            }
            match op {
                Operation::Eq => Ok(Value::Bool(lhs.is_same(rhs))),
                Operation::Ne => Ok(Value::Bool(!lhs.is_same(rhs))),
                _ => Err(err),
            }
        }
        result => result,
    }
}

/// Equality as a boolean, with the same dispatch as `==`
pub fn equals(lhs: &Value, rhs: &Value) -> ProxyResult<bool> {
    Ok(compare(Operation::Eq, lhs, rhs)?.is_truthy())
}

/// Check whether `ordering` satisfies a rich comparison
pub fn comparison_holds(op: Operation, ordering: Ordering) -> bool {
    match op {
        Operation::Lt => ordering == Ordering::Less,
        Operation::Le => ordering != Ordering::Greater,
        Operation::Eq => ordering == Ordering::Equal,
        Operation::Ne => ordering != Ordering::Equal,
        Operation::Gt => ordering == Ordering::Greater,
        Operation::Ge => ordering != Ordering::Less,
        _ => false,
    }
}

/// Hash a value with the unchecked identity machinery
pub fn hash_value(value: &Value) -> i64 {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish() as i64
}

/// Read an attribute; proxies check the name first
pub fn get_attr(target: &Value, name: &str) -> ProxyResult<Value> {
    match target {
        Value::Proxy(proxy) => proxy.get(name),
        Value::Object(obj) => obj.get_attr(name),
        other => Err(ProxyError::NoAttribute {
            type_name: other.type_name(),
            name: name.to_string(),
        }),
    }
}

/// Write an attribute
pub fn set_attr(target: &Value, name: &str, value: Value) -> ProxyResult<()> {
    match target {
        Value::Proxy(proxy) => proxy.set(name, value),
        Value::Object(obj) => obj.set_attr(name, value),
        other => Err(ProxyError::NoAttribute {
            type_name: other.type_name(),
            name: name.to_string(),
        }),
    }
}

/// Delete an attribute
pub fn del_attr(target: &Value, name: &str) -> ProxyResult<()> {
    match target {
        Value::Proxy(proxy) => proxy.delete(name),
        Value::Object(obj) => obj.del_attr(name),
        other => Err(ProxyError::NoAttribute {
            type_name: other.type_name(),
            name: name.to_string(),
        }),
    }
}

/// Text conversion
pub fn to_str(value: &Value) -> ProxyResult<String> {
    expect_text(apply(value, Operation::Str, &[])?, Operation::Str)
}

/// Representation
pub fn repr(value: &Value) -> ProxyResult<String> {
    expect_text(apply(value, Operation::Repr, &[])?, Operation::Repr)
}

/// Length as a native count
pub fn len(value: &Value) -> ProxyResult<usize> {
    match apply(value, Operation::Len, &[])? {
        Value::Int(n) if n >= 0 => Ok(n as usize),
        other => Err(ProxyError::TypeMismatch(format!(
            "'len' returned {} instead of a non-negative int",
            other.type_name()
        ))),
    }
}

/// Drain an iterable into a vector
///
/// Goes through `iter` and `next`, so a proxied iterable is checked at each
/// step.
pub fn collect_iter(iterable: &Value) -> ProxyResult<Vec<Value>> {
    if let Some(list) = iterable.downcast_ref::<crate::builtins::List>() {
        return Ok(list.snapshot());
    }
    let iterator = apply(iterable, Operation::Iter, &[])?;
    let mut items = Vec::new();
    loop {
        match apply(&iterator, Operation::Next, &[]) {
            Ok(item) => items.push(item),
            Err(ProxyError::StopIteration) => return Ok(items),
            Err(err) => return Err(err),
        }
    }
}

/// Longest sequence a repetition may produce
pub const MAX_REPEAT_LEN: usize = 1 << 28;

/// Length of a `unit`-long sequence repeated `count` times
///
/// Negative counts repeat zero times. Results longer than
/// [`MAX_REPEAT_LEN`] are refused instead of attempting the allocation.
pub(crate) fn repeat_len(op: Operation, unit: usize, count: i64) -> ProxyResult<usize> {
    if unit == 0 || count <= 0 {
        return Ok(0);
    }
    usize::try_from(count)
        .ok()
        .and_then(|times| unit.checked_mul(times))
        .filter(|len| *len <= MAX_REPEAT_LEN)
        .ok_or_else(|| ProxyError::TypeMismatch(format!("repeated sequence too long in '{}'", op)))
}

/// Fetch the `index`th argument of `op`
pub(crate) fn operand(op: Operation, args: &[Value], index: usize) -> ProxyResult<&Value> {
    args.get(index).ok_or_else(|| {
        ProxyError::TypeMismatch(format!(
            "'{}' expects {} argument(s), got {}",
            op,
            op.arity().unwrap_or(index + 1),
            args.len()
        ))
    })
}

fn expect_text(value: Value, op: Operation) -> ProxyResult<String> {
    match value {
        Value::Str(text) => Ok(text.to_string()),
        other => Err(ProxyError::TypeMismatch(format!(
            "'{}' returned {} instead of str",
            op,
            other.type_name()
        ))),
    }
}

fn swapped(op: Operation) -> Operation {
    match op {
        Operation::Lt => Operation::Gt,
        Operation::Le => Operation::Ge,
        Operation::Gt => Operation::Lt,
        Operation::Ge => Operation::Le,
        other => other,
    }
}

fn apply_side(target: &Value, op: Operation, other: &Value) -> ProxyResult<Value> {
    match target {
        Value::Proxy(proxy) => proxy.dispatch(op, slice::from_ref(other)),
        _ => apply_direct(target, op, slice::from_ref(other)),
    }
}

/// Apply `op` to `target` alone, without the two-sided operator protocol
fn apply_direct(target: &Value, op: Operation, args: &[Value]) -> ProxyResult<Value> {
    match op {
        Operation::Compare => {
            let other = operand(op, args, 0)?;
            Ok(Value::Int(match target.cmp(other) {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            }))
        }
        Operation::Hash => Ok(Value::Int(hash_value(target))),
        Operation::Bool => Ok(Value::Bool(target.is_truthy())),
        _ => match target {
            Value::Proxy(proxy) => proxy.dispatch(op, args),
            Value::Object(obj) => apply_object(target, obj, op, args),
            _ => numeric::apply(target, op, args),
        },
    }
}

fn apply_object(target: &Value, obj: &ObjectRef, op: Operation, args: &[Value]) -> ProxyResult<Value> {
    match op {
        Operation::Str => Ok(Value::str(obj.to_str())),
        Operation::Repr => Ok(Value::str(obj.repr())),
        _ if op.is_in_place() => match obj.clone().in_place(op, args) {
            Some(result) => result,
            None => match op.forward() {
                Some(forward) => binary(forward, target, operand(op, args, 0)?),
                None => Err(ProxyError::unsupported(obj.type_name(), op)),
            },
        },
        _ => obj.clone().dispatch(op, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{List, Record};

    #[test]
    fn test_reflected_operator_on_right_operand() {
        let list = List::of([1, 2]).into_value();
        let result = binary(Operation::Mul, &Value::Int(2), &list).unwrap();
        let items = collect_iter(&result).unwrap();
        assert_eq!(items, vec![Value::Int(1), Value::Int(2), Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_unsupported_on_both_sides_reports_left() {
        let record = Value::object(Record::new("pkg.Type"));
        let err = binary(Operation::Sub, &Value::Int(1), &record).unwrap_err();
        assert_eq!(
            err,
            ProxyError::Unsupported {
                type_name: Value::Int(1).type_name(),
                operation: "sub",
            }
        );
    }

    #[test]
    fn test_equality_falls_back_to_identity() {
        let a = Value::object(Record::new("pkg.Type"));
        let b = Value::object(Record::new("pkg.Type"));
        assert!(equals(&a, &a.clone()).unwrap());
        assert!(!equals(&a, &b).unwrap());
        assert_eq!(compare(Operation::Ne, &a, &b).unwrap(), Value::Bool(true));
        assert!(compare(Operation::Lt, &a, &b).unwrap_err().is_unsupported());
    }

    #[test]
    fn test_in_place_without_true_form_uses_forward() {
        let result = apply(&Value::Int(2), Operation::IAdd, &[Value::Int(3)]);
        assert_eq!(result.unwrap(), Value::Int(5));

        let a = List::of([1]).into_value();
        let b = List::of([2]).into_value();
        let joined = apply(&a, Operation::Add, &[b]).unwrap();
        assert_eq!(collect_iter(&joined).unwrap(), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_attributes_on_primitives() {
        assert_eq!(get_attr(&Value::Int(1), "real").unwrap_err().kind(), "no-attribute");
    }

    #[test]
    fn test_text_helpers() {
        assert_eq!(to_str(&Value::Int(42)).unwrap(), "42");
        assert_eq!(repr(&Value::str("hi")).unwrap(), "'hi'");
        assert_eq!(len(&Value::str("héllo")).unwrap(), 5);
    }

    #[test]
    fn test_missing_operand() {
        let err = apply(&Value::Int(1), Operation::Add, &[]).unwrap_err();
        assert_eq!(err.kind(), "type-mismatch");
    }
}
