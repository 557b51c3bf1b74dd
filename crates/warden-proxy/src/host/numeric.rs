//! Operations on primitive values
//!
//! Integers and booleans share integer arithmetic, mixed with floats they
//! widen to float. Integer overflow is reported rather than wrapped.

use super::operand;
use crate::builtins::{List, ListIterator};
use crate::catalog::Operation;
use crate::error::{ProxyError, ProxyResult};
use crate::value::{numeric_ordering, Value};
use std::cmp::Ordering;
use std::sync::Arc;

pub(super) fn apply(target: &Value, op: Operation, args: &[Value]) -> ProxyResult<Value> {
    match op {
        Operation::Str => Ok(Value::str(text(target))),
        Operation::Repr => Ok(Value::str(repr(target))),
        Operation::Int => to_int(target),
        Operation::Float => to_float(target),
        Operation::Index => match target {
            Value::Int(i) => Ok(Value::Int(*i)),
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            _ => Err(unsupported(target, op)),
        },
        Operation::Len | Operation::GetItem | Operation::Contains | Operation::Iter => {
            string_protocol(target, op, args)
        }
        Operation::Neg | Operation::Pos | Operation::Abs | Operation::Invert => unary(target, op),
        _ if op.is_comparison() => compare(target, op, operand(op, args, 0)?),
        _ if op.is_binary() => arith(op, target, operand(op, args, 0)?),
        _ if op.is_reflected() => match op.reflected() {
            Some(forward) => arith(forward, operand(op, args, 0)?, target),
            None => Err(unsupported(target, op)),
        },
        _ if op.is_in_place() => match op.forward() {
            Some(forward) => super::binary(forward, target, operand(op, args, 0)?),
            None => Err(unsupported(target, op)),
        },
        _ => Err(unsupported(target, op)),
    }
}

fn unsupported(target: &Value, op: Operation) -> ProxyError {
    ProxyError::unsupported(target.type_name(), op)
}

fn overflow(op: Operation) -> ProxyError {
    ProxyError::TypeMismatch(format!("integer overflow in '{}'", op))
}

fn is_int(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Bool(_))
}

fn is_number(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Bool(_) | Value::Float(_))
}

/// Text form of a primitive
pub(crate) fn text(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format_float(*f),
        Value::Str(s) => s.to_string(),
        Value::Object(_) | Value::Proxy(_) => String::new(),
    }
}

fn repr(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        other => text(other),
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        let text = if f > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

fn to_int(value: &Value) -> ProxyResult<Value> {
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Float(f) if f.is_finite() && f.abs() < i64::MAX as f64 => Ok(Value::Int(f.trunc() as i64)),
        Value::Float(f) => Err(ProxyError::TypeMismatch(format!(
            "cannot convert float {} to int",
            format_float(*f)
        ))),
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            ProxyError::TypeMismatch(format!("invalid literal for int: '{}'", s))
        }),
        _ => Err(unsupported(value, Operation::Int)),
    }
}

fn to_float(value: &Value) -> ProxyResult<Value> {
    match value {
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Bool(b) => Ok(Value::Float(*b as i64 as f64)),
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            ProxyError::TypeMismatch(format!("could not convert string to float: '{}'", s))
        }),
        _ => Err(unsupported(value, Operation::Float)),
    }
}

fn string_protocol(target: &Value, op: Operation, args: &[Value]) -> ProxyResult<Value> {
    let Value::Str(s) = target else {
        return Err(unsupported(target, op));
    };
    match op {
        Operation::Len => Ok(Value::Int(s.chars().count() as i64)),
        Operation::GetItem => {
            let len = s.chars().count();
            let index = crate::builtins::resolve_index(operand(op, args, 0)?, len)?;
            let ch = s.chars().nth(index).map(String::from).unwrap_or_default();
            Ok(Value::str(ch))
        }
        Operation::Contains => match operand(op, args, 0)? {
            Value::Str(needle) => Ok(Value::Bool(s.contains(needle.as_ref()))),
            other => Err(ProxyError::TypeMismatch(format!(
                "'in <str>' requires str as left operand, not {}",
                other.type_name()
            ))),
        },
        _ => {
            let chars = List::new(s.chars().map(|c| Value::str(c.to_string())).collect());
            Ok(Value::object(ListIterator::new(Arc::new(chars))))
        }
    }
}

fn unary(target: &Value, op: Operation) -> ProxyResult<Value> {
    match (target, op) {
        (Value::Float(f), Operation::Neg) => Ok(Value::Float(-f)),
        (Value::Float(f), Operation::Pos) => Ok(Value::Float(*f)),
        (Value::Float(f), Operation::Abs) => Ok(Value::Float(f.abs())),
        _ if is_int(target) => {
            let i = target.as_int().unwrap_or_default();
            match op {
                Operation::Neg => i.checked_neg().map(Value::Int).ok_or_else(|| overflow(op)),
                Operation::Pos => Ok(Value::Int(i)),
                Operation::Abs => i.checked_abs().map(Value::Int).ok_or_else(|| overflow(op)),
                _ => Ok(Value::Int(!i)),
            }
        }
        _ => Err(unsupported(target, op)),
    }
}

fn compare(lhs: &Value, op: Operation, rhs: &Value) -> ProxyResult<Value> {
    let ordering = match (lhs, rhs) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Str(a), Value::Str(b)) => Some(a.as_ref().cmp(b.as_ref())),
        _ if is_number(lhs) && is_number(rhs) => {
            // NaN is unordered: every comparison but `ne` is false
            match numeric_ordering(lhs, rhs) {
                Some(ordering) => Some(ordering),
                None => return Ok(Value::Bool(op == Operation::Ne)),
            }
        }
        _ => None,
    };
    match ordering {
        Some(ordering) => Ok(Value::Bool(super::comparison_holds(op, ordering))),
        None if rhs.is_primitive() && op == Operation::Eq => Ok(Value::Bool(false)),
        None if rhs.is_primitive() && op == Operation::Ne => Ok(Value::Bool(true)),
        None => Err(unsupported(lhs, op)),
    }
}

fn arith(op: Operation, lhs: &Value, rhs: &Value) -> ProxyResult<Value> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) if op == Operation::Add => Ok(Value::str(format!("{}{}", a, b))),
        (Value::Str(s), n) | (n, Value::Str(s)) if op == Operation::Mul && is_int(n) => {
            let len = super::repeat_len(op, s.len(), n.as_int().unwrap_or_default())?;
            Ok(Value::str(s.repeat(len.checked_div(s.len()).unwrap_or(0))))
        }
        (Value::Bool(a), Value::Bool(b)) if matches!(op, Operation::And | Operation::Or | Operation::Xor) => {
            Ok(Value::Bool(match op {
                Operation::And => *a & *b,
                Operation::Or => *a | *b,
                _ => *a ^ *b,
            }))
        }
        _ if is_int(lhs) && is_int(rhs) => int_arith(
            op,
            lhs,
            lhs.as_int().unwrap_or_default(),
            rhs.as_int().unwrap_or_default(),
        ),
        _ if is_number(lhs) && is_number(rhs) => float_arith(
            op,
            lhs,
            lhs.as_float().unwrap_or_default(),
            rhs.as_float().unwrap_or_default(),
        ),
        _ => Err(unsupported(lhs, op)),
    }
}

fn floor_div(a: i64, b: i64, op: Operation) -> ProxyResult<i64> {
    let q = a.checked_div(b).ok_or_else(|| overflow(op))?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

fn floor_mod(a: i64, b: i64) -> i64 {
    let r = a.wrapping_rem(b);
    if r != 0 && ((r < 0) != (b < 0)) {
        r + b
    } else {
        r
    }
}

fn int_arith(op: Operation, lhs: &Value, a: i64, b: i64) -> ProxyResult<Value> {
    let needs_divisor = matches!(
        op,
        Operation::TrueDiv | Operation::FloorDiv | Operation::Mod | Operation::DivMod
    );
    if needs_divisor && b == 0 {
        return Err(ProxyError::DivisionByZero);
    }
    let int = |result: Option<i64>| result.map(Value::Int).ok_or_else(|| overflow(op));
    match op {
        Operation::Add => int(a.checked_add(b)),
        Operation::Sub => int(a.checked_sub(b)),
        Operation::Mul => int(a.checked_mul(b)),
        Operation::TrueDiv => Ok(Value::Float(a as f64 / b as f64)),
        Operation::FloorDiv => Ok(Value::Int(floor_div(a, b, op)?)),
        Operation::Mod => Ok(Value::Int(floor_mod(a, b))),
        Operation::DivMod => Ok(List::of([floor_div(a, b, op)?, floor_mod(a, b)]).into_value()),
        Operation::Pow => match u32::try_from(b) {
            Ok(exp) => int(a.checked_pow(exp)),
            Err(_) if b < 0 && a == 0 => Err(ProxyError::DivisionByZero),
            Err(_) if b < 0 => Ok(Value::Float((a as f64).powf(b as f64))),
            Err(_) => Err(overflow(op)),
        },
        Operation::LShift | Operation::RShift if b < 0 => {
            Err(ProxyError::TypeMismatch("negative shift count".to_string()))
        }
        Operation::LShift => {
            let shifted = u32::try_from(b).ok().and_then(|s| a.checked_shl(s));
            match shifted {
                Some(v) if v >> b == a => Ok(Value::Int(v)),
                _ => Err(overflow(op)),
            }
        }
        Operation::RShift => Ok(Value::Int(if b >= 64 {
            if a < 0 {
                -1
            } else {
                0
            }
        } else {
            a >> b
        })),
        Operation::And => Ok(Value::Int(a & b)),
        Operation::Xor => Ok(Value::Int(a ^ b)),
        Operation::Or => Ok(Value::Int(a | b)),
        _ => Err(unsupported(lhs, op)),
    }
}

fn float_arith(op: Operation, lhs: &Value, a: f64, b: f64) -> ProxyResult<Value> {
    let needs_divisor = matches!(
        op,
        Operation::TrueDiv | Operation::FloorDiv | Operation::Mod | Operation::DivMod
    );
    if needs_divisor && b == 0.0 {
        return Err(ProxyError::DivisionByZero);
    }
    let modulo = || {
        let r = a % b;
        if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
            r + b
        } else {
            r
        }
    };
    match op {
        Operation::Add => Ok(Value::Float(a + b)),
        Operation::Sub => Ok(Value::Float(a - b)),
        Operation::Mul => Ok(Value::Float(a * b)),
        Operation::TrueDiv => Ok(Value::Float(a / b)),
        Operation::FloorDiv => Ok(Value::Float((a / b).floor())),
        Operation::Mod => Ok(Value::Float(modulo())),
        Operation::DivMod => Ok(List::of([(a / b).floor(), modulo()]).into_value()),
        Operation::Pow if a == 0.0 && b < 0.0 => Err(ProxyError::DivisionByZero),
        Operation::Pow => Ok(Value::Float(a.powf(b))),
        _ => Err(unsupported(lhs, op)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(lhs: impl Into<Value>, op: Operation, rhs: impl Into<Value>) -> ProxyResult<Value> {
        apply(&lhs.into(), op, &[rhs.into()])
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(run(7, Operation::Add, 5).unwrap(), Value::Int(12));
        assert_eq!(run(7, Operation::FloorDiv, -2).unwrap(), Value::Int(-4));
        assert_eq!(run(-7, Operation::Mod, 3).unwrap(), Value::Int(2));
        assert_eq!(run(2, Operation::Pow, 10).unwrap(), Value::Int(1024));
        assert_eq!(run(1, Operation::LShift, 4).unwrap(), Value::Int(16));
        assert_eq!(run(7, Operation::TrueDiv, 2).unwrap(), Value::Float(3.5));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(run(1, Operation::TrueDiv, 0).unwrap_err(), ProxyError::DivisionByZero);
        assert_eq!(run(1.0, Operation::Mod, 0.0).unwrap_err(), ProxyError::DivisionByZero);
    }

    #[test]
    fn test_overflow_is_reported() {
        assert_eq!(run(i64::MAX, Operation::Add, 1).unwrap_err().kind(), "type-mismatch");
    }

    #[test]
    fn test_huge_string_repeat_is_an_error() {
        assert_eq!(run("ab", Operation::Mul, i64::MAX).unwrap_err().kind(), "type-mismatch");
        assert_eq!(run(i64::MAX, Operation::Mul, "ab").unwrap_err().kind(), "type-mismatch");
    }

    #[test]
    fn test_zero_to_negative_power() {
        assert_eq!(run(0, Operation::Pow, -1).unwrap_err(), ProxyError::DivisionByZero);
        assert_eq!(run(0.0, Operation::Pow, -2.0).unwrap_err(), ProxyError::DivisionByZero);
        assert_eq!(run(2, Operation::Pow, -1).unwrap(), Value::Float(0.5));
        assert_eq!(run(0, Operation::Pow, 0).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_mixed_comparison_is_exact() {
        let big = 1i64 << 53;
        assert_eq!(run(big + 1, Operation::Eq, big as f64).unwrap(), Value::Bool(false));
        assert_eq!(run(big + 1, Operation::Gt, big as f64).unwrap(), Value::Bool(true));
        assert_eq!(run(big as f64, Operation::Eq, big).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_reflected_swaps_operands() {
        assert_eq!(run(10, Operation::RSub, 3).unwrap(), Value::Int(-7));
    }

    #[test]
    fn test_strings() {
        assert_eq!(run("ab", Operation::Add, "cd").unwrap(), Value::str("abcd"));
        assert_eq!(run("ab", Operation::Mul, 3).unwrap(), Value::str("ababab"));
        assert_eq!(run(2, Operation::Mul, "x").unwrap(), Value::str("xx"));
        assert_eq!(run("", Operation::Mul, i64::MAX).unwrap(), Value::str(""));
        assert_eq!(run("ab", Operation::Mul, -3).unwrap(), Value::str(""));
        assert_eq!(run("hello", Operation::Contains, "ell").unwrap(), Value::Bool(true));
        assert_eq!(run("abc", Operation::GetItem, -1).unwrap(), Value::str("c"));
        assert!(run("ab", Operation::Sub, "a").unwrap_err().is_unsupported());
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(run(1, Operation::Lt, 2.5).unwrap(), Value::Bool(true));
        assert_eq!(run("a", Operation::Ge, "b").unwrap(), Value::Bool(false));
        assert_eq!(run(1, Operation::Eq, "1").unwrap(), Value::Bool(false));
        assert_eq!(run(f64::NAN, Operation::Eq, f64::NAN).unwrap(), Value::Bool(false));
        assert_eq!(run(f64::NAN, Operation::Ne, 1).unwrap(), Value::Bool(true));
        assert!(run(1, Operation::Lt, "a").unwrap_err().is_unsupported());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(apply(&Value::str(" 42 "), Operation::Int, &[]).unwrap(), Value::Int(42));
        assert_eq!(apply(&Value::Float(2.9), Operation::Int, &[]).unwrap(), Value::Int(2));
        assert_eq!(apply(&Value::Int(3), Operation::Float, &[]).unwrap(), Value::Float(3.0));
        assert_eq!(text(&Value::Float(2.0)), "2.0");
        assert_eq!(text(&Value::Null), "None");
        assert!(apply(&Value::Float(1.0), Operation::Index, &[]).unwrap_err().is_unsupported());
    }

    #[test]
    fn test_bool_bitwise_stays_bool() {
        assert_eq!(run(true, Operation::And, false).unwrap(), Value::Bool(false));
        assert_eq!(run(true, Operation::Add, true).unwrap(), Value::Int(2));
    }
}
