//! Dynamic value representation
//!
//! [`Value`] is what flows in and out of every proxied operation: a small set
//! of inline primitives, a shared heap [`Object`], or a [`Proxy`] around any
//! of these.
//!
//! The `PartialEq`, `Eq`, `PartialOrd`, `Ord` and `Hash` impls here are the
//! identity machinery. They never consult a checker and see straight through
//! proxies, so sorting and hashing keep working under any policy.

use crate::object::{object_address, Object, ObjectRef, TypeName};
use crate::proxy::Proxy;
use rustc_hash::FxHasher;
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Dynamic value
#[derive(Clone)]
pub enum Value {
    /// Absence of a value
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// Immutable shared string
    Str(Arc<str>),
    /// Shared heap object
    Object(ObjectRef),
    /// Security proxy
    Proxy(Proxy),
}

impl Value {
    /// Create a string value
    pub fn str(s: impl Into<Arc<str>>) -> Self {
        Value::Str(s.into())
    }

    /// Move an object onto the heap and wrap it
    pub fn object<T: Object>(object: T) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Declared type name
    ///
    /// A proxy reports its own type, not the wrapped value's.
    pub fn type_name(&self) -> TypeName {
        match self {
            Value::Null => TypeName::builtin("NoneType"),
            Value::Bool(_) => TypeName::builtin("bool"),
            Value::Int(_) => TypeName::builtin("int"),
            Value::Float(_) => TypeName::builtin("float"),
            Value::Str(_) => TypeName::builtin("str"),
            Value::Object(obj) => obj.type_name(),
            Value::Proxy(_) => Proxy::type_name(),
        }
    }

    /// Check if this is an inline primitive or a string
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Value::Object(_) | Value::Proxy(_))
    }

    /// Check if this is a proxy
    pub fn is_proxy(&self) -> bool {
        matches!(self, Value::Proxy(_))
    }

    /// Check if this is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as proxy
    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            Value::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    /// Get as heap object
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as integer (booleans count as 0 and 1)
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Get as float (integers are widened)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Bool(b) => Some(*b as i64 as f64),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Downcast a heap object to its concrete type
    ///
    /// Proxies are opaque here; use [`crate::is_instance_of`] to test the
    /// type of a proxied value.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_object()?.as_any().downcast_ref::<T>()
    }

    /// Truthiness; unchecked, proxies answer for their wrapped value
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Object(obj) => obj.is_truthy(),
            Value::Proxy(proxy) => proxy.wrapped().is_truthy(),
        }
    }

    /// Stable opaque identity token
    ///
    /// Heap values use their address. Inline primitives have no address and
    /// use a hash of their content instead.
    pub fn identity_token(&self) -> usize {
        match self {
            Value::Object(obj) => object_address(obj.as_ref()),
            Value::Proxy(proxy) => proxy.id(),
            Value::Str(s) => s.as_ptr() as usize,
            _ => {
                let mut hasher = FxHasher::default();
                self.hash(&mut hasher);
                hasher.finish() as usize
            }
        }
    }

    /// Same value by identity: same allocation for heap values, equal content
    /// for primitives
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Proxy(a), Value::Proxy(b)) => Proxy::ptr_eq(a, b),
            (Value::Str(a), Value::Str(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Object(_) | Value::Proxy(_), _) | (_, Value::Object(_) | Value::Proxy(_)) => false,
            _ => self == other,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) | Value::Int(_) | Value::Float(_) => 1,
            Value::Str(_) => 2,
            Value::Object(_) => 3,
            Value::Proxy(_) => 4,
        }
    }
}

/// Exact ordering of two numeric values, `None` if either is NaN
///
/// Integers are never rounded through `f64`, so equality stays transitive
/// across `Int` and `Float`.
pub(crate) fn numeric_ordering(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Float(x), other) => Some(int_float_ordering(other.as_int()?, *x)?.reverse()),
        (other, Value::Float(y)) => int_float_ordering(other.as_int()?, *y),
        _ => Some(a.as_int()?.cmp(&b.as_int()?)),
    }
}

/// 2^63, the first float above every `i64`
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

fn int_float_ordering(i: i64, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f >= I64_BOUND {
        return Some(Ordering::Less);
    }
    if f < -I64_BOUND {
        return Some(Ordering::Greater);
    }
    let whole = f.trunc();
    Some(i.cmp(&(whole as i64)).then_with(|| {
        if f > whole {
            Ordering::Less
        } else if f < whole {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }))
}

fn compare_numbers(a: &Value, b: &Value) -> Ordering {
    numeric_ordering(a, b).unwrap_or_else(|| {
        let x = a.as_float().unwrap_or(f64::NAN);
        let y = b.as_float().unwrap_or(f64::NAN);
        x.total_cmp(&y)
    })
}

fn compare_objects(a: &ObjectRef, b: &ObjectRef) -> Ordering {
    if Arc::ptr_eq(a, b) {
        return Ordering::Equal;
    }
    if let Some(ordering) = a.identity_cmp(b.as_ref()) {
        return ordering;
    }
    (a.type_name(), object_address(a.as_ref())).cmp(&(b.type_name(), object_address(b.as_ref())))
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Proxy(proxy), _) => proxy.wrapped().cmp(other),
            (_, Value::Proxy(proxy)) => self.cmp(&proxy.wrapped()),
            _ if self.rank() != other.rank() => self.rank().cmp(&other.rank()),
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Object(a), Value::Object(b)) => compare_objects(a, b),
            _ => compare_numbers(self, other),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Proxy(proxy) => proxy.wrapped().hash(state),
            Value::Null => 0u8.hash(state),
            Value::Bool(b) => (*b as i64).hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => {
                if f.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(f) {
                    (*f as i64).hash(state)
                } else {
                    f.to_bits().hash(state)
                }
            }
            Value::Str(s) => s.hash(state),
            Value::Object(obj) => match obj.hash_code() {
                Some(code) => code.hash(state),
                None => object_address(obj.as_ref()).hash(state),
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(i) => write!(f, "Int({})", i),
            Value::Float(x) => write!(f, "Float({})", x),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Object(obj) => fmt::Debug::fmt(obj.as_ref(), f),
            Value::Proxy(proxy) => fmt::Debug::fmt(proxy, f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match crate::host::to_str(self) {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "<unprintable {} value>", self.type_name()),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl From<Proxy> for Value {
    fn from(proxy: Proxy) -> Self {
        Value::Proxy(proxy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_numeric_equality_crosses_variants() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_ne!(Value::Int(1), Value::str("1"));
        assert_ne!(Value::Null, Value::Int(0));
    }

    #[test]
    fn test_hash_agrees_with_equality() {
        let mut set = HashSet::new();
        set.insert(Value::Int(2));
        assert!(set.contains(&Value::Float(2.0)));
        assert!(!set.contains(&Value::Float(2.5)));
    }

    #[test]
    fn test_large_int_float_comparison_is_exact() {
        let two_53 = 1i64 << 53;
        let float = Value::Float(two_53 as f64);

        assert_eq!(Value::Int(two_53), float);
        assert_ne!(Value::Int(two_53 + 1), float);
        assert!(Value::Int(two_53 + 1) > float);
        assert!(float < Value::Int(two_53 + 1));

        assert!(Value::Int(i64::MAX) < Value::Float(9.3e18));
        assert_eq!(Value::Int(i64::MIN), Value::Float(i64::MIN as f64));
        assert!(Value::Int(3) > Value::Float(2.5));
        assert!(Value::Int(-3) < Value::Float(-2.5));
        assert_eq!(Value::Float(-0.0), Value::Int(0));
    }

    #[test]
    fn test_equal_numbers_hash_alike() {
        let pairs = [
            (Value::Int(1 << 53), Value::Float((1i64 << 53) as f64)),
            (Value::Int(i64::MIN), Value::Float(i64::MIN as f64)),
            (Value::Int(0), Value::Float(-0.0)),
        ];
        for (int, float) in pairs {
            assert_eq!(int, float);
            assert_eq!(crate::host::hash_value(&int), crate::host::hash_value(&float));
        }
    }

    #[test]
    fn test_ordering_ranks() {
        let mut values = vec![
            Value::str("b"),
            Value::Int(3),
            Value::Null,
            Value::Float(1.5),
            Value::str("a"),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Float(1.5),
                Value::Int(3),
                Value::str("a"),
                Value::str("b"),
            ]
        );
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(Value::str("x").is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
    }

    #[test]
    fn test_identity_token_is_stable() {
        let s = Value::str("hello");
        assert_eq!(s.identity_token(), s.clone().identity_token());
        assert_eq!(Value::Int(7).identity_token(), Value::Int(7).identity_token());
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Int(1).type_name().to_string(), "builtins.int");
        assert_eq!(Value::Null.type_name().to_string(), "builtins.NoneType");
        assert_eq!(Value::str("x").type_name().to_string(), "builtins.str");
    }
}
