//! Error types for proxy dispatch
//!
//! Policy refusals ([`ProxyError::Forbidden`]) and capability gaps
//! ([`ProxyError::Unsupported`]) are separate variants. Both can look like
//! "attribute not found" to a caller, but they must never be merged.

use crate::catalog::Operation;
use crate::object::TypeName;

/// Result type for every proxy and host operation
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Errors raised while constructing proxies or dispatching through them
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProxyError {
    /// The checker refused access to `name`
    #[error("Access to '{name}' is forbidden")]
    Forbidden {
        /// Operation or attribute name that was refused
        name: String,
    },

    /// A proxy was constructed without a checker
    #[error("Proxy checker may not be None")]
    MissingChecker,

    /// Attempt to delete one of the proxy's own reserved fields
    #[error("Cannot delete reserved proxy field '{0}'")]
    ReservedField(String),

    /// The wrapped value does not implement the operation
    #[error("'{type_name}' does not support '{operation}'")]
    Unsupported {
        /// Declared type of the receiver
        type_name: TypeName,
        /// Catalog name of the operation
        operation: &'static str,
    },

    /// The wrapped value has no attribute with this name
    #[error("'{type_name}' has no attribute '{name}'")]
    NoAttribute {
        /// Declared type of the receiver
        type_name: TypeName,
        /// Requested attribute
        name: String,
    },

    /// Sequence index outside the valid range
    #[error("Index {index} out of range (length {len})")]
    IndexOutOfRange {
        /// Requested index
        index: i64,
        /// Sequence length
        len: usize,
    },

    /// Mapping has no entry for the key
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Division or modulo by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Iterator exhausted
    #[error("Iteration stopped")]
    StopIteration,

    /// Operand had the wrong type for an otherwise supported operation
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Escape operation applied to a value that is not a proxy
    #[error("Value is not a security proxy")]
    NotAProxy,

    /// `make` was asked to re-wrap a proxy under a different checker
    #[error("Tried to change a proxy's checker")]
    ProxyCheckerMismatch,
}

impl ProxyError {
    /// Build a denial for `name`
    pub fn forbidden(name: impl Into<String>) -> Self {
        ProxyError::Forbidden { name: name.into() }
    }

    /// Build an unsupported-operation error
    pub fn unsupported(type_name: TypeName, operation: Operation) -> Self {
        ProxyError::Unsupported {
            type_name,
            operation: operation.name(),
        }
    }

    /// Check whether this error is a checker denial
    pub fn is_denial(&self) -> bool {
        matches!(self, ProxyError::Forbidden { .. })
    }

    /// Check whether the receiver simply lacks the operation
    pub fn is_unsupported(&self) -> bool {
        matches!(self, ProxyError::Unsupported { .. })
    }

    /// Name carried by a denial, if this is one
    pub fn denied_name(&self) -> Option<&str> {
        match self {
            ProxyError::Forbidden { name } => Some(name),
            _ => None,
        }
    }

    /// Stable short label, used by traces and logs
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Forbidden { .. } => "forbidden",
            ProxyError::MissingChecker => "missing-checker",
            ProxyError::ReservedField(_) => "reserved-field",
            ProxyError::Unsupported { .. } => "unsupported",
            ProxyError::NoAttribute { .. } => "no-attribute",
            ProxyError::IndexOutOfRange { .. } => "index-out-of-range",
            ProxyError::KeyNotFound(_) => "key-not-found",
            ProxyError::DivisionByZero => "division-by-zero",
            ProxyError::StopIteration => "stop-iteration",
            ProxyError::TypeMismatch(_) => "type-mismatch",
            ProxyError::NotAProxy => "not-a-proxy",
            ProxyError::ProxyCheckerMismatch => "checker-mismatch",
        }
    }
}
