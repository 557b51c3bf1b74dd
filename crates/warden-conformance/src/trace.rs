//! Execution traces
//!
//! A trace records, per step, whether it passed and what kind of result it
//! produced. Traces carry no addresses or other run-specific data, so two
//! backends running the same script must produce equal traces.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use warden_proxy::{host, BackendKind, ProxyError, TypeName, Value};

static REDACTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<security proxied (.+) instance at 0x[0-9a-f]+>$")
        .expect("redacted-repr pattern is a valid regex")
});

/// Result kind of one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// No result
    Unit,
    /// Primitive value and its repr
    Primitive {
        /// Value's type
        type_name: TypeName,
        /// Repr text
        text: String,
    },
    /// Redacted fallback text for a denied `str`/`repr`
    Redacted {
        /// Type named in the fallback
        type_name: String,
    },
    /// Unproxied heap object
    Object {
        /// Object's type
        type_name: TypeName,
    },
    /// A proxy
    Proxy {
        /// Type of the wrapped value
        wraps: TypeName,
        /// Whether it is the step's receiver, when the receiver was a proxy
        same_as_target: Option<bool>,
    },
    /// Result of an escape
    Raw {
        /// Type of the unwrapped value
        type_name: TypeName,
        /// Whether it is the fixture's original input
        is_original: bool,
    },
}

impl Shape {
    /// Classify a step result
    pub fn of(value: &Value, same_as_target: Option<bool>) -> Self {
        match value {
            Value::Proxy(_) => Shape::Proxy {
                wraps: warden_proxy::unwrap(value).type_name(),
                same_as_target,
            },
            Value::Object(obj) => Shape::Object {
                type_name: obj.type_name(),
            },
            Value::Str(text) => match REDACTED.captures(text) {
                Some(captures) => Shape::Redacted {
                    type_name: captures[1].to_string(),
                },
                None => Shape::primitive(value),
            },
            _ => Shape::primitive(value),
        }
    }

    /// Classify an unwrapped value
    pub fn raw(value: &Value, is_original: bool) -> Self {
        Shape::Raw {
            type_name: value.type_name(),
            is_original,
        }
    }

    fn primitive(value: &Value) -> Self {
        Shape::Primitive {
            type_name: value.type_name(),
            text: host::repr(value).unwrap_or_default(),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Unit => f.write_str("unit"),
            Shape::Primitive { type_name, text } => write!(f, "{} {}", type_name.name(), text),
            Shape::Redacted { type_name } => write!(f, "redacted {}", type_name),
            Shape::Object { type_name } => write!(f, "object {}", type_name),
            Shape::Proxy {
                wraps,
                same_as_target,
            } => {
                write!(f, "proxy {}", wraps)?;
                match same_as_target {
                    Some(true) => f.write_str(" (same)"),
                    Some(false) => f.write_str(" (new)"),
                    None => Ok(()),
                }
            }
            Shape::Raw {
                type_name,
                is_original,
            } => {
                write!(f, "raw {}", type_name)?;
                if *is_original {
                    f.write_str(" (original)")?;
                }
                Ok(())
            }
        }
    }
}

/// Pass/fail outcome of one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Step succeeded
    Ok(Shape),
    /// Step failed
    Err {
        /// Error label
        kind: &'static str,
        /// Operation or attribute named by a denial
        denied: Option<String>,
    },
}

impl Outcome {
    /// Record a failure
    pub fn from_error(err: &ProxyError) -> Self {
        Outcome::Err {
            kind: err.kind(),
            denied: err.denied_name().map(str::to_string),
        }
    }

    /// Check whether the step passed
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    /// Check whether the step was refused by the checker
    pub fn is_denial(&self) -> bool {
        matches!(self, Outcome::Err { denied: Some(_), .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ok(shape) => write!(f, "ok {}", shape),
            Outcome::Err {
                denied: Some(name), ..
            } => write!(f, "denied {}", name),
            Outcome::Err { kind, .. } => write!(f, "error {}", kind),
        }
    }
}

/// One recorded step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    /// Position in the script
    pub index: usize,
    /// Rendered step
    pub label: String,
    /// What happened
    pub outcome: Outcome,
}

/// Outcomes of one script on one backend
#[derive(Debug, Clone)]
pub struct Trace {
    script: String,
    backend: BackendKind,
    entries: Vec<TraceEntry>,
}

impl Trace {
    /// Create an empty trace
    pub fn new(script: &str, backend: BackendKind) -> Self {
        Self {
            script: script.to_string(),
            backend,
            entries: Vec::new(),
        }
    }

    /// Append a step
    pub fn push(&mut self, entry: TraceEntry) {
        self.entries.push(entry);
    }

    /// Script name
    pub fn script(&self) -> &str {
        &self.script
    }

    /// Backend that produced the trace
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Recorded steps
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Outcome of step `index`
    pub fn outcome(&self, index: usize) -> Option<&Outcome> {
        self.entries.get(index).map(|entry| &entry.outcome)
    }

    /// Number of steps that passed
    pub fn passed(&self) -> usize {
        self.entries.iter().filter(|entry| entry.outcome.is_ok()).count()
    }

    /// Number of steps the checker refused
    pub fn denied(&self) -> usize {
        self.entries.iter().filter(|entry| entry.outcome.is_denial()).count()
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} [{}]", self.script, self.backend)?;
        for entry in &self.entries {
            writeln!(f, "  {:>3}  {:<32} {}", entry.index, entry.label, entry.outcome)?;
        }
        Ok(())
    }
}

/// Step where two traces disagree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    /// Position in the script
    pub index: usize,
    /// Rendered step
    pub label: String,
    /// Outcome on the first backend; `None` if it stopped early
    pub left: Option<Outcome>,
    /// Outcome on the second backend
    pub right: Option<Outcome>,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |outcome: &Option<Outcome>| match outcome {
            Some(outcome) => outcome.to_string(),
            None => "<missing>".to_string(),
        };
        write!(
            f,
            "step {} `{}`: {} vs {}",
            self.index,
            self.label,
            render(&self.left),
            render(&self.right)
        )
    }
}

/// Every step where `left` and `right` disagree
pub fn compare(left: &Trace, right: &Trace) -> Vec<Divergence> {
    let len = left.entries.len().max(right.entries.len());
    (0..len)
        .filter_map(|index| {
            let a = left.entries.get(index);
            let b = right.entries.get(index);
            if a.map(|e| &e.outcome) == b.map(|e| &e.outcome) {
                return None;
            }
            let label = a.or(b).map(|e| e.label.clone()).unwrap_or_default();
            Some(Divergence {
                index,
                label,
                left: a.map(|e| e.outcome.clone()),
                right: b.map(|e| e.outcome.clone()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_proxy::{List, Record};

    fn entry(index: usize, outcome: Outcome) -> TraceEntry {
        TraceEntry {
            index,
            label: format!("step{}", index),
            outcome,
        }
    }

    #[test]
    fn test_redacted_text_is_recognized() {
        let value = Value::str("<security proxied pkg.Type instance at 0x7f3a10>");
        assert_eq!(
            Shape::of(&value, None),
            Shape::Redacted {
                type_name: "pkg.Type".to_string()
            }
        );
        assert_eq!(Shape::of(&Value::str("widget"), None).to_string(), "str 'widget'");
    }

    #[test]
    fn test_shapes() {
        assert_eq!(Shape::of(&Value::Int(4), None).to_string(), "int 4");
        assert_eq!(Shape::of(&Value::Null, None).to_string(), "NoneType None");
        assert_eq!(
            Shape::of(&Record::new("pkg.Type").into_value(), None).to_string(),
            "object pkg.Type"
        );
        assert_eq!(
            Shape::raw(&List::of([1]).into_value(), true).to_string(),
            "raw builtins.list (original)"
        );
    }

    #[test]
    fn test_outcome_from_error() {
        let denied = Outcome::from_error(&ProxyError::forbidden("item-get"));
        assert!(denied.is_denial());
        assert_eq!(denied.to_string(), "denied item-get");

        let failed = Outcome::from_error(&ProxyError::DivisionByZero);
        assert!(!failed.is_denial());
        assert!(!failed.is_ok());
        assert_eq!(failed.to_string(), "error division-by-zero");
    }

    #[test]
    fn test_compare_reports_differences() {
        let mut left = Trace::new("s", BackendKind::Portable);
        let mut right = Trace::new("s", BackendKind::Accelerated);
        left.push(entry(0, Outcome::Ok(Shape::Unit)));
        right.push(entry(0, Outcome::Ok(Shape::Unit)));
        left.push(entry(1, Outcome::Ok(Shape::Unit)));
        right.push(entry(1, Outcome::from_error(&ProxyError::forbidden("len"))));
        left.push(entry(2, Outcome::Ok(Shape::Unit)));

        let diffs = compare(&left, &right);
        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs[0].index, 1);
        assert_eq!(diffs[0].to_string(), "step 1 `step1`: ok unit vs denied len");
        assert_eq!(diffs[1].right, None);
        assert_eq!(left.passed(), 3);
        assert_eq!(right.denied(), 1);
    }
}
