//! Backend conformance for warden proxies
//!
//! Runs scripted operation sequences on each proxy backend and compares the
//! resulting pass/fail traces step by step:
//! - **Scripts**: fixtures and steps over numbered registers (`script` module)
//! - **Traces**: per-step outcomes with run-specific detail removed
//!   (`trace` module)
//! - **Fixtures**: the standard script set (`fixtures` module)

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod fixtures;
pub mod script;
pub mod trace;

pub use script::{run, Arg, Fixture, Script, Step};
pub use trace::{compare, Divergence, Outcome, Shape, Trace, TraceEntry};

use warden_proxy::backend::Backend;

/// Result of one script across several backends
#[derive(Debug)]
pub struct ScriptReport {
    /// Script name
    pub script: &'static str,
    /// One trace per backend, in the order the backends were given
    pub traces: Vec<Trace>,
    /// Disagreements between the first trace and each later one
    pub divergences: Vec<Divergence>,
}

impl ScriptReport {
    /// Check whether every backend produced the same trace
    pub fn is_conformant(&self) -> bool {
        self.divergences.is_empty()
    }
}

/// Run `script` on every backend and compare against the first
pub fn check_script(backends: &[&dyn Backend], script: &Script) -> ScriptReport {
    let traces: Vec<Trace> = backends.iter().map(|backend| run(*backend, script)).collect();
    let divergences = match traces.split_first() {
        Some((reference, rest)) => rest
            .iter()
            .flat_map(|other| compare(reference, other))
            .collect(),
        None => Vec::new(),
    };
    if !divergences.is_empty() {
        tracing::warn!(
            script = script.name,
            divergences = divergences.len(),
            "backends disagree"
        );
    }
    ScriptReport {
        script: script.name,
        traces,
        divergences,
    }
}
