//! Backend Equivalence Tests
//!
//! Runs the standard scripts on both backends and checks that every step
//! produced the same outcome, then pins down the expected outcomes of the
//! main mixed sequence.

use warden_conformance::{check_script, fixtures, run, Outcome};
use warden_proxy::backend::{self, Backend};

fn both() -> Vec<&'static dyn Backend> {
    vec![
        backend::portable(),
        backend::accelerated().expect("accelerated backend is enabled for conformance"),
    ]
}

fn rendered(outcomes: &[&Outcome]) -> Vec<String> {
    outcomes.iter().map(|outcome| outcome.to_string()).collect()
}

// ===== Equivalence =====

#[test]
fn test_all_scripts_conform() {
    let backends = both();
    for script in fixtures::standard_scripts() {
        let report = check_script(&backends, &script);
        assert!(
            report.is_conformant(),
            "{} diverged:\n{}",
            script.name,
            report
                .divergences
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n")
        );
        assert_eq!(report.traces.len(), 2);
        assert_eq!(report.traces[0].entries().len(), script.steps.len());
    }
}

#[test]
fn test_runs_are_repeatable() {
    let script = fixtures::mixed();
    for backend in both() {
        let first = run(backend, &script);
        let second = run(backend, &script);
        assert_eq!(first.entries(), second.entries());
    }
}

// ===== Mixed Sequence =====

#[test]
fn test_mixed_sequence_outcomes() {
    let script = fixtures::mixed();
    for backend in both() {
        let trace = run(backend, &script);
        let outcomes: Vec<&Outcome> = trace.entries().iter().map(|e| &e.outcome).collect();
        let text = rendered(&outcomes);

        assert_eq!(text[0], "ok int 3");
        assert_eq!(text[1], "denied item-get");
        assert_eq!(text[2], "ok redacted pkg.Type");
        assert_eq!(text[3], "denied name");
        assert_eq!(text[4], "ok unit");
        assert_eq!(text[5], "ok int 1");
        assert_eq!(text[6], "ok str 'widget'");
        assert_eq!(text[7], "ok str 'widget'");
        assert_eq!(text[8], "denied inplace-add");
        assert_eq!(text[9], "ok unit");
        assert_eq!(text[10], "ok proxy builtins.list (same)");
        assert_eq!(text[11], "ok proxy builtins.list_iterator (new)");
        assert_eq!(text[12], "ok unit");
        assert_eq!(text[13], "ok int 1");
        assert!(text[14].starts_with("ok int "), "hash step: {}", text[14]);
        assert_eq!(text[15], "ok proxy builtins.list (new)");
        assert_eq!(text[16], "ok unit");
        assert_eq!(text[17], "denied item-get");
        assert_eq!(text[18], "error reserved-field");
        assert_eq!(text[19], "ok raw builtins.list (original)");

        assert_eq!(trace.denied(), 4);
    }
}

// ===== Focused Scripts =====

#[test]
fn test_identity_survives_deny_all() {
    for backend in both() {
        let trace = run(backend, &fixtures::identity());
        let text: Vec<String> = trace.entries().iter().map(|e| e.outcome.to_string()).collect();

        assert!(text[0].starts_with("ok int "));
        assert_eq!(text[1], "ok bool True");
        assert_eq!(text[2], "ok int -1");
        assert_eq!(text[3], "ok int 1");
        assert_eq!(text[4], "denied eq");
        assert_eq!(text[5], "ok redacted pkg.Ranked");
        assert_eq!(text[6], "ok redacted pkg.Ranked");
        assert_eq!(text[7], "denied len");
        assert_eq!(text[8], "denied rank");
        assert_eq!(text[9], "ok unit");
        assert_eq!(text[10], "ok int 1");
        assert_eq!(text[11], "ok raw pkg.Ranked (original)");
    }
}

#[test]
fn test_in_place_identity() {
    for backend in both() {
        let trace = run(backend, &fixtures::in_place());
        let text: Vec<String> = trace.entries().iter().map(|e| e.outcome.to_string()).collect();

        assert_eq!(text[0], "ok proxy builtins.list (same)");
        assert_eq!(text[1], "ok int 2");
        assert_eq!(text[2], "ok proxy builtins.dict (same)");
        assert_eq!(text[3], "ok int 2");
        assert_eq!(text[4], "ok proxy builtins.list (same)");
        assert_eq!(text[5], "ok int 4");
        assert_eq!(text[6], "denied inplace-sub");
        assert_eq!(text[7], "ok proxy builtins.int (new)");
        assert_eq!(text[8], "ok raw builtins.list (original)");
        assert_eq!(text[9], "ok raw builtins.dict (original)");
        assert_eq!(text[10], "ok raw builtins.int (original)");
    }
}

#[test]
fn test_results_are_mediated() {
    for backend in both() {
        let trace = run(backend, &fixtures::mediation());
        let text: Vec<String> = trace.entries().iter().map(|e| e.outcome.to_string()).collect();

        assert_eq!(text[0], "ok proxy pkg.Child");
        assert_eq!(text[1], "ok str 'c'");
        assert_eq!(text[2], "ok proxy builtins.list");
        assert_eq!(text[3], "ok proxy pkg.Child (new)");
        assert_eq!(text[4], "ok object pkg.Value");
        assert_eq!(text[5], "denied missing");
        assert_eq!(text[6], "error no-attribute");
        assert_eq!(text[7], "error unsupported");
        assert_eq!(text[8], "ok raw pkg.Child");
    }
}

#[test]
fn test_arithmetic_outcomes() {
    for backend in both() {
        let trace = run(backend, &fixtures::arithmetic());
        let text: Vec<String> = trace.entries().iter().map(|e| e.outcome.to_string()).collect();

        assert_eq!(text[0], "ok int 10");
        assert_eq!(text[1], "error division-by-zero");
        assert_eq!(text[2], "ok int -1");
        assert_eq!(text[3], "ok proxy builtins.int (new)");
        assert_eq!(text[4], "ok int 8");
        assert_eq!(text[5], "denied pow");
        assert_eq!(text[6], "denied rsub");
        assert_eq!(text[7], "ok int 8");
        assert_eq!(text[8], "denied neg");
        assert!(text[9].starts_with("ok int "));
        assert_eq!(text[10], "ok float 3.5");
        assert_eq!(text[11], "ok raw builtins.int");
    }
}
