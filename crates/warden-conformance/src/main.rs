//! Warden backend conformance runner
//!
//! Runs the standard scripts on the selected backends and exits non-zero if
//! any step's outcome differs between them.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use regex::Regex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warden_conformance::{check_script, fixtures};
use warden_proxy::backend::{self, Backend};

#[derive(Parser)]
#[command(name = "warden-conformance")]
#[command(about = "Check that warden proxy backends behave identically", long_about = None)]
#[command(version)]
struct Cli {
    /// Backends to run
    #[arg(short, long, value_enum, default_value = "both")]
    backend: BackendArg,

    /// Only run scripts whose name matches this pattern
    #[arg(short, long)]
    filter: Option<String>,

    /// List scripts and exit
    #[arg(long)]
    list: bool,

    /// Print every trace, not only divergences
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Portable,
    Accelerated,
    Both,
}

fn backends(arg: BackendArg) -> anyhow::Result<Vec<&'static dyn Backend>> {
    let accelerated = || backend::accelerated().context("accelerated backend not compiled in");
    Ok(match arg {
        BackendArg::Portable => vec![backend::portable()],
        BackendArg::Accelerated => vec![accelerated()?],
        BackendArg::Both => vec![backend::portable(), accelerated()?],
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let pattern = cli
        .filter
        .as_deref()
        .map(Regex::new)
        .transpose()
        .context("invalid --filter pattern")?;
    let scripts: Vec<_> = fixtures::standard_scripts()
        .into_iter()
        .filter(|script| pattern.as_ref().map_or(true, |re| re.is_match(script.name)))
        .collect();

    if cli.list {
        for script in &scripts {
            println!("{:<20} {:>3} steps  {}", script.name, script.steps.len(), script.description);
        }
        return Ok(());
    }

    let backends = backends(cli.backend)?;
    let names: Vec<&str> = backends.iter().map(|b| b.kind().name()).collect();
    println!("Backends: {}", names.join(", "));

    let mut failed = 0;
    for script in &scripts {
        let report = check_script(&backends, script);
        if cli.verbose {
            for trace in &report.traces {
                print!("{}", trace);
            }
        }
        if report.is_conformant() {
            let steps = script.steps.len();
            let passed = report.traces.first().map_or(0, |trace| trace.passed());
            println!("PASS {:<20} {} steps, {} ok", script.name, steps, passed);
        } else {
            failed += 1;
            println!("FAIL {}", script.name);
            for divergence in &report.divergences {
                println!("     {}", divergence);
            }
        }
    }

    println!();
    println!("{} scripts, {} diverged", scripts.len(), failed);
    if failed > 0 {
        bail!("{} of {} scripts diverged between backends", failed, scripts.len());
    }
    Ok(())
}
