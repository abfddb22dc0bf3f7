//! Scenario harness CLI.
//!
//! Runs the built-in scenario set (or a JSON scenario file) and prints
//! one JSONL result record per scenario. Exits nonzero when any
//! scenario's outcome does not match its declared expectation.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use rankguard_harness::{ScenarioError, builtin, load, run_scenario};

#[derive(Debug, Parser)]
#[command(
    name = "rankguard-harness",
    about = "Run lock-order tracking scenarios and emit JSONL results"
)]
struct Args {
    /// JSON scenario file (a top-level array); built-in scenarios run
    /// when omitted.
    #[arg(long)]
    scenarios: Option<PathBuf>,

    /// List scenario names without running them.
    #[arg(long)]
    list: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let scenarios = match args.scenarios {
        Some(path) => match load(&path) {
            Ok(scenarios) => scenarios,
            Err(error) => return fail(&error),
        },
        None => builtin(),
    };

    if args.list {
        for scenario in &scenarios {
            println!("{}", scenario.name);
        }

        return ExitCode::SUCCESS;
    }

    let mut all_matched = true;

    for scenario in &scenarios {
        let report = run_scenario(scenario);
        println!("{}", report.to_jsonl());
        all_matched &= report.matched_expectation;
    }

    if all_matched {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn fail(error: &ScenarioError) -> ExitCode {
    eprintln!("rankguard-harness: {error}");

    ExitCode::FAILURE
}
