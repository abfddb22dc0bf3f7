//! Scenario execution.
//!
//! Each scenario runs on its own thread against a fresh
//! `TrackingContext`, so one scenario's fatal diagnostic (a thread
//! panic) never poisons the panic state or held-lock records of the
//! next. Headers live for the scenario's duration; ranks come straight
//! from the scenario's declarations.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use rankguard_core::{LockHeader, ObjectType, Rank, TrackingContext, log_dump};

use crate::report::{Outcome, ScenarioReport};
use crate::scenario::{Scenario, Step};

/// Object-type code the harness stamps on its scenario locks.
const HARNESS_LOCK_TYPE: u8 = 1;

/// Run one validated scenario to a report.
pub fn run_scenario(scenario: &Scenario) -> ScenarioReport {
    let steps_run = Arc::new(AtomicUsize::new(0));

    let outcome = {
        let scenario = scenario.clone();
        let steps_run = Arc::clone(&steps_run);

        let worker = thread::Builder::new()
            .name(format!("scenario-{}", scenario.name))
            .spawn(move || execute_steps(&scenario, &steps_run))
            .expect("spawn scenario thread");

        match worker.join() {
            Ok(()) => Outcome::Completed,
            Err(payload) => {
                let message = panic_message(payload);

                if message.contains("rank violation") {
                    Outcome::Violation { message }
                } else {
                    Outcome::Fatal { message }
                }
            }
        }
    };

    let matched_expectation = match (&outcome, scenario.expect_violation) {
        (Outcome::Completed, false) => true,
        (Outcome::Violation { .. }, true) => true,
        _ => false,
    };

    ScenarioReport {
        scenario: scenario.name.clone(),
        steps_run: steps_run.load(Ordering::Acquire),
        outcome,
        matched_expectation,
    }
}

fn execute_steps(scenario: &Scenario, steps_run: &AtomicUsize) {
    let ctx = TrackingContext::new();
    let object_type = ObjectType::new(HARNESS_LOCK_TYPE);

    // Boxed so header addresses stay stable as the map grows; the
    // tracking layer matches held locks by header identity.
    let mut headers: BTreeMap<&str, Box<LockHeader>> = BTreeMap::new();

    for step in &scenario.steps {
        match step {
            Step::Acquire { lock, rank } => {
                let header = headers.entry(lock).or_insert_with(|| {
                    Box::new(LockHeader::new(&ctx, lock, Rank(*rank), object_type, log_dump))
                });

                ctx.acquisition_tracking(header, true);
            }
            Step::Release { lock } => {
                // Validation guarantees the header exists.
                if let Some(header) = headers.get(lock.as_str()) {
                    ctx.release_tracking(header);
                }
            }
        }

        steps_run.fetch_add(1, Ordering::AcqRel);
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else {
        "unrecognized panic payload".to_owned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
