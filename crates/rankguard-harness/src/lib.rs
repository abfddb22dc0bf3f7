//! # rankguard-harness
//!
//! Scenario harness for the rankguard tracking layer: runs named
//! acquire/release sequences against fresh tracking contexts and emits
//! one JSONL result record per scenario.

#![forbid(unsafe_code)]

pub mod report;
pub mod runner;
pub mod scenario;

pub use report::{Outcome, ScenarioReport};
pub use runner::run_scenario;
pub use scenario::{Scenario, ScenarioError, Step, builtin, load};
