//! JSONL result records.
//!
//! One object per scenario, printed to stdout. The schema is flat and
//! stable so downstream tooling can grep or parse line by line.

use serde::Serialize;

/// What running a scenario produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// All steps ran to completion without a fatal diagnostic.
    Completed,
    /// The tracking layer died with a rank-violation diagnostic.
    Violation { message: String },
    /// The scenario died with some other fatal diagnostic.
    Fatal { message: String },
}

/// Result record for one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub steps_run: usize,
    pub outcome: Outcome,
    /// Did the outcome match the scenario's declared expectation?
    pub matched_expectation: bool,
}

impl ScenarioReport {
    /// Render as a single JSONL line.
    #[must_use]
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|error| {
            format!(
                "{{\"scenario\":{:?},\"error\":\"report serialization failed: {error}\"}}",
                self.scenario
            )
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
