//! Scenario model.
//!
//! A scenario is a named sequence of acquire/release steps executed on a
//! fresh tracking context, with a declared expectation: either the
//! sequence completes cleanly or it dies in a rank violation.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use rankguard_core::Rank;

/// Failure to load or validate a scenario file.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse scenario file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("scenario `{scenario}` step {step}: lock `{lock}` is released before any acquire")]
    ReleaseBeforeAcquire {
        scenario: String,
        step: usize,
        lock: String,
    },

    #[error("scenario `{scenario}`: lock `{lock}` is declared with conflicting ranks {first} and {second}")]
    ConflictingRank {
        scenario: String,
        lock: String,
        first: Rank,
        second: Rank,
    },
}

/// One acquire or release step. Rank 0 means unranked.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Acquire { lock: String, rank: u32 },
    Release { lock: String },
}

/// A named step sequence with its expected outcome.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub steps: Vec<Step>,
    /// True when the scenario is expected to die in a rank violation.
    #[serde(default)]
    pub expect_violation: bool,
}

impl Scenario {
    /// Static validation: every released lock must have been declared by
    /// an earlier acquire, and a lock's rank must be declared
    /// consistently.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let mut ranks: BTreeMap<&str, Rank> = BTreeMap::new();

        for (index, step) in self.steps.iter().enumerate() {
            match step {
                Step::Acquire { lock, rank } => {
                    let declared = Rank(*rank);

                    if let Some(&first) = ranks.get(lock.as_str()) {
                        if first != declared {
                            return Err(ScenarioError::ConflictingRank {
                                scenario: self.name.clone(),
                                lock: lock.clone(),
                                first,
                                second: declared,
                            });
                        }
                    } else {
                        ranks.insert(lock, declared);
                    }
                }
                Step::Release { lock } => {
                    if !ranks.contains_key(lock.as_str()) {
                        return Err(ScenarioError::ReleaseBeforeAcquire {
                            scenario: self.name.clone(),
                            step: index,
                            lock: lock.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

/// Load and validate scenarios from a JSON file (a top-level array).
pub fn load(path: &Path) -> Result<Vec<Scenario>, ScenarioError> {
    let text = std::fs::read_to_string(path)?;
    let scenarios: Vec<Scenario> = serde_json::from_str(&text)?;

    for scenario in &scenarios {
        scenario.validate()?;
    }

    Ok(scenarios)
}

/// The built-in scenario set run when no file is given.
pub fn builtin() -> Vec<Scenario> {
    fn acquire(lock: &str, rank: u32) -> Step {
        Step::Acquire {
            lock: lock.to_owned(),
            rank,
        }
    }

    fn release(lock: &str) -> Step {
        Step::Release {
            lock: lock.to_owned(),
        }
    }

    vec![
        Scenario {
            name: "well_nested".to_owned(),
            steps: vec![
                acquire("config", 10),
                acquire("journal", 20),
                acquire("io", 30),
                release("io"),
                release("journal"),
                release("config"),
            ],
            expect_violation: false,
        },
        Scenario {
            name: "unranked_mixture".to_owned(),
            steps: vec![
                acquire("config", 10),
                acquire("stats", 0),
                acquire("journal", 20),
                release("journal"),
                release("stats"),
                release("config"),
            ],
            expect_violation: false,
        },
        Scenario {
            name: "rank_violation".to_owned(),
            steps: vec![
                acquire("config", 10),
                acquire("journal", 20),
                acquire("cache", 15),
            ],
            expect_violation: true,
        },
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
