//! Run reports and per-unit results.
//!
//! A report is assembled while the run progresses and sealed exactly once;
//! after it is returned to the host it is never mutated.

use serde::{Deserialize, Serialize};

/// Outcome of one executed unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnitOutcome {
    /// The kernel executed the unit without reporting a fault.
    Success,

    /// The kernel reported a runtime fault for this unit.
    Fault { message: String },
}

impl UnitOutcome {
    /// Whether this outcome counts toward an overall success.
    pub fn is_success(&self) -> bool {
        matches!(self, UnitOutcome::Success)
    }
}

/// Result of one code unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitResult {
    /// Document position of the unit.
    pub sequence: usize,

    /// Captured output, newline-joined, at most `max_results` lines.
    pub output: String,

    /// Whether output was cut at the configured cap.
    pub truncated: bool,

    /// Wall-clock execution time in milliseconds.
    pub elapsed_ms: u64,

    /// Success or kernel fault.
    #[serde(flatten)]
    pub outcome: UnitOutcome,
}

impl UnitResult {
    /// Result recorded for a non-executable unit: success, no output, no
    /// kernel round trip.
    pub fn skipped(sequence: usize) -> Self {
        Self {
            sequence,
            output: String::new(),
            truncated: false,
            elapsed_ms: 0,
            outcome: UnitOutcome::Success,
        }
    }
}

/// Overall verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Failure,
}

/// The sealed result of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Overall verdict.
    pub outcome: RunOutcome,

    /// Per-unit results in execution order.
    pub unit_results: Vec<UnitResult>,

    /// Human-readable diagnostics collected during the run.
    pub diagnostics: Vec<String>,
}

impl ExecutionReport {
    /// Map the verdict into the host's boolean status vocabulary.
    pub fn succeeded(&self) -> bool {
        self.outcome == RunOutcome::Success
    }

    /// One-line summary for the host's build page.
    pub fn summary(&self) -> String {
        let recorded = self.unit_results.len();
        match self.outcome {
            RunOutcome::Success => format!("run succeeded: {recorded} unit(s) executed"),
            RunOutcome::Failure => {
                let faults = self
                    .unit_results
                    .iter()
                    .filter(|result| !result.outcome.is_success())
                    .count();
                format!("run failed: {faults} fault(s), {recorded} unit(s) recorded")
            }
        }
    }
}
