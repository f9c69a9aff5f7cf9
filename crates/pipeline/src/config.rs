//! Runtime configuration for the executor.
//!
//! Built once at process start (see the `cli` crate) and shared by reference
//! with every run. Nothing in the pipeline reads the process environment.

use serde::{Deserialize, Serialize};

use crate::errors::QuillError;
use crate::mode::DEFAULT_REFINE_TRIGGERS;
use crate::types::Constraints;

/// What happens when planning fails (call error or unparseable plan).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerFailurePolicy {
    /// Continue with a minimal plan built from the brief.
    #[default]
    Fallback,
    /// End the run with no final text.
    Terminal,
}

/// What happens when the guardrail call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailFailurePolicy {
    /// Pass the selected text through, status `ok`, marked as skipped.
    #[default]
    FailOpen,
    /// Pass the selected text through, status `flagged` for human review.
    FailClosed,
}

/// Executor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Maximum brief length, in characters.
    pub max_brief_chars: usize,
    /// Planner failure handling.
    pub planner_failure: PlannerFailurePolicy,
    /// Guardrail failure handling.
    pub guardrail_failure: GuardrailFailurePolicy,
    /// Seed for the judge's presentation order, mixed with each run id so a
    /// run's order is reproducible from its id. `None` draws from entropy.
    pub judge_seed: Option<u64>,
    /// Organisation-wide constraints merged into every plan.
    pub global_constraints: Constraints,
    /// Start-over phrases that force generate mode despite a prior text.
    pub refine_triggers: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_brief_chars: 4000,
            planner_failure: PlannerFailurePolicy::default(),
            guardrail_failure: GuardrailFailurePolicy::default(),
            judge_seed: None,
            global_constraints: Constraints::default(),
            refine_triggers: DEFAULT_REFINE_TRIGGERS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

impl RunnerConfig {
    /// Checks the configuration for values the executor cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::ConfigurationError`] describing the first problem.
    pub fn validate(&self) -> Result<(), QuillError> {
        if self.max_brief_chars == 0 {
            return Err(QuillError::ConfigurationError {
                message: "max_brief_chars must be greater than zero".into(),
            });
        }
        if self.refine_triggers.iter().any(|t| t.trim().is_empty()) {
            return Err(QuillError::ConfigurationError {
                message: "refine_triggers must not contain blank phrases".into(),
            });
        }
        Ok(())
    }
}
