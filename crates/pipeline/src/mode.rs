//! Generate-vs-refine selection.

use serde::{Deserialize, Serialize};

/// Phrases that mean "discard the previous version and start over".
pub const DEFAULT_REFINE_TRIGGERS: &[&str] = &[
    "new speech",
    "start again",
    "fresh speech",
    "fresh talk",
    "ignore the previous",
    "ignore the last",
    "different topic",
    "different subject",
];

/// Which path a run takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Full parse → plan → draft → judge → guardrail → edit pipeline.
    Generate,
    /// Single constrained edit of a prior final text.
    Refine,
}

impl Mode {
    /// Lowercase mode name.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Generate => "generate",
            Mode::Refine => "refine",
        }
    }
}

/// Returns `true` if `instruction` contains any start-over phrase, ignoring case.
pub fn is_start_over<S: AsRef<str>>(instruction: &str, triggers: &[S]) -> bool {
    let lower = instruction.to_lowercase();
    triggers
        .iter()
        .any(|t| !t.as_ref().is_empty() && lower.contains(&t.as_ref().to_lowercase()))
}

/// Refine iff a non-blank prior final text exists and the instruction does not
/// ask to start over.
pub fn select_mode<S: AsRef<str>>(
    previous_text: Option<&str>,
    instruction: &str,
    triggers: &[S],
) -> Mode {
    match previous_text {
        Some(text) if !text.trim().is_empty() && !is_start_over(instruction, triggers) => {
            Mode::Refine
        }
        _ => Mode::Generate,
    }
}
