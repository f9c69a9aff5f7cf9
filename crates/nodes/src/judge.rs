//! Candidate selection.
//!
//! The executor picks the [`PresentationOrder`]; this stage shows the
//! candidates in that order, reads back an option number and maps it to the
//! drafted candidate. Any failure or invalid reply selects the first drafted
//! candidate and marks the verdict as defaulted.

use std::sync::Arc;

use pipeline::parse::parse_json;
use pipeline::trace::snippet;
use pipeline::{
    CandidatePair, CandidateSlot, GenerationRequest, JudgeVerdict, Plan, PresentationOrder, Stage,
    StageError, TextGenerator, TraceLog,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{instrument, warn};

use crate::prompts;

/// Reason attached to a defaulted verdict.
pub const DEFAULTED_REASON: &str = "defaulted: judge unavailable";

/// Trace entries quote at most this much of the justification.
const REASON_TRACE_CHARS: usize = 260;

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(alias = "choice")]
    winner: Value,
    #[serde(default, alias = "justification")]
    reason: String,
}

/// Accepts `1`, `"2"`, `"option 1"`, `"Option 2"` and the like.
fn option_number(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        Value::String(s) => {
            let digits: String = s.chars().filter(char::is_ascii_digit).collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

/// Option number under which `slot` was shown.
fn shown_as(order: PresentationOrder, slot: CandidateSlot) -> u8 {
    if order.presented()[0] == slot {
        1
    } else {
        2
    }
}

pub struct Judge {
    generator: Arc<dyn TextGenerator>,
}

impl Judge {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    async fn call(
        &self,
        plan: &Plan,
        pair: &CandidatePair,
        order: PresentationOrder,
    ) -> Result<JudgeVerdict, StageError> {
        let [one, two] = order.presented();
        let payload = json!({
            "plan": plan,
            "option1": pair.get(one),
            "option2": pair.get(two),
        })
        .to_string();
        let raw = self
            .generator
            .generate(GenerationRequest::json(Stage::Judge, prompts::JUDGE, payload))
            .await?;
        let verdict: RawVerdict = parse_json(&raw)?;
        let presented = option_number(&verdict.winner)
            .ok_or_else(|| StageError::Malformed(format!("unreadable winner {}", verdict.winner)))?;
        let winner = order
            .candidate_for_option(presented)
            .ok_or_else(|| StageError::Malformed(format!("winner {presented} is not an option")))?;
        Ok(JudgeVerdict {
            winner,
            presented_winner: presented,
            order,
            reason: verdict.reason.trim().to_string(),
            defaulted: false,
        })
    }

    /// Selects the stronger candidate. Infallible.
    #[instrument(skip_all, fields(order = ?order))]
    pub async fn judge(
        &self,
        plan: &Plan,
        pair: &CandidatePair,
        order: PresentationOrder,
        trace: &mut TraceLog,
    ) -> JudgeVerdict {
        match self.call(plan, pair, order).await {
            Ok(verdict) => {
                trace.record(
                    Stage::Judge,
                    format!(
                        "candidate {} selected (shown as option {}): {}",
                        verdict.winner.number(),
                        verdict.presented_winner,
                        snippet(&verdict.reason, REASON_TRACE_CHARS)
                    ),
                );
                verdict
            }
            Err(e) => {
                warn!(error = %e, "judge degraded to first candidate");
                trace.record(
                    Stage::Judge,
                    format!("degraded judge ({e}); candidate 1 selected by default"),
                );
                JudgeVerdict {
                    winner: CandidateSlot::First,
                    presented_winner: shown_as(order, CandidateSlot::First),
                    order,
                    reason: DEFAULTED_REASON.to_string(),
                    defaulted: true,
                }
            }
        }
    }
}
