//! Brief normalization.
//!
//! One JSON call turns the free-text brief into a [`NormalizedIntent`]. The
//! stage never fails: a call error or unusable reply drops back to the keyword
//! heuristics, and gaps in a usable reply are filled from them too. Explicit
//! hints are applied last so they always win.

use std::sync::Arc;

use pipeline::heuristics::{apply_hints, heuristic_intent};
use pipeline::parse::parse_json;
use pipeline::types::dedup_phrases;
use pipeline::{
    BriefHints, GenerationRequest, NormalizedIntent, Stage, StageError, TextGenerator, TraceLog,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{instrument, warn};

use crate::prompts;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawIntent {
    role: Option<String>,
    audience: Option<String>,
    intent: Option<String>,
    format: Option<String>,
    domain: Option<String>,
    #[serde(alias = "event_context")]
    event_context: Option<String>,
    tone: Option<String>,
    duration: Option<String>,
    #[serde(alias = "must_include")]
    must_include: Vec<String>,
    #[serde(alias = "must_avoid")]
    must_avoid: Vec<String>,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

impl RawIntent {
    fn into_intent(self) -> Result<NormalizedIntent, StageError> {
        let intent = NormalizedIntent {
            role: clean(self.role),
            audience: clean(self.audience),
            intent: clean(self.intent),
            format: clean(self.format),
            domain: clean(self.domain),
            event_context: clean(self.event_context),
            tone: clean(self.tone),
            duration: clean(self.duration),
            must_include: dedup_phrases(self.must_include),
            must_avoid: dedup_phrases(self.must_avoid),
        };
        if intent == NormalizedIntent::default() {
            return Err(StageError::Malformed("intent has no fields".into()));
        }
        Ok(intent)
    }
}

/// Fills every field the model left empty from the heuristic reading.
fn fill_gaps(model: NormalizedIntent, heuristic: NormalizedIntent) -> NormalizedIntent {
    NormalizedIntent {
        role: model.role.or(heuristic.role),
        audience: model.audience.or(heuristic.audience),
        intent: model.intent.or(heuristic.intent),
        format: model.format.or(heuristic.format),
        domain: model.domain.or(heuristic.domain),
        event_context: model.event_context.or(heuristic.event_context),
        tone: model.tone.or(heuristic.tone),
        duration: model.duration.or(heuristic.duration),
        must_include: model.must_include,
        must_avoid: model.must_avoid,
    }
}

fn describe(intent: &NormalizedIntent) -> String {
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".into());
    format!(
        "role={} audience={} intent={} format={} tone={} duration={}",
        field(&intent.role),
        field(&intent.audience),
        field(&intent.intent),
        field(&intent.format),
        field(&intent.tone),
        field(&intent.duration),
    )
}

pub struct Normalizer {
    generator: Arc<dyn TextGenerator>,
}

impl Normalizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    async fn call(&self, brief: &str, hints: &BriefHints) -> Result<NormalizedIntent, StageError> {
        let payload = json!({ "brief": brief, "hints": hints }).to_string();
        let raw = self
            .generator
            .generate(GenerationRequest::json(
                Stage::Normalizer,
                prompts::NORMALIZER,
                payload,
            ))
            .await?;
        parse_json::<RawIntent>(&raw)?.into_intent()
    }

    /// Produces the run's intent. Infallible.
    #[instrument(skip_all, fields(brief_chars = brief.chars().count()))]
    pub async fn normalize(
        &self,
        brief: &str,
        hints: &BriefHints,
        trace: &mut TraceLog,
    ) -> NormalizedIntent {
        let heuristic = heuristic_intent(brief, hints);
        match self.call(brief, hints).await {
            Ok(model) => {
                let intent = apply_hints(fill_gaps(model, heuristic), hints);
                trace.record(Stage::Normalizer, format!("intent parsed: {}", describe(&intent)));
                intent
            }
            Err(e) => {
                warn!(error = %e, "normalizer degraded to heuristics");
                trace.record(
                    Stage::Normalizer,
                    format!(
                        "degraded to keyword heuristics ({e}): {}",
                        describe(&heuristic)
                    ),
                );
                heuristic
            }
        }
    }
}
