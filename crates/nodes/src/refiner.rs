//! Refine mode: one constrained edit of a prior final text.
//!
//! A failed or empty refinement returns the prior text byte for byte, so a
//! previously good result is never lost.

use std::sync::Arc;

use pipeline::parse::strip_wrapping;
use pipeline::{GenerationRequest, RefinementContext, Stage, StageError, TextGenerator, TraceLog};
use serde_json::json;
use tracing::{instrument, warn};

use crate::prompts;

pub struct Refiner {
    generator: Arc<dyn TextGenerator>,
}

impl Refiner {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    async fn call(
        &self,
        context: &RefinementContext,
        instruction: &str,
    ) -> Result<String, StageError> {
        let payload = json!({
            "previousText": context.previous_text,
            "previousInstruction": context.previous_instruction,
            "instruction": instruction,
        })
        .to_string();
        let raw = self
            .generator
            .generate(GenerationRequest::text(Stage::Refiner, prompts::REFINER, payload))
            .await?;
        let refined = strip_wrapping(&raw);
        if refined.is_empty() {
            return Err(StageError::Empty("refiner returned no text".into()));
        }
        Ok(refined)
    }

    #[instrument(skip_all)]
    pub async fn refine(
        &self,
        context: &RefinementContext,
        instruction: &str,
        trace: &mut TraceLog,
    ) -> String {
        match self.call(context, instruction).await {
            Ok(text) => {
                trace.record(
                    Stage::Refiner,
                    format!("applied instruction ({} words)", text.split_whitespace().count()),
                );
                text
            }
            Err(e) => {
                warn!(error = %e, "refinement failed; keeping previous text");
                trace.record(
                    Stage::Refiner,
                    format!("refinement failed ({e}); previous text returned unchanged"),
                );
                context.previous_text.clone()
            }
        }
    }
}
