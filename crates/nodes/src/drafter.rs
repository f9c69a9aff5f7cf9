//! Candidate drafting.
//!
//! Two independent calls run concurrently, each under a different stylistic
//! directive. Either call failing, or either reply being empty once its
//! wrapping is stripped, is terminal for the run.

use std::sync::Arc;

use pipeline::parse::strip_wrapping;
use pipeline::{
    CandidatePair, GenerationRequest, Plan, Stage, StageError, TextGenerator, TraceLog,
};
use serde_json::json;
use tracing::instrument;

use crate::prompts;

pub struct Drafter {
    generator: Arc<dyn TextGenerator>,
}

impl Drafter {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    fn request(plan_json: &str, style: &str) -> GenerationRequest {
        GenerationRequest::text(
            Stage::Drafter,
            format!("{}\n\n{style}", prompts::DRAFTER),
            plan_json,
        )
    }

    async fn call(&self, plan: &Plan) -> Result<CandidatePair, StageError> {
        let plan_json = json!({ "plan": plan }).to_string();
        let [style_a, style_b] = prompts::DRAFT_STYLES;
        let (a, b) = tokio::join!(
            self.generator.generate(Self::request(&plan_json, style_a)),
            self.generator.generate(Self::request(&plan_json, style_b)),
        );
        CandidatePair::new(strip_wrapping(&a?), strip_wrapping(&b?))
    }

    /// Drafts exactly two non-empty candidates.
    ///
    /// # Errors
    ///
    /// Any call failure or empty candidate; the failure is recorded first so
    /// the trace ends on this stage.
    #[instrument(skip_all)]
    pub async fn draft(
        &self,
        plan: &Plan,
        trace: &mut TraceLog,
    ) -> Result<CandidatePair, StageError> {
        match self.call(plan).await {
            Ok(pair) => {
                trace.record(
                    Stage::Drafter,
                    format!(
                        "two candidates drafted ({} and {} words)",
                        pair.first().split_whitespace().count(),
                        pair.second().split_whitespace().count()
                    ),
                );
                Ok(pair)
            }
            Err(e) => {
                trace.record(Stage::Drafter, format!("drafting failed: {e}"));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGenerator;
    use pipeline::{Constraints, GenerationError};

    fn plan() -> Plan {
        Plan {
            core_message: "We did it together.".into(),
            audience: "Engineers".into(),
            event_context: "Year end".into(),
            tone: "Warm".into(),
            duration: "3 minutes".into(),
            pillars: vec![],
            constraints: Constraints::default(),
        }
    }

    #[tokio::test]
    async fn strips_wrapping_and_uses_distinct_directives() {
        let generator = Arc::new(
            ScriptedGenerator::new()
                .reply(Stage::Drafter, "===DRAFT_1===\nFriends, what a year.\n===END_DRAFT_1===")
                .reply(Stage::Drafter, "```\nThree things made this year.\n```"),
        );
        let drafter = Drafter::new(generator.clone());
        let mut trace = TraceLog::new();

        let pair = drafter.draft(&plan(), &mut trace).await.unwrap();

        assert_eq!(pair.first(), "Friends, what a year.");
        assert_eq!(pair.second(), "Three things made this year.");
        let requests = generator.requests();
        assert_eq!(requests.len(), 2);
        assert_ne!(requests[0].instruction, requests[1].instruction);
    }

    #[tokio::test]
    async fn one_empty_candidate_is_terminal() {
        let generator = Arc::new(
            ScriptedGenerator::new()
                .reply(Stage::Drafter, "A real speech.")
                .reply(Stage::Drafter, "```\n\n```"),
        );
        let drafter = Drafter::new(generator);
        let mut trace = TraceLog::new();

        let err = drafter.draft(&plan(), &mut trace).await.unwrap_err();

        assert!(matches!(err, StageError::Empty(_)));
        let last = trace.last().unwrap();
        assert_eq!(last.stage, Stage::Drafter);
        assert!(last.message.contains("candidate 2"));
    }

    #[tokio::test]
    async fn call_failure_is_terminal() {
        let generator = Arc::new(
            ScriptedGenerator::new()
                .reply(Stage::Drafter, "A real speech.")
                .fail(Stage::Drafter, GenerationError::Timeout(std::time::Duration::from_secs(30))),
        );
        let drafter = Drafter::new(generator);
        let mut trace = TraceLog::new();

        let err = drafter.draft(&plan(), &mut trace).await.unwrap_err();

        assert!(matches!(err, StageError::Generation(_)));
        assert_eq!(trace.last().unwrap().stage, Stage::Drafter);
    }
}
