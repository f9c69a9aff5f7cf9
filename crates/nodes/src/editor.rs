//! Final delivery polish. A quality pass only: any failure keeps the guarded
//! text, and so does a polish that brings back a must-avoid phrase the
//! guarded text was free of.

use std::sync::Arc;

use pipeline::parse::strip_wrapping;
use pipeline::{GenerationRequest, Plan, Stage, StageError, TextGenerator, TraceLog};
use serde_json::json;
use tracing::{instrument, warn};

use crate::guardrail::must_avoid_violations;
use crate::prompts;

pub struct Editor {
    generator: Arc<dyn TextGenerator>,
}

impl Editor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    async fn call(&self, plan: &Plan, text: &str) -> Result<String, StageError> {
        let payload = json!({
            "tone": plan.tone,
            "duration": plan.duration,
            "audience": plan.audience,
            "constraints": plan.constraints,
            "text": text,
        })
        .to_string();
        let raw = self
            .generator
            .generate(GenerationRequest::text(Stage::Editor, prompts::EDITOR, payload))
            .await?;
        let polished = strip_wrapping(&raw);
        if polished.is_empty() {
            return Err(StageError::Empty("editor returned no text".into()));
        }
        Ok(polished)
    }

    #[instrument(skip_all)]
    pub async fn polish(&self, plan: &Plan, guarded: &str, trace: &mut TraceLog) -> String {
        let text = match self.call(plan, guarded).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "editor skipped");
                trace.record(Stage::Editor, format!("skipped ({e}); keeping guarded text"));
                return guarded.to_string();
            }
        };

        let already_present = must_avoid_violations(&plan.constraints, guarded);
        let reintroduced: Vec<&str> = must_avoid_violations(&plan.constraints, &text)
            .into_iter()
            .filter(|phrase| !already_present.contains(phrase))
            .collect();
        if !reintroduced.is_empty() {
            warn!(phrases = ?reintroduced, "editor reintroduced must-avoid phrases");
            trace.record(
                Stage::Editor,
                format!(
                    "polish discarded: it reintroduced must-avoid {}; keeping guarded text",
                    reintroduced
                        .iter()
                        .map(|p| format!("\"{p}\""))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            );
            return guarded.to_string();
        }

        trace.record(
            Stage::Editor,
            format!("polished ({} words)", text.split_whitespace().count()),
        );
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGenerator;
    use pipeline::Constraints;

    fn plan() -> Plan {
        Plan {
            core_message: "Thanks.".into(),
            audience: "Team".into(),
            event_context: "Friday".into(),
            tone: "Warm".into(),
            duration: "1 minute".into(),
            pillars: vec![],
            constraints: Constraints::default(),
        }
    }

    #[tokio::test]
    async fn returns_the_polished_text() {
        let generator =
            Arc::new(ScriptedGenerator::new().reply(Stage::Editor, "\"Thank you, all.\""));
        let mut trace = TraceLog::new();
        let text = Editor::new(generator)
            .polish(&plan(), "Thank you all of you.", &mut trace)
            .await;
        assert_eq!(text, "Thank you, all.");
    }

    #[tokio::test]
    async fn payload_carries_the_constraints() {
        let generator = Arc::new(ScriptedGenerator::new().reply(Stage::Editor, "Thank you."));
        let mut plan = plan();
        plan.constraints = Constraints::new(["the team"], ["bonuses"]);

        Editor::new(generator.clone())
            .polish(&plan, "Thank you all.", &mut TraceLog::new())
            .await;

        let payload: serde_json::Value =
            serde_json::from_str(&generator.requests()[0].payload).unwrap();
        assert_eq!(payload["constraints"]["mustAvoid"][0], "bonuses");
    }

    #[tokio::test]
    async fn polish_that_reintroduces_a_must_avoid_phrase_is_discarded() {
        let generator = Arc::new(
            ScriptedGenerator::new().reply(Stage::Editor, "Thank you, despite the layoffs."),
        );
        let mut plan = plan();
        plan.constraints = Constraints::new(Vec::<String>::new(), ["layoffs"]);
        let mut trace = TraceLog::new();

        let text = Editor::new(generator)
            .polish(&plan, "Thank you all.", &mut trace)
            .await;

        assert_eq!(text, "Thank you all.");
        let last = trace.last().unwrap();
        assert!(last.message.starts_with("polish discarded"));
        assert!(last.message.contains("layoffs"));
    }

    #[tokio::test]
    async fn phrase_already_in_the_guarded_text_does_not_discard_the_polish() {
        let generator = Arc::new(
            ScriptedGenerator::new().reply(Stage::Editor, "Despite the layoffs, thank you."),
        );
        let mut plan = plan();
        plan.constraints = Constraints::new(Vec::<String>::new(), ["layoffs"]);
        let mut trace = TraceLog::new();

        let text = Editor::new(generator)
            .polish(&plan, "Despite the layoffs, thank you all.", &mut trace)
            .await;

        assert_eq!(text, "Despite the layoffs, thank you.");
        assert!(trace.last().unwrap().message.starts_with("polished"));
    }

    #[tokio::test]
    async fn empty_reply_keeps_the_guarded_text() {
        let generator = Arc::new(ScriptedGenerator::new().reply(Stage::Editor, "   "));
        let mut trace = TraceLog::new();
        let text = Editor::new(generator)
            .polish(&plan(), "Thank you all of you.", &mut trace)
            .await;
        assert_eq!(text, "Thank you all of you.");
        assert!(trace.last().unwrap().message.starts_with("skipped"));
    }
}
