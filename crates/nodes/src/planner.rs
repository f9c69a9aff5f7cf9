//! Structured planning.
//!
//! The plan is the single source of truth from drafting onwards, so its
//! constraint set is assembled here: the intent's lists (explicit hints first),
//! whatever the model added, then the organisation-wide constraints.

use std::sync::Arc;

use pipeline::parse::parse_json;
use pipeline::trace::snippet;
use pipeline::{
    BriefHints, Constraints, GenerationRequest, MemoryProfile, NormalizedIntent, Plan,
    PlannerFailurePolicy, PresetId, Stage, StageError, TextGenerator, TraceLog,
};
use serde_json::json;
use tracing::{instrument, warn};

use crate::prompts;

/// Maximum length of the core message in a fallback plan, in characters.
const FALLBACK_CORE_CHARS: usize = 200;

/// Everything the planner is given.
#[derive(Debug, Clone, Copy)]
pub struct PlanInput<'a> {
    pub brief: &'a str,
    pub intent: &'a NormalizedIntent,
    pub presets: &'a [PresetId],
    pub memory: Option<&'a MemoryProfile>,
    pub hints: &'a BriefHints,
}

impl PlanInput<'_> {
    fn intent_constraints(&self) -> Constraints {
        Constraints::new(&self.intent.must_include, &self.intent.must_avoid)
    }
}

pub struct Planner {
    generator: Arc<dyn TextGenerator>,
    policy: PlannerFailurePolicy,
    global_constraints: Constraints,
}

impl Planner {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        policy: PlannerFailurePolicy,
        global_constraints: Constraints,
    ) -> Self {
        Self {
            generator,
            policy,
            global_constraints,
        }
    }

    async fn call(&self, input: PlanInput<'_>) -> Result<Plan, StageError> {
        let payload = json!({
            "brief": input.brief,
            "intent": input.intent,
            "presets": input.presets,
            "memoryHints": input.memory,
            "explicitHints": input.hints,
        })
        .to_string();
        let raw = self
            .generator
            .generate(GenerationRequest::json(Stage::Planner, prompts::PLANNER, payload))
            .await?;
        let plan: Plan = parse_json(&raw)?;
        if plan.core_message.trim().is_empty() {
            return Err(StageError::Malformed("plan has an empty core message".into()));
        }
        Ok(plan)
    }

    /// Produces the plan.
    ///
    /// # Errors
    ///
    /// Only under [`PlannerFailurePolicy::Terminal`]; the default policy
    /// substitutes [`fallback_plan`] and records the degradation.
    #[instrument(skip_all, fields(presets = input.presets.len()))]
    pub async fn plan(
        &self,
        input: PlanInput<'_>,
        trace: &mut TraceLog,
    ) -> Result<Plan, StageError> {
        match self.call(input).await {
            Ok(mut plan) => {
                plan.constraints = input
                    .intent_constraints()
                    .union(&plan.constraints)
                    .union(&self.global_constraints);
                trace.record(
                    Stage::Planner,
                    format!(
                        "plan ready: {} pillar(s), {} must-avoid; core message: {}",
                        plan.pillars.len(),
                        plan.constraints.must_avoid.len(),
                        snippet(&plan.core_message, 120)
                    ),
                );
                Ok(plan)
            }
            Err(e) => match self.policy {
                PlannerFailurePolicy::Fallback => {
                    warn!(error = %e, "planner degraded to fallback plan");
                    trace.record(
                        Stage::Planner,
                        format!("degraded planning ({e}); using a minimal plan from the brief"),
                    );
                    Ok(fallback_plan(input, &self.global_constraints))
                }
                PlannerFailurePolicy::Terminal => {
                    trace.record(Stage::Planner, format!("planning failed: {e}"));
                    Err(e)
                }
            },
        }
    }
}

/// Minimal plan built from the brief and the intent alone. Pillars are empty.
pub fn fallback_plan(input: PlanInput<'_>, global: &Constraints) -> Plan {
    let intent = input.intent;
    let or = |v: &Option<String>, default: &str| v.clone().unwrap_or_else(|| default.to_string());
    Plan {
        core_message: snippet(input.brief, FALLBACK_CORE_CHARS),
        audience: or(&intent.audience, "general audience"),
        event_context: or(&intent.event_context, "unspecified occasion"),
        tone: or(&intent.tone, "clear and sincere"),
        duration: or(&intent.duration, "about 3 minutes"),
        pillars: Vec::new(),
        constraints: input.intent_constraints().union(global),
    }
}
