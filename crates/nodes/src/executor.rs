//! `PipelineExecutor`: drives one run from request to [`PipelineResult`].
//!
//! Stages run strictly in sequence (the drafter's two calls are the only
//! concurrency). Every stage owns its fallback; the executor only stops early
//! when the planner (under the terminal policy) or the drafter returns an
//! error. Side effects run after the last stage, and the result is assembled
//! once at the end.

use std::sync::Arc;

use pipeline::{
    match_presets, select_mode, CandidatePair, GuardrailOutcome, Identity, JudgeVerdict,
    MemoryProfile, MemoryStore, Mode, PipelineResult, Plan, PresentationOrder, PresetId,
    RefinementContext, RequestError, RunId, RunRequest, RunRequestInput, RunStore, RunnerConfig,
    Stage, TextGenerator, Timestamp, TraceLog,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{info, instrument};

use crate::drafter::Drafter;
use crate::editor::Editor;
use crate::guardrail::Guardrail;
use crate::judge::Judge;
use crate::normalizer::Normalizer;
use crate::planner::{PlanInput, Planner};
use crate::refiner::Refiner;
use crate::side_effects::{CompletedRun, SideEffects};

/// A request refused before any stage ran.
///
/// The trace holds exactly one [`Stage::Input`] entry describing the refusal.
#[derive(Debug, Error)]
#[error("request rejected: {error}")]
pub struct RequestRejected {
    pub error: RequestError,
    pub trace: TraceLog,
}

/// What the stages produced, before side effects and result assembly.
struct Outcome {
    mode: Mode,
    final_text: Option<String>,
    plan: Option<Plan>,
    candidates: Option<CandidatePair>,
    verdict: Option<JudgeVerdict>,
    guardrail: Option<GuardrailOutcome>,
    role: Option<String>,
    presets: Vec<PresetId>,
}

impl Outcome {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            final_text: None,
            plan: None,
            candidates: None,
            verdict: None,
            guardrail: None,
            role: None,
            presets: Vec::new(),
        }
    }
}

pub struct PipelineExecutor {
    config: Arc<RunnerConfig>,
    normalizer: Normalizer,
    planner: Planner,
    drafter: Drafter,
    judge: Judge,
    guardrail: Guardrail,
    editor: Editor,
    refiner: Refiner,
    memory: Option<Arc<dyn MemoryStore>>,
    side_effects: SideEffects,
}

impl PipelineExecutor {
    /// Builds an executor whose every stage calls `generator`.
    pub fn new(config: Arc<RunnerConfig>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            normalizer: Normalizer::new(generator.clone()),
            planner: Planner::new(
                generator.clone(),
                config.planner_failure,
                config.global_constraints.clone(),
            ),
            drafter: Drafter::new(generator.clone()),
            judge: Judge::new(generator.clone()),
            guardrail: Guardrail::new(generator.clone(), config.guardrail_failure),
            editor: Editor::new(generator.clone()),
            refiner: Refiner::new(generator),
            memory: None,
            side_effects: SideEffects::default(),
            config,
        }
    }

    /// Saves every successful run with an identity to `store`.
    #[must_use]
    pub fn with_run_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.side_effects = self.side_effects.with_run_store(store);
        self
    }

    /// Reads planner hints from, and merges inferred traits into, `store`.
    #[must_use]
    pub fn with_memory_store(mut self, store: Arc<dyn MemoryStore>) -> Self {
        self.side_effects = self.side_effects.with_memory_store(store.clone());
        self.memory = Some(store);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Validates `input` and runs it.
    ///
    /// # Errors
    ///
    /// [`RequestRejected`] when the input fails validation; no stage is called.
    pub async fn submit(&self, input: RunRequestInput) -> Result<PipelineResult, RequestRejected> {
        match RunRequest::new(input, self.config.max_brief_chars) {
            Ok(request) => Ok(self.run(&request).await),
            Err(error) => {
                let mut trace = TraceLog::new();
                trace.record(Stage::Input, format!("rejected: {error}"));
                Err(RequestRejected { error, trace })
            }
        }
    }

    /// Runs a validated request to completion. `final_text == None` is the
    /// only failure signal.
    pub async fn run(&self, request: &RunRequest) -> PipelineResult {
        self.execute(RunId::new_random(), request).await
    }

    #[instrument(skip_all, fields(run_id = %run_id))]
    async fn execute(&self, run_id: RunId, request: &RunRequest) -> PipelineResult {
        let started_at = Timestamp::now();
        let mut trace = TraceLog::new();
        trace.record(
            Stage::Input,
            format!(
                "brief accepted ({} chars, caller {})",
                request.brief().chars().count(),
                request
                    .identity()
                    .map_or_else(|| "unidentified".to_string(), Identity::to_string)
            ),
        );

        let refinement = request.refinement();
        let mode = select_mode(
            refinement.map(|r| r.previous_text.as_str()),
            request.brief(),
            &self.config.refine_triggers,
        );
        trace.record(
            Stage::Mode,
            match (mode, refinement) {
                (Mode::Refine, _) => "refine: editing the previous text",
                (Mode::Generate, Some(_)) => {
                    "generate: start-over phrase found, previous text ignored"
                }
                (Mode::Generate, None) => "generate: no previous text",
            },
        );

        let outcome = match (mode, refinement) {
            (Mode::Refine, Some(context)) => self.refine(context, request, &mut trace).await,
            _ => self.generate(run_id, request, &mut trace).await,
        };

        if let Some(final_text) = outcome.final_text.as_deref() {
            match request.identity() {
                Some(identity) => {
                    let run = CompletedRun {
                        run_id,
                        started_at,
                        identity,
                        mode: outcome.mode,
                        brief: request.brief(),
                        final_text,
                        plan: outcome.plan.as_ref(),
                        role: outcome.role.as_deref(),
                        presets: &outcome.presets,
                        candidates: outcome.candidates.as_ref(),
                        verdict: outcome.verdict.as_ref(),
                    };
                    self.side_effects.dispatch(run, &mut trace).await;
                }
                None => trace.record(Stage::Persistence, "no caller identity; run not saved"),
            }
        }

        info!(
            mode = outcome.mode.as_str(),
            success = outcome.final_text.is_some(),
            trace_entries = trace.len(),
            "run finished"
        );

        PipelineResult {
            run_id,
            started_at,
            mode: outcome.mode,
            winner: outcome.verdict.as_ref().map(|v| v.winner),
            final_text: outcome.final_text,
            plan: outcome.plan,
            candidates: outcome.candidates,
            verdict: outcome.verdict,
            guardrail: outcome.guardrail,
            trace,
        }
    }

    async fn refine(
        &self,
        context: &RefinementContext,
        request: &RunRequest,
        trace: &mut TraceLog,
    ) -> Outcome {
        let text = self.refiner.refine(context, request.brief(), trace).await;
        Outcome {
            final_text: Some(text),
            ..Outcome::new(Mode::Refine)
        }
    }

    async fn generate(
        &self,
        run_id: RunId,
        request: &RunRequest,
        trace: &mut TraceLog,
    ) -> Outcome {
        let mut outcome = Outcome::new(Mode::Generate);

        let memory = self.load_memory(request.identity(), trace).await;

        let intent = self
            .normalizer
            .normalize(request.brief(), request.hints(), trace)
            .await;

        let presets = match_presets(&intent);
        trace.record(
            Stage::Presets,
            if presets.is_empty() {
                "no preset matched".to_string()
            } else {
                let names: Vec<&str> = presets.iter().map(|p| p.as_str()).collect();
                format!("matched {}", names.join(", "))
            },
        );
        outcome.role = intent.role.clone();
        outcome.presets = presets;

        let input = PlanInput {
            brief: request.brief(),
            intent: &intent,
            presets: &outcome.presets,
            memory: memory.as_ref(),
            hints: request.hints(),
        };
        let Ok(plan) = self.planner.plan(input, trace).await else {
            return outcome;
        };

        let pair = match self.drafter.draft(&plan, trace).await {
            Ok(pair) => pair,
            Err(_) => {
                outcome.plan = Some(plan);
                return outcome;
            }
        };

        let order = self.draw_order(run_id);
        let verdict = self.judge.judge(&plan, &pair, order, trace).await;

        let guarded = self
            .guardrail
            .enforce(&plan.constraints, pair.get(verdict.winner), trace)
            .await;

        let final_text = self.editor.polish(&plan, &guarded.text, trace).await;

        Outcome {
            final_text: Some(final_text),
            plan: Some(plan),
            candidates: Some(pair),
            verdict: Some(verdict),
            guardrail: Some(guarded),
            ..outcome
        }
    }

    async fn load_memory(
        &self,
        identity: Option<&Identity>,
        trace: &mut TraceLog,
    ) -> Option<MemoryProfile> {
        let (Some(identity), Some(store)) = (identity, &self.memory) else {
            trace.record(Stage::Memory, "skipped: no identity or no memory store");
            return None;
        };
        match store.load_traits(identity).await {
            Ok(Some(profile)) => {
                trace.record(
                    Stage::Memory,
                    format!("profile loaded ({} prior runs)", profile.runs_count),
                );
                Some(profile)
            }
            Ok(None) => {
                trace.record(Stage::Memory, "no stored profile");
                None
            }
            Err(e) => {
                trace.record(
                    Stage::Memory,
                    format!("profile load failed ({e}); continuing without it"),
                );
                None
            }
        }
    }

    /// Presentation order for one run. Each run draws from its own generator:
    /// seeded from `judge_seed` mixed with the run id when a seed is set, from
    /// the thread-local generator otherwise.
    fn draw_order(&self, run_id: RunId) -> PresentationOrder {
        let swapped = match self.config.judge_seed {
            Some(seed) => {
                let id = run_id.as_uuid().as_u128();
                let mixed = seed ^ (id as u64) ^ ((id >> 64) as u64);
                StdRng::seed_from_u64(mixed).gen_bool(0.5)
            }
            None => rand::thread_rng().gen_bool(0.5),
        };
        if swapped {
            PresentationOrder::Swapped
        } else {
            PresentationOrder::AsDrafted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGenerator;
    use pipeline::GenerationError;

    fn executor(generator: ScriptedGenerator) -> PipelineExecutor {
        let config = RunnerConfig {
            judge_seed: Some(7),
            ..Default::default()
        };
        PipelineExecutor::new(Arc::new(config), Arc::new(generator))
    }

    fn input(brief: &str) -> RunRequestInput {
        RunRequestInput {
            brief: brief.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn rejection_calls_no_stage() {
        let generator = Arc::new(ScriptedGenerator::new());
        let executor = PipelineExecutor::new(Arc::new(RunnerConfig::default()), generator.clone());

        let rejected = executor.submit(input("   ")).await.unwrap_err();

        assert_eq!(rejected.error, RequestError::EmptyBrief);
        assert_eq!(rejected.trace.len(), 1);
        assert_eq!(rejected.trace.entries()[0].stage, Stage::Input);
        assert_eq!(generator.calls(), 0);
    }

    #[test]
    fn seeded_order_depends_only_on_the_seed_and_the_run() {
        let a = executor(ScriptedGenerator::new());
        let b = executor(ScriptedGenerator::new());
        let runs: Vec<RunId> = (0..32).map(|_| RunId::new_random()).collect();

        let orders_a: Vec<_> = runs.iter().map(|id| a.draw_order(*id)).collect();
        let orders_b: Vec<_> = runs.iter().rev().map(|id| b.draw_order(*id)).collect();

        assert_eq!(orders_a, orders_b.into_iter().rev().collect::<Vec<_>>());
        assert!(orders_a.contains(&PresentationOrder::Swapped));
        assert!(orders_a.contains(&PresentationOrder::AsDrafted));
    }

    #[tokio::test]
    async fn terminal_planner_stops_before_drafting() {
        let generator = Arc::new(
            ScriptedGenerator::new()
                .fail(Stage::Normalizer, GenerationError::EmptyResponse)
                .fail(Stage::Planner, GenerationError::EmptyResponse),
        );
        let config = RunnerConfig {
            planner_failure: pipeline::PlannerFailurePolicy::Terminal,
            ..Default::default()
        };
        let executor = PipelineExecutor::new(Arc::new(config), generator.clone());

        let result = executor.submit(input("Toast for the retiring CFO")).await.unwrap();

        assert_eq!(result.final_text, None);
        assert_eq!(result.trace.last().unwrap().stage, Stage::Planner);
        assert!(generator.requests().iter().all(|r| r.stage != Stage::Drafter));
    }

    #[tokio::test]
    async fn refine_runs_a_single_call() {
        let generator = Arc::new(ScriptedGenerator::new().reply(Stage::Refiner, "Shorter speech."));
        let executor = PipelineExecutor::new(Arc::new(RunnerConfig::default()), generator.clone());
        let request = RunRequestInput {
            previous_text: Some("Long speech.".into()),
            previous_instruction: Some("Thank the team".into()),
            ..input("Make it shorter")
        };

        let result = executor.submit(request).await.unwrap();

        assert_eq!(result.mode, Mode::Refine);
        assert_eq!(result.final_text.as_deref(), Some("Shorter speech."));
        assert!(result.candidates.is_none());
        assert_eq!(generator.calls(), 1);
    }
}
