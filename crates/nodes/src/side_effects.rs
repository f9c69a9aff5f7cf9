//! Post-run side effects: save the run, then merge inferred traits.
//!
//! Runs once per successful run, after every stage has finished. Both steps
//! are best-effort; their failures land in the trace and never reach the
//! caller or change the run's outcome.

use std::sync::Arc;

use pipeline::{
    infer_traits, CandidatePair, Identity, JudgeVerdict, MemoryStore, Mode, Plan, PresetId, RunId,
    RunRecord, RunStore, Stage, Timestamp, TraceLog, TraitSource,
};
use tracing::{instrument, warn};

/// A successful run, as the dispatcher sees it.
#[derive(Debug, Clone, Copy)]
pub struct CompletedRun<'a> {
    pub run_id: RunId,
    pub started_at: Timestamp,
    pub identity: &'a Identity,
    pub mode: Mode,
    pub brief: &'a str,
    pub final_text: &'a str,
    pub plan: Option<&'a Plan>,
    pub role: Option<&'a str>,
    pub presets: &'a [PresetId],
    pub candidates: Option<&'a CandidatePair>,
    pub verdict: Option<&'a JudgeVerdict>,
}

#[derive(Default, Clone)]
pub struct SideEffects {
    runs: Option<Arc<dyn RunStore>>,
    memory: Option<Arc<dyn MemoryStore>>,
}

impl SideEffects {
    pub fn new(runs: Option<Arc<dyn RunStore>>, memory: Option<Arc<dyn MemoryStore>>) -> Self {
        Self { runs, memory }
    }

    #[must_use]
    pub fn with_run_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.runs = Some(store);
        self
    }

    #[must_use]
    pub fn with_memory_store(mut self, store: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(store);
        self
    }

    #[instrument(skip_all, fields(run_id = %run.run_id, identity = %run.identity))]
    pub async fn dispatch(&self, run: CompletedRun<'_>, trace: &mut TraceLog) {
        self.persist(run, trace).await;
        self.merge_memory(run, trace).await;
    }

    async fn persist(&self, run: CompletedRun<'_>, trace: &mut TraceLog) {
        let Some(store) = &self.runs else {
            trace.record(Stage::Persistence, "no run store configured; run not saved");
            return;
        };
        let record = RunRecord {
            run_id: run.run_id,
            identity: run.identity.clone(),
            mode: run.mode,
            brief: run.brief.to_string(),
            final_text: run.final_text.to_string(),
            candidates: run.candidates.cloned(),
            verdict: run.verdict.cloned(),
            trace: trace.clone(),
            created_at: run.started_at,
        };
        match store.save(&record).await {
            Ok(()) => trace.record(Stage::Persistence, format!("run saved for {}", run.identity)),
            Err(e) => {
                warn!(error = %e, "run save failed");
                trace.record(Stage::Persistence, format!("save failed: {e}"));
            }
        }
    }

    async fn merge_memory(&self, run: CompletedRun<'_>, trace: &mut TraceLog) {
        let Some(memory) = &self.memory else {
            return;
        };
        let delta = infer_traits(TraitSource {
            plan: run.plan,
            role: run.role,
            final_text: run.final_text,
            presets: run.presets,
        });
        if delta.is_empty() {
            trace.record(Stage::Memory, "no new traits");
            return;
        }
        match memory.merge_traits(run.identity, &delta).await {
            Ok(()) => trace.record(
                Stage::Memory,
                format!(
                    "traits merged: {} role(s), {} tone(s), {} domain(s)",
                    delta.roles.len(),
                    delta.tone_preferences.len(),
                    delta.domains.len()
                ),
            ),
            Err(e) => {
                warn!(error = %e, "trait merge failed");
                trace.record(Stage::Memory, format!("trait merge failed: {e}"));
            }
        }
    }
}
