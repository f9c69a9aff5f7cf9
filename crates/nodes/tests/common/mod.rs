//! Test doubles shared by the executor integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nodes::PipelineExecutor;
use pipeline::{
    CandidateSlot, GenerationRequest, Identity, JudgeFeedback, MemoryProfile, MemoryStore, RunId,
    RunRecord, RunStore, RunnerConfig, Stage, StoreError, Timestamp, TraitDelta,
};
use serde_json::Value;

pub use nodes::testing::ScriptedGenerator;

/// Reads the `text` field of a stage payload.
pub fn payload_text(request: &GenerationRequest) -> String {
    serde_json::from_str::<Value>(&request.payload)
        .ok()
        .and_then(|v| v["text"].as_str().map(str::to_string))
        .unwrap_or_default()
}

pub const INTENT_JSON: &str = r#"{"role": "manager", "audience": "50 engineers", "intent": "thank",
 "format": "speech", "tone": "warm", "duration": "under 3 minutes"}"#;

pub const PLAN_JSON: &str = r#"{"coreMessage": "This year worked because we trusted each other.",
 "audience": "Fifty engineers", "eventContext": "Year-end team gathering", "tone": "Warm",
 "duration": "Under 3 minutes",
 "pillars": [{"title": "The launch", "summary": "What we shipped together."},
             {"title": "Next year", "summary": "Where we go from here."}],
 "constraints": {"mustInclude": [], "mustAvoid": []}}"#;

pub const DRAFT_A: &str = "Friends, a year ago we set out to ship the platform. We did.";
pub const DRAFT_B: &str = "Three things made this year: trust, focus, and each other.";

/// A generator under which every stage succeeds. The guardrail and editor
/// echo the text they are given.
pub fn happy_generator(judge_reply: &str) -> ScriptedGenerator {
    ScriptedGenerator::new()
        .reply(Stage::Normalizer, INTENT_JSON)
        .reply(Stage::Planner, PLAN_JSON)
        .reply(Stage::Drafter, DRAFT_A)
        .reply(Stage::Drafter, DRAFT_B)
        .reply(Stage::Judge, judge_reply)
        .handle(Stage::Guardrail, |req| {
            let reply = serde_json::json!({ "status": "ok", "resultingText": payload_text(req) });
            Ok(reply.to_string())
        })
        .handle(Stage::Editor, |req| Ok(payload_text(req)))
}

pub fn seeded_config(seed: u64) -> RunnerConfig {
    RunnerConfig {
        judge_seed: Some(seed),
        ..Default::default()
    }
}

pub fn executor(generator: Arc<ScriptedGenerator>, config: RunnerConfig) -> PipelineExecutor {
    PipelineExecutor::new(Arc::new(config), generator)
}

/// In-memory run and memory store that can be told to fail.
#[derive(Default)]
pub struct RecordingStore {
    pub saved: Mutex<Vec<RunRecord>>,
    pub profiles: Mutex<HashMap<String, MemoryProfile>>,
    pub feedback: Mutex<Vec<JudgeFeedback>>,
    pub fail_saves: bool,
    pub fail_loads: bool,
}

#[async_trait]
impl RunStore for RecordingStore {
    async fn save(&self, record: &RunRecord) -> Result<(), StoreError> {
        if self.fail_saves {
            return Err(StoreError::Backend("database is locked".into()));
        }
        self.saved.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn recent(
        &self,
        identity: &Identity,
        limit: usize,
    ) -> Result<Vec<RunRecord>, StoreError> {
        let saved = self.saved.lock().unwrap();
        Ok(saved
            .iter()
            .rev()
            .filter(|r| &r.identity == identity)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn record_feedback(
        &self,
        run_id: RunId,
        user_choice: CandidateSlot,
    ) -> Result<JudgeFeedback, StoreError> {
        let saved = self.saved.lock().unwrap();
        let record = saved
            .iter()
            .find(|r| r.run_id == run_id)
            .ok_or(StoreError::RunNotFound(run_id))?;
        let feedback = JudgeFeedback::for_run(record, user_choice, Timestamp::now())?;
        self.feedback.lock().unwrap().push(feedback.clone());
        Ok(feedback)
    }
}

#[async_trait]
impl MemoryStore for RecordingStore {
    async fn load_traits(&self, identity: &Identity) -> Result<Option<MemoryProfile>, StoreError> {
        if self.fail_loads {
            return Err(StoreError::Backend("connection refused".into()));
        }
        Ok(self.profiles.lock().unwrap().get(&identity.to_string()).cloned())
    }

    async fn merge_traits(
        &self,
        identity: &Identity,
        delta: &TraitDelta,
    ) -> Result<(), StoreError> {
        let mut profiles = self.profiles.lock().unwrap();
        let current = profiles.remove(&identity.to_string()).unwrap_or_default();
        profiles.insert(identity.to_string(), current.merge(delta));
        Ok(())
    }
}
