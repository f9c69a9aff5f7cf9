//! Port traits for the pipeline's external collaborators.
//!
//! Infrastructure crates implement these; the executor only ever sees the
//! traits. All methods are async and every failure is an ordinary `Err` value
//! the calling stage converts into its own fallback.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{GenerationError, StoreError};
use crate::identifiers::{Identity, RunId};
use crate::memory::{MemoryProfile, TraitDelta};
use crate::mode::Mode;
use crate::trace::{Stage, TraceLog};
use crate::types::{CandidatePair, CandidateSlot, JudgeVerdict, Timestamp};

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Shape the stage expects the reply in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Plain prose.
    Text,
    /// A single JSON object.
    Json,
}

/// One logical request to the generative capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// The stage issuing the request (for routing, logging and test scripting).
    pub stage: Stage,
    /// Fixed role/behaviour instruction for the stage.
    pub instruction: String,
    /// Run-specific payload: free text or a serialised object.
    pub payload: String,
    /// Expected reply shape.
    pub format: ResponseFormat,
}

impl GenerationRequest {
    /// Builds a request expecting prose.
    pub fn text(stage: Stage, instruction: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            stage,
            instruction: instruction.into(),
            payload: payload.into(),
            format: ResponseFormat::Text,
        }
    }

    /// Builds a request expecting one JSON object.
    pub fn json(stage: Stage, instruction: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            stage,
            instruction: instruction.into(),
            payload: payload.into(),
            format: ResponseFormat::Json,
        }
    }
}

/// The opaque text-generation capability.
///
/// Implementations return the raw reply text; they do no validation beyond
/// transport-level success. Timeouts and retries, if any, belong here.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Sends one request and returns the reply text.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// What is saved for one completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    /// Run identifier.
    pub run_id: RunId,
    /// Caller the run belongs to.
    pub identity: Identity,
    /// Which path the run took.
    pub mode: Mode,
    /// The brief (or refine instruction) as submitted.
    pub brief: String,
    /// Delivered text.
    pub final_text: String,
    /// Both candidates, for generate runs.
    pub candidates: Option<CandidatePair>,
    /// Judge verdict, for generate runs.
    pub verdict: Option<JudgeVerdict>,
    /// Trace at the time of saving.
    pub trace: TraceLog,
    /// When the run started.
    pub created_at: Timestamp,
}

/// A caller's pick between the two candidates of a saved run, set against
/// the judge's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeFeedback {
    pub run_id: RunId,
    /// The judge's winner, in drafting order.
    pub judge_winner: CandidateSlot,
    /// The caller's pick, in drafting order.
    pub user_choice: CandidateSlot,
    pub agreement: bool,
    /// The judge's winner was the fallback default, not a real verdict.
    pub judge_defaulted: bool,
    pub recorded_at: Timestamp,
}

impl JudgeFeedback {
    /// Compares `user_choice` with the verdict stored on `record`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoVerdict`] when the run was never judged.
    pub fn for_run(
        record: &RunRecord,
        user_choice: CandidateSlot,
        recorded_at: Timestamp,
    ) -> Result<Self, StoreError> {
        let verdict = record
            .verdict
            .as_ref()
            .ok_or(StoreError::NoVerdict(record.run_id))?;
        Ok(Self {
            run_id: record.run_id,
            judge_winner: verdict.winner,
            user_choice,
            agreement: verdict.winner == user_choice,
            judge_defaulted: verdict.defaulted,
            recorded_at,
        })
    }
}

/// Best-effort storage of completed runs.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Saves a run.
    async fn save(&self, record: &RunRecord) -> Result<(), StoreError>;

    /// Most recent runs for `identity`, newest first.
    async fn recent(&self, identity: &Identity, limit: usize) -> Result<Vec<RunRecord>, StoreError>;

    /// Records which candidate the caller preferred for a saved, judged run.
    ///
    /// Fails with [`StoreError::RunNotFound`] or [`StoreError::NoVerdict`]
    /// when there is no verdict to compare against.
    async fn record_feedback(
        &self,
        run_id: RunId,
        user_choice: CandidateSlot,
    ) -> Result<JudgeFeedback, StoreError>;
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Per-identity trait profile storage.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Loads the profile, or `None` if the identity has none yet.
    async fn load_traits(&self, identity: &Identity) -> Result<Option<MemoryProfile>, StoreError>;

    /// Merges `delta` into the identity's profile, creating it if needed.
    async fn merge_traits(&self, identity: &Identity, delta: &TraitDelta) -> Result<(), StoreError>;
}
