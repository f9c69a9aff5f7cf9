//! Core domain for Quill, a multi-stage speechwriting pipeline.
//!
//! This crate contains every value that crosses a stage boundary, the pure
//! logic that needs no generator (preset matching, keyword heuristics, output
//! parsing, mode selection, trait inference), and the port traits the
//! infrastructure crates implement.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | `UserId`, `AnonId`, `Identity`, `RunId` |
//! | [`types`] | Request, intent, plan, candidates, verdict, guardrail outcome, result |
//! | [`trace`] | `Stage`, `TraceEntry`, `TraceLog` |
//! | [`errors`] | Request, port, stage and configuration errors; `RetryPolicy` |
//! | [`config`] | `RunnerConfig` and failure policies |
//! | [`mode`] | Generate-vs-refine selection |
//! | [`presets`] | Preset rule table and matcher |
//! | [`heuristics`] | Keyword fallback for brief normalization |
//! | [`parse`] | Wrapping removal and JSON extraction for raw output |
//! | [`memory`] | `MemoryProfile`, `TraitDelta`, trait inference |
//! | [`ports`] | `TextGenerator`, `RunStore`, `MemoryStore` |

pub mod config;
pub mod errors;
pub mod heuristics;
pub mod identifiers;
pub mod memory;
pub mod mode;
pub mod parse;
pub mod ports;
pub mod presets;
pub mod trace;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use config::{GuardrailFailurePolicy, PlannerFailurePolicy, RunnerConfig};
pub use errors::{GenerationError, QuillError, RequestError, RetryPolicy, StageError, StoreError};
pub use identifiers::{AnonId, Identity, RunId, UserId};
pub use memory::{infer_traits, LengthPreference, MemoryProfile, TraitDelta, TraitSource};
pub use mode::{select_mode, Mode, DEFAULT_REFINE_TRIGGERS};
pub use ports::{
    GenerationRequest, JudgeFeedback, MemoryStore, ResponseFormat, RunRecord, RunStore,
    TextGenerator,
};
pub use presets::{match_presets, PresetId};
pub use trace::{Stage, TraceEntry, TraceLog};
pub use types::{
    BriefHints, CandidatePair, CandidateSlot, Constraints, GuardrailOutcome, GuardrailStatus,
    JudgeVerdict, NormalizedIntent, Pillar, PipelineResult, Plan, PresentationOrder,
    RefinementContext, RunRequest, RunRequestInput, Timestamp,
};
