//! Quill pipeline stages and the executor that drives them.
//!
//! This crate provides one module per stage (normalizer, planner, drafter,
//! judge, guardrail, editor, refiner), the fixed instruction text each stage
//! sends, the post-run side-effect dispatcher, and the `PipelineExecutor`
//! that runs a request end to end.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Stages sequence calls between business logic in
//! the [`pipeline`] crate and the port traits (`TextGenerator`, `RunStore`,
//! `MemoryStore`). They never perform I/O directly.
//!
//! ## Failure model
//!
//! Every stage converts its own failures into a documented fallback and
//! records it in the run's trace. Only two stages can end a run early: the
//! drafter always, and the planner when configured as terminal.

pub mod drafter;
pub mod editor;
pub mod executor;
pub mod guardrail;
pub mod judge;
pub mod normalizer;
pub mod planner;
pub mod prompts;
pub mod refiner;
pub mod side_effects;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use drafter::Drafter;
pub use editor::Editor;
pub use executor::{PipelineExecutor, RequestRejected};
pub use guardrail::{must_avoid_violations, Guardrail};
pub use judge::{Judge, DEFAULTED_REASON};
pub use normalizer::Normalizer;
pub use planner::{fallback_plan, PlanInput, Planner};
pub use refiner::Refiner;
pub use side_effects::{CompletedRun, SideEffects};
