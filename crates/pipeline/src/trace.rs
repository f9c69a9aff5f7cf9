//! Per-run trace log.
//!
//! The trace is an append-only, ordered list of `(stage, message)` pairs that
//! explains what a run did. It is for humans debugging a run; nothing in the
//! pipeline ever branches on its contents.

use serde::{Deserialize, Serialize};

/// A point in the run that can emit trace entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Request validation, before any stage runs.
    Input,
    /// Memory profile load / merge.
    Memory,
    /// Generate-vs-refine selection.
    Mode,
    /// Brief normalization.
    Normalizer,
    /// Preset matching.
    Presets,
    /// Structured planning.
    Planner,
    /// Candidate drafting.
    Drafter,
    /// Candidate selection.
    Judge,
    /// Constraint enforcement.
    Guardrail,
    /// Final polish.
    Editor,
    /// Refine-mode edit pass.
    Refiner,
    /// Saving the run.
    Persistence,
}

impl Stage {
    /// The stage name as it appears in the trace.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::Memory => "memory",
            Stage::Mode => "mode",
            Stage::Normalizer => "normalizer",
            Stage::Presets => "presets",
            Stage::Planner => "planner",
            Stage::Drafter => "drafter",
            Stage::Judge => "judge",
            Stage::Guardrail => "guardrail",
            Stage::Editor => "editor",
            Stage::Refiner => "refiner",
            Stage::Persistence => "persistence",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Stage that recorded the entry.
    pub stage: Stage,
    /// Human-readable description.
    pub message: String,
}

/// Ordered, append-only trace for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceLog(Vec<TraceEntry>);

impl TraceLog {
    /// Creates an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry and mirrors it to the structured log.
    pub fn record(&mut self, stage: Stage, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(stage = stage.as_str(), message = %message, "trace");
        self.0.push(TraceEntry { stage, message });
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[TraceEntry] {
        &self.0
    }

    /// The most recent entry.
    pub fn last(&self) -> Option<&TraceEntry> {
        self.0.last()
    }

    /// Number of entries recorded so far.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries recorded by one stage, in order.
    pub fn for_stage(&self, stage: Stage) -> impl Iterator<Item = &TraceEntry> {
        self.0.iter().filter(move |e| e.stage == stage)
    }
}

/// Shortens `text` to at most `max` characters for a trace line, marking the cut.
pub fn snippet(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max).collect();
    cut.push('…');
    cut
}
