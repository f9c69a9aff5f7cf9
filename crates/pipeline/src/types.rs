//! Shared value types for the Quill pipeline.
//!
//! Each stage boundary has its own validated type: the request a caller
//! submits, the intent the normalizer infers, the plan, the candidate pair,
//! the judge's verdict, the guardrail outcome and the final result. Values are
//! built once and handed forward by reference; nothing downstream mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{RequestError, StageError};
use crate::identifiers::{AnonId, Identity, RunId, UserId};
use crate::mode::Mode;
use crate::trace::TraceLog;

// ---------------------------------------------------------------------------
// Phrase lists
// ---------------------------------------------------------------------------

/// Trims, drops blanks and removes case-insensitive duplicates, keeping the
/// first spelling seen.
pub fn dedup_phrases<I, S>(phrases: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for phrase in phrases {
        let trimmed = phrase.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            out.push(trimmed.to_string());
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Optional structured hints that accompany the free-text brief.
///
/// Explicit hints always take precedence over anything inferred from the brief.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefHints {
    /// Who will hear the speech.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    /// Where, when and why it is delivered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_context: Option<String>,
    /// Desired tone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    /// Target duration or length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Points that must appear.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must_include: Vec<String>,
    /// Points that must not appear.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must_avoid: Vec<String>,
}

impl BriefHints {
    fn normalized(self) -> Self {
        fn clean(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        Self {
            audience: clean(self.audience),
            event_context: clean(self.event_context),
            tone: clean(self.tone),
            duration: clean(self.duration),
            must_include: dedup_phrases(self.must_include),
            must_avoid: dedup_phrases(self.must_avoid),
        }
    }
}

/// A previously delivered final text plus the instruction that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinementContext {
    /// The prior final artifact.
    pub previous_text: String,
    /// The instruction the prior run was given.
    pub previous_instruction: String,
}

/// Unvalidated request fields, as received from the web or CLI layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequestInput {
    /// Free-text brief (or, in refine mode, the new instruction).
    #[serde(default)]
    pub brief: String,
    /// Structured hints.
    #[serde(default)]
    pub hints: BriefHints,
    /// Authenticated caller id.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Anonymous caller id.
    #[serde(default)]
    pub anon_id: Option<String>,
    /// Prior final text, for refinement.
    #[serde(default)]
    pub previous_text: Option<String>,
    /// Prior instruction, for refinement.
    #[serde(default)]
    pub previous_instruction: Option<String>,
}

/// Validated input to a single run. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRequest {
    brief: String,
    hints: BriefHints,
    identity: Option<Identity>,
    refinement: Option<RefinementContext>,
}

impl RunRequest {
    /// Validates `input` against the brief length cap.
    ///
    /// # Errors
    ///
    /// Returns a [`RequestError`] for an empty or over-long brief, for a request
    /// carrying both identities, or for half a refinement context.
    pub fn new(input: RunRequestInput, max_brief_chars: usize) -> Result<Self, RequestError> {
        let brief = input.brief.trim().to_string();
        if brief.is_empty() {
            return Err(RequestError::EmptyBrief);
        }
        let length = brief.chars().count();
        if length > max_brief_chars {
            return Err(RequestError::BriefTooLong {
                length,
                limit: max_brief_chars,
            });
        }

        let user = input.user_id.and_then(UserId::new);
        let anon = input.anon_id.and_then(AnonId::new);
        let identity = match (user, anon) {
            (Some(_), Some(_)) => return Err(RequestError::ConflictingIdentity),
            (Some(u), None) => Some(Identity::User(u)),
            (None, Some(a)) => Some(Identity::Anonymous(a)),
            (None, None) => None,
        };

        let previous_text = input.previous_text.filter(|s| !s.trim().is_empty());
        let previous_instruction = input
            .previous_instruction
            .filter(|s| !s.trim().is_empty());
        let refinement = match (previous_text, previous_instruction) {
            (Some(previous_text), Some(previous_instruction)) => Some(RefinementContext {
                previous_text,
                previous_instruction,
            }),
            (Some(_), None) => {
                return Err(RequestError::PartialRefinement {
                    missing: "previous instruction".into(),
                })
            }
            (None, Some(_)) => {
                return Err(RequestError::PartialRefinement {
                    missing: "previous text".into(),
                })
            }
            (None, None) => None,
        };

        Ok(Self {
            brief,
            hints: input.hints.normalized(),
            identity,
            refinement,
        })
    }

    /// The trimmed brief.
    pub fn brief(&self) -> &str {
        &self.brief
    }

    /// Normalised structured hints.
    pub fn hints(&self) -> &BriefHints {
        &self.hints
    }

    /// The caller, when known.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Refinement context, when the caller is iterating on a prior result.
    pub fn refinement(&self) -> Option<&RefinementContext> {
        self.refinement.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Intent
// ---------------------------------------------------------------------------

/// Structured view of what the brief asks for.
///
/// Produced once per run by the normalizer; degrades to keyword heuristics
/// when the normalizing call is unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedIntent {
    /// Who is speaking (e.g. `"ceo"`, `"manager"`).
    pub role: Option<String>,
    /// Who is listening.
    pub audience: Option<String>,
    /// What the speech is meant to do (e.g. `"thank"`, `"announce"`).
    pub intent: Option<String>,
    /// Artifact format (e.g. `"speech"`, `"personal_statement"`).
    pub format: Option<String>,
    /// Subject domain (e.g. `"startup"`, `"wedding"`).
    pub domain: Option<String>,
    /// Where, when and why.
    pub event_context: Option<String>,
    /// Desired tone.
    pub tone: Option<String>,
    /// Target duration.
    pub duration: Option<String>,
    /// Points that must appear, deduplicated.
    pub must_include: Vec<String>,
    /// Points that must not appear, deduplicated.
    pub must_avoid: Vec<String>,
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// One supporting theme of the speech.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pillar {
    /// Short label.
    pub title: String,
    /// One-to-two sentence explanation.
    pub summary: String,
}

/// Inclusion and exclusion constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    /// Soft-enforced: themes the text should cover.
    #[serde(default, alias = "must_include")]
    pub must_include: Vec<String>,
    /// Strictly enforced: phrases or topics the text must not contain.
    #[serde(default, alias = "must_avoid")]
    pub must_avoid: Vec<String>,
}

impl Constraints {
    /// Builds a deduplicated constraint set.
    pub fn new<I, A>(must_include: I, must_avoid: A) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        Self {
            must_include: dedup_phrases(must_include),
            must_avoid: dedup_phrases(must_avoid),
        }
    }

    /// Union of `self` and `other`, deduplicated, `self`'s entries first.
    pub fn union(&self, other: &Constraints) -> Constraints {
        Constraints::new(
            self.must_include.iter().chain(&other.must_include),
            self.must_avoid.iter().chain(&other.must_avoid),
        )
    }

    /// Returns `true` if there is nothing to enforce.
    pub fn is_empty(&self) -> bool {
        self.must_include.is_empty() && self.must_avoid.is_empty()
    }
}

/// Structured plan; the single source of truth for every later stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// The speech's central idea in one sentence.
    pub core_message: String,
    /// Who they are and what they care about.
    pub audience: String,
    /// What the event or moment is.
    pub event_context: String,
    /// Style to aim for.
    pub tone: String,
    /// Interpreted target length.
    pub duration: String,
    /// Supporting themes in delivery order. May be empty.
    pub pillars: Vec<Pillar>,
    /// The authoritative merged constraint set.
    pub constraints: Constraints,
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

/// Identity of a candidate in drafting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSlot {
    /// The first drafted candidate.
    First,
    /// The second drafted candidate.
    Second,
}

impl CandidateSlot {
    /// 1-based index in drafting order.
    pub fn number(self) -> u8 {
        match self {
            CandidateSlot::First => 1,
            CandidateSlot::Second => 2,
        }
    }

    /// Slot for a 1-based drafting index; `None` outside 1..=2.
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(CandidateSlot::First),
            2 => Some(CandidateSlot::Second),
            _ => None,
        }
    }
}

/// Exactly two non-empty candidate texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePair {
    first: String,
    second: String,
}

impl CandidatePair {
    /// Builds a pair from two drafts, trimming each.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Empty`] naming the first candidate that is empty.
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Result<Self, StageError> {
        let first = first.into().trim().to_string();
        let second = second.into().trim().to_string();
        if first.is_empty() {
            return Err(StageError::Empty("candidate 1 is empty".into()));
        }
        if second.is_empty() {
            return Err(StageError::Empty("candidate 2 is empty".into()));
        }
        Ok(Self { first, second })
    }

    /// Text of the candidate in `slot`.
    pub fn get(&self, slot: CandidateSlot) -> &str {
        match slot {
            CandidateSlot::First => &self.first,
            CandidateSlot::Second => &self.second,
        }
    }

    /// First drafted candidate.
    pub fn first(&self) -> &str {
        &self.first
    }

    /// Second drafted candidate.
    pub fn second(&self) -> &str {
        &self.second
    }
}

// ---------------------------------------------------------------------------
// Judge
// ---------------------------------------------------------------------------

/// Order in which the candidates were shown to the judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationOrder {
    /// Option 1 is the first candidate.
    AsDrafted,
    /// Option 1 is the second candidate.
    Swapped,
}

impl PresentationOrder {
    /// Maps a presented option (1 or 2) back to the candidate it showed.
    pub fn candidate_for_option(self, option: u8) -> Option<CandidateSlot> {
        match (self, option) {
            (PresentationOrder::AsDrafted, 1) | (PresentationOrder::Swapped, 2) => {
                Some(CandidateSlot::First)
            }
            (PresentationOrder::AsDrafted, 2) | (PresentationOrder::Swapped, 1) => {
                Some(CandidateSlot::Second)
            }
            _ => None,
        }
    }

    /// The candidate shown as option 1, then the one shown as option 2.
    pub fn presented(self) -> [CandidateSlot; 2] {
        match self {
            PresentationOrder::AsDrafted => [CandidateSlot::First, CandidateSlot::Second],
            PresentationOrder::Swapped => [CandidateSlot::Second, CandidateSlot::First],
        }
    }
}

/// The judge's selection, already mapped back to drafting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    /// Winning candidate in drafting order.
    pub winner: CandidateSlot,
    /// Option number (1 or 2) the judge picked, in presentation order.
    pub presented_winner: u8,
    /// How the candidates were presented.
    pub order: PresentationOrder,
    /// Full justification text.
    pub reason: String,
    /// `true` when the judge was unavailable or invalid and the default applied.
    pub defaulted: bool,
}

// ---------------------------------------------------------------------------
// Guardrail
// ---------------------------------------------------------------------------

/// Classification of the guardrail pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailStatus {
    /// No material changes.
    Ok,
    /// Targeted changes were applied.
    Edited,
    /// A serious concern remains; requires human review.
    Flagged,
}

impl GuardrailStatus {
    /// Lowercase status name.
    pub fn as_str(self) -> &'static str {
        match self {
            GuardrailStatus::Ok => "ok",
            GuardrailStatus::Edited => "edited",
            GuardrailStatus::Flagged => "flagged",
        }
    }
}

/// Result of enforcing the plan's constraints on the selected candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailOutcome {
    /// Outcome classification.
    pub status: GuardrailStatus,
    /// Resulting text; never empty when the input was not.
    pub text: String,
    /// What changed or what remains a concern. Empty when status is `ok`.
    pub issues: Vec<String>,
    /// `true` when the guardrail call failed and the text passed through unchecked.
    pub skipped: bool,
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// The externally visible value of a run. Built once and never mutated.
///
/// `final_text == None` is the only failure signal; the trace says which stage
/// failed and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    /// Run identifier.
    pub run_id: RunId,
    /// When the run started.
    pub started_at: Timestamp,
    /// Which path the run took.
    pub mode: Mode,
    /// The delivered text, or `None` on terminal failure.
    pub final_text: Option<String>,
    /// The plan the run followed, when planning ran.
    pub plan: Option<Plan>,
    /// Both drafted candidates.
    pub candidates: Option<CandidatePair>,
    /// Which candidate won.
    pub winner: Option<CandidateSlot>,
    /// The judge's verdict.
    pub verdict: Option<JudgeVerdict>,
    /// The guardrail outcome.
    pub guardrail: Option<GuardrailOutcome>,
    /// What happened, in order.
    pub trace: TraceLog,
}

impl PipelineResult {
    /// Returns `true` when the run produced a final text.
    pub fn is_success(&self) -> bool {
        self.final_text.is_some()
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
