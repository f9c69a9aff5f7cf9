//! Per-identity trait profile.
//!
//! The profile is owned by the memory collaborator; the pipeline only reads it
//! as advisory planner input and proposes a [`TraitDelta`] after each
//! successful run. Inference and merging are pure so the store only has to
//! load, call [`MemoryProfile::merge`], and write back.

use serde::{Deserialize, Serialize};

use crate::presets::PresetId;
use crate::types::{dedup_phrases, Plan};

/// Preferred speech length, bucketed by word count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthPreference {
    /// Under 200 words.
    Short,
    /// 200 to 699 words.
    Medium,
    /// 700 words or more.
    Long,
}

impl LengthPreference {
    /// Buckets a text by its word count.
    pub fn from_word_count(words: usize) -> Self {
        match words {
            0..=199 => LengthPreference::Short,
            200..=699 => LengthPreference::Medium,
            _ => LengthPreference::Long,
        }
    }
}

/// Accumulated traits for one identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemoryProfile {
    /// Speaker roles seen so far.
    pub roles: Vec<String>,
    /// Tones the caller tends to ask for.
    pub tone_preferences: Vec<String>,
    /// Most recent length bucket.
    pub length_preference: Option<LengthPreference>,
    /// Subject domains seen so far.
    pub domains: Vec<String>,
    /// Presets that matched past briefs.
    pub presets_used: Vec<String>,
    /// Number of runs merged into this profile.
    pub runs_count: u64,
}

/// Traits inferred from one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TraitDelta {
    /// Inferred speaker roles.
    pub roles: Vec<String>,
    /// Inferred tones.
    pub tone_preferences: Vec<String>,
    /// Length bucket of the final text.
    pub length_preference: Option<LengthPreference>,
    /// Inferred domains.
    pub domains: Vec<String>,
    /// Matched presets.
    pub presets_used: Vec<String>,
}

impl TraitDelta {
    /// Returns `true` if nothing was inferred.
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
            && self.tone_preferences.is_empty()
            && self.length_preference.is_none()
            && self.domains.is_empty()
            && self.presets_used.is_empty()
    }
}

fn normalized_union(existing: &[String], incoming: &[String]) -> Vec<String> {
    dedup_phrases(
        existing
            .iter()
            .chain(incoming)
            .map(|v| v.trim().to_lowercase()),
    )
}

impl MemoryProfile {
    /// Folds `delta` into the profile and counts the run.
    pub fn merge(&self, delta: &TraitDelta) -> MemoryProfile {
        MemoryProfile {
            roles: normalized_union(&self.roles, &delta.roles),
            tone_preferences: normalized_union(&self.tone_preferences, &delta.tone_preferences),
            length_preference: delta.length_preference.or(self.length_preference),
            domains: normalized_union(&self.domains, &delta.domains),
            presets_used: normalized_union(&self.presets_used, &delta.presets_used),
            runs_count: self.runs_count + 1,
        }
    }
}

/// Everything trait inference looks at.
#[derive(Debug, Clone, Copy)]
pub struct TraitSource<'a> {
    /// The plan, absent for refine runs.
    pub plan: Option<&'a Plan>,
    /// Speaker role inferred by the normalizer.
    pub role: Option<&'a str>,
    /// The delivered text.
    pub final_text: &'a str,
    /// Presets that matched.
    pub presets: &'a [PresetId],
}

const TONE_KEYWORDS: &[(&[&str], &str)] = &[
    (&["warm"], "warm"),
    (&["formal", "serious"], "formal"),
    (&["clear", "direct"], "clear"),
    (&["inspiring", "motivational"], "inspiring"),
    (&["playful", "fun"], "playful"),
];

const DOMAIN_KEYWORDS: &[(&[&str], &str)] = &[
    (&["fintech", "financial services"], "fintech"),
    (&["climate", "sustainability"], "sustainability"),
    (&["university", "ucas"], "education"),
    (&["startup", "scale-up"], "startup"),
];

fn role_tag(role: &str) -> Option<String> {
    let r = role.trim().to_lowercase();
    if r.is_empty() {
        return None;
    }
    let tag = if r.contains("ceo") || r.contains("chief executive") {
        "executive".to_string()
    } else if r.contains("founder") {
        "founder".to_string()
    } else if r.contains("student") {
        "student".to_string()
    } else if r.contains("manager") {
        "manager".to_string()
    } else {
        r
    };
    Some(tag)
}

/// Maps a completed run to a small set of trait tags. Deterministic.
pub fn infer_traits(source: TraitSource<'_>) -> TraitDelta {
    let mut delta = TraitDelta {
        presets_used: source.presets.iter().map(|p| p.as_str().to_string()).collect(),
        ..Default::default()
    };

    if let Some(tag) = source.role.and_then(role_tag) {
        delta.roles.push(tag);
    }

    if let Some(plan) = source.plan {
        let tone = plan.tone.to_lowercase();
        for (needles, tag) in TONE_KEYWORDS {
            if needles.iter().any(|n| tone.contains(n)) {
                delta.tone_preferences.push((*tag).to_string());
            }
        }
    }

    let words = source.final_text.split_whitespace().count();
    if words > 0 {
        delta.length_preference = Some(LengthPreference::from_word_count(words));
    }

    let mut haystack = source.final_text.to_lowercase();
    if let Some(plan) = source.plan {
        if let Ok(json) = serde_json::to_string(plan) {
            haystack.push(' ');
            haystack.push_str(&json.to_lowercase());
        }
    }
    for (needles, tag) in DOMAIN_KEYWORDS {
        if needles.iter().any(|n| haystack.contains(n)) {
            delta.domains.push((*tag).to_string());
        }
    }

    delta
}
