//! Preset matching.
//!
//! Soft-classifies a [`NormalizedIntent`] against a small rule table. The
//! result only biases the planner; an empty match is normal and never blocks
//! generation.

use serde::{Deserialize, Serialize};

use crate::types::NormalizedIntent;

/// Named speech archetypes the planner can lean on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetId {
    /// Leadership talk to a whole organisation.
    CorporateLeadershipTalk,
    /// Company or team all-hands update.
    AllHandsUpdate,
    /// Briefing to a board.
    BoardBriefing,
    /// Update for investors.
    InvestorUpdate,
    /// University application statement.
    StudentPersonalStatement,
    /// Wedding speech or toast.
    WeddingSpeech,
    /// Public announcement.
    PressAnnouncement,
    /// Funding pitch.
    FundraisingPitch,
    /// Explaining a policy.
    PolicyExplainer,
}

impl PresetId {
    /// Snake-case identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            PresetId::CorporateLeadershipTalk => "corporate_leadership_talk",
            PresetId::AllHandsUpdate => "all_hands_update",
            PresetId::BoardBriefing => "board_briefing",
            PresetId::InvestorUpdate => "investor_update",
            PresetId::StudentPersonalStatement => "student_personal_statement",
            PresetId::WeddingSpeech => "wedding_speech",
            PresetId::PressAnnouncement => "press_announcement",
            PresetId::FundraisingPitch => "fundraising_pitch",
            PresetId::PolicyExplainer => "policy_explainer",
        }
    }
}

impl std::fmt::Display for PresetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribute values a preset responds to. An empty list never matches.
struct PresetRule {
    id: PresetId,
    roles: &'static [&'static str],
    audiences: &'static [&'static str],
    intents: &'static [&'static str],
    formats: &'static [&'static str],
    domains: &'static [&'static str],
}

// Order matters: ties keep this order.
const RULES: &[PresetRule] = &[
    PresetRule {
        id: PresetId::CorporateLeadershipTalk,
        roles: &["ceo", "founder", "chief executive"],
        audiences: &["all-staff", "employees", "team"],
        intents: &["motivate", "thank", "reassure", "announce_change"],
        formats: &["speech", "talk", "remarks"],
        domains: &["corporate", "startup"],
    },
    PresetRule {
        id: PresetId::AllHandsUpdate,
        roles: &[],
        audiences: &["all-staff", "employees", "team"],
        intents: &["update", "motivate", "reassure"],
        formats: &["speech", "talk", "remarks"],
        domains: &[],
    },
    PresetRule {
        id: PresetId::BoardBriefing,
        roles: &[],
        audiences: &["board"],
        intents: &["explain", "defend", "report"],
        formats: &["speech", "talk", "memo", "briefing"],
        domains: &[],
    },
    PresetRule {
        id: PresetId::InvestorUpdate,
        roles: &[],
        audiences: &["investors"],
        intents: &["update", "pitch", "reassure"],
        formats: &["speech", "email", "deck"],
        domains: &[],
    },
    PresetRule {
        id: PresetId::StudentPersonalStatement,
        roles: &[],
        audiences: &[],
        intents: &["apply"],
        formats: &["personal_statement"],
        domains: &["education"],
    },
    PresetRule {
        id: PresetId::WeddingSpeech,
        roles: &[],
        audiences: &[],
        intents: &[],
        formats: &["speech", "talk"],
        domains: &["wedding"],
    },
    PresetRule {
        id: PresetId::PressAnnouncement,
        roles: &[],
        audiences: &[],
        intents: &["announce_change", "announce"],
        formats: &["press_release", "statement"],
        domains: &[],
    },
    PresetRule {
        id: PresetId::FundraisingPitch,
        roles: &[],
        audiences: &[],
        intents: &["pitch", "fundraise"],
        formats: &["speech", "talk", "deck"],
        domains: &[],
    },
    PresetRule {
        id: PresetId::PolicyExplainer,
        roles: &[],
        audiences: &[],
        intents: &["explain", "inform"],
        formats: &["speech", "memo"],
        domains: &["public_sector", "politics"],
    },
];

const MIN_SCORE: u32 = 2;
const MAX_MATCHES: usize = 3;

fn hits(value: &Option<String>, needles: &[&str]) -> bool {
    match value {
        Some(v) if !v.trim().is_empty() => {
            let v = v.to_lowercase();
            needles.iter().any(|n| v.contains(n))
        }
        _ => false,
    }
}

fn score(rule: &PresetRule, intent: &NormalizedIntent) -> u32 {
    let mut score = 0;
    if hits(&intent.role, rule.roles) {
        score += 2;
    }
    if hits(&intent.audience, rule.audiences) {
        score += 2;
    }
    if hits(&intent.intent, rule.intents) {
        score += 1;
    }
    if hits(&intent.format, rule.formats) {
        score += 1;
    }
    if hits(&intent.domain, rule.domains) {
        score += 1;
    }
    score
}

/// Returns up to three presets scoring at least two, strongest first.
///
/// Pure and deterministic: equal scores keep rule-table order.
pub fn match_presets(intent: &NormalizedIntent) -> Vec<PresetId> {
    let mut scored: Vec<(PresetId, u32)> = RULES
        .iter()
        .map(|rule| (rule.id, score(rule, intent)))
        .filter(|(_, s)| *s >= MIN_SCORE)
        .collect();

    // `sort_by` is stable, so ties stay in table order.
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    let mut out: Vec<PresetId> = Vec::with_capacity(MAX_MATCHES);
    for (id, _) in scored {
        if !out.contains(&id) {
            out.push(id);
        }
        if out.len() == MAX_MATCHES {
            break;
        }
    }
    out
}
