//! Keyword heuristics over the raw brief.
//!
//! Used when the normalizing call is unavailable or returns junk, so a run can
//! still reach the planner with a usable (if thin) [`NormalizedIntent`].

use std::sync::OnceLock;

use regex::Regex;

use crate::types::{dedup_phrases, BriefHints, NormalizedIntent};

type Vocabulary = &'static [(&'static str, &'static str)];

const ROLES: Vocabulary = &[
    ("chief executive", "ceo"),
    ("ceo", "ceo"),
    ("founder", "founder"),
    ("best man", "best man"),
    ("maid of honor", "maid of honour"),
    ("maid of honour", "maid of honour"),
    ("father of the bride", "father of the bride"),
    ("headteacher", "headteacher"),
    ("student", "student"),
    ("team lead", "manager"),
    ("manager", "manager"),
    ("my team", "manager"),
];

const AUDIENCES: Vocabulary = &[
    ("all-staff", "all-staff"),
    ("all staff", "all-staff"),
    ("all-hands", "employees"),
    ("all hands", "employees"),
    ("employees", "employees"),
    ("staff", "employees"),
    ("my team", "team"),
    ("the team", "team"),
    ("engineers", "team"),
    ("board", "board"),
    ("shareholders", "investors"),
    ("investors", "investors"),
    ("students", "students"),
    ("guests", "guests"),
];

const INTENTS: Vocabulary = &[
    ("thank", "thank"),
    ("appreciat", "thank"),
    ("motivat", "motivate"),
    ("inspire", "motivate"),
    ("reassur", "reassure"),
    ("announce", "announce"),
    ("update", "update"),
    ("fundrais", "fundraise"),
    ("raise money", "fundraise"),
    ("pitch", "pitch"),
    ("explain", "explain"),
    ("report", "report"),
    ("application", "apply"),
    ("apply", "apply"),
    ("celebrat", "celebrate"),
    ("toast", "celebrate"),
];

const FORMATS: Vocabulary = &[
    ("personal statement", "personal_statement"),
    ("press release", "press_release"),
    ("statement", "statement"),
    ("email", "email"),
    ("memo", "memo"),
    ("deck", "deck"),
    ("toast", "speech"),
    ("remarks", "remarks"),
    ("talk", "talk"),
    ("speech", "speech"),
];

const DOMAINS: Vocabulary = &[
    ("wedding", "wedding"),
    ("ucas", "education"),
    ("university", "education"),
    ("college", "education"),
    ("school", "education"),
    ("start-up", "startup"),
    ("startup", "startup"),
    ("scale-up", "startup"),
    ("fintech", "fintech"),
    ("government", "public_sector"),
    ("council", "public_sector"),
    ("policy", "public_sector"),
    ("election", "politics"),
    ("corporate", "corporate"),
    ("company", "corporate"),
];

const TONES: Vocabulary = &[
    ("formal", "formal"),
    ("serious", "formal"),
    ("heartfelt", "warm"),
    ("warm", "warm"),
    ("funny", "playful"),
    ("humorous", "playful"),
    ("light-hearted", "playful"),
    ("motivational", "inspiring"),
    ("inspiring", "inspiring"),
];

const DEFAULT_FORMAT: &str = "speech";

fn lookup(haystack: &str, vocabulary: Vocabulary) -> Option<String> {
    vocabulary
        .iter()
        .find(|(needle, _)| haystack.contains(needle))
        .map(|(_, value)| (*value).to_string())
}

fn duration_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(concat!(
                r"(?i)\b(?:(under|about|around|roughly|at most|no more than|up to)\s+)?",
                r"(\d+)\s*-?\s*(minutes?|mins?|words)\b",
            ))
            .ok()
        })
        .as_ref()
}

fn audience_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)\baudience\s*[:\-]\s*([^,.;\n]+)").ok())
        .as_ref()
}

fn infer_duration(brief: &str) -> Option<String> {
    let caps = duration_pattern()?.captures(brief)?;
    let amount = caps.get(2)?.as_str();
    let unit = caps.get(3)?.as_str().to_lowercase();
    let unit = if unit.starts_with("word") {
        "words"
    } else {
        "minutes"
    };
    Some(match caps.get(1) {
        Some(q) => format!("{} {amount} {unit}", q.as_str().to_lowercase()),
        None => format!("{amount} {unit}"),
    })
}

fn infer_audience(brief: &str, lower: &str) -> Option<String> {
    if let Some(caps) = audience_pattern().and_then(|p| p.captures(brief)) {
        if let Some(m) = caps.get(1) {
            let stated = m.as_str().trim();
            if !stated.is_empty() {
                return Some(stated.to_string());
            }
        }
    }
    lookup(lower, AUDIENCES)
}

/// Builds an intent from keyword matches alone, then applies explicit hints.
pub fn heuristic_intent(brief: &str, hints: &BriefHints) -> NormalizedIntent {
    let lower = brief.to_lowercase();
    let inferred = NormalizedIntent {
        role: lookup(&lower, ROLES),
        audience: infer_audience(brief, &lower),
        intent: lookup(&lower, INTENTS),
        format: lookup(&lower, FORMATS).or_else(|| Some(DEFAULT_FORMAT.to_string())),
        domain: lookup(&lower, DOMAINS),
        event_context: None,
        tone: lookup(&lower, TONES),
        duration: infer_duration(brief),
        must_include: Vec::new(),
        must_avoid: Vec::new(),
    };
    apply_hints(inferred, hints)
}

/// Overlays explicit hints on an inferred intent.
///
/// Scalar hints replace inferred values; constraint lists are unioned with the
/// hint entries first.
pub fn apply_hints(inferred: NormalizedIntent, hints: &BriefHints) -> NormalizedIntent {
    NormalizedIntent {
        audience: hints.audience.clone().or(inferred.audience),
        event_context: hints.event_context.clone().or(inferred.event_context),
        tone: hints.tone.clone().or(inferred.tone),
        duration: hints.duration.clone().or(inferred.duration),
        must_include: dedup_phrases(hints.must_include.iter().chain(&inferred.must_include)),
        must_avoid: dedup_phrases(hints.must_avoid.iter().chain(&inferred.must_avoid)),
        ..inferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_thank_you_brief() {
        let intent = heuristic_intent(
            "Thank my team for a great year, keep it under 3 minutes, audience: 50 engineers",
            &BriefHints::default(),
        );
        assert_eq!(intent.role.as_deref(), Some("manager"));
        assert_eq!(intent.audience.as_deref(), Some("50 engineers"));
        assert_eq!(intent.intent.as_deref(), Some("thank"));
        assert_eq!(intent.format.as_deref(), Some("speech"));
        assert_eq!(intent.duration.as_deref(), Some("under 3 minutes"));
    }

    #[test]
    fn wedding_toast() {
        let intent = heuristic_intent(
            "Best man toast for my brother's wedding, funny but heartfelt, 5 min",
            &BriefHints::default(),
        );
        assert_eq!(intent.role.as_deref(), Some("best man"));
        assert_eq!(intent.domain.as_deref(), Some("wedding"));
        assert_eq!(intent.intent.as_deref(), Some("celebrate"));
        assert_eq!(intent.tone.as_deref(), Some("warm"));
        assert_eq!(intent.duration.as_deref(), Some("5 minutes"));
    }

    #[test]
    fn explicit_hints_win() {
        let hints = BriefHints {
            audience: Some("the board".into()),
            tone: Some("sober".into()),
            must_avoid: vec!["redundancies".into()],
            ..Default::default()
        };
        let intent = heuristic_intent("Warm update for all staff", &hints);
        assert_eq!(intent.audience.as_deref(), Some("the board"));
        assert_eq!(intent.tone.as_deref(), Some("sober"));
        assert_eq!(intent.must_avoid, vec!["redundancies".to_string()]);
    }

    #[test]
    fn lists_are_unioned_without_duplicates() {
        let inferred = NormalizedIntent {
            must_include: vec!["Thank the interns".into(), "Roadmap".into()],
            ..Default::default()
        };
        let hints = BriefHints {
            must_include: vec!["roadmap".into()],
            ..Default::default()
        };
        let merged = apply_hints(inferred, &hints);
        assert_eq!(merged.must_include, vec!["roadmap", "Thank the interns"]);
    }
}
