//! Constraint enforcement on the selected candidate.
//!
//! The model's own status word is only trusted for `flagged`. Otherwise the
//! status is derived by comparing texts: any non-whitespace change is
//! `edited`, none is `ok`. A must-avoid phrase still present as whole words in
//! the resulting text always forces `flagged`, including on the pass-through
//! path when the call fails.

use std::sync::Arc;

use pipeline::parse::{normalize_whitespace, parse_json, strip_wrapping};
use pipeline::{
    Constraints, GenerationRequest, GuardrailFailurePolicy, GuardrailOutcome, GuardrailStatus,
    Stage, StageError, TextGenerator, TraceLog,
};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{instrument, warn};

use crate::prompts;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGuardrail {
    #[serde(default)]
    status: Option<String>,
    #[serde(
        default,
        alias = "resulting_text",
        alias = "adjusted_draft",
        alias = "adjustedDraft",
        alias = "safeDraft",
        alias = "text"
    )]
    resulting_text: Option<String>,
    #[serde(default, alias = "issues_summary", alias = "issuesSummary")]
    issues: Value,
}

/// Issues may arrive as a list or as one summary string.
fn issue_list(value: Value) -> Vec<String> {
    let items = match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Value::String(s) => vec![s],
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Case-insensitive matcher for one must-avoid phrase. Word boundaries are
/// required at whichever ends of the phrase are word characters, and any run
/// of whitespace inside the phrase matches any run in the text.
fn phrase_matcher(phrase: &str) -> Option<Regex> {
    let words: Vec<String> = phrase.split_whitespace().map(regex::escape).collect();
    if words.is_empty() {
        return None;
    }
    let open = if phrase.trim_start().starts_with(is_word_char) { r"\b" } else { "" };
    let close = if phrase.trim_end().ends_with(is_word_char) { r"\b" } else { "" };
    RegexBuilder::new(&format!("{open}{}{close}", words.join(r"\s+")))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Must-avoid phrases present in `text` as whole words, ignoring case.
pub fn must_avoid_violations<'a>(constraints: &'a Constraints, text: &str) -> Vec<&'a str> {
    constraints
        .must_avoid
        .iter()
        .map(String::as_str)
        .filter(|phrase| match phrase_matcher(phrase) {
            Some(matcher) => matcher.is_match(text),
            // Unbuildable pattern: fall back to a plain substring check.
            None => {
                let p = phrase.trim().to_lowercase();
                !p.is_empty() && text.to_lowercase().contains(&p)
            }
        })
        .collect()
}

fn violation_issues(violations: &[&str]) -> Vec<String> {
    violations
        .iter()
        .map(|v| format!("must-avoid phrase still present: \"{v}\""))
        .collect()
}

struct Reply {
    claimed_flagged: bool,
    text: String,
    issues: Vec<String>,
}

pub struct Guardrail {
    generator: Arc<dyn TextGenerator>,
    policy: GuardrailFailurePolicy,
}

impl Guardrail {
    pub fn new(generator: Arc<dyn TextGenerator>, policy: GuardrailFailurePolicy) -> Self {
        Self { generator, policy }
    }

    async fn call(&self, constraints: &Constraints, text: &str) -> Result<Reply, StageError> {
        let payload = json!({ "constraints": constraints, "text": text }).to_string();
        let raw = self
            .generator
            .generate(GenerationRequest::json(Stage::Guardrail, prompts::GUARDRAIL, payload))
            .await?;
        let reply: RawGuardrail = parse_json(&raw)?;
        let resulting = reply
            .resulting_text
            .map(|t| strip_wrapping(&t))
            .unwrap_or_default();
        if resulting.is_empty() {
            return Err(StageError::Empty("guardrail returned no text".into()));
        }
        Ok(Reply {
            claimed_flagged: reply
                .status
                .is_some_and(|s| s.trim().eq_ignore_ascii_case("flagged")),
            text: resulting,
            issues: issue_list(reply.issues),
        })
    }

    fn classify(constraints: &Constraints, input: &str, reply: Reply) -> GuardrailOutcome {
        let changed = normalize_whitespace(&reply.text) != normalize_whitespace(input);
        let text = if changed { reply.text } else { input.to_string() };
        let violations = must_avoid_violations(constraints, &text);

        if reply.claimed_flagged || !violations.is_empty() {
            let mut issues = reply.issues;
            issues.extend(violation_issues(&violations));
            if issues.is_empty() {
                issues.push("flagged for human review".into());
            }
            return GuardrailOutcome {
                status: GuardrailStatus::Flagged,
                text,
                issues,
                skipped: false,
            };
        }

        if changed {
            let mut issues = reply.issues;
            if issues.is_empty() {
                issues.push("text adjusted to meet constraints".into());
            }
            GuardrailOutcome {
                status: GuardrailStatus::Edited,
                text,
                issues,
                skipped: false,
            }
        } else {
            GuardrailOutcome {
                status: GuardrailStatus::Ok,
                text,
                issues: Vec::new(),
                skipped: false,
            }
        }
    }

    fn pass_through(&self, constraints: &Constraints, input: &str) -> GuardrailOutcome {
        let violations = violation_issues(&must_avoid_violations(constraints, input));
        let (status, issues) = match self.policy {
            GuardrailFailurePolicy::FailOpen if violations.is_empty() => {
                (GuardrailStatus::Ok, Vec::new())
            }
            GuardrailFailurePolicy::FailOpen => (GuardrailStatus::Flagged, violations),
            GuardrailFailurePolicy::FailClosed => {
                let mut issues = vec!["guardrail unavailable; text was not checked".to_string()];
                issues.extend(violations);
                (GuardrailStatus::Flagged, issues)
            }
        };
        GuardrailOutcome {
            status,
            text: input.to_string(),
            issues,
            skipped: true,
        }
    }

    /// Enforces `constraints` on `text`. Infallible; the result text is never
    /// empty when `text` is not.
    #[instrument(skip_all, fields(must_avoid = constraints.must_avoid.len()))]
    pub async fn enforce(
        &self,
        constraints: &Constraints,
        text: &str,
        trace: &mut TraceLog,
    ) -> GuardrailOutcome {
        match self.call(constraints, text).await {
            Ok(reply) => {
                let outcome = Self::classify(constraints, text, reply);
                let detail = if outcome.issues.is_empty() {
                    String::new()
                } else {
                    format!(": {}", outcome.issues.join("; "))
                };
                trace.record(
                    Stage::Guardrail,
                    format!("status {}{detail}", outcome.status.as_str()),
                );
                outcome
            }
            Err(e) => {
                warn!(error = %e, policy = ?self.policy, "guardrail skipped");
                let outcome = self.pass_through(constraints, text);
                trace.record(
                    Stage::Guardrail,
                    format!(
                        "skipped ({e}); text passed through unchanged, status {}",
                        outcome.status.as_str()
                    ),
                );
                outcome
            }
        }
    }
}
