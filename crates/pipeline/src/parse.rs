//! Tolerant handling of raw generator output.
//!
//! The generator promises nothing about shape. These helpers remove the
//! wrapping models like to add (code fences, draft delimiters, quotes) and
//! locate the JSON object inside chatty replies, so each stage can then apply
//! its own strict validation.

use serde::de::DeserializeOwned;

use crate::errors::StageError;

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

fn is_delimiter(line: &str) -> bool {
    let t = line.trim();
    t.len() > 6 && t.starts_with("===") && t.ends_with("===")
}

/// Removes code fences, `===MARKER===` delimiter lines and matching outer
/// quotes, then trims.
pub fn strip_wrapping(raw: &str) -> String {
    let kept: Vec<&str> = raw
        .lines()
        .filter(|line| !is_fence(line) && !is_delimiter(line))
        .collect();
    let joined = kept.join("\n");
    let trimmed = joined.trim();

    let unquoted = ['"', '\'', '“']
        .iter()
        .find_map(|q| {
            let close = if *q == '“' { '”' } else { *q };
            trimmed
                .strip_prefix(*q)
                .and_then(|s| s.strip_suffix(close))
                .filter(|inner| !inner.contains(close))
        })
        .unwrap_or(trimmed);

    unquoted.trim().to_string()
}

/// Returns the first balanced `{...}` object in `raw`, ignoring braces inside
/// JSON strings.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Locates and deserialises a JSON object of type `T` from raw output.
///
/// # Errors
///
/// [`StageError::Empty`] for blank output, [`StageError::Malformed`] when no
/// object is present or it does not match `T`.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, StageError> {
    if raw.trim().is_empty() {
        return Err(StageError::Empty("no output".into()));
    }
    let object = extract_json_object(raw)
        .ok_or_else(|| StageError::Malformed("no JSON object in output".into()))?;
    serde_json::from_str(object).map_err(|e| StageError::Malformed(e.to_string()))
}

/// Collapses runs of whitespace so formatting-only differences compare equal.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        winner: u8,
    }

    #[test]
    fn strips_fences_and_draft_markers() {
        let raw = "===DRAFT_1===\n```\nFriends, colleagues.\n```\n===END_DRAFT_1===\n";
        assert_eq!(strip_wrapping(raw), "Friends, colleagues.");
    }

    #[test]
    fn strips_matching_outer_quotes_only() {
        assert_eq!(strip_wrapping("\"Hello all\""), "Hello all");
        assert_eq!(
            strip_wrapping("\"Yes\" she said, \"we did\""),
            "\"Yes\" she said, \"we did\""
        );
    }

    #[test]
    fn finds_object_inside_chatter() {
        let raw = "Sure! Here you go:\n```json\n{\"winner\": 2, \"note\": \"{not a brace}\"}\n```";
        let v: Verdict = parse_json(raw).unwrap();
        assert_eq!(v, Verdict { winner: 2 });
    }

    #[test]
    fn reports_missing_object_as_malformed() {
        let err = parse_json::<Verdict>("I prefer the second one").unwrap_err();
        assert!(matches!(err, StageError::Malformed(_)));
        let err = parse_json::<Verdict>("   ").unwrap_err();
        assert!(matches!(err, StageError::Empty(_)));
    }

    #[test]
    fn unbalanced_object_is_not_extracted() {
        assert_eq!(extract_json_object("{\"a\": {\"b\": 1}"), None);
    }
}
