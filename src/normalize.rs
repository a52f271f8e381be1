//! Turns an untrusted classifier reply into a [`Classification`].
//!
//! This is the only place classifier output is inspected. Nothing here can
//! fail: anything that doesn't check out is replaced by
//! [`DEFAULT_SENTIMENT`] / [`DEFAULT_THEME`], field by field.

use tracing::warn;

use crate::classifier::RawResponse;
use crate::feedback::{Classification, DEFAULT_SENTIMENT, DEFAULT_THEME, Sentiment, Theme};

/// Outcome of normalizing one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Both fields came back as exact enumeration members.
    Valid(Classification),
    /// At least one field was substituted. Carries the reason.
    Defaulted(Classification, String),
}

impl Normalized {
    pub fn classification(&self) -> Classification {
        match self {
            Normalized::Valid(c) | Normalized::Defaulted(c, _) => *c,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Normalized::Valid(_))
    }
}

/// Normalize a reply, logging a warning whenever defaults were used.
pub fn normalize(raw: &RawResponse) -> Classification {
    let normalized = validate(raw);
    if let Normalized::Defaulted(c, reason) = &normalized {
        warn!(
            sentiment = %c.sentiment,
            theme = %c.theme,
            "classifier output defaulted: {reason}"
        );
    }
    normalized.classification()
}

/// Normalize a reply and report whether defaults were needed.
pub fn validate(raw: &RawResponse) -> Normalized {
    let text = payload_text(raw);

    let parsed: serde_json::Value = match serde_json::from_str(extract_json(&text)) {
        Ok(v) => v,
        Err(e) => {
            return Normalized::Defaulted(
                Classification::default(),
                format!("unparseable output ({e})"),
            );
        }
    };
    let Some(fields) = parsed.as_object() else {
        return Normalized::Defaulted(
            Classification::default(),
            "output is not a JSON object".to_string(),
        );
    };

    let sentiment = field(fields, "sentiment").and_then(|s| s.trim().parse::<Sentiment>().ok());
    let theme = field(fields, "theme").and_then(|s| s.trim().parse::<Theme>().ok());

    let classification = Classification {
        sentiment: sentiment.unwrap_or(DEFAULT_SENTIMENT),
        theme: theme.unwrap_or(DEFAULT_THEME),
    };

    let mut problems = Vec::new();
    if sentiment.is_none() {
        problems.push(format!("sentiment {}", describe(fields.get("sentiment"))));
    }
    if theme.is_none() {
        problems.push(format!("theme {}", describe(fields.get("theme"))));
    }

    if problems.is_empty() {
        Normalized::Valid(classification)
    } else {
        Normalized::Defaulted(classification, problems.join(", "))
    }
}

fn field<'a>(fields: &'a serde_json::Map<String, serde_json::Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(|v| v.as_str())
}

fn describe(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => "missing".to_string(),
        Some(v) => format!("invalid: {v}"),
    }
}

/// Pull the text payload out of a reply. Envelopes we don't recognize are
/// serialized whole and handed to the parser as-is.
fn payload_text(raw: &RawResponse) -> String {
    match raw {
        RawResponse::Text(text) => text.clone(),
        RawResponse::Envelope(value) => {
            if let Some(s) = value.as_str() {
                return s.to_string();
            }
            if let Some(s) = value.get("text").and_then(|t| t.as_str()) {
                return s.to_string();
            }
            if let Some(blocks) = value.get("content").and_then(|c| c.as_array()) {
                let joined: String = blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                    .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                    .collect();
                if !joined.is_empty() {
                    return joined;
                }
            }
            value.to_string()
        }
    }
}

/// Extract JSON from text that may be wrapped in markdown code fences.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(after) = trimmed.strip_prefix("```json")
        && let Some(json) = after.strip_suffix("```")
    {
        return json.trim();
    }
    if let Some(after) = trimmed.strip_prefix("```")
        && let Some(json) = after.strip_suffix("```")
    {
        return json.trim();
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(s: &str) -> RawResponse {
        RawResponse::Text(s.to_string())
    }

    #[test]
    fn valid_payload_passes_through() {
        let c = normalize(&text(r#"{"sentiment":"Positive","theme":"Bug"}"#));
        assert_eq!(c.sentiment, Sentiment::Positive);
        assert_eq!(c.theme, Theme::Bug);
    }

    #[test]
    fn not_json_defaults_both() {
        let n = validate(&text("not json"));
        assert_eq!(
            n.classification(),
            Classification {
                sentiment: DEFAULT_SENTIMENT,
                theme: DEFAULT_THEME,
            }
        );
        assert!(!n.is_valid());
    }

    #[test]
    fn fields_are_validated_independently() {
        let c = normalize(&text(r#"{"sentiment":"VeryHappy","theme":"Bug"}"#));
        assert_eq!(c.sentiment, DEFAULT_SENTIMENT);
        assert_eq!(c.theme, Theme::Bug);

        let c = normalize(&text(r#"{"sentiment":"Negative","theme":"Crashes"}"#));
        assert_eq!(c.sentiment, Sentiment::Negative);
        assert_eq!(c.theme, DEFAULT_THEME);
    }

    #[test]
    fn values_are_trimmed() {
        let n = validate(&text(r#"{"sentiment":"  Negative ","theme":"\tUI/UX\n"}"#));
        assert_eq!(
            n,
            Normalized::Valid(Classification {
                sentiment: Sentiment::Negative,
                theme: Theme::UiUx,
            })
        );
    }

    #[test]
    fn matching_is_case_sensitive() {
        let c = normalize(&text(r#"{"sentiment":"positive","theme":"bug"}"#));
        assert_eq!(c, Classification::default());
    }

    #[test]
    fn missing_fields_default() {
        let n = validate(&text(r#"{"theme":"Performance"}"#));
        match n {
            Normalized::Defaulted(c, reason) => {
                assert_eq!(c.sentiment, DEFAULT_SENTIMENT);
                assert_eq!(c.theme, Theme::Performance);
                assert!(reason.contains("sentiment missing"));
            }
            other => panic!("expected Defaulted, got {other:?}"),
        }
    }

    #[test]
    fn non_string_fields_default() {
        let n = validate(&text(r#"{"sentiment": 3, "theme": ["Bug"]}"#));
        assert_eq!(n.classification(), Classification::default());
        assert!(!n.is_valid());
    }

    #[test]
    fn non_object_json_defaults() {
        assert_eq!(normalize(&text("42")), Classification::default());
        assert_eq!(normalize(&text(r#"["Positive","Bug"]"#)), Classification::default());
        assert_eq!(normalize(&text("")), Classification::default());
    }

    #[test]
    fn extra_keys_are_ignored() {
        let n = validate(&text(
            r#"{"sentiment":"Neutral","theme":"Bug","confidence":0.9}"#,
        ));
        assert!(n.is_valid());
    }

    #[test]
    fn fenced_json_is_accepted() {
        let c = normalize(&text(
            "```json\n{\"sentiment\":\"Negative\",\"theme\":\"Performance\"}\n```",
        ));
        assert_eq!(c.sentiment, Sentiment::Negative);
        assert_eq!(c.theme, Theme::Performance);
    }

    #[test]
    fn envelope_string_is_parsed() {
        let raw = RawResponse::Envelope(json!(r#"{"sentiment":"Positive","theme":"UI/UX"}"#));
        assert!(validate(&raw).is_valid());
    }

    #[test]
    fn envelope_text_field_is_parsed() {
        let raw = RawResponse::Envelope(json!({
            "text": r#"{"sentiment":"Negative","theme":"Bug"}"#
        }));
        let c = normalize(&raw);
        assert_eq!(c.sentiment, Sentiment::Negative);
        assert_eq!(c.theme, Theme::Bug);
    }

    #[test]
    fn envelope_content_blocks_are_parsed() {
        let raw = RawResponse::Envelope(json!({
            "content": [{"type": "text", "text": r#"{"sentiment":"Positive","theme":"Performance"}"#}]
        }));
        assert!(validate(&raw).is_valid());
    }

    #[test]
    fn unknown_envelope_is_serialized_whole() {
        // The envelope itself happens to be a classification object.
        let raw = RawResponse::Envelope(json!({"sentiment": "Positive", "theme": "Bug"}));
        assert!(validate(&raw).is_valid());

        let raw = RawResponse::Envelope(json!({"choices": []}));
        assert_eq!(normalize(&raw), Classification::default());
    }

    #[test]
    fn output_always_within_enumerations() {
        let inputs = [
            "",
            "null",
            "{}",
            r#"{"sentiment":null,"theme":null}"#,
            r#"{"sentiment":"","theme":""}"#,
            "{\"sentiment\":\"Positive\"",
            "```\n```",
        ];
        for input in inputs {
            let c = normalize(&text(input));
            assert!(Sentiment::ALL.contains(&c.sentiment), "input: {input}");
            assert!(Theme::ALL.contains(&c.theme), "input: {input}");
        }
    }

    #[test]
    fn extract_json_strips_fences() {
        assert_eq!(extract_json("```json\n{\"a\": 1}\n```"), r#"{"a": 1}"#);
        assert_eq!(extract_json("```\n{\"a\": 1}\n```"), r#"{"a": 1}"#);
        assert_eq!(extract_json("  {\"a\": 1}  "), r#"{"a": 1}"#);
    }
}
