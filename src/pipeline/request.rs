//! Extraction request building: prompt + truncated statement text.
//!
//! One [`ExtractionRequest`] type covers both modes; only its
//! [`ResponseShape`] differs. Everything downstream of the completion call
//! (repair, parsing, normalisation) is shared.

use crate::config::{ExtractionMode, TrackerConfig};
use crate::prompts::{subscription_schema, EXTRACTION_PROMPT, SCHEMA_NAME};
use serde_json::Value;
use tracing::debug;

/// What the completion service is asked to return.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    /// Free text that should contain one JSON object; repaired before parsing.
    FreeText,
    /// Output constrained server-side to a JSON schema.
    JsonSchema { name: String, schema: Value },
}

impl ResponseShape {
    pub fn mode(&self) -> ExtractionMode {
        match self {
            ResponseShape::FreeText => ExtractionMode::Unstructured,
            ResponseShape::JsonSchema { .. } => ExtractionMode::Structured,
        }
    }
}

/// A single-message completion request for one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    pub model: String,
    /// Instruction prompt followed by the (truncated) statement text.
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub shape: ResponseShape,
    /// Characters of statement text actually included.
    pub input_chars: usize,
    /// Whether trailing statement text was cut off.
    pub truncated: bool,
}

/// Build the request for one file's extracted text.
pub fn build_request(text: &str, config: &TrackerConfig) -> ExtractionRequest {
    let (body, truncated) = truncate_chars(text, config.max_input_chars);
    if truncated {
        debug!(
            "Statement text truncated to {} of {} chars",
            config.max_input_chars,
            text.chars().count()
        );
    }

    let instructions = config.prompt.as_deref().unwrap_or(EXTRACTION_PROMPT);
    let mut prompt = String::with_capacity(instructions.len() + body.len());
    prompt.push_str(instructions);
    prompt.push_str(body);

    let shape = match config.mode {
        ExtractionMode::Unstructured => ResponseShape::FreeText,
        ExtractionMode::Structured => ResponseShape::JsonSchema {
            name: SCHEMA_NAME.to_string(),
            schema: subscription_schema(),
        },
    };

    ExtractionRequest {
        model: config.model.clone(),
        prompt,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        shape,
        input_chars: body.chars().count(),
        truncated,
    }
}

/// Keep at most `max_chars` characters (not bytes) of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => (&text[..cut], true),
        None => (text, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("abcdef", 3), ("abc", true));
        assert_eq!(truncate_chars("abc", 3), ("abc", false));
        assert_eq!(truncate_chars("", 3), ("", false));
        // Multi-byte characters must not be split.
        assert_eq!(truncate_chars("ééééé", 2), ("éé", true));
    }

    #[test]
    fn prompt_precedes_statement_text() {
        let config = TrackerConfig::default();
        let req = build_request("NETFLIX 15.99", &config);
        assert!(req.prompt.starts_with("Extract subscriptions"));
        assert!(req.prompt.ends_with("Bank statement:\nNETFLIX 15.99"));
        assert_eq!(req.shape, ResponseShape::FreeText);
        assert_eq!(req.model, "google/gemini-2.0-flash-001");
        assert!(!req.truncated);
    }

    #[test]
    fn long_statements_lose_trailing_text() {
        let config = TrackerConfig::builder().max_input_chars(10).build().unwrap();
        let req = build_request("0123456789TAIL", &config);
        assert!(req.prompt.ends_with("0123456789"));
        assert!(!req.prompt.contains("TAIL"));
        assert!(req.truncated);
        assert_eq!(req.input_chars, 10);
    }

    #[test]
    fn default_limit_is_fifty_thousand_chars() {
        let text = "x".repeat(60_000);
        let req = build_request(&text, &TrackerConfig::default());
        assert_eq!(req.input_chars, 50_000);
        assert!(req.truncated);
    }

    #[test]
    fn structured_mode_attaches_schema() {
        let config = TrackerConfig::builder()
            .mode(ExtractionMode::Structured)
            .build()
            .unwrap();
        let req = build_request("text", &config);
        match &req.shape {
            ResponseShape::JsonSchema { name, schema } => {
                assert_eq!(name, SCHEMA_NAME);
                assert_eq!(schema["type"], "object");
            }
            other => panic!("expected schema, got {other:?}"),
        }
        assert_eq!(req.shape.mode(), ExtractionMode::Structured);
    }

    #[test]
    fn custom_prompt_replaces_default() {
        let config = TrackerConfig::builder().prompt("List charges:\n").build().unwrap();
        let req = build_request("abc", &config);
        assert_eq!(req.prompt, "List charges:\nabc");
    }
}
