//! Recovers the JSON array of test cases from raw model text.

use crate::domain::error::{AppError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::error;

static ARRAY_SPAN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").unwrap());

/// Parsed array items plus the cleaned text they were taken from.
pub type ParsedOutput = (Vec<Value>, String);

/// Trims, removes code fences when the text opens with one, then parses the
/// span from the first `[` to the last `]` (or the whole text when there is
/// no such span). Anything other than a JSON array is a `ParseFailure`.
pub fn parse_output(raw: &str) -> Result<ParsedOutput> {
    let cleaned = strip_fences(raw);

    let candidate = ARRAY_SPAN_PATTERN
        .find(&cleaned)
        .map(|m| m.as_str())
        .unwrap_or(cleaned.as_str());

    let parsed: Value = serde_json::from_str(candidate).map_err(|e| {
        error!(raw = %cleaned, "Raw output could not be parsed as JSON");
        AppError::ParseFailure {
            message: e.to_string(),
            raw: cleaned.clone(),
        }
    })?;

    match parsed {
        Value::Array(items) => Ok((items, cleaned)),
        other => {
            error!(raw = %cleaned, "Parsed JSON is not an array");
            Err(AppError::ParseFailure {
                message: format!("Parsed JSON is not a list (got {})", json_kind(&other)),
                raw: cleaned,
            })
        }
    }
}

fn strip_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let interior = trimmed.split("```").collect::<String>();
    let interior = interior.trim();
    match interior.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => interior[4..].trim().to_string(),
        _ => interior.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
