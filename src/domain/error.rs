use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize)]
pub enum AppError {
    Internal(String),
    NotFound(String),
    ValidationError(String),
    ParseError(String),
    LLMError(String),
    SecurityError(String),
    IoError(String),
    ConfigError(String),
    /// Every completion attempt came back blank.
    GenerationExhausted { attempts: u32 },
    /// Generation output held no recoverable JSON array. `raw` is the text that was parsed.
    ParseFailure { message: String, raw: String },
}

impl AppError {
    /// Errors that abort a pipeline run, as opposed to degrading it.
    pub fn is_generation_failure(&self) -> bool {
        matches!(
            self,
            AppError::GenerationExhausted { .. } | AppError::ParseFailure { .. }
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            AppError::LLMError(msg) => write!(f, "LLM error: {}", msg),
            AppError::SecurityError(msg) => write!(f, "Security error: {}", msg),
            AppError::IoError(msg) => write!(f, "IO error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Config error: {}", msg),
            AppError::GenerationExhausted { attempts } => write!(
                f,
                "Generation exhausted: model returned empty output after {} attempt(s)",
                attempts
            ),
            AppError::ParseFailure { message, .. } => write!(
                f,
                "Failed to parse JSON from generator output: {}. Check logs for raw output.",
                message
            ),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ParseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_failures_are_flagged() {
        assert!(AppError::GenerationExhausted { attempts: 3 }.is_generation_failure());
        assert!(AppError::ParseFailure {
            message: "not a list".to_string(),
            raw: "{}".to_string(),
        }
        .is_generation_failure());
        assert!(!AppError::LLMError("timeout".to_string()).is_generation_failure());
    }

    #[test]
    fn test_parse_failure_display_hides_raw_text() {
        let err = AppError::ParseFailure {
            message: "Parsed JSON is not a list".to_string(),
            raw: "{\"secret\": 1}".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("Parsed JSON is not a list"));
        assert!(!rendered.contains("secret"));
    }
}
