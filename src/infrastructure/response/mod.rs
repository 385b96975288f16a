use once_cell::sync::Lazy;
use regex::Regex;

static THINK_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<think>[\s\S]*?</think>|<think\s*/>").unwrap());

static REASONING_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<reasoning>[\s\S]*?</reasoning>").unwrap());

/// Removes reasoning blocks some models prepend to their answer.
///
/// Only whole tagged blocks are removed and the rest is returned untouched, so
/// JSON payloads (including newlines inside string values) survive unchanged.
pub fn strip_reasoning_blocks(response: &str) -> String {
    let cleaned = THINK_TAG_PATTERN.replace_all(response, "");
    REASONING_TAG_PATTERN.replace_all(&cleaned, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_think_tags() {
        let input = "<think>Some reasoning here</think>[{\"a\":\"1\"}]";
        assert_eq!(strip_reasoning_blocks(input), "[{\"a\":\"1\"}]");
    }

    #[test]
    fn test_strip_self_closing_think() {
        assert_eq!(strip_reasoning_blocks("<think />[]"), "[]");
    }

    #[test]
    fn test_strip_reasoning_tags() {
        let input = "<reasoning>Internal reasoning</reasoning>Final answer";
        assert_eq!(strip_reasoning_blocks(input), "Final answer");
    }

    #[test]
    fn test_only_reasoning_leaves_blank() {
        let input = "<think>\nno answer produced\n</think>\n  ";
        assert!(strip_reasoning_blocks(input).trim().is_empty());
    }

    #[test]
    fn test_preserves_multiline_payload() {
        let input = "[{\"Notes\":\"line 1\\n\\n\\n\\nline 2\"}]\n\n\n\n";
        assert_eq!(strip_reasoning_blocks(input), input);
    }
}
