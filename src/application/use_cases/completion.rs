//! Text-generation adapter with retry on blank output.

use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::response::strip_reasoning_blocks;
use crate::shared::text::estimate_tokens;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_MAX_RETRIES: u32 = 2;

const SYSTEM_PROMPT: &str = "";

pub struct CompletionClient {
    llm: Arc<dyn LLMClient + Send + Sync>,
    config: LLMConfig,
    max_retries: u32,
}

impl CompletionClient {
    pub fn new(llm: Arc<dyn LLMClient + Send + Sync>, config: LLMConfig, max_retries: u32) -> Self {
        Self {
            llm,
            config,
            max_retries,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Calls the model until it returns non-blank text, at most
    /// `1 + max_retries` times. Non-blank output is returned as-is, malformed
    /// or not. Transport errors are not retried.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let attempts = self.max_attempts();
        debug!(
            prompt_chars = prompt.chars().count(),
            prompt_tokens = estimate_tokens(prompt),
            max_attempts = attempts,
            "Requesting completion"
        );

        for attempt in 1..=attempts {
            let text = self.complete_once(prompt).await?;
            if !text.trim().is_empty() {
                return Ok(text);
            }
            warn!(
                attempt,
                max_attempts = attempts,
                model = %self.config.model,
                "Empty response from model, retrying"
            );
        }

        Err(AppError::GenerationExhausted { attempts })
    }

    /// Single call, reasoning blocks removed. May return blank text.
    pub async fn complete_once(&self, prompt: &str) -> Result<String> {
        let raw = self.llm.generate(&self.config, SYSTEM_PROMPT, prompt).await?;
        Ok(strip_reasoning_blocks(&raw))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed script of responses, one per call. Extra calls return "".
    pub(crate) struct ScriptedLlm {
        script: Mutex<VecDeque<Result<String>>>,
        pub(crate) calls: AtomicUsize,
        pub(crate) prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        pub(crate) fn new(script: Vec<Result<String>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn texts(script: &[&str]) -> Self {
            Self::new(script.iter().map(|s| Ok(s.to_string())).collect())
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LLMClient for ScriptedLlm {
        async fn generate(&self, _config: &LLMConfig, _system: &str, user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(user.to_string());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    fn client(llm: Arc<ScriptedLlm>, max_retries: u32) -> CompletionClient {
        CompletionClient::new(llm, LLMConfig::default(), max_retries)
    }

    #[tokio::test]
    async fn test_returns_first_non_blank_after_retries() {
        let llm = Arc::new(ScriptedLlm::texts(&["", "  \n", "[{\"a\": 1}]"]));
        let completion = client(llm.clone(), 2);

        let text = completion.complete("prompt").await.unwrap();
        assert_eq!(text, "[{\"a\": 1}]");
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_all_blank_exhausts_after_one_plus_retries() {
        let llm = Arc::new(ScriptedLlm::texts(&["", "", "", "never reached"]));
        let completion = client(llm.clone(), 2);

        let err = completion.complete("prompt").await.unwrap_err();
        assert!(matches!(err, AppError::GenerationExhausted { attempts: 3 }));
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_malformed_output_is_not_retried() {
        let llm = Arc::new(ScriptedLlm::texts(&["not json at all", "[]"]));
        let completion = client(llm.clone(), 2);

        assert_eq!(completion.complete("prompt").await.unwrap(), "not json at all");
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_reasoning_only_output_counts_as_blank() {
        let llm = Arc::new(ScriptedLlm::texts(&["<think>hmm</think>", "[1]"]));
        let completion = client(llm.clone(), 1);

        assert_eq!(completion.complete("prompt").await.unwrap(), "[1]");
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_transport_error_propagates_without_retry() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Err(AppError::LLMError("connection refused".to_string())),
            Ok("[]".to_string()),
        ]));
        let completion = client(llm.clone(), 2);

        let err = completion.complete("prompt").await.unwrap_err();
        assert!(matches!(err, AppError::LLMError(_)));
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_call() {
        let llm = Arc::new(ScriptedLlm::texts(&[""]));
        let completion = client(llm.clone(), 0);

        let err = completion.complete("prompt").await.unwrap_err();
        assert!(matches!(err, AppError::GenerationExhausted { attempts: 1 }));
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unbounded_retry_setting_still_calls_model() {
        let llm = Arc::new(ScriptedLlm::texts(&["", "[]"]));
        let completion = client(llm.clone(), u32::MAX);
        assert_eq!(completion.max_attempts(), u32::MAX);

        assert_eq!(completion.complete("prompt").await.unwrap(), "[]");
        assert_eq!(llm.call_count(), 2);
    }
}
