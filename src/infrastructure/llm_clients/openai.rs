use super::LLMClient;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use async_trait::async_trait;
use serde_json::json;

/// Client for OpenAI-compatible `/chat/completions` endpoints, including local
/// servers that do not require a key.
pub struct OpenAIClient {
    client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    fn endpoint(config: &LLMConfig, path: &str) -> String {
        if config.base_url.ends_with('/') {
            format!("{}{}", config.base_url, path)
        } else {
            format!("{}/{}", config.base_url, path)
        }
    }

    fn build_messages(system: &str, user: &str) -> serde_json::Value {
        let mut messages = Vec::new();
        if !system.trim().is_empty() {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": user }));
        serde_json::Value::Array(messages)
    }
}

impl Default for OpenAIClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate(&self, config: &LLMConfig, system: &str, user: &str) -> Result<String> {
        let url = Self::endpoint(config, "chat/completions");

        let body = json!({
            "model": config.model,
            "messages": Self::build_messages(system, user),
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::LLMError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::LLMError(format!(
                "API error ({}): {}",
                status, text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::LLMError(format!("Failed to parse JSON: {}", e)))?;

        if json["choices"].as_array().map_or(true, |c| c.is_empty()) {
            return Err(AppError::LLMError(
                "Invalid response format: missing choices".to_string(),
            ));
        }

        // A null content is an empty completion, which the caller retries.
        Ok(json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }
}
