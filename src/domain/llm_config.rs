use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum LLMProvider {
    /// OpenAI-compatible local server (Ollama, LM Studio).
    Local,
    OpenAI,
    Google,
}

impl LLMProvider {
    /// Key under which the provider's API key is stored in the OS keyring.
    pub fn keyring_key(&self) -> &'static str {
        match self {
            LLMProvider::Local => "local",
            LLMProvider::OpenAI => "openai",
            LLMProvider::Google => "google",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl LLMConfig {
    /// Default embedding endpoint, paired with [`LLMConfig::default`].
    pub fn default_embedding() -> Self {
        Self {
            model: "gemini-embedding-001".to_string(),
            max_tokens: None,
            temperature: None,
            ..Self::default()
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::Google,
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key: None,
            max_tokens: Some(8192),
            temperature: Some(0.4),
        }
    }
}
