//! Layered configuration: built-in defaults, then `caseforge.toml`, then
//! `CASEFORGE_*` environment variables (`__` separates nested keys).

use crate::application::use_cases::generation_pipeline::PipelineSettings;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{LLMConfig, LLMProvider};
use crate::infrastructure::security::keyring::KeyringManager;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const KEYRING_SERVICE: &str = "caseforge";
pub const DEFAULT_CONFIG_FILE: &str = "caseforge.toml";
const ENV_PREFIX: &str = "CASEFORGE_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub data_dir: PathBuf,
    pub llm: LLMConfig,
    pub embedding: LLMConfig,
    pub pipeline: PipelineSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            data_dir: PathBuf::from("data"),
            llm: LLMConfig::default(),
            embedding: LLMConfig::default_embedding(),
            pipeline: PipelineSettings::default(),
        }
    }
}

impl AppConfig {
    /// Loads `.env`, then the config file named by `CASEFORGE_CONFIG`
    /// (default `caseforge.toml`), then the environment.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env");
        }
        let path = std::env::var("CASEFORGE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::extract(Self::figment(&path).merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Defaults layered with the TOML file at `path`, if it exists.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::file(path))
    }

    pub fn extract(figment: Figment) -> Result<Self> {
        figment
            .extract()
            .map_err(|e| AppError::ConfigError(format!("Invalid configuration: {}", e)))
    }
}

pub struct ConfigService {
    keyring: KeyringManager,
}

impl ConfigService {
    pub fn new() -> Self {
        Self {
            keyring: KeyringManager::new(KEYRING_SERVICE),
        }
    }

    pub fn get_api_key(&self, provider: LLMProvider) -> Result<Option<String>> {
        self.keyring.get_secret(provider.keyring_key())
    }

    /// Fills a missing API key from the keyring. Local servers need none.
    pub fn resolve_api_key(&self, config: &mut LLMConfig) {
        let has_key = config
            .api_key
            .as_deref()
            .map_or(false, |key| !key.trim().is_empty());
        if has_key || config.provider == LLMProvider::Local {
            return;
        }

        match self.get_api_key(config.provider) {
            Ok(Some(key)) => config.api_key = Some(key),
            Ok(None) => warn!(
                provider = config.provider.keyring_key(),
                "No API key configured or stored in keyring"
            ),
            Err(err) => warn!(
                provider = config.provider.keyring_key(),
                error = %err,
                "Keyring lookup failed"
            ),
        }
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::extract(AppConfig::figment(&dir.path().join("missing.toml"))).unwrap();

        assert_eq!(config.server.port, 3001);
        assert_eq!(config.pipeline.max_retries, 2);
        assert_eq!(config.pipeline.retrieval_k, 3);
        assert_eq!(config.pipeline.review_context_chars, 1000);
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.embedding.model, "gemini-embedding-001");
    }

    #[test]
    fn test_toml_overrides_nested_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caseforge.toml");
        fs::write(
            &path,
            r#"
data_dir = "/var/lib/caseforge"

[server]
port = 8080

[llm]
provider = "Local"
base_url = "http://localhost:11434/v1"
model = "llama3.1"

[pipeline]
max_retries = 4
"#,
        )
        .unwrap();

        let config = AppConfig::extract(AppConfig::figment(&path)).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/caseforge"));
        assert_eq!(config.llm.provider, LLMProvider::Local);
        assert_eq!(config.llm.max_tokens, Some(8192));
        assert_eq!(config.pipeline.max_retries, 4);
        assert_eq!(config.pipeline.min_cases, 10);
    }

    #[test]
    fn test_invalid_value_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caseforge.toml");
        fs::write(&path, "[server]\nport = \"not a number\"\n").unwrap();

        let err = AppConfig::extract(AppConfig::figment(&path)).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_local_provider_needs_no_key() {
        let mut config = LLMConfig {
            provider: LLMProvider::Local,
            ..LLMConfig::default()
        };
        ConfigService::new().resolve_api_key(&mut config);
        assert!(config.api_key.is_none());
    }
}
