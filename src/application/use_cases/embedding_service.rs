use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::domain::llm_config::LLMProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Opaque text-embedding service.
#[async_trait]
pub trait TextEmbedder {
    /// One vector per input text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[derive(Debug, Serialize)]
struct OpenAIEmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct GeminiEmbeddingRequest {
    content: GeminiEmbeddingContent,
}

#[derive(Debug, Serialize)]
struct GeminiEmbeddingContent {
    parts: Vec<GeminiEmbeddingPart>,
}

#[derive(Debug, Serialize)]
struct GeminiEmbeddingPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbeddingResponse {
    embedding: GeminiEmbeddingResult,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbeddingResult {
    values: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

pub struct EmbeddingService {
    client: Client,
    config: LLMConfig,
}

impl EmbeddingService {
    pub fn new(config: LLMConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn resolve_gemini_embedding_model(model: &str) -> String {
        let trimmed = model.trim().trim_start_matches("models/");
        if trimmed.contains("embedding") {
            trimmed.to_string()
        } else {
            "gemini-embedding-001".to_string()
        }
    }

    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = match self.config.provider {
            LLMProvider::OpenAI => self.generate_openai_embedding(text).await?,
            LLMProvider::Google => self.generate_gemini_embedding(text).await?,
            LLMProvider::Local => self.generate_ollama_embedding(text).await?,
        };
        if embedding.is_empty() {
            return Err(AppError::Internal("Empty embedding response".to_string()));
        }
        Ok(embedding)
    }

    async fn post_json<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &Req,
        bearer: Option<&str>,
    ) -> Result<Resp> {
        let mut req = self.client.post(url);
        if let Some(api_key) = bearer {
            req = req.bearer_auth(api_key);
        }

        let response = req
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                AppError::LLMError(format!("Failed to call embedding API ({}): {}", url, e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::LLMError(format!(
                "Embedding API returned error {}: {}",
                status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            AppError::LLMError(format!("Failed to parse embedding response: {}", e))
        })
    }

    async fn generate_openai_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let base_url = self.config.base_url.trim_end_matches('/');
        let url = format!("{}/embeddings", base_url);

        let request = OpenAIEmbeddingRequest {
            model: self.config.model.clone(),
            input: text.to_string(),
        };

        let response: OpenAIEmbeddingResponse = self
            .post_json(&url, &request, self.config.api_key.as_deref())
            .await?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AppError::LLMError("No embedding data in response".to_string()))
    }

    async fn generate_gemini_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let api_key = self
            .config
            .api_key
            .clone()
            .ok_or_else(|| AppError::LLMError("Missing API key for Google provider".to_string()))?;
        let mut base_url = self.config.base_url.trim_end_matches('/').to_string();
        if !base_url.ends_with("/models") {
            base_url = format!("{}/models", base_url);
        }
        let model_id = Self::resolve_gemini_embedding_model(&self.config.model);
        let url = format!("{}/{}:embedContent?key={}", base_url, model_id, api_key);

        let request = GeminiEmbeddingRequest {
            content: GeminiEmbeddingContent {
                parts: vec![GeminiEmbeddingPart {
                    text: text.to_string(),
                }],
            },
        };

        let response: GeminiEmbeddingResponse = self.post_json(&url, &request, None).await?;
        Ok(response.embedding.values)
    }

    async fn generate_ollama_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", Self::ollama_root(&self.config.base_url));

        let request = OllamaEmbeddingRequest {
            model: self.config.model.clone(),
            prompt: text.to_string(),
        };

        let response: OllamaEmbeddingResponse = self.post_json(&url, &request, None).await?;
        Ok(response.embedding)
    }

    /// Ollama serves embeddings outside the OpenAI-compatible `/v1` prefix.
    fn ollama_root(base_url: &str) -> String {
        base_url
            .trim_end_matches('/')
            .trim_end_matches("/v1")
            .trim_end_matches('/')
            .to_string()
    }

    pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Option<f32> {
        if a.len() != b.len() {
            return None;
        }
        let sum: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
        Some(sum.sqrt())
    }
}

#[async_trait]
impl TextEmbedder for EmbeddingService {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.generate_embedding(text).await?);
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        let distance = EmbeddingService::euclidean_distance(&a, &b).unwrap();
        assert!((distance - 5.0).abs() < 0.001);
        assert_eq!(EmbeddingService::euclidean_distance(&a, &a), Some(0.0));
    }

    #[test]
    fn test_euclidean_distance_dimension_mismatch() {
        assert_eq!(EmbeddingService::euclidean_distance(&[1.0], &[1.0, 2.0]), None);
    }

    #[test]
    fn test_resolve_gemini_embedding_model() {
        assert_eq!(
            EmbeddingService::resolve_gemini_embedding_model("models/text-embedding-004"),
            "text-embedding-004"
        );
        assert_eq!(
            EmbeddingService::resolve_gemini_embedding_model("gemini-2.5-flash"),
            "gemini-embedding-001"
        );
    }

    #[test]
    fn test_ollama_root_strips_v1() {
        assert_eq!(
            EmbeddingService::ollama_root("http://localhost:11434/v1/"),
            "http://localhost:11434"
        );
        assert_eq!(
            EmbeddingService::ollama_root("http://localhost:11434"),
            "http://localhost:11434"
        );
    }
}
