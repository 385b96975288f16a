//! Similarity search over the small compliance/reference corpus.

use crate::application::use_cases::embedding_service::{EmbeddingService, TextEmbedder};
use crate::domain::error::{AppError, Result};
use crate::shared::text::render_aligned_table;
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub const COMPLIANCE_DOC: &str = "healthcare_compliance.txt";
pub const REQUIREMENTS_DOC: &str = "req_example.json";
pub const TRACEABILITY_DOC: &str = "traceability_matrix_eg.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDocument {
    pub name: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct RequirementExample {
    #[serde(default)]
    requirement: String,
    #[serde(default)]
    testcases: Vec<String>,
}

pub struct RetrievalStore {
    documents: Vec<ReferenceDocument>,
    embedder: Arc<dyn TextEmbedder + Send + Sync>,
    vectors: OnceCell<Vec<Vec<f32>>>,
}

impl RetrievalStore {
    pub fn new(
        documents: Vec<ReferenceDocument>,
        embedder: Arc<dyn TextEmbedder + Send + Sync>,
    ) -> Self {
        Self {
            documents,
            embedder,
            vectors: OnceCell::new(),
        }
    }

    /// Loads the reference corpus from `rag_dir`. Missing or unreadable
    /// documents are skipped.
    pub fn load(rag_dir: &Path, embedder: Arc<dyn TextEmbedder + Send + Sync>) -> Self {
        let documents = load_documents(rag_dir);
        info!(
            dir = %rag_dir.display(),
            documents = documents.len(),
            "Loaded retrieval corpus"
        );
        Self::new(documents, embedder)
    }

    /// Up to `k` document bodies ordered by ascending Euclidean distance to `text`.
    ///
    /// Document vectors are computed on the first call and reused afterwards.
    /// A failed initialization leaves the cache empty so the next call retries.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<String>> {
        if self.documents.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let vectors = self
            .vectors
            .get_or_try_init(|| async {
                let bodies: Vec<String> =
                    self.documents.iter().map(|d| d.body.clone()).collect();
                let vectors = self.embedder.embed_batch(&bodies).await?;
                if vectors.len() != bodies.len() {
                    return Err(AppError::Internal(format!(
                        "Embedder returned {} vectors for {} documents",
                        vectors.len(),
                        bodies.len()
                    )));
                }
                debug!(documents = vectors.len(), "Embedded retrieval corpus");
                Ok(vectors)
            })
            .await?;

        let query_vector = self
            .embedder
            .embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Internal("Embedder returned no query vector".to_string()))?;

        let mut ranked: Vec<(usize, f32)> = vectors
            .iter()
            .enumerate()
            .filter_map(|(idx, vector)| {
                EmbeddingService::euclidean_distance(&query_vector, vector).map(|d| (idx, d))
            })
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

        Ok(ranked
            .into_iter()
            .take(k)
            .filter_map(|(idx, _)| self.documents.get(idx).map(|d| d.body.clone()))
            .collect())
    }
}

pub fn load_documents(rag_dir: &Path) -> Vec<ReferenceDocument> {
    let loaders: [(&str, fn(&Path) -> Result<String>); 3] = [
        (REQUIREMENTS_DOC, load_requirement_examples),
        (TRACEABILITY_DOC, load_table),
        (COMPLIANCE_DOC, load_plain_text),
    ];

    loaders
        .iter()
        .filter_map(|(name, loader)| {
            let path = rag_dir.join(name);
            match loader(&path) {
                Ok(body) if !body.trim().is_empty() => Some(ReferenceDocument {
                    name: name.to_string(),
                    body,
                }),
                Ok(_) => {
                    warn!(path = %path.display(), "Skipping empty reference document");
                    None
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Skipping reference document");
                    None
                }
            }
        })
        .collect()
}

fn load_plain_text(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| AppError::IoError(format!("Failed to read {}: {}", path.display(), e)))
}

/// `[{requirement, testcases: [...]}, ...]` flattened to one space-joined line.
fn load_requirement_examples(path: &Path) -> Result<String> {
    let content = load_plain_text(path)?;
    let examples: Vec<RequirementExample> = serde_json::from_str(&content)?;
    Ok(examples
        .iter()
        .map(|example| {
            let mut parts = vec![example.requirement.as_str()];
            parts.extend(example.testcases.iter().map(String::as_str));
            parts.join(" ")
        })
        .collect::<Vec<_>>()
        .join(" "))
}

fn load_table(path: &Path) -> Result<String> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| AppError::IoError(format!("Failed to open {}: {}", path.display(), e)))?;

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::ParseError(format!("Failed to read header: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| AppError::ParseError(format!("Invalid row: {}", e)))?;
        rows.push(row.iter().map(str::to_string).collect::<Vec<_>>());
    }

    Ok(render_aligned_table(&header, &rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Maps text to a 3-dim keyword vector: (encrypt, login, trace).
    struct KeywordEmbedder {
        batches: AtomicUsize,
        fail_first: AtomicUsize,
    }

    impl KeywordEmbedder {
        fn new() -> Self {
            Self {
                batches: AtomicUsize::new(0),
                fail_first: AtomicUsize::new(0),
            }
        }

        fn failing_once() -> Self {
            Self {
                batches: AtomicUsize::new(0),
                fail_first: AtomicUsize::new(1),
            }
        }

        fn vector(text: &str) -> Vec<f32> {
            let lower = text.to_lowercase();
            ["encrypt", "login", "trace"]
                .iter()
                .map(|kw| lower.matches(kw).count() as f32)
                .collect()
        }
    }

    #[async_trait]
    impl TextEmbedder for KeywordEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            if self
                .fail_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(AppError::LLMError("embedding service offline".to_string()));
            }
            Ok(texts.iter().map(|t| Self::vector(t)).collect())
        }
    }

    fn doc(name: &str, body: &str) -> ReferenceDocument {
        ReferenceDocument {
            name: name.to_string(),
            body: body.to_string(),
        }
    }

    fn corpus() -> Vec<ReferenceDocument> {
        vec![
            doc("a", "Encrypt PHI. Encrypt at rest."),
            doc("b", "Valid login, invalid login"),
            doc("c", "Trace matrix"),
        ]
    }

    #[tokio::test]
    async fn test_query_orders_by_distance_and_caps_k() {
        let store = RetrievalStore::new(corpus(), Arc::new(KeywordEmbedder::new()));

        let results = store.query("login and login", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], "Valid login, invalid login");

        let all = store.query("encrypt encrypt", 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], "Encrypt PHI. Encrypt at rest.");
    }

    #[tokio::test]
    async fn test_documents_are_embedded_once() {
        let embedder = Arc::new(KeywordEmbedder::new());
        let store = RetrievalStore::new(corpus(), embedder.clone());

        store.query("login", 1).await.unwrap();
        store.query("trace", 1).await.unwrap();

        // one corpus batch plus one batch per query
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_initialization_is_retried() {
        let embedder = Arc::new(KeywordEmbedder::failing_once());
        let store = RetrievalStore::new(corpus(), embedder);

        assert!(store.query("login", 1).await.is_err());
        let results = store.query("login", 1).await.unwrap();
        assert_eq!(results, vec!["Valid login, invalid login".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_corpus_returns_nothing() {
        let store = RetrievalStore::new(Vec::new(), Arc::new(KeywordEmbedder::new()));
        assert!(store.query("anything", 3).await.unwrap().is_empty());
    }

    #[test]
    fn test_load_documents_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(COMPLIANCE_DOC), "PHI must be protected.\n").unwrap();
        fs::write(
            dir.path().join(REQUIREMENTS_DOC),
            r#"[{"requirement": "Authenticate users", "testcases": ["Valid login", "Invalid login"]},
                {"requirement": "Encrypt PHI", "testcases": ["Encrypt in transit"]}]"#,
        )
        .unwrap();

        let docs = load_documents(dir.path());
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].name, REQUIREMENTS_DOC);
        assert_eq!(
            docs[0].body,
            "Authenticate users Valid login Invalid login Encrypt PHI Encrypt in transit"
        );
        assert_eq!(docs[1].body, "PHI must be protected.\n");
    }

    #[test]
    fn test_table_document_is_rendered_aligned() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(TRACEABILITY_DOC),
            "ReqID,Requirement,Trace\nR1,Authenticate users,TC001\n",
        )
        .unwrap();

        let docs = load_documents(dir.path());
        assert_eq!(docs.len(), 1);
        assert_eq!(
            docs[0].body,
            "ReqID  Requirement         Trace\nR1     Authenticate users  TC001"
        );
    }
}
