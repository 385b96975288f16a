use std::sync::{Arc, Mutex};

use tracing::{error, info};

use crate::application::use_cases::completion::CompletionClient;
use crate::application::use_cases::embedding_service::EmbeddingService;
use crate::application::use_cases::example_library::ExampleLibrary;
use crate::application::use_cases::generate_testcases::GenerateTestCasesUseCase;
use crate::application::use_cases::generation_pipeline::GenerationPipeline;
use crate::application::use_cases::retrieval_store::RetrievalStore;
use crate::domain::error::Result;
use crate::infrastructure::config::{AppConfig, ConfigService};
use crate::infrastructure::llm_clients::{LLMClient, RouterClient};
use crate::infrastructure::seed::ensure_seeded;
use crate::infrastructure::session_store::{InMemorySessionStore, SessionStore};
use crate::infrastructure::storage::DataLayout;
use crate::interfaces::http::{add_log, HttpState};

/// Seeds the data directory and wires the pipeline behind the HTTP state.
pub fn setup(config: &AppConfig) -> Result<HttpState> {
    let logs = Arc::new(Mutex::new(Vec::new()));

    let layout = DataLayout::new(&config.data_dir);
    let created = ensure_seeded(&layout).map_err(|err| {
        error!(error = %err, data_dir = %config.data_dir.display(), "Failed to seed data dir");
        err
    })?;
    if created > 0 {
        add_log(
            &logs,
            "INFO",
            "Bootstrap",
            &format!("Seeded {} reference files in {}", created, layout.root().display()),
        );
    }

    let config_service = ConfigService::new();
    let mut llm_config = config.llm.clone();
    config_service.resolve_api_key(&mut llm_config);
    let mut embedding_config = config.embedding.clone();
    config_service.resolve_api_key(&mut embedding_config);

    let embedder = Arc::new(EmbeddingService::new(embedding_config));
    let retrieval = Arc::new(RetrievalStore::load(layout.rag_dir(), embedder));
    let examples = Arc::new(ExampleLibrary::new(layout.examples_dir()));

    let llm_client: Arc<dyn LLMClient + Send + Sync> = Arc::new(RouterClient::new());
    let completion = CompletionClient::new(llm_client, llm_config, config.pipeline.max_retries);
    let pipeline = Arc::new(GenerationPipeline::new(
        retrieval,
        examples,
        completion,
        &config.pipeline,
    ));

    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let generate = Arc::new(GenerateTestCasesUseCase::new(
        pipeline,
        sessions.clone(),
        layout.uploads_dir(),
    ));

    info!(
        provider = ?config.llm.provider,
        model = %config.llm.model,
        max_retries = config.pipeline.max_retries,
        "Pipeline ready"
    );

    Ok(HttpState {
        generate,
        sessions,
        logs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm_config::{LLMConfig, LLMProvider};

    #[test]
    fn test_setup_seeds_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let local = LLMConfig {
            provider: LLMProvider::Local,
            base_url: "http://localhost:11434/v1".to_string(),
            ..LLMConfig::default()
        };
        let config = AppConfig {
            data_dir: dir.path().join("data"),
            llm: local.clone(),
            embedding: local,
            ..AppConfig::default()
        };

        let state = setup(&config).unwrap();
        assert_eq!(state.sessions.len().unwrap(), 0);
        assert!(dir.path().join("data/examples/jira_testcase_eg.csv").exists());
        assert!(dir.path().join("data/rag/healthcare_compliance.txt").exists());
        assert_eq!(state.logs.lock().unwrap().len(), 1);
    }
}
