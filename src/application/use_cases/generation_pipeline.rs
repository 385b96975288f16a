//! Generation-and-review pipeline.
//!
//! `RETRIEVE -> SELECT_EXAMPLES -> BUILD_PROMPT -> COMPLETE -> PARSE ->
//! NORMALIZE -> REVIEW`. Retrieval and review degrade on failure; blank
//! generation and unparseable generation abort the run.

use crate::application::use_cases::completion::CompletionClient;
use crate::application::use_cases::example_library::ExampleLibrary;
use crate::application::use_cases::normalizer::normalize;
use crate::application::use_cases::output_parser::parse_output;
use crate::application::use_cases::prompt_builder::{
    compose_user_request, retrieval_query, PromptBuilder,
};
use crate::application::use_cases::retrieval_store::RetrievalStore;
use crate::application::use_cases::review_stage::{ReviewStage, DEFAULT_REVIEW_CONTEXT_CHARS};
use crate::domain::error::Result;
use crate::domain::requirement::PipelineRequest;
use crate::domain::test_case::PipelineResult;
use crate::shared::text::preview_text;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Retrieve,
    SelectExamples,
    BuildPrompt,
    Complete,
    Parse,
    Normalize,
    Review,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Retrieve => "retrieve",
            PipelineStage::SelectExamples => "select_examples",
            PipelineStage::BuildPrompt => "build_prompt",
            PipelineStage::Complete => "complete",
            PipelineStage::Parse => "parse",
            PipelineStage::Normalize => "normalize",
            PipelineStage::Review => "review",
            PipelineStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Tunables for one pipeline instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub max_retries: u32,
    pub retrieval_k: usize,
    pub review_context_chars: usize,
    pub min_cases: usize,
    pub max_cases: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retrieval_k: 3,
            review_context_chars: DEFAULT_REVIEW_CONTEXT_CHARS,
            min_cases: 10,
            max_cases: 15,
        }
    }
}

pub struct GenerationPipeline {
    retrieval: Arc<RetrievalStore>,
    examples: Arc<ExampleLibrary>,
    completion: CompletionClient,
    prompts: PromptBuilder,
    review: ReviewStage,
    retrieval_k: usize,
}

impl GenerationPipeline {
    pub fn new(
        retrieval: Arc<RetrievalStore>,
        examples: Arc<ExampleLibrary>,
        completion: CompletionClient,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            retrieval,
            examples,
            completion,
            prompts: PromptBuilder::new(settings.min_cases, settings.max_cases),
            review: ReviewStage::new(settings.review_context_chars),
            retrieval_k: settings.retrieval_k,
        }
    }

    pub async fn run(&self, request: &PipelineRequest) -> Result<PipelineResult> {
        let started = Instant::now();

        debug!(stage = %PipelineStage::Retrieve, "Pipeline stage");
        let query = retrieval_query(request);
        let context_text = match self.retrieval.query(&query, self.retrieval_k).await {
            Ok(docs) => {
                debug!(documents = docs.len(), "Retrieved reference context");
                docs.join("\n\n")
            }
            Err(err) => {
                warn!(error = %err, "Retrieval degraded, continuing without context");
                String::new()
            }
        };

        debug!(stage = %PipelineStage::SelectExamples, alm_tool = %request.alm_tool, "Pipeline stage");
        let few_shot = self.examples.get(&request.alm_tool);
        let few_shot_text = few_shot.render_text();
        let columns = few_shot.columns.clone();

        debug!(stage = %PipelineStage::BuildPrompt, "Pipeline stage");
        let user_text = compose_user_request(request);
        let prompt =
            self.prompts
                .build_generation_prompt(&user_text, &columns, &few_shot_text, &context_text);

        debug!(stage = %PipelineStage::Complete, "Pipeline stage");
        let raw = self.completion.complete(&prompt).await.map_err(|err| {
            error!(stage = %PipelineStage::Complete, error = %err, "Generation failed");
            err
        })?;

        debug!(stage = %PipelineStage::Parse, output = %preview_text(&raw, 200), "Pipeline stage");
        let (items, generation_output) = parse_output(&raw)?;

        debug!(stage = %PipelineStage::Normalize, items = items.len(), "Pipeline stage");
        let raw_records = normalize(&items, &columns);

        debug!(stage = %PipelineStage::Review, "Pipeline stage");
        let reviewed_records = self
            .review
            .review(
                &self.completion,
                &self.prompts,
                &raw_records,
                &columns,
                &context_text,
                &few_shot_text,
            )
            .await;

        info!(
            stage = %PipelineStage::Done,
            alm_tool = %few_shot.alm_tool,
            raw = raw_records.len(),
            reviewed = reviewed_records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline completed"
        );

        Ok(PipelineResult {
            alm_tool: few_shot.alm_tool,
            raw_records,
            reviewed_records,
            column_schema: columns,
            prompt_used: prompt,
            generation_output,
        })
    }
}
