//! Second-pass AI review of generated test cases.
//!
//! The review can only improve a run: every failure falls back to the
//! records it was given.

use crate::application::use_cases::completion::CompletionClient;
use crate::application::use_cases::normalizer::normalize;
use crate::application::use_cases::output_parser::parse_output;
use crate::application::use_cases::prompt_builder::PromptBuilder;
use crate::domain::error::{AppError, Result};
use crate::domain::test_case::{ColumnSchema, TestCaseRecord, ID_COLUMN};
use std::collections::HashSet;
use tracing::{info, warn};

pub const DEFAULT_REVIEW_CONTEXT_CHARS: usize = 1000;
const REVIEW_ID_PREFIX: &str = "REV-";

pub struct ReviewStage {
    context_chars: usize,
}

impl ReviewStage {
    pub fn new(context_chars: usize) -> Self {
        Self { context_chars }
    }

    /// Reviewed records with the same key set as `records`. On any failure
    /// (transport, blank output, unparseable output) returns `records` unchanged.
    pub async fn review(
        &self,
        completion: &CompletionClient,
        prompts: &PromptBuilder,
        records: &[TestCaseRecord],
        columns: &ColumnSchema,
        context_text: &str,
        few_shot_text: &str,
    ) -> Vec<TestCaseRecord> {
        match self
            .try_review(completion, prompts, records, columns, context_text, few_shot_text)
            .await
        {
            Ok(reviewed) => {
                info!(
                    input = records.len(),
                    reviewed = reviewed.len(),
                    "Review completed"
                );
                reviewed
            }
            Err(err) => {
                warn!(error = %err, "Review degraded, returning original cases");
                records.to_vec()
            }
        }
    }

    async fn try_review(
        &self,
        completion: &CompletionClient,
        prompts: &PromptBuilder,
        records: &[TestCaseRecord],
        columns: &ColumnSchema,
        context_text: &str,
        few_shot_text: &str,
    ) -> Result<Vec<TestCaseRecord>> {
        let cases_json = serde_json::to_string_pretty(records)?;
        let prompt = prompts.build_review_prompt(
            &cases_json,
            columns,
            context_text,
            few_shot_text,
            self.context_chars,
        );
        info!(prompt_chars = prompt.chars().count(), "Sending review prompt");

        let raw = completion.complete_once(&prompt).await?;
        if raw.trim().is_empty() {
            return Err(AppError::LLMError("Reviewer returned empty output".to_string()));
        }

        let (items, _) = parse_output(&raw)?;
        let mut reviewed = dedup_exact(normalize(&items, columns));
        assign_review_ids(&mut reviewed, columns);
        Ok(reviewed)
    }
}

impl Default for ReviewStage {
    fn default() -> Self {
        Self::new(DEFAULT_REVIEW_CONTEXT_CHARS)
    }
}

/// Drops records whose every field equals an earlier record, keeping the first.
pub fn dedup_exact(records: Vec<TestCaseRecord>) -> Vec<TestCaseRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.clone()))
        .collect()
}

/// Fills empty `TestCaseID`s with `REV-0001`, `REV-0002`, ... skipping ids
/// already present in the set.
pub fn assign_review_ids(records: &mut [TestCaseRecord], columns: &ColumnSchema) {
    if !columns.contains(ID_COLUMN) {
        return;
    }

    let mut taken: HashSet<String> = records
        .iter()
        .filter_map(|r| r.get(ID_COLUMN))
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
        .collect();

    let mut counter = 0u32;
    for record in records.iter_mut() {
        let empty = record.get(ID_COLUMN).map_or(false, |id| id.trim().is_empty());
        if !empty {
            continue;
        }
        let id = loop {
            counter += 1;
            let candidate = format!("{}{:04}", REVIEW_ID_PREFIX, counter);
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        taken.insert(id.clone());
        record.set(ID_COLUMN, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::completion::tests::ScriptedLlm;
    use crate::domain::llm_config::LLMConfig;
    use std::sync::Arc;

    fn columns() -> ColumnSchema {
        ColumnSchema::default()
    }

    fn record(id: &str, description: &str) -> TestCaseRecord {
        TestCaseRecord::from_values(&columns(), [id, description, "Req", "Ok", "High", ""])
    }

    fn stage_with(llm: Arc<ScriptedLlm>) -> CompletionClient {
        CompletionClient::new(llm, LLMConfig::default(), 2)
    }

    async fn run_review(llm: Arc<ScriptedLlm>, records: &[TestCaseRecord]) -> Vec<TestCaseRecord> {
        let completion = stage_with(llm);
        ReviewStage::default()
            .review(
                &completion,
                &PromptBuilder::default(),
                records,
                &columns(),
                "PHI must be protected.",
                "TestCaseID  Description",
            )
            .await
    }

    #[tokio::test]
    async fn test_transport_error_returns_original_records() {
        let llm = Arc::new(ScriptedLlm::new(vec![Err(AppError::LLMError(
            "timeout".to_string(),
        ))]));
        let records = vec![record("TC1", "Login")];

        assert_eq!(run_review(llm.clone(), &records).await, records);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_output_returns_original_records() {
        let llm = Arc::new(ScriptedLlm::texts(&["Looks good to me!"]));
        let records = vec![record("TC1", "Login"), record("TC2", "Logout")];
        assert_eq!(run_review(llm, &records).await, records);
    }

    #[tokio::test]
    async fn test_non_array_output_returns_original_records() {
        let llm = Arc::new(ScriptedLlm::texts(&["{\"TestCaseID\": \"TC9\"}"]));
        let records = vec![record("TC1", "Login")];
        assert_eq!(run_review(llm, &records).await, records);
    }

    #[tokio::test]
    async fn test_blank_output_is_not_retried() {
        let llm = Arc::new(ScriptedLlm::texts(&["", "[]"]));
        let records = vec![record("TC1", "Login")];
        assert_eq!(run_review(llm.clone(), &records).await, records);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_successful_review_is_normalized_deduplicated_and_numbered() {
        let reviewed_json = r#"```json
[
  {"TestCaseID": "TC1", "Description": "Login", "Requirement": "Req", "ExpectedResult": "Ok", "Priority": "High", "Notes": ""},
  {"TestCaseID": "TC1", "Description": "Login", "Requirement": "Req", "ExpectedResult": "Ok", "Priority": "High", "Notes": ""},
  {"TestCaseID": "", "Description": "SQL injection on login", "Severity": "Critical"},
  {"Description": "Brute force lockout"}
]
```"#;
        let llm = Arc::new(ScriptedLlm::texts(&[reviewed_json]));
        let records = vec![record("TC1", "Login"), record("TC1", "Login")];

        let reviewed = run_review(llm.clone(), &records).await;
        assert_eq!(reviewed.len(), 3);
        assert_eq!(reviewed[0], record("TC1", "Login"));
        assert_eq!(reviewed[1].get("TestCaseID"), Some("REV-0001"));
        assert_eq!(reviewed[2].get("TestCaseID"), Some("REV-0002"));
        for r in &reviewed {
            assert_eq!(r.keys().count(), 6);
        }

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("\"TestCaseID\": \"TC1\""));
        assert!(prompts[0].contains("PHI must be protected."));
    }

    #[test]
    fn test_assign_review_ids_skips_taken_ids() {
        let schema = columns();
        let mut records = vec![record("REV-0001", "Existing"), record("", "New")];
        assign_review_ids(&mut records, &schema);
        assert_eq!(records[1].get("TestCaseID"), Some("REV-0002"));
    }

    #[test]
    fn test_assign_review_ids_requires_id_column() {
        let schema = ColumnSchema::new(["Title"]);
        let mut records = vec![TestCaseRecord::empty(&schema)];
        assign_review_ids(&mut records, &schema);
        assert_eq!(records[0].get("Title"), Some(""));
    }
}
