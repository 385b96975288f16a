//! Prompt templates for the generation and review calls.

use crate::domain::requirement::PipelineRequest;
use crate::domain::test_case::ColumnSchema;
use crate::shared::text::truncate_chars;

pub const DEFAULT_RETRIEVAL_QUERY: &str = "healthcare requirements";

pub struct PromptBuilder {
    min_cases: usize,
    max_cases: usize,
}

impl PromptBuilder {
    pub fn new(min_cases: usize, max_cases: usize) -> Self {
        Self {
            min_cases: min_cases.min(max_cases),
            max_cases: max_cases.max(min_cases),
        }
    }

    /// Generation prompt. Same inputs always produce the same text.
    pub fn build_generation_prompt(
        &self,
        user_text: &str,
        columns: &ColumnSchema,
        few_shot_text: &str,
        context_text: &str,
    ) -> String {
        format!(
            "\nYou are an expert QA engineer specializing in healthcare software.\n\
             Based on the following user request, generate {min}-{max} unique test cases.\n\
             Include Positive, Negative, Security, Performance, and Usability scenarios.\n\
             \n\
             Relevant docs:\n\
             {context}\n\
             \n\
             Few-shot examples:\n\
             {few_shot}\n\
             \n\
             User Request: '{request}'\n\
             \n\
             Return strictly valid JSON array where each object has keys: {keys}.\n\
             Do not include explanations or markdown.\n",
            min = self.min_cases,
            max = self.max_cases,
            context = context_text,
            few_shot = few_shot_text,
            request = user_text,
            keys = columns.quoted_list(),
        )
    }

    /// Review prompt over already-normalized records. Only the first
    /// `context_chars` characters of the context are included.
    pub fn build_review_prompt(
        &self,
        cases_json: &str,
        columns: &ColumnSchema,
        context_text: &str,
        few_shot_text: &str,
        context_chars: usize,
    ) -> String {
        format!(
            "\nYou are an expert QA reviewer for healthcare systems. You will receive a JSON array of test cases.\n\
             Each test case has keys: {keys}.\n\
             \n\
             Tasks (perform all):\n\
             1. Remove exact duplicates.\n\
             2. Identify missing negative or security scenarios and add up to 3 suggested test cases (if applicable).\n\
             3. Ensure fields are non-empty where possible (fill brief suggestions if empty).\n\
             4. Check alignment to compliance items in the following context (if provided): {context}\n\
             5. Produce a cleaned JSON array of objects using the same keys. For any added test case, generate a TestCaseID (prefix REV-XXXX).\n\
             \n\
             Input test cases:\n\
             {cases}\n\
             \n\
             Few-shot examples for format:\n\
             {few_shot}\n\
             \n\
             Return only valid JSON array (no commentary).\n",
            keys = columns.quoted_list(),
            context = truncate_chars(context_text, context_chars),
            cases = cases_json,
            few_shot = few_shot_text,
        )
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(10, 15)
    }
}

/// Text used to query the retrieval store.
pub fn retrieval_query(request: &PipelineRequest) -> String {
    let typed = request.typed_requirements.join(" ");
    if !typed.is_empty() {
        return typed;
    }
    match request.external_prompt.as_deref() {
        Some(prompt) if !prompt.is_empty() => prompt.to_string(),
        _ => DEFAULT_RETRIEVAL_QUERY.to_string(),
    }
}

/// User request text: typed requirements, uploaded file contents and ALM
/// references in labelled sections. An explicit external prompt wins.
pub fn compose_user_request(request: &PipelineRequest) -> String {
    if let Some(prompt) = request.external_prompt.as_deref() {
        if !prompt.is_empty() {
            return prompt.to_string();
        }
    }

    let mut sections = Vec::new();
    if !request.typed_requirements.is_empty() {
        sections.push(format!(
            "Typed Requirements:\n{}",
            request.typed_requirements.join("\n")
        ));
    }
    if !request.uploaded_files.is_empty() {
        let files = request
            .uploaded_files
            .iter()
            .map(|f| format!("{}\n{}", f.file_name, f.content))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!("Uploaded Files Content:\n{}", files));
    }
    if !request.alm_inputs.is_empty() {
        let alm_json = serde_json::to_string(&request.alm_inputs).unwrap_or_default();
        sections.push(format!("ALM Inputs:\n{}", alm_json));
    }

    let composed = sections.join("\n").trim().to_string();
    if composed.is_empty() {
        retrieval_query(request)
    } else {
        composed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::requirement::{AlmInput, UploadedFile};

    #[test]
    fn test_generation_prompt_lists_keys_and_range() {
        let builder = PromptBuilder::default();
        let prompt = builder.build_generation_prompt(
            "Patients can book appointments",
            &ColumnSchema::default(),
            "TestCaseID  Description",
            "PHI must be protected.",
        );

        assert!(prompt.contains("generate 10-15 unique test cases"));
        assert!(prompt.contains("Positive, Negative, Security, Performance, and Usability"));
        assert!(prompt.contains(
            "keys: \"TestCaseID\", \"Description\", \"Requirement\", \"ExpectedResult\", \"Priority\", \"Notes\"."
        ));
        assert!(prompt.contains("User Request: 'Patients can book appointments'"));
        assert!(prompt.contains("Relevant docs:\nPHI must be protected.\n"));
        assert!(prompt.contains("Do not include explanations or markdown."));
    }

    #[test]
    fn test_generation_prompt_is_deterministic() {
        let builder = PromptBuilder::new(3, 5);
        let columns = ColumnSchema::new(["ID"]);
        let a = builder.build_generation_prompt("x", &columns, "f", "c");
        let b = builder.build_generation_prompt("x", &columns, "f", "c");
        assert_eq!(a, b);
        assert!(a.contains("generate 3-5 unique"));
    }

    #[test]
    fn test_review_prompt_truncates_context_by_chars() {
        let builder = PromptBuilder::default();
        let context = "é".repeat(1500);
        let prompt =
            builder.build_review_prompt("[]", &ColumnSchema::default(), &context, "", 1000);

        assert_eq!(prompt.matches('é').count(), 1000);
        assert!(prompt.contains("prefix REV-XXXX"));
        assert!(prompt.contains("Input test cases:\n[]\n"));
    }

    #[test]
    fn test_compose_user_request_sections() {
        let mut request = PipelineRequest::typed(
            vec!["Login works".to_string(), "Logout works".to_string()],
            "jira",
        );
        request.uploaded_files.push(UploadedFile {
            file_name: "notes.txt".to_string(),
            content: "Session expires after 15 minutes".to_string(),
        });
        request.alm_inputs.insert(
            "jira".to_string(),
            AlmInput {
                tickets: vec!["HC-1".to_string()],
                items: vec![],
            },
        );

        assert_eq!(
            compose_user_request(&request),
            "Typed Requirements:\nLogin works\nLogout works\n\
             Uploaded Files Content:\nnotes.txt\nSession expires after 15 minutes\n\
             ALM Inputs:\n{\"jira\":{\"tickets\":[\"HC-1\"]}}"
        );
    }

    #[test]
    fn test_external_prompt_replaces_composed_text() {
        let mut request = PipelineRequest::typed(vec!["ignored".to_string()], "jira");
        request.external_prompt = Some("Use this instead".to_string());
        assert_eq!(compose_user_request(&request), "Use this instead");
        assert_eq!(retrieval_query(&request), "ignored");
    }

    #[test]
    fn test_empty_request_falls_back_to_default_query() {
        let request = PipelineRequest::default();
        assert_eq!(retrieval_query(&request), DEFAULT_RETRIEVAL_QUERY);
        assert_eq!(compose_user_request(&request), DEFAULT_RETRIEVAL_QUERY);
    }
}
