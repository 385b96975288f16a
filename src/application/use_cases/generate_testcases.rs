//! Runs the pipeline for one user request and persists its artifacts.

use crate::application::use_cases::generation_pipeline::GenerationPipeline;
use crate::domain::error::Result;
use crate::domain::generation_session::GenerationSession;
use crate::domain::requirement::{PipelineRequest, RequirementInput};
use crate::domain::test_case::{ColumnSchema, TestCaseRecord};
use crate::infrastructure::export::{write_raw_json, write_reviewed_csv};
use crate::infrastructure::session_store::SessionStore;
use crate::infrastructure::storage::{ensure_dir, safe_file_component, sha256_hex};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub const PREVIEW_ROWS: usize = 10;

#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub session: GenerationSession,
    pub columns: ColumnSchema,
    /// First reviewed records, for display.
    pub preview: Vec<TestCaseRecord>,
    pub raw_file_name: String,
    pub reviewed_file_name: String,
}

/// Requirement sources in one request, by kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InputCounts {
    pub typed: usize,
    pub files: usize,
    pub alm_references: usize,
}

impl InputCounts {
    pub fn of(request: &PipelineRequest) -> Self {
        request
            .inputs()
            .iter()
            .fold(Self::default(), |mut counts, input| {
                match input {
                    RequirementInput::Typed { .. } => counts.typed += 1,
                    RequirementInput::File { .. } => counts.files += 1,
                    RequirementInput::Alm { .. } => counts.alm_references += 1,
                }
                counts
            })
    }
}

pub struct GenerateTestCasesUseCase {
    pipeline: Arc<GenerationPipeline>,
    sessions: Arc<dyn SessionStore>,
    uploads_dir: PathBuf,
}

impl GenerateTestCasesUseCase {
    pub fn new(
        pipeline: Arc<GenerationPipeline>,
        sessions: Arc<dyn SessionStore>,
        uploads_dir: &Path,
    ) -> Self {
        Self {
            pipeline,
            sessions,
            uploads_dir: uploads_dir.to_path_buf(),
        }
    }

    pub async fn execute(&self, username: &str, request: &PipelineRequest) -> Result<GenerateOutcome> {
        let counts = InputCounts::of(request);
        info!(
            user = %username,
            alm_tool = %request.alm_tool,
            typed = counts.typed,
            files = counts.files,
            alm_references = counts.alm_references,
            "Generating test cases"
        );
        let result = self.pipeline.run(request).await?;

        let now = Utc::now();
        let ts = now.format("%Y%m%d_%H%M%S").to_string();
        let safe_user = safe_file_component(username);
        let session_id = Uuid::new_v4().to_string();

        let out_dir = self
            .uploads_dir
            .join(format!("{}_{}_{}", safe_user, ts, session_id));
        ensure_dir(&out_dir)?;

        let raw_file_name = format!("{}_raw_{}_{}.json", safe_user, result.alm_tool, ts);
        let reviewed_file_name = format!("{}_reviewed_{}_{}.csv", safe_user, result.alm_tool, ts);
        let raw_path = out_dir.join(&raw_file_name);
        let reviewed_path = out_dir.join(&reviewed_file_name);

        write_raw_json(&raw_path, &result.raw_records)?;
        write_reviewed_csv(&reviewed_path, &result.column_schema, &result.reviewed_records)?;

        let session = GenerationSession {
            id: session_id,
            username: username.to_string(),
            created_at: now,
            alm_tool: result.alm_tool.clone(),
            columns: result.column_schema.columns().to_vec(),
            prompt_digest: sha256_hex(result.prompt_used.as_bytes()),
            prompt: result.prompt_used,
            raw_path: raw_path.to_string_lossy().to_string(),
            reviewed_path: reviewed_path.to_string_lossy().to_string(),
            reviewed_count: result.reviewed_records.len(),
        };
        self.sessions.create(session.clone())?;

        info!(
            session_id = %session.id,
            raw = result.raw_records.len(),
            reviewed = session.reviewed_count,
            "Test cases generated and AI-reviewed"
        );

        Ok(GenerateOutcome {
            preview: result
                .reviewed_records
                .into_iter()
                .take(PREVIEW_ROWS)
                .collect(),
            columns: result.column_schema,
            session,
            raw_file_name,
            reviewed_file_name,
        })
    }

    /// Forgets a session and deletes its artifact directory.
    /// `Ok(None)` when the session is unknown.
    pub fn evict(&self, session_id: &str) -> Result<Option<GenerationSession>> {
        let Some(session) = self.sessions.evict(session_id)? else {
            return Ok(None);
        };

        let artifact_dir = Path::new(&session.raw_path)
            .parent()
            .filter(|dir| dir.starts_with(&self.uploads_dir) && *dir != self.uploads_dir.as_path());
        if let Some(dir) = artifact_dir {
            match std::fs::remove_dir_all(dir) {
                Ok(()) => info!(session_id = %session.id, dir = %dir.display(), "Removed session artifacts"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => warn!(
                    session_id = %session.id,
                    dir = %dir.display(),
                    error = %err,
                    "Failed to remove session artifacts"
                ),
            }
        }
        Ok(Some(session))
    }
}
