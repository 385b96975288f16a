//! Few-shot exemplar tables, one per ALM tool.
//!
//! The header row of a table is the column schema for every run that targets
//! that tool.

use crate::domain::error::{AppError, Result};
use crate::domain::requirement::AlmTool;
use crate::domain::test_case::{ColumnSchema, FewShotSet, TestCaseRecord, DEFAULT_COLUMNS};
use crate::infrastructure::storage::create_if_absent;
use csv::{ReaderBuilder, Trim, Writer};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct ExampleLibrary {
    dir: PathBuf,
}

impl ExampleLibrary {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Built-in exemplar for a tool, used to seed missing tables.
    pub fn builtin(tool: AlmTool) -> FewShotSet {
        let columns = ColumnSchema::new(DEFAULT_COLUMNS);
        let row: [&str; 6] = match tool {
            AlmTool::Jira => [
                "TC-JIRA-001",
                "View appointment slots",
                "Patients can view slots",
                "Slots list shown",
                "High",
                "Jira example",
            ],
            AlmTool::Azure => [
                "TC-AZ-001",
                "Email reminder",
                "Send reminder 24h",
                "Reminder sent",
                "Medium",
                "Azure example",
            ],
            AlmTool::Polarion => [
                "TC-POL-001",
                "Cancel appointment",
                "Doctor can cancel",
                "Appointment removed",
                "Medium",
                "Polarion example",
            ],
            AlmTool::Etl => [
                "TC-ETL-001",
                "ETL load completes",
                "ETL must load daily",
                "Data loaded",
                "Medium",
                "ETL example",
            ],
        };
        FewShotSet {
            alm_tool: tool.as_str().to_string(),
            examples: vec![TestCaseRecord::from_values(&columns, row)],
            columns,
        }
    }

    pub fn table_path(&self, tool: AlmTool) -> PathBuf {
        self.dir.join(tool.example_file_name())
    }

    /// Writes the built-in table for `tool` unless a table already exists.
    /// Returns `true` when the file was created by this call.
    pub fn ensure_table(&self, tool: AlmTool) -> Result<bool> {
        let path = self.table_path(tool);
        let bytes = to_csv(&Self::builtin(tool))?;
        let created = create_if_absent(&path, &bytes)?;
        if created {
            info!(path = %path.display(), "Created sample few-shot example");
        }
        Ok(created)
    }

    /// Returns the exemplar set for an ALM identifier (case-insensitive,
    /// unknown identifiers fall back to Jira).
    ///
    /// A missing table is synthesized and persisted first. An unreadable table
    /// is left on disk and the built-in set is returned instead.
    pub fn get(&self, alm_tool: &str) -> FewShotSet {
        let tool = AlmTool::normalize(alm_tool);

        if let Err(err) = self.ensure_table(tool) {
            warn!(tool = %tool, error = %err, "Failed to persist default few-shot table");
            return Self::builtin(tool);
        }

        let path = self.table_path(tool);
        match read_table(&path, tool) {
            Ok(set) => set,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to load few-shot table");
                Self::builtin(tool)
            }
        }
    }
}

fn read_table(path: &Path, tool: AlmTool) -> Result<FewShotSet> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| AppError::IoError(format!("Failed to open {}: {}", path.display(), e)))?;

    let headers = reader
        .headers()
        .map_err(|e| AppError::ParseError(format!("Failed to read header: {}", e)))?
        .clone();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(AppError::ParseError(format!(
            "Few-shot table {} has no columns",
            path.display()
        )));
    }
    // Row cells are matched to columns by position.
    for (index, header) in headers.iter().enumerate() {
        if header.is_empty() {
            return Err(AppError::ParseError(format!(
                "Few-shot table {} has a blank header in column {}",
                path.display(),
                index + 1
            )));
        }
        if headers.iter().take(index).any(|earlier| earlier == header) {
            return Err(AppError::ParseError(format!(
                "Few-shot table {} repeats column {:?}",
                path.display(),
                header
            )));
        }
    }
    let columns = ColumnSchema::new(headers.iter());

    let mut examples = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| AppError::ParseError(format!("Invalid row: {}", e)))?;
        if row.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        examples.push(TestCaseRecord::from_values(&columns, row.iter()));
    }

    Ok(FewShotSet {
        alm_tool: tool.as_str().to_string(),
        columns,
        examples,
    })
}

pub(crate) fn to_csv(set: &FewShotSet) -> Result<Vec<u8>> {
    let mut writer = Writer::from_writer(Vec::new());
    writer
        .write_record(set.columns.columns())
        .map_err(|e| AppError::Internal(format!("Failed to write CSV header: {}", e)))?;
    for record in &set.examples {
        writer
            .write_record(record.values())
            .map_err(|e| AppError::Internal(format!("Failed to write CSV row: {}", e)))?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Failed to flush CSV: {}", e)))
}
