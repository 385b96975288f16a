use crate::domain::error::{AppError, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

fn io_err(msg: impl Into<String>) -> AppError {
    AppError::IoError(msg.into())
}

/// On-disk layout rooted at the configured data directory.
///
/// - `examples/`: few-shot exemplar tables, one CSV per ALM tool
/// - `rag/`: compliance and reference documents for retrieval
/// - `uploads/`: exported artifacts, one directory per generation session
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
    examples: PathBuf,
    rag: PathBuf,
    uploads: PathBuf,
}

impl DataLayout {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.to_path_buf(),
            examples: data_dir.join("examples"),
            rag: data_dir.join("rag"),
            uploads: data_dir.join("uploads"),
        }
    }

    pub fn ensure(&self) -> Result<()> {
        ensure_dir(&self.root)?;
        ensure_dir(&self.examples)?;
        ensure_dir(&self.rag)?;
        ensure_dir(&self.uploads)?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn examples_dir(&self) -> &Path {
        &self.examples
    }

    pub fn rag_dir(&self) -> &Path {
        &self.rag
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads
    }
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| io_err(format!("Failed to create dir {}: {e}", path.display())))?;
    Ok(())
}

fn write_temp_sibling(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let tmp_path = path.with_extension(format!("tmp-{}", Uuid::new_v4()));
    let mut file = fs::File::create(&tmp_path).map_err(|e| {
        io_err(format!(
            "Failed to create temp file {}: {e}",
            tmp_path.display()
        ))
    })?;
    file.write_all(bytes).map_err(|e| {
        io_err(format!(
            "Failed to write temp file {}: {e}",
            tmp_path.display()
        ))
    })?;
    file.sync_all().ok();
    Ok(tmp_path)
}

/// Writes `bytes` to `path` through a temp file and rename, replacing any existing file.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = write_temp_sibling(path, bytes)?;

    // Rename cannot replace on Windows; move the old file away first.
    if path.exists() {
        let backup = path.with_extension(format!("bak-{}", Uuid::new_v4()));
        fs::rename(path, &backup).map_err(|e| {
            io_err(format!(
                "Failed to move existing file {} to {}: {e}",
                path.display(),
                backup.display()
            ))
        })?;
        fs::rename(&tmp_path, path).map_err(|e| {
            io_err(format!(
                "Failed to rename temp file {} to {}: {e}",
                tmp_path.display(),
                path.display()
            ))
        })?;
        let _ = fs::remove_file(&backup);
        return Ok(());
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        io_err(format!(
            "Failed to rename temp file {} to {}: {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}

/// Creates `path` with `bytes` only if nothing exists there yet.
///
/// The content is fully written to a temp file and then hard-linked into
/// place; the link fails when the target exists, so concurrent callers never
/// observe a partially written file and the first writer wins. Returns `true`
/// when this call created the file.
pub fn create_if_absent(path: &Path, bytes: &[u8]) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    let tmp_path = write_temp_sibling(path, bytes)?;
    let outcome = match fs::hard_link(&tmp_path, path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(io_err(format!(
            "Failed to link {} to {}: {e}",
            tmp_path.display(),
            path.display()
        ))),
    };
    let _ = fs::remove_file(&tmp_path);
    outcome
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Reduces a user-supplied name to `[A-Za-z0-9_]`, falling back to `user`.
pub fn safe_file_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if cleaned.trim_matches('_').is_empty() {
        "user".to_string()
    } else {
        cleaned
    }
}
