use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for one completed generation run and its exported artifacts.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GenerationSession {
    pub id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub alm_tool: String,
    pub columns: Vec<String>,
    pub prompt: String,
    pub prompt_digest: String,
    pub raw_path: String,
    pub reviewed_path: String,
    pub reviewed_count: usize,
}
