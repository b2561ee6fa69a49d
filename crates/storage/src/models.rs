use serde::Serialize;
use sqlx::FromRow;

/// Row of `learned_patterns`. `leaf_path` holds a JSON array of folder labels.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PatternRow {
    pub signature: String,
    pub leaf_path: String,
    pub times_confirmed: i64,
    pub updated_at: i64,
}

/// Row of `routing_records`. Paths are JSON arrays, timestamps epoch millis.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RecordRow {
    pub id: String,
    pub file_name: String,
    pub signature: String,
    pub template_id: String,
    pub project_id: Option<String>,
    pub suggested_path: String,
    pub actual_path: Option<String>,
    pub confidence: i64,
    pub method: String,
    pub content_hash: Option<String>,
    pub created_at: i64,
    pub reported_at: Option<i64>,
}
