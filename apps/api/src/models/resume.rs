use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub title: String,
    pub file_path: String,
    pub file_type: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub version: i32,
    pub is_active: bool,
    pub uploaded_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateResumeRequest {
    pub title: String,
    pub file_path: String,
    pub file_type: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update. Supplying `file_path` counts as a new revision.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateResumeRequest {
    pub title: Option<String>,
    pub file_path: Option<String>,
    pub file_type: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}
