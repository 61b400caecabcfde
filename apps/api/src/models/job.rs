use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Pipeline stage of a tracked job. Stored as its display string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Found,
    Saved,
    Applied,
    Interviewing,
    Offer,
    Rejected,
    Withdrawn,
}

impl JobStatus {
    pub const ALL: [JobStatus; 7] = [
        JobStatus::Found,
        JobStatus::Saved,
        JobStatus::Applied,
        JobStatus::Interviewing,
        JobStatus::Offer,
        JobStatus::Rejected,
        JobStatus::Withdrawn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Found => "Found",
            JobStatus::Saved => "Saved",
            JobStatus::Applied => "Applied",
            JobStatus::Interviewing => "Interviewing",
            JobStatus::Offer => "Offer",
            JobStatus::Rejected => "Rejected",
            JobStatus::Withdrawn => "Withdrawn",
        }
    }

    /// Case-insensitive lookup.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub title: String,
    pub company: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub status: String,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub relevance_score: Option<f64>,
    pub skills: Vec<String>,
    pub is_scraped: bool,
    pub search_query: Option<String>,
    pub source: Option<String>,
    pub date_posted: Option<String>,
    pub date_applied: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    pub company: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub date_applied: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    pub company: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub skills: Option<Vec<String>>,
    pub date_applied: Option<DateTime<Utc>>,
}

/// One row of the skill statistics report.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SkillCount {
    pub skill: String,
    pub count: i64,
}
