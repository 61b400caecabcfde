use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::parse_skill_filter;
use super::repository::{self, JobFilter, ScrapedFilter};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::job::{CreateJobRequest, JobRow, JobStatus, SkillCount, UpdateJobRequest};
use crate::pagination::{Page, Paginated};
use crate::parsing::ParsedPosting;
use crate::scraping::{ScrapedJob, SearchParams, SortOrder};
use crate::state::AppState;

const DEFAULT_SKILL_LIMIT: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub skills: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScrapedListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub search_query: Option<String>,
    pub min_relevance: Option<f64>,
    pub skills: Option<String>,
    pub applied: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SkillStatsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ParseUrlRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub search_term: String,
    pub sort_order: SortOrder,
    pub total: usize,
    pub jobs: Vec<ScrapedJob>,
}

fn parse_status(raw: &str) -> Result<JobStatus, AppError> {
    JobStatus::parse(raw).ok_or_else(|| {
        let allowed: Vec<&str> = JobStatus::ALL.iter().map(|s| s.as_str()).collect();
        AppError::Validation(format!(
            "Invalid status '{raw}'. Expected one of: {}",
            allowed.join(", ")
        ))
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<JobListQuery>,
) -> Result<Json<Paginated<JobRow>>, AppError> {
    auth.require("read:jobs")?;
    let page = Page::resolve(params.skip, params.limit)?;
    let status = non_blank(params.status)
        .map(|s| parse_status(&s))
        .transpose()?;

    let filter = JobFilter {
        status: status.map(|s| s.as_str().to_string()),
        search: non_blank(params.search),
        skills: parse_skill_filter(params.skills.as_deref()),
    };
    let (jobs, total) = repository::list_jobs(&state.db, auth.id(), &filter, page).await?;
    Ok(Json(Paginated::new(jobs, total, page)))
}

/// POST /api/v1/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobRow>), AppError> {
    auth.require("create:jobs")?;
    if req.title.trim().is_empty() || req.company.trim().is_empty() {
        return Err(AppError::Validation("title and company are required".into()));
    }
    let status = match non_blank(req.status.clone()) {
        Some(raw) => parse_status(&raw)?,
        None => JobStatus::Applied,
    };

    let job = repository::create_job(&state.db, auth.id(), &req, status).await?;
    info!(job_id = %job.id, "Created job '{}' at {}", job.title, job.company);
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JobRow>, AppError> {
    auth.require("read:jobs")?;
    let job = repository::get_job(&state.db, auth.id(), id).await?;
    Ok(Json(job))
}

/// PUT /api/v1/jobs/:id
pub async fn handle_update_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateJobRequest>,
) -> Result<Json<JobRow>, AppError> {
    auth.require("update:jobs")?;
    if req.title.as_deref().is_some_and(|t| t.trim().is_empty())
        || req.company.as_deref().is_some_and(|c| c.trim().is_empty())
    {
        return Err(AppError::Validation("title and company must not be empty".into()));
    }
    let status = req.status.as_deref().map(parse_status).transpose()?;

    let job = repository::update_job(&state.db, auth.id(), id, &req, status).await?;
    Ok(Json(job))
}

/// DELETE /api/v1/jobs/:id
pub async fn handle_delete_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require("delete:jobs")?;
    repository::delete_job(&state.db, auth.id(), id).await?;
    info!(job_id = %id, "Deleted job");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/jobs/scraped
pub async fn handle_list_scraped(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ScrapedListQuery>,
) -> Result<Json<Paginated<JobRow>>, AppError> {
    auth.require("read:jobs")?;
    let page = Page::resolve(params.skip, params.limit)?;
    if let Some(min) = params.min_relevance {
        if !(0.0..=1.0).contains(&min) {
            return Err(AppError::Validation(
                "min_relevance must be between 0 and 1".into(),
            ));
        }
    }

    let filter = ScrapedFilter {
        search_query: non_blank(params.search_query),
        min_relevance: params.min_relevance,
        skills: parse_skill_filter(params.skills.as_deref()),
        applied: params.applied,
    };
    let (jobs, total) = repository::list_scraped(&state.db, auth.id(), &filter, page).await?;
    Ok(Json(Paginated::new(jobs, total, page)))
}

/// GET /api/v1/jobs/skills
pub async fn handle_skill_stats(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<SkillStatsQuery>,
) -> Result<Json<Vec<SkillCount>>, AppError> {
    auth.require("read:jobs")?;
    let limit = params.limit.unwrap_or(DEFAULT_SKILL_LIMIT);
    if !(1..=100).contains(&limit) {
        return Err(AppError::Validation("limit must be between 1 and 100".into()));
    }
    let counts = repository::skill_counts(&state.db, auth.id(), limit).await?;
    Ok(Json(counts))
}

/// POST /api/v1/jobs/parse-url
pub async fn handle_parse_url(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ParseUrlRequest>,
) -> Result<Json<ParsedPosting>, AppError> {
    auth.require("create:jobs")?;
    let posting = state.parser.parse(&req.url).await?;
    Ok(Json(posting))
}

/// POST /api/v1/jobs/search
///
/// Runs a search inline and returns the processed results without saving them.
pub async fn handle_search_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(params): Json<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    auth.require("read:jobs")?;
    params.validate().map_err(AppError::Validation)?;

    let jobs = state.search.search(&params).await?;
    info!(
        user = %auth.info.user_id,
        found = jobs.len(),
        "Search for '{}' complete",
        params.search_term
    );
    Ok(Json(SearchResponse {
        search_term: params.search_term,
        sort_order: params.sort_order,
        total: jobs.len(),
        jobs,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_rejects_unknown() {
        assert_eq!(parse_status("offer").unwrap(), JobStatus::Offer);
        let err = parse_status("ghosted").unwrap_err();
        assert!(err.to_string().contains("Withdrawn"));
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some("x".into())).as_deref(), Some("x"));
    }
}
