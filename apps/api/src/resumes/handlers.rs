use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;

use super::repository;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::resume::{CreateResumeRequest, ResumeRow, UpdateResumeRequest};
use crate::state::AppState;

fn validate_create(req: &CreateResumeRequest) -> Result<(), AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".into()));
    }
    if req.file_path.trim().is_empty() {
        return Err(AppError::Validation("file_path is required".into()));
    }
    Ok(())
}

fn validate_update(req: &UpdateResumeRequest) -> Result<(), AppError> {
    if req.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(AppError::Validation("title must not be empty".into()));
    }
    if req.file_path.as_deref().is_some_and(|p| p.trim().is_empty()) {
        return Err(AppError::Validation("file_path must not be empty".into()));
    }
    Ok(())
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<ResumeRow>>, AppError> {
    auth.require("read:resumes")?;
    Ok(Json(repository::list_active(&state.db, auth.id()).await?))
}

/// POST /api/v1/resumes
pub async fn handle_create_resume(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateResumeRequest>,
) -> Result<(StatusCode, Json<ResumeRow>), AppError> {
    auth.require("create:resumes")?;
    validate_create(&req)?;
    let resume = repository::create_resume(&state.db, auth.id(), &req).await?;
    info!(resume_id = %resume.id, "Created resume '{}'", resume.title);
    Ok((StatusCode::CREATED, Json(resume)))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeRow>, AppError> {
    auth.require("read:resumes")?;
    Ok(Json(repository::get_resume(&state.db, auth.id(), id).await?))
}

/// PUT /api/v1/resumes/:id
pub async fn handle_update_resume(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateResumeRequest>,
) -> Result<Json<ResumeRow>, AppError> {
    auth.require("update:resumes")?;
    validate_update(&req)?;
    let resume = repository::update_resume(&state.db, auth.id(), id, &req).await?;
    Ok(Json(resume))
}

/// DELETE /api/v1/resumes/:id
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require("delete:resumes")?;
    repository::deactivate_resume(&state.db, auth.id(), id).await?;
    info!(resume_id = %id, "Deactivated resume");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_requires_title_and_path() {
        let req = CreateResumeRequest {
            title: "Backend CV".into(),
            file_path: " ".into(),
            file_type: None,
            description: None,
            tags: vec![],
        };
        assert!(matches!(validate_create(&req), Err(AppError::Validation(_))));

        let ok = CreateResumeRequest {
            file_path: "resumes/backend.pdf".into(),
            ..req
        };
        assert!(validate_create(&ok).is_ok());
    }

    #[test]
    fn test_update_rejects_blank_fields() {
        let req = UpdateResumeRequest {
            title: Some("".into()),
            ..Default::default()
        };
        assert!(validate_update(&req).is_err());
        assert!(validate_update(&UpdateResumeRequest::default()).is_ok());
    }
}
