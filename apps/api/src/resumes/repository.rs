use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{CreateResumeRequest, ResumeRow, UpdateResumeRequest};

pub async fn list_active(db: &PgPool, user_id: Uuid) -> Result<Vec<ResumeRow>, AppError> {
    let resumes = sqlx::query_as(
        "SELECT * FROM resumes WHERE user_id = $1 AND is_active ORDER BY last_modified DESC",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(resumes)
}

pub async fn get_resume(db: &PgPool, user_id: Uuid, id: Uuid) -> Result<ResumeRow, AppError> {
    sqlx::query_as("SELECT * FROM resumes WHERE id = $1 AND user_id = $2 AND is_active")
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

pub async fn create_resume(
    db: &PgPool,
    user_id: Uuid,
    req: &CreateResumeRequest,
) -> Result<ResumeRow, AppError> {
    let resume = sqlx::query_as(
        r#"
        INSERT INTO resumes (user_id, title, file_path, file_type, description, tags)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(req.title.trim())
    .bind(req.file_path.trim())
    .bind(req.file_type.as_deref())
    .bind(req.description.as_deref())
    .bind(&req.tags)
    .fetch_one(db)
    .await?;
    Ok(resume)
}

/// Partial update; a new `file_path` bumps `version`.
pub async fn update_resume(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
    req: &UpdateResumeRequest,
) -> Result<ResumeRow, AppError> {
    sqlx::query_as(
        r#"
        UPDATE resumes SET
            title         = COALESCE($3, title),
            file_path     = COALESCE($4, file_path),
            file_type     = COALESCE($5, file_type),
            description   = COALESCE($6, description),
            tags          = COALESCE($7, tags),
            version       = CASE WHEN $4::text IS NULL THEN version ELSE version + 1 END,
            last_modified = now()
        WHERE id = $1 AND user_id = $2 AND is_active
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(req.title.as_deref().map(str::trim))
    .bind(req.file_path.as_deref().map(str::trim))
    .bind(req.file_type.as_deref())
    .bind(req.description.as_deref())
    .bind(req.tags.as_deref())
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

/// Marks the resume inactive; the row is kept.
pub async fn deactivate_resume(db: &PgPool, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE resumes SET is_active = FALSE, last_modified = now() \
         WHERE id = $1 AND user_id = $2 AND is_active",
    )
    .bind(id)
    .bind(user_id)
    .execute(db)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Resume {id} not found")));
    }
    Ok(())
}
