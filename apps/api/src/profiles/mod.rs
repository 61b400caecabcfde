pub mod handlers;

use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::{ProfilePayload, ProfileRow};

pub async fn find_profile(db: &PgPool, user_id: Uuid) -> Result<Option<ProfileRow>, AppError> {
    let profile = sqlx::query_as("SELECT * FROM profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    Ok(profile)
}

/// Inserts the user's profile. 409 when one already exists.
pub async fn create_profile(
    db: &PgPool,
    user_id: Uuid,
    payload: &ProfilePayload,
) -> Result<ProfileRow, AppError> {
    sqlx::query_as(
        r#"
        INSERT INTO profiles
            (user_id, full_name, title, email, phone, location, linkedin, github, portfolio)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (user_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(payload.full_name.as_deref())
    .bind(payload.title.as_deref())
    .bind(payload.email.as_deref())
    .bind(payload.phone.as_deref())
    .bind(payload.location.as_deref())
    .bind(payload.linkedin.as_deref())
    .bind(payload.github.as_deref())
    .bind(payload.portfolio.as_deref())
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::Conflict("Profile already exists".into()))
}

/// Updates the supplied fields. 404 when the user has no profile yet.
pub async fn update_profile(
    db: &PgPool,
    user_id: Uuid,
    payload: &ProfilePayload,
) -> Result<ProfileRow, AppError> {
    sqlx::query_as(
        r#"
        UPDATE profiles SET
            full_name  = COALESCE($2, full_name),
            title      = COALESCE($3, title),
            email      = COALESCE($4, email),
            phone      = COALESCE($5, phone),
            location   = COALESCE($6, location),
            linkedin   = COALESCE($7, linkedin),
            github     = COALESCE($8, github),
            portfolio  = COALESCE($9, portfolio),
            updated_at = now()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(payload.full_name.as_deref())
    .bind(payload.title.as_deref())
    .bind(payload.email.as_deref())
    .bind(payload.phone.as_deref())
    .bind(payload.location.as_deref())
    .bind(payload.linkedin.as_deref())
    .bind(payload.github.as_deref())
    .bind(payload.portfolio.as_deref())
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::NotFound("Profile not found".into()))
}
