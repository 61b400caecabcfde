use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::profile::{ProfilePayload, ProfileRow};
use crate::state::AppState;

/// GET /api/v1/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ProfileRow>, AppError> {
    auth.require("read:profile")?;
    super::find_profile(&state.db, auth.id())
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Profile not found".into()))
}

/// POST /api/v1/profile
pub async fn handle_create_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ProfilePayload>,
) -> Result<(StatusCode, Json<ProfileRow>), AppError> {
    auth.require("update:profile")?;
    let profile = super::create_profile(&state.db, auth.id(), &payload).await?;
    info!(user = %auth.info.user_id, "Created profile");
    Ok((StatusCode::CREATED, Json(profile)))
}

/// PUT /api/v1/profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ProfilePayload>,
) -> Result<Json<ProfileRow>, AppError> {
    auth.require("update:profile")?;
    let profile = super::update_profile(&state.db, auth.id(), &payload).await?;
    Ok(Json(profile))
}
