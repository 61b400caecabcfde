use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use tracing::warn;
use uuid::Uuid;

use super::users::get_or_create_user;
use super::{AuthError, UserInfo};
use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;

/// The authenticated caller. Extracting it verifies the bearer token and
/// ensures a local user row exists.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub info: UserInfo,
    enforce_permissions: bool,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.info.permissions.iter().any(|p| p == permission)
    }

    /// 403 when enforcement is on and the token lacks `permission`.
    pub fn require(&self, permission: &str) -> Result<(), AppError> {
        if !self.enforce_permissions || self.has_permission(permission) {
            return Ok(());
        }
        warn!(user = %self.info.user_id, "Missing permission {permission}");
        Err(AppError::Forbidden(format!("Missing required permission: {permission}")))
    }
}

/// The token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token.trim())
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let info = state.verifier.user_info(token).await?;
        let user = get_or_create_user(&state.db, &info).await?;

        Ok(Self {
            user,
            info,
            enforce_permissions: state.config.enforce_permissions,
        })
    }
}
