//! Bearer-token authentication against the identity provider's JWKS.

pub mod extractor;
pub mod jwks;
pub mod users;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use extractor::AuthUser;
pub use jwks::{JwksProvider, RemoteJwksProvider};
pub use verifier::TokenVerifier;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("malformed Authorization header")]
    MalformedHeader,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("no signing key matches kid '{0}'")]
    UnknownKey(String),

    #[error("could not fetch signing keys: {0}")]
    KeyFetch(String),
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

/// The caller's identity, reduced from verified claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub email_verified: bool,
    pub permissions: Vec<String>,
}

impl From<Claims> for UserInfo {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            name: claims.name,
            email_verified: claims.email_verified,
            permissions: claims.permissions,
        }
    }
}
