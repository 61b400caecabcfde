use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use tracing::debug;

use super::{AuthError, Claims, JwksProvider, UserInfo};
use crate::config::AuthConfig;

/// Verifies RS256 access tokens issued for one audience by one issuer.
#[derive(Clone)]
pub struct TokenVerifier {
    provider: Arc<dyn JwksProvider>,
    audience: String,
    issuer: String,
}

impl TokenVerifier {
    pub fn new(
        provider: Arc<dyn JwksProvider>,
        audience: impl Into<String>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            audience: audience.into(),
            issuer: issuer.into(),
        }
    }

    pub fn from_config(provider: Arc<dyn JwksProvider>, config: &AuthConfig) -> Self {
        Self::new(provider, config.audience.clone(), config.issuer())
    }

    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token)
            .map_err(|e| AuthError::InvalidToken(format!("unreadable header: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::InvalidToken(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("token header has no kid".into()))?;

        let key = self.provider.get_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_issuer(&[self.issuer.as_str()]);

        let data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidAudience => AuthError::InvalidToken("wrong audience".into()),
            ErrorKind::InvalidIssuer => AuthError::InvalidToken("wrong issuer".into()),
            ErrorKind::InvalidSignature => AuthError::InvalidToken("bad signature".into()),
            _ => AuthError::InvalidToken(e.to_string()),
        })?;

        debug!(sub = %data.claims.sub, "Verified access token");
        Ok(data.claims)
    }

    pub async fn user_info(&self, token: &str) -> Result<UserInfo, AuthError> {
        Ok(self.verify(token).await?.into())
    }
}
