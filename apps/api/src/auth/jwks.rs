use std::collections::HashMap;

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::AuthError;

/// Source of token signing keys, looked up by `kid`.
#[async_trait]
pub trait JwksProvider: Send + Sync {
    async fn get_key(&self, kid: &str) -> Result<DecodingKey, AuthError>;

    async fn clear_cache(&self);
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: Option<String>,
    kty: String,
    n: Option<String>,
    e: Option<String>,
}

/// Fetches the provider's JWKS document on a cache miss and keeps the RSA
/// keys until [`JwksProvider::clear_cache`] is called.
pub struct RemoteJwksProvider {
    client: reqwest::Client,
    jwks_url: String,
    keys: RwLock<HashMap<String, DecodingKey>>,
}

impl RemoteJwksProvider {
    pub fn new(client: reqwest::Client, jwks_url: impl Into<String>) -> Self {
        Self {
            client,
            jwks_url: jwks_url.into(),
            keys: RwLock::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub(crate) async fn cached_key_count(&self) -> usize {
        self.keys.read().await.len()
    }

    async fn fetch_keys(&self) -> Result<HashMap<String, DecodingKey>, AuthError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::KeyFetch(format!(
                "{} responded with HTTP {}",
                self.jwks_url,
                response.status()
            )));
        }

        let set: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        let mut keys = HashMap::new();
        for jwk in set.keys {
            let (Some(kid), Some(n), Some(e)) = (jwk.kid, jwk.n, jwk.e) else {
                continue;
            };
            if jwk.kty != "RSA" {
                continue;
            }
            match DecodingKey::from_rsa_components(&n, &e) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(err) => warn!("Skipping unusable JWK '{kid}': {err}"),
            }
        }
        info!("Loaded {} signing keys from {}", keys.len(), self.jwks_url);
        Ok(keys)
    }
}

#[async_trait]
impl JwksProvider for RemoteJwksProvider {
    async fn get_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Some(key) = self.keys.read().await.get(kid) {
            return Ok(key.clone());
        }

        let fetched = self.fetch_keys().await?;
        let mut keys = self.keys.write().await;
        keys.extend(fetched);
        keys.get(kid)
            .cloned()
            .ok_or_else(|| AuthError::UnknownKey(kid.to_string()))
    }

    async fn clear_cache(&self) {
        self.keys.write().await.clear();
        info!("Cleared JWKS cache");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::{jwks_body, TEST_KID};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve_jwks(expected_calls: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body()))
            .expect(expected_calls)
            .mount(&server)
            .await;
        server
    }

    fn provider(server: &MockServer) -> RemoteJwksProvider {
        RemoteJwksProvider::new(
            reqwest::Client::new(),
            format!("{}/.well-known/jwks.json", server.uri()),
        )
    }

    #[tokio::test]
    async fn test_keys_are_cached() {
        let server = serve_jwks(1).await;
        let provider = provider(&server);

        provider.get_key(TEST_KID).await.unwrap();
        provider.get_key(TEST_KID).await.unwrap();
        assert_eq!(provider.cached_key_count().await, 1);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_refetch() {
        let server = serve_jwks(2).await;
        let provider = provider(&server);

        provider.get_key(TEST_KID).await.unwrap();
        provider.clear_cache().await;
        assert_eq!(provider.cached_key_count().await, 0);
        provider.get_key(TEST_KID).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_kid() {
        let server = serve_jwks(1).await;
        let provider = provider(&server);

        let Err(err) = provider.get_key("rotated-away").await else {
            panic!("unknown kid resolved to a key");
        };
        assert!(matches!(err, AuthError::UnknownKey(kid) if kid == "rotated-away"));
    }

    #[tokio::test]
    async fn test_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let Err(err) = provider(&server).get_key(TEST_KID).await else {
            panic!("key served despite a 503");
        };
        assert!(matches!(err, AuthError::KeyFetch(_)));
    }
}
