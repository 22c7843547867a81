//! Request authentication.
//!
//! An [`Authenticator`] turns the headers of a create request into the
//! platform credentials the export runs with. [`HeaderAuthenticator`] checks,
//! in order:
//!
//! 1. `Authorization: Bearer <token>`
//! 2. `X-Client-Id` + `X-Client-Secret` (+ optional `X-Region`)
//! 3. the fallback captured at startup, usually from the environment

use std::fmt;

use async_trait::async_trait;
use axum::http::HeaderMap;
use thiserror::Error;
use tracing::debug;

use crate::error::ServiceError;

pub const ENV_ACCESS_TOKEN: &str = "GENESYSCLOUD_ACCESS_TOKEN";
pub const ENV_CLIENT_ID: &str = "GENESYSCLOUD_OAUTHCLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "GENESYSCLOUD_OAUTHCLIENT_SECRET";
pub const ENV_REGION: &str = "GENESYSCLOUD_REGION";

pub const HEADER_CLIENT_ID: &str = "x-client-id";
pub const HEADER_CLIENT_SECRET: &str = "x-client-secret";
pub const HEADER_REGION: &str = "x-region";

const DEFAULT_REGION: &str = "us-east-1";

// ═══════════════════════════════════════════════════════════════════════════════
// Error Types
// ═══════════════════════════════════════════════════════════════════════════════

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication credentials")]
    MissingCredentials,

    #[error("Malformed authorization header")]
    MalformedHeader,

    #[error("Incomplete client credentials: {0} is missing")]
    IncompleteCredentials(&'static str),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        ServiceError::unauthorized(err.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Credentials
// ═══════════════════════════════════════════════════════════════════════════════

/// Credentials handed to the exporter.
#[derive(Clone, PartialEq, Eq)]
pub enum ClientConfig {
    AccessToken(String),
    ClientCredentials {
        client_id: String,
        client_secret: String,
        region: String,
    },
}

impl ClientConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AccessToken(_) => "access_token",
            Self::ClientCredentials { .. } => "client_credentials",
        }
    }

    pub fn region(&self) -> Option<&str> {
        match self {
            Self::AccessToken(_) => None,
            Self::ClientCredentials { region, .. } => Some(region),
        }
    }

    /// Read credentials from the process environment.
    pub fn from_env() -> Option<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if let Some(token) = var(ENV_ACCESS_TOKEN) {
            return Some(Self::AccessToken(token));
        }

        Some(Self::ClientCredentials {
            client_id: var(ENV_CLIENT_ID)?,
            client_secret: var(ENV_CLIENT_SECRET)?,
            region: var(ENV_REGION).unwrap_or_else(|| DEFAULT_REGION.to_string()),
        })
    }
}

// Secrets stay out of logs.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessToken(_) => f.debug_tuple("AccessToken").field(&"<redacted>").finish(),
            Self::ClientCredentials {
                client_id, region, ..
            } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .field("region", region)
                .finish(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Authenticator
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<ClientConfig, AuthError>;
}

/// Header-based authenticator with an optional startup fallback.
#[derive(Debug, Clone, Default)]
pub struct HeaderAuthenticator {
    fallback: Option<ClientConfig>,
}

impl HeaderAuthenticator {
    pub fn new(fallback: Option<ClientConfig>) -> Self {
        Self { fallback }
    }

    pub fn from_env() -> Self {
        Self::new(ClientConfig::from_env())
    }

    fn extract_bearer(headers: &HeaderMap) -> Result<Option<String>, AuthError> {
        let Some(value) = headers.get(axum::http::header::AUTHORIZATION) else {
            return Ok(None);
        };
        let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;
        let token = value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MalformedHeader)?;
        Ok(Some(token.to_string()))
    }

    fn header(headers: &HeaderMap, name: &str) -> Option<String> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }
}

#[async_trait]
impl Authenticator for HeaderAuthenticator {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<ClientConfig, AuthError> {
        if let Some(token) = Self::extract_bearer(headers)? {
            debug!("Authenticated with bearer token");
            return Ok(ClientConfig::AccessToken(token));
        }

        let client_id = Self::header(headers, HEADER_CLIENT_ID);
        let client_secret = Self::header(headers, HEADER_CLIENT_SECRET);
        match (client_id, client_secret) {
            (Some(client_id), Some(client_secret)) => {
                debug!(client_id = %client_id, "Authenticated with client credentials");
                return Ok(ClientConfig::ClientCredentials {
                    client_id,
                    client_secret,
                    region: Self::header(headers, HEADER_REGION)
                        .unwrap_or_else(|| DEFAULT_REGION.to_string()),
                });
            }
            (Some(_), None) => return Err(AuthError::IncompleteCredentials(HEADER_CLIENT_SECRET)),
            (None, Some(_)) => return Err(AuthError::IncompleteCredentials(HEADER_CLIENT_ID)),
            (None, None) => {}
        }

        self.fallback.clone().ok_or(AuthError::MissingCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc123"));

        let config = HeaderAuthenticator::default().authenticate(&headers).await.unwrap();
        assert_eq!(config, ClientConfig::AccessToken("abc123".to_string()));
    }

    #[tokio::test]
    async fn test_malformed_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcg=="));

        let err = HeaderAuthenticator::default().authenticate(&headers).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedHeader));
    }

    #[tokio::test]
    async fn test_client_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_CLIENT_ID, HeaderValue::from_static("id"));
        headers.insert(HEADER_CLIENT_SECRET, HeaderValue::from_static("secret"));
        headers.insert(HEADER_REGION, HeaderValue::from_static("eu-west-1"));

        let config = HeaderAuthenticator::default().authenticate(&headers).await.unwrap();
        assert_eq!(config.region(), Some("eu-west-1"));
        assert_eq!(config.kind(), "client_credentials");
    }

    #[tokio::test]
    async fn test_half_credentials_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_CLIENT_ID, HeaderValue::from_static("id"));

        let err = HeaderAuthenticator::default().authenticate(&headers).await.unwrap_err();
        assert!(matches!(err, AuthError::IncompleteCredentials(_)));
    }

    #[tokio::test]
    async fn test_fallback() {
        let headers = HeaderMap::new();
        assert!(matches!(
            HeaderAuthenticator::default().authenticate(&headers).await,
            Err(AuthError::MissingCredentials)
        ));

        let fallback = ClientConfig::AccessToken("env".to_string());
        let auth = HeaderAuthenticator::new(Some(fallback.clone()));
        assert_eq!(auth.authenticate(&headers).await.unwrap(), fallback);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ClientConfig::ClientCredentials {
            client_id: "id".into(),
            client_secret: "hunter2".into(),
            region: "us-east-1".into(),
        };
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn test_auth_error_maps_to_401() {
        let err: ServiceError = AuthError::MissingCredentials.into();
        assert_eq!(err.http_status(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
