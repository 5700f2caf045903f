//! Authentication
//!
//! Mutating routes require `Authorization: Bearer <token>`. Tokens are
//! resolved to an [`Identity`] through an [`IdentityVerifier`]; the identity
//! is attached to the request and only used for logging.

use std::collections::BTreeMap;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use cameraman_common::config::AuthConfig;

use crate::AppState;

/// Caller identity injected into request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
}

/// Resolves bearer tokens to identities.
#[async_trait::async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// `None` when the token is not recognized.
    async fn verify(&self, token: &str) -> Option<Identity>;
}

/// Verifier backed by a fixed token table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: BTreeMap<String, String>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: BTreeMap<String, String>) -> Self {
        Self { tokens }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        if config.tokens.is_empty() {
            tracing::warn!("No API tokens configured, start and stop requests will be rejected");
        }
        Self::new(config.tokens.clone())
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Option<Identity> {
        self.tokens.get(token).map(|name| Identity { name: name.clone() })
    }
}

/// Authentication failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing Authorization header.
    #[error("Missing authorization header")]
    MissingAuthHeader,

    /// Invalid authorization header format.
    #[error("Invalid authorization header format")]
    InvalidAuthHeader,

    /// Token not recognized.
    #[error("Authentication failed: unknown token")]
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let code = match self {
            Self::MissingAuthHeader => "MISSING_AUTH_HEADER",
            Self::InvalidAuthHeader => "INVALID_AUTH_HEADER",
            Self::InvalidToken => "INVALID_TOKEN",
        };
        let body = Json(serde_json::json!({
            "error": self.to_string(),
            "code": code,
        }));
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

/// Middleware to require authentication.
///
/// Extracts the bearer token, verifies it, and injects [`Identity`] into
/// request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingAuthHeader)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)?;

    let identity = state.verifier.verify(token).await.ok_or_else(|| {
        tracing::warn!(path = %request.uri().path(), "Rejected request with unknown token");
        AuthError::InvalidToken
    })?;

    tracing::debug!(identity = %identity.name, path = %request.uri().path(), "Authenticated request");
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_verifier() {
        let verifier = StaticTokenVerifier::new(BTreeMap::from([(
            "secret".to_string(),
            "Operator".to_string(),
        )]));
        assert_eq!(
            verifier.verify("secret").await,
            Some(Identity {
                name: "Operator".to_string()
            })
        );
        assert_eq!(verifier.verify("other").await, None);
    }
}
