//! `AuthUser` extractor: pulls the bearer token from the Authorization header and verifies it.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use chatis_realtime::AuthenticatedIdentity;

use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated caller, resolved through the same verifier as WebSocket connections.
#[derive(Debug, Clone)]
pub struct AuthUser(pub AuthenticatedIdentity);

impl std::ops::Deref for AuthUser {
    type Target = AuthenticatedIdentity;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Token from an `Authorization: Bearer <token>` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let identity = state
            .realtime
            .authenticate(bearer_token(&parts.headers))
            .await?;
        Ok(AuthUser(identity))
    }
}
