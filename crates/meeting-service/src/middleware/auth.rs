//! Authentication middleware for protected routes.
//!
//! Extracts the Bearer token from the Authorization header, validates it
//! as a user session token, and injects `UserClaims` into request
//! extensions. Role checks (admin vs. participant) happen in handlers,
//! which see the claims and can report precise Forbidden messages.

use crate::errors::LmError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use common::jwt::{validate_user_token, UserClaims};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Shared secret for user token validation.
    pub jwt_secret: String,

    /// Clock skew tolerance for token validation.
    pub clock_skew: Duration,
}

/// Extract Bearer token from the Authorization header.
fn extract_bearer_token(req: &Request) -> Result<&str, LmError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "lms.middleware.auth", "Missing Authorization header");
            LmError::InvalidToken("Missing Authorization header".to_string())
        })?;

    auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::debug!(target: "lms.middleware.auth", "Invalid Authorization header format");
        LmError::InvalidToken("Invalid Authorization header format".to_string())
    })
}

/// Authentication middleware for user tokens.
///
/// # Response
///
/// - Returns 401 Unauthorized if token is missing or invalid
/// - Continues to next handler with `UserClaims` in extensions otherwise
#[instrument(skip_all, name = "lms.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, LmError> {
    let token = extract_bearer_token(&req)?;

    let claims: UserClaims =
        validate_user_token(token, state.jwt_secret.as_bytes(), state.clock_skew).map_err(|e| {
            tracing::debug!(target: "lms.middleware.auth", error = ?e, "Token validation failed");
            LmError::InvalidToken(e.to_string())
        })?;

    // Store claims in request extensions for downstream handlers
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
