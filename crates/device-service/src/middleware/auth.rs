//! Authentication middleware for protected routes.
//!
//! Extracts the Bearer token from the Authorization header, validates it
//! as a user session token, and injects `UserClaims` into request
//! extensions. Admin checks happen in handlers.
//!
//! Note the layering with admission control: this middleware proves who
//! the caller is; whether their device may keep the session is decided by
//! the admission endpoints themselves.

use crate::errors::DmError;
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
fn extract_bearer_token(req: &Request) -> Result<&str, DmError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "dms.middleware.auth", "Missing Authorization header");
            DmError::InvalidToken("Missing Authorization header".to_string())
        })?;

    auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::debug!(target: "dms.middleware.auth", "Invalid Authorization header format");
        DmError::InvalidToken("Invalid Authorization header format".to_string())
    })
}

/// Authentication middleware for user tokens.
///
/// # Response
///
/// - Returns 401 Unauthorized if token is missing or invalid
/// - Continues to next handler with `UserClaims` in extensions otherwise
#[instrument(skip_all, name = "dms.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, DmError> {
    let token = extract_bearer_token(&req)?;

    let claims: UserClaims =
        validate_user_token(token, state.jwt_secret.as_bytes(), state.clock_skew).map_err(|e| {
            tracing::debug!(target: "dms.middleware.auth", error = ?e, "Token validation failed");
            DmError::InvalidToken(e.to_string())
        })?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
