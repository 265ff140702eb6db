//! Device service error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse`
//! impl. `DeviceLimitExceeded` is a distinguished condition with its own
//! machine-readable code: clients branch on it to render the
//! "contact an administrator" flow instead of a generic error toast.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Device service error type.
///
/// Maps to appropriate HTTP status codes:
/// - Validation: 400 Bad Request
/// - InvalidToken: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - NotFound: 404 Not Found
/// - DeviceLimitExceeded: 409 Conflict (code DEVICE_LIMIT_EXCEEDED)
/// - Database, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum DmError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Device limit of {limit} reached")]
    DeviceLimitExceeded { limit: i32 },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl DmError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            DmError::Validation(_) => 400,
            DmError::InvalidToken(_) => 401,
            DmError::Forbidden(_) => 403,
            DmError::NotFound(_) => 404,
            DmError::DeviceLimitExceeded { .. } => 409,
            DmError::Database(_) | DmError::Internal(_) => 500,
        }
    }

    /// Whether this failure may be degraded to an allow under the
    /// permissive admission policy.
    ///
    /// Limit exhaustion always surfaces (it drives dedicated UX), and
    /// request errors are the caller's to fix; everything else is a soft
    /// failure of the admission layer itself.
    pub fn is_soft_admission_failure(&self) -> bool {
        matches!(
            self,
            DmError::Database(_) | DmError::Internal(_) | DmError::NotFound(_)
        )
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for DmError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            DmError::Validation(reason) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                reason.clone(),
            ),
            DmError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            DmError::Forbidden(reason) => (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone()),
            DmError::NotFound(resource) => (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone()),
            DmError::DeviceLimitExceeded { limit } => (
                StatusCode::CONFLICT,
                "DEVICE_LIMIT_EXCEEDED",
                format!(
                    "Device limit of {} reached. Contact an administrator to manage your devices.",
                    limit
                ),
            ),
            DmError::Database(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "dms.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            DmError::Internal(err) => {
                tracing::error!(target: "dms.internal", error = %err, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"openclass-api\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

/// Convert sqlx errors to DmError
impl From<sqlx::Error> for DmError {
    fn from(err: sqlx::Error) -> Self {
        DmError::Database(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_device_limit_exceeded() {
        let error = DmError::DeviceLimitExceeded { limit: 2 };
        assert_eq!(format!("{}", error), "Device limit of 2 reached");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(DmError::Validation("test".to_string()).status_code(), 400);
        assert_eq!(DmError::InvalidToken("test".to_string()).status_code(), 401);
        assert_eq!(DmError::Forbidden("test".to_string()).status_code(), 403);
        assert_eq!(DmError::NotFound("test".to_string()).status_code(), 404);
        assert_eq!(DmError::DeviceLimitExceeded { limit: 2 }.status_code(), 409);
        assert_eq!(DmError::Database("test".to_string()).status_code(), 500);
        assert_eq!(DmError::Internal("test".to_string()).status_code(), 500);
    }

    #[test]
    fn test_soft_admission_failures() {
        assert!(DmError::Database("down".to_string()).is_soft_admission_failure());
        assert!(DmError::Internal("bug".to_string()).is_soft_admission_failure());
        assert!(DmError::NotFound("account".to_string()).is_soft_admission_failure());

        // The distinguished limit condition is never degraded away.
        assert!(!DmError::DeviceLimitExceeded { limit: 2 }.is_soft_admission_failure());
        assert!(!DmError::Validation("bad".to_string()).is_soft_admission_failure());
        assert!(!DmError::InvalidToken("bad".to_string()).is_soft_admission_failure());
    }

    #[tokio::test]
    async fn test_into_response_device_limit_exceeded() {
        let error = DmError::DeviceLimitExceeded { limit: 3 };
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body_json = read_body_json(response.into_body()).await;
        // The machine-readable code is the contract clients branch on.
        assert_eq!(body_json["error"]["code"], "DEVICE_LIMIT_EXCEEDED");
        let message = body_json["error"]["message"].as_str().unwrap();
        assert!(message.contains("3"));
        assert!(message.contains("administrator"));
    }

    #[tokio::test]
    async fn test_into_response_not_found() {
        let error = DmError::NotFound("Device not found".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "NOT_FOUND");
        assert_eq!(body_json["error"]["message"], "Device not found");
    }

    #[tokio::test]
    async fn test_into_response_database_error_is_generic() {
        let error = DmError::Database("connection refused on db-primary".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "DATABASE_ERROR");
        let message = body_json["error"]["message"].as_str().unwrap();
        assert!(!message.contains("db-primary"));
    }
}
