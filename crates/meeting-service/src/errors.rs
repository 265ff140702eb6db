//! Meeting service error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse`
//! impl. Database and internal error messages returned to clients are
//! intentionally generic; actual errors are logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Meeting service error type.
///
/// Maps to appropriate HTTP status codes:
/// - Validation: 400 Bad Request
/// - InvalidToken: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - NotFound: 404 Not Found
/// - Conflict: 409 Conflict
/// - Database, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum LmError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl LmError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            LmError::Validation(_) => 400,
            LmError::InvalidToken(_) => 401,
            LmError::Forbidden(_) => 403,
            LmError::NotFound(_) => 404,
            LmError::Conflict(_) => 409,
            LmError::Database(_) | LmError::Internal(_) => 500,
        }
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

impl IntoResponse for LmError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            LmError::Validation(reason) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                reason.clone(),
            ),
            LmError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            LmError::Forbidden(reason) => (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone()),
            LmError::NotFound(resource) => (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone()),
            LmError::Conflict(reason) => (StatusCode::CONFLICT, "CONFLICT", reason.clone()),
            LmError::Database(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "lms.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            LmError::Internal(err) => {
                tracing::error!(target: "lms.internal", error = %err, "Internal error");
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

/// Convert sqlx errors to LmError
impl From<sqlx::Error> for LmError {
    fn from(err: sqlx::Error) -> Self {
        LmError::Database(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    // Helper function to read the response body as JSON
    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_validation() {
        let error = LmError::Validation("scheduled date must be in the future".to_string());
        assert_eq!(
            format!("{}", error),
            "Validation error: scheduled date must be in the future"
        );
    }

    #[test]
    fn test_display_not_found() {
        let error = LmError::NotFound("Meeting not found".to_string());
        assert_eq!(format!("{}", error), "Not found: Meeting not found");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(LmError::Validation("test".to_string()).status_code(), 400);
        assert_eq!(LmError::InvalidToken("test".to_string()).status_code(), 401);
        assert_eq!(LmError::Forbidden("test".to_string()).status_code(), 403);
        assert_eq!(LmError::NotFound("test".to_string()).status_code(), 404);
        assert_eq!(LmError::Conflict("test".to_string()).status_code(), 409);
        assert_eq!(LmError::Database("test".to_string()).status_code(), 500);
        assert_eq!(LmError::Internal("test".to_string()).status_code(), 500);
    }

    #[tokio::test]
    async fn test_into_response_validation() {
        let error = LmError::Validation("Duration must be between 15 and 480 minutes".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(
            body_json["error"]["message"],
            "Duration must be between 15 and 480 minutes"
        );
    }

    #[tokio::test]
    async fn test_into_response_conflict() {
        let error = LmError::Conflict("Meeting is at capacity".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "CONFLICT");
        assert_eq!(body_json["error"]["message"], "Meeting is at capacity");
    }

    #[tokio::test]
    async fn test_into_response_forbidden() {
        let error = LmError::Forbidden("You are not on the attendee list".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_into_response_invalid_token_sets_www_authenticate() {
        let error = LmError::InvalidToken("token expired".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let www_auth = response.headers().get("WWW-Authenticate");
        assert!(www_auth.is_some());
        let www_auth_str = www_auth.unwrap().to_str().unwrap();
        assert!(www_auth_str.contains("Bearer realm=\"openclass-api\""));
    }

    #[tokio::test]
    async fn test_into_response_database_error_is_generic() {
        let error = LmError::Database("connection refused on 10.0.0.3:5432".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "DATABASE_ERROR");
        // Infrastructure details must not leak to the client
        let message = body_json["error"]["message"].as_str().unwrap();
        assert!(!message.contains("10.0.0.3"));
    }
}
