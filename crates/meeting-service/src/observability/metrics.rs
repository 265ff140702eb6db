//! Metrics definitions for the meeting service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `lms_` prefix for the meeting (live meeting service) component
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: HTTP methods in use (GET, POST, PUT, DELETE)
//! - `endpoint`: parameterized paths (~10 values, unknown paths collapse
//!   to "/other")
//! - `status`: success / error / timeout
//! - `operation`: bounded by code (create, join, add_attendees, ...)

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already
/// installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("lms_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("lms_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `lms_http_requests_total`, `lms_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// Captures ALL HTTP responses including framework-level errors like 415,
/// 400 (JSON parse), 404, and 405.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("lms_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("lms_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Record a meeting operation outcome.
///
/// Metric: `lms_meeting_operations_total`
/// Labels: `operation`, `outcome`
pub fn record_meeting_operation(operation: &'static str, outcome: &'static str) {
    counter!("lms_meeting_operations_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record database query duration and outcome.
///
/// Metric: `lms_db_query_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_db_query(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("lms_db_query_duration_seconds",
        "operation" => operation,
        "status" => status
    )
    .record(duration.as_secs_f64());
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion.
///
/// Replaces dynamic segments (meeting and attendee ids) with placeholders.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" | "/ready" | "/metrics" | "/live-meetings" | "/live-meetings/admin/all"
        | "/live-meetings/admin/stats" | "/live-meetings/my-meetings"
        | "/live-meetings/upcoming" => path.to_string(),
        _ => normalize_dynamic_endpoint(path),
    }
}

/// Normalize paths with dynamic segments.
fn normalize_dynamic_endpoint(path: &str) -> String {
    if path.starts_with("/live-meetings/") {
        let parts: Vec<&str> = path.split('/').collect();

        // /live-meetings/{id}
        if parts.len() == 3 {
            return "/live-meetings/{id}".to_string();
        }

        // /live-meetings/{id}/join and /live-meetings/{id}/attendees
        if parts.len() == 4 {
            if let Some(action) = parts.get(3) {
                if *action == "join" {
                    return "/live-meetings/{id}/join".to_string();
                }
                if *action == "attendees" {
                    return "/live-meetings/{id}/attendees".to_string();
                }
            }
        }

        // /live-meetings/{id}/attendees/{attendeeId}
        if parts.len() == 5 {
            if let Some(action) = parts.get(3) {
                if *action == "attendees" {
                    return "/live-meetings/{id}/attendees/{attendeeId}".to_string();
                }
            }
        }
    }

    // Unknown paths normalized to "/other" to bound cardinality
    "/other".to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(201), "success");
        assert_eq!(categorize_status_code(400), "error");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
        assert_eq!(categorize_status_code(500), "error");
    }

    #[test]
    fn test_normalize_static_endpoints() {
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/live-meetings"), "/live-meetings");
        assert_eq!(
            normalize_endpoint("/live-meetings/admin/stats"),
            "/live-meetings/admin/stats"
        );
    }

    #[test]
    fn test_normalize_dynamic_endpoints() {
        assert_eq!(
            normalize_endpoint("/live-meetings/0b944c07-8c9f-4a5a-a138-73b73c225733"),
            "/live-meetings/{id}"
        );
        assert_eq!(
            normalize_endpoint("/live-meetings/abc/join"),
            "/live-meetings/{id}/join"
        );
        assert_eq!(
            normalize_endpoint("/live-meetings/abc/attendees"),
            "/live-meetings/{id}/attendees"
        );
        assert_eq!(
            normalize_endpoint("/live-meetings/abc/attendees/def"),
            "/live-meetings/{id}/attendees/{attendeeId}"
        );
    }

    #[test]
    fn test_normalize_unknown_collapses() {
        assert_eq!(normalize_endpoint("/unknown/deep/path"), "/other");
        assert_eq!(normalize_endpoint("/live-meetings/a/b/c/d/e"), "/other");
    }
}
