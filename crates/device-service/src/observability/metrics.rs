//! Metrics definitions for the device service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `dms_` prefix for the device management service
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `outcome`: registered / reused / limit_exceeded / policy_fallback
//! - `endpoint`: parameterized paths (unknown paths collapse to "/other")
//! - `operation`, `status`: bounded by code

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already
/// installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("dms_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("dms_db_query".to_string()),
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
/// Metric: `dms_http_requests_total`, `dms_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("dms_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("dms_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Record an admission decision.
///
/// Metric: `dms_admission_total`
/// Labels: `outcome` (registered, reused, limit_exceeded, policy_fallback)
pub fn record_admission(outcome: &'static str) {
    counter!("dms_admission_total", "outcome" => outcome).increment(1);
}

/// Record the device limit currently in effect.
///
/// Metric: `dms_device_limit`
pub fn record_device_limit(limit: i32) {
    gauge!("dms_device_limit").set(f64::from(limit));
}

/// Record database query duration and outcome.
///
/// Metric: `dms_db_query_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_db_query(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("dms_db_query_duration_seconds",
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
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" | "/ready" | "/metrics" | "/device-management/register"
        | "/device-management/check-authorization" | "/device-management/users"
        | "/device-management/stats" | "/device-management/limit" => path.to_string(),
        _ => normalize_dynamic_endpoint(path),
    }
}

/// Normalize paths with dynamic segments.
fn normalize_dynamic_endpoint(path: &str) -> String {
    if path.starts_with("/device-management/") {
        let parts: Vec<&str> = path.split('/').collect();

        // /device-management/devices/{id}
        if parts.len() == 4 && parts.get(2) == Some(&"devices") {
            return "/device-management/devices/{id}".to_string();
        }

        // /device-management/users/{id}/devices and .../reset
        if parts.len() == 5 && parts.get(2) == Some(&"users") {
            if let Some(action) = parts.get(4) {
                if *action == "devices" {
                    return "/device-management/users/{id}/devices".to_string();
                }
                if *action == "reset" {
                    return "/device-management/users/{id}/reset".to_string();
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
        assert_eq!(categorize_status_code(409), "error");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(500), "error");
    }

    #[test]
    fn test_normalize_static_endpoints() {
        assert_eq!(
            normalize_endpoint("/device-management/register"),
            "/device-management/register"
        );
        assert_eq!(
            normalize_endpoint("/device-management/limit"),
            "/device-management/limit"
        );
    }

    #[test]
    fn test_normalize_dynamic_endpoints() {
        assert_eq!(
            normalize_endpoint("/device-management/devices/3f2a"),
            "/device-management/devices/{id}"
        );
        assert_eq!(
            normalize_endpoint("/device-management/users/3f2a/devices"),
            "/device-management/users/{id}/devices"
        );
        assert_eq!(
            normalize_endpoint("/device-management/users/3f2a/reset"),
            "/device-management/users/{id}/reset"
        );
    }

    #[test]
    fn test_normalize_unknown_collapses() {
        assert_eq!(normalize_endpoint("/device-management/users/a/b/c"), "/other");
        assert_eq!(normalize_endpoint("/elsewhere"), "/other");
    }
}
