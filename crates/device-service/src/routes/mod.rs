//! HTTP routes for the device service.
//!
//! Defines the Axum router and application state. Role checks beyond
//! "authenticated" happen inside handlers, so every /device-management
//! route shares one auth layer.

use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use crate::services::DeviceLimitService;
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: PgPool,

    /// Service configuration.
    pub config: Config,

    /// Global device limit service (loaded at startup).
    pub limits: Arc<DeviceLimitService>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health`, `/ready`, `/metrics` - public operational endpoints
/// - `/device-management/...` - admission and admin endpoints
///   (authenticated; admin role enforced in handlers)
/// - TraceLayer, HTTP metrics middleware, 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        jwt_secret: state.config.jwt_secret.clone(),
        clock_skew: Duration::from_secs(state.config.jwt_clock_skew_seconds.unsigned_abs()),
    });

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state.clone());

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Device management routes (authentication required)
    let device_routes = Router::new()
        .route("/device-management/register", post(handlers::register_device))
        .route(
            "/device-management/check-authorization",
            post(handlers::check_authorization),
        )
        .route("/device-management/users", get(handlers::list_accounts))
        .route(
            "/device-management/users/:id/devices",
            get(handlers::account_devices),
        )
        .route(
            "/device-management/users/:id/reset",
            put(handlers::reset_account),
        )
        .route(
            "/device-management/devices/:id",
            delete(handlers::remove_device),
        )
        .route("/device-management/stats", get(handlers::device_stats))
        .route(
            "/device-management/limit",
            get(handlers::get_limit).put(handlers::update_limit),
        )
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(device_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
