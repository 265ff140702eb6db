//! HTTP routes for the meeting service.
//!
//! Defines the Axum router and application state. Role checks beyond
//! "authenticated" happen inside handlers, so every /live-meetings route
//! shares one auth layer.

use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use axum::{
    middleware,
    routing::{delete, get, post},
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
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK") - public
/// - `/ready` - Readiness probe (checks DB) - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/live-meetings/...` - Meeting endpoints - authenticated
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
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

    // Meeting routes (authentication required; admin checks in handlers)
    let meeting_routes = Router::new()
        .route("/live-meetings", post(handlers::create_meeting))
        .route("/live-meetings/admin/all", get(handlers::list_meetings_admin))
        .route("/live-meetings/admin/stats", get(handlers::meeting_stats))
        .route("/live-meetings/my-meetings", get(handlers::my_meetings))
        .route("/live-meetings/upcoming", get(handlers::upcoming_meetings))
        .route(
            "/live-meetings/:id",
            get(handlers::get_meeting)
                .put(handlers::update_meeting)
                .delete(handlers::delete_meeting),
        )
        .route("/live-meetings/:id/join", post(handlers::join_meeting))
        .route("/live-meetings/:id/attendees", post(handlers::add_attendees))
        .route(
            "/live-meetings/:id/attendees/:attendee_id",
            delete(handlers::remove_attendee),
        )
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(meeting_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
