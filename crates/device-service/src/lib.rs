//! Device Admission Service Library
//!
//! Owns the set of devices authorized to maintain an authenticated
//! session for an OpenClass account: fingerprint-keyed registration, a
//! configurable per-account device cap with reset/override operations,
//! and the admin HTTP surface.
//!
//! # Modules
//!
//! - `config` - Service configuration (including the admission policy)
//! - `errors` - Error types
//! - `fingerprint` - Device fingerprint and user-agent derivation
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and HTTP metrics middleware
//! - `models` - Data models
//! - `observability` - Metrics definitions
//! - `repositories` - Database access layer
//! - `routes` - Router and application state
//! - `services` - Business logic (admission, device limit)

pub mod config;
pub mod errors;
pub mod fingerprint;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
