//! Meeting Lifecycle Service Library
//!
//! Owns the live-meeting catalog for the OpenClass platform: time-derived
//! meeting status, the attendee roster with capacity enforcement, and the
//! admin/participant HTTP surface.
//!
//! # Modules
//!
//! - `config` - Service configuration
//! - `errors` - Error types
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and HTTP metrics middleware
//! - `models` - Data models and the status derivation function
//! - `observability` - Metrics definitions
//! - `repositories` - Database access layer
//! - `routes` - Router and application state

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
