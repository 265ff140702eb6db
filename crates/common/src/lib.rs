//! Common utilities and types shared across OpenClass services.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (validation, claims, constants)
pub mod jwt;

/// Module for common data types (pagination, reference summaries)
pub mod types;
