//! Observability (metrics) for the meeting service.

pub mod metrics;
