//! Business logic layer for the device service.

pub mod admission;
pub mod limit;

pub use limit::DeviceLimitService;
