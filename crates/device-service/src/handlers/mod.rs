//! HTTP request handlers for the device service.

pub mod admin;
pub mod admission;
pub mod health;
pub mod metrics;

pub use admin::{
    account_devices, device_stats, get_limit, list_accounts, remove_device, reset_account,
    update_limit,
};
pub use admission::{check_authorization, register_device};
pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;
