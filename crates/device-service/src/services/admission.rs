//! Device admission business logic.
//!
//! State machine per (account, fingerprint) pair:
//! `unregistered → active → inactive`. Deactivation is always explicit
//! (single removal, account reset, or the limit sweep); an inactive
//! registration is never reactivated — the same fingerprint registers a
//! fresh row, subject to the cap.

use crate::errors::DmError;
use crate::fingerprint;
use crate::models::{DeviceMetadataRequest, DeviceRow, NewDevice};
use crate::observability::metrics;
use crate::repositories::{accounts, devices};
use crate::services::DeviceLimitService;
use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

/// Deactivation reason recorded by an account-wide reset.
const RESET_REASON: &str = "admin_reset";

/// Deactivation reason recorded by a single-device removal.
const REMOVE_REASON: &str = "admin_removed";

/// Outcome of a registration attempt.
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    pub device: DeviceRow,

    /// False when an existing active registration was reused.
    pub created: bool,
}

/// Register the originating device for an account.
///
/// # Steps
///
/// 1. Derive the fingerprint from the submitted metadata
/// 2. Reuse an existing active registration (bump activity + counter)
/// 3. Otherwise resolve the account; unlimited-tier accounts register
///    unconditionally
/// 4. Otherwise insert through the cap gate; a rejected insert is the
///    distinguished DEVICE_LIMIT_EXCEEDED condition
#[instrument(skip_all, name = "dms.services.register_device")]
pub async fn register_device(
    pool: &PgPool,
    limits: &DeviceLimitService,
    account_id: Uuid,
    metadata: &DeviceMetadataRequest,
) -> Result<RegistrationOutcome, DmError> {
    let fp = fingerprint::derive_fingerprint(
        &metadata.platform,
        &metadata.screen_resolution,
        &metadata.timezone,
        &metadata.user_agent,
    );

    // Idempotent re-registration from a known device.
    if let Some(existing) = devices::find_active_by_fingerprint(pool, account_id, &fp).await? {
        let device = devices::touch_login(pool, existing.device_id).await?;
        metrics::record_admission("reused");
        return Ok(RegistrationOutcome {
            device,
            created: false,
        });
    }

    let account = accounts::get_by_id(pool, account_id)
        .await?
        .ok_or_else(|| DmError::NotFound("Account not found".to_string()))?;

    let new = NewDevice {
        account_id,
        fingerprint: fp,
        device_name: fingerprint::device_name(&metadata.user_agent),
        platform: metadata.platform.trim().to_string(),
        browser: fingerprint::detect_browser(&metadata.user_agent).to_string(),
        os: fingerprint::detect_os(&metadata.user_agent).to_string(),
        screen_resolution: metadata.screen_resolution.trim().to_string(),
        timezone: metadata.timezone.trim().to_string(),
        user_agent: metadata.user_agent.trim().to_string(),
    };

    let device = if account.unlimited_devices {
        devices::insert(pool, &new).await?
    } else {
        let limit = limits.get().await;
        match devices::insert_with_limit(pool, &new, limit).await? {
            Some(device) => device,
            None => {
                metrics::record_admission("limit_exceeded");
                info!(
                    target: "dms.services.admission",
                    account_id = %account_id,
                    limit,
                    "Registration rejected: device limit reached"
                );
                return Err(DmError::DeviceLimitExceeded { limit });
            }
        }
    };

    metrics::record_admission("registered");
    info!(
        target: "dms.services.admission",
        account_id = %account_id,
        device_id = %device.device_id,
        device_name = %device.device_name,
        "Device registered"
    );

    Ok(RegistrationOutcome {
        device,
        created: true,
    })
}

/// Check whether the originating device holds an active registration.
///
/// Read-only: activity bookkeeping happens on registration, not on
/// checks. `None` is the distinguished not-authorized condition; the
/// caller is expected to attempt registration next.
pub async fn check_authorization(
    pool: &PgPool,
    account_id: Uuid,
    metadata: &DeviceMetadataRequest,
) -> Result<Option<DeviceRow>, DmError> {
    let fp = fingerprint::derive_fingerprint(
        &metadata.platform,
        &metadata.screen_resolution,
        &metadata.timezone,
        &metadata.user_agent,
    );

    devices::find_active_by_fingerprint(pool, account_id, &fp).await
}

/// Deactivate all of an account's active registrations.
///
/// Idempotent: resetting an already-reset account succeeds with a zero
/// count. Registration rows are kept for audit.
#[instrument(skip_all, name = "dms.services.reset_devices")]
pub async fn reset_account_devices(pool: &PgPool, account_id: Uuid) -> Result<u64, DmError> {
    let count = devices::deactivate_all_for_account(pool, account_id, RESET_REASON).await?;

    info!(
        target: "dms.services.admission",
        account_id = %account_id,
        count,
        "Account devices reset"
    );

    Ok(count)
}

/// Deactivate a single registration, recording the removal reason.
///
/// # Errors
///
/// Returns `NotFound` if the registration is absent or already inactive.
pub async fn remove_device(pool: &PgPool, device_id: Uuid) -> Result<DeviceRow, DmError> {
    let device = devices::deactivate_by_id(pool, device_id, REMOVE_REASON)
        .await?
        .ok_or_else(|| DmError::NotFound("Device not found".to_string()))?;

    info!(
        target: "dms.services.admission",
        device_id = %device_id,
        account_id = %device.account_id,
        "Device removed"
    );

    Ok(device)
}
