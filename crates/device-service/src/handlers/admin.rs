//! Admin handlers for device management.
//!
//! - `GET /device-management/users` - Per-account device summaries
//! - `GET /device-management/users/{id}/devices` - One account's devices
//! - `PUT /device-management/users/{id}/reset` - Reset an account
//! - `DELETE /device-management/devices/{id}` - Remove one device
//! - `GET /device-management/stats` - Aggregate statistics
//! - `GET /device-management/limit` - Read the global limit
//! - `PUT /device-management/limit` - Update the limit (with sweep)

use crate::errors::DmError;
use crate::models::{
    AccountDevicesResponse, AccountDevicesSummary, AccountListQuery, AccountListResponse,
    BreakdownEntry, DeviceStatsResponse, DeviceStatusFilter, DeviceSummary, LimitResponse,
    ResetDevicesResponse, UpdateLimitRequest, UpdateLimitResponse,
};
use crate::repositories::{accounts, devices};
use crate::routes::AppState;
use crate::services::admission;
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use common::jwt::UserClaims;
use common::types::{PageMeta, PageParams};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Handler for GET /device-management/users
///
/// Paginated per-account device summaries, searchable by name or email
/// and filterable by over/under-limit status.
#[instrument(
    skip_all,
    name = "dms.admin.list_accounts",
    fields(method = "GET", endpoint = "/device-management/users")
)]
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
    Query(query): Query<AccountListQuery>,
) -> Result<Json<AccountListResponse>, DmError> {
    ensure_admin(&claims)?;

    let filter = DeviceStatusFilter::parse(query.device_status.as_deref()).ok_or_else(|| {
        DmError::Validation(
            "deviceStatus must be 'all', 'over_limit', or 'under_limit'".to_string(),
        )
    })?;

    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let (page, limit) = params.resolve();

    let device_limit = state.limits.get().await;
    let rows = devices::account_summaries(
        &state.pool,
        search,
        filter,
        device_limit,
        limit,
        params.offset(),
    )
    .await?;

    let total = rows.first().map_or(0, |row| row.total_count);
    let accounts = rows
        .into_iter()
        .map(|row| AccountDevicesSummary::from_row(row, device_limit))
        .collect();

    Ok(Json(AccountListResponse {
        accounts,
        pagination: PageMeta::new(page, limit, total),
        device_limit,
    }))
}

/// Handler for GET /device-management/users/{id}/devices
///
/// All registrations for one account, active and inactive.
#[instrument(
    skip_all,
    name = "dms.admin.account_devices",
    fields(method = "GET", endpoint = "/device-management/users/{id}/devices")
)]
pub async fn account_devices(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AccountDevicesResponse>, DmError> {
    ensure_admin(&claims)?;

    accounts::get_by_id(&state.pool, account_id)
        .await?
        .ok_or_else(|| DmError::NotFound("Account not found".to_string()))?;

    let devices = devices::list_for_account(&state.pool, account_id).await?;

    Ok(Json(AccountDevicesResponse {
        account_id,
        devices: devices.into_iter().map(DeviceSummary::from).collect(),
    }))
}

/// Handler for PUT /device-management/users/{id}/reset
///
/// Deactivate all of an account's devices. Idempotent: resetting an
/// already-reset account reports a zero count and succeeds.
#[instrument(
    skip_all,
    name = "dms.admin.reset_account",
    fields(method = "PUT", endpoint = "/device-management/users/{id}/reset")
)]
pub async fn reset_account(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<ResetDevicesResponse>, DmError> {
    ensure_admin(&claims)?;

    accounts::get_by_id(&state.pool, account_id)
        .await?
        .ok_or_else(|| DmError::NotFound("Account not found".to_string()))?;

    let reset_count = admission::reset_account_devices(&state.pool, account_id).await?;

    Ok(Json(ResetDevicesResponse { reset_count }))
}

/// Handler for DELETE /device-management/devices/{id}
///
/// Deactivate a single registration. 404 if it is absent or already
/// inactive; the row itself is retained for audit.
#[instrument(
    skip_all,
    name = "dms.admin.remove_device",
    fields(method = "DELETE", endpoint = "/device-management/devices/{id}")
)]
pub async fn remove_device(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
    Path(device_id): Path<Uuid>,
) -> Result<Json<DeviceSummary>, DmError> {
    ensure_admin(&claims)?;

    let device = admission::remove_device(&state.pool, device_id).await?;

    Ok(Json(DeviceSummary::from(device)))
}

/// Handler for GET /device-management/stats
///
/// Totals, per-platform and per-browser breakdowns of active devices,
/// the count of accounts currently over the limit, and the limit itself.
#[instrument(
    skip_all,
    name = "dms.admin.stats",
    fields(method = "GET", endpoint = "/device-management/stats")
)]
pub async fn device_stats(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<DeviceStatsResponse>, DmError> {
    ensure_admin(&claims)?;

    let (total_devices, active_devices, inactive_devices) = devices::totals(&state.pool).await?;
    let device_limit = state.limits.get().await;
    let accounts_over_limit = devices::count_accounts_over_limit(&state.pool, device_limit).await?;

    let by_platform = devices::breakdown_by_platform(&state.pool)
        .await?
        .into_iter()
        .map(|(name, count)| BreakdownEntry { name, count })
        .collect();

    let by_browser = devices::breakdown_by_browser(&state.pool)
        .await?
        .into_iter()
        .map(|(name, count)| BreakdownEntry { name, count })
        .collect();

    Ok(Json(DeviceStatsResponse {
        total_devices,
        active_devices,
        inactive_devices,
        by_platform,
        by_browser,
        accounts_over_limit,
        device_limit,
    }))
}

/// Handler for GET /device-management/limit
#[instrument(
    skip_all,
    name = "dms.admin.get_limit",
    fields(method = "GET", endpoint = "/device-management/limit")
)]
pub async fn get_limit(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<LimitResponse>, DmError> {
    ensure_admin(&claims)?;

    Ok(Json(LimitResponse {
        limit: state.limits.get().await,
    }))
}

/// Handler for PUT /device-management/limit
///
/// Update the global device limit. The update persists the new value and
/// then sweeps accounts whose active-device count exceeds it; the
/// response reports how many accounts were reset so the caller can show
/// the impact.
#[instrument(
    skip_all,
    name = "dms.admin.update_limit",
    fields(method = "PUT", endpoint = "/device-management/limit")
)]
pub async fn update_limit(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
    Json(request): Json<UpdateLimitRequest>,
) -> Result<Json<UpdateLimitResponse>, DmError> {
    ensure_admin(&claims)?;

    let update = state.limits.set(request.new_limit).await?;

    info!(
        target: "dms.handlers.admin",
        limit = update.limit,
        reset_users = update.reset_accounts,
        "Device limit updated by admin"
    );

    Ok(Json(UpdateLimitResponse {
        limit: update.limit,
        reset_users_count: update.reset_accounts,
    }))
}

/// Require an admin role on the authenticated claims.
fn ensure_admin(claims: &UserClaims) -> Result<(), DmError> {
    if claims.is_admin() {
        return Ok(());
    }

    warn!(
        target: "dms.handlers.admin",
        role = %claims.role,
        "Non-admin attempted a device admin operation"
    );
    Err(DmError::Forbidden(
        "Insufficient permissions for this operation".to_string(),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn claims(role: &str) -> UserClaims {
        UserClaims {
            sub: Uuid::new_v4().to_string(),
            role: role.to_string(),
            exp: 0,
            iat: 0,
        }
    }

    #[test]
    fn test_ensure_admin() {
        assert!(ensure_admin(&claims("admin")).is_ok());
        assert!(ensure_admin(&claims("super_admin")).is_ok());
        assert!(matches!(
            ensure_admin(&claims("student")),
            Err(DmError::Forbidden(_))
        ));
    }
}
