//! Device registrations repository.
//!
//! The per-account device cap is enforced by a single atomic CTE insert
//! gated on the active-registration count, so concurrent registrations
//! cannot overshoot the limit. Deactivation never deletes rows; history
//! is kept for audit.

use crate::errors::DmError;
use crate::models::{AccountDeviceSummaryRow, DeviceRow, DeviceStatusFilter, NewDevice};
use crate::observability::metrics;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Column list shared by every query returning device rows.
const DEVICE_COLUMNS: &str = r#"
    device_id, account_id, fingerprint, device_name, platform, browser, os,
    screen_resolution, timezone, user_agent, first_seen_at, last_activity_at,
    login_count, is_active, deactivated_at, deactivation_reason
"#;

/// Find the active registration for an (account, fingerprint) pair.
pub async fn find_active_by_fingerprint(
    pool: &PgPool,
    account_id: Uuid,
    fingerprint: &str,
) -> Result<Option<DeviceRow>, DmError> {
    let query = format!(
        "SELECT {DEVICE_COLUMNS} FROM device_registrations
         WHERE account_id = $1 AND fingerprint = $2 AND is_active = true"
    );

    let device = sqlx::query_as::<_, DeviceRow>(&query)
        .bind(account_id)
        .bind(fingerprint)
        .fetch_optional(pool)
        .await
        .map_err(|e| DmError::Database(format!("Failed to look up device: {}", e)))?;

    Ok(device)
}

/// Record a repeat authentication from a known device.
///
/// Bumps `last_activity_at` and the login counter; fails with NotFound if
/// the registration was deactivated in the meantime.
pub async fn touch_login(pool: &PgPool, device_id: Uuid) -> Result<DeviceRow, DmError> {
    let query = format!(
        "UPDATE device_registrations
         SET last_activity_at = NOW(), login_count = login_count + 1
         WHERE device_id = $1 AND is_active = true
         RETURNING {DEVICE_COLUMNS}"
    );

    sqlx::query_as::<_, DeviceRow>(&query)
        .bind(device_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| DmError::Database(format!("Failed to update device activity: {}", e)))?
        .ok_or_else(|| DmError::NotFound("Device registration not found".to_string()))
}

/// Insert a registration without a cap check (unlimited-tier accounts).
#[instrument(skip_all, name = "dms.repo.insert_device")]
pub async fn insert(pool: &PgPool, new: &NewDevice) -> Result<DeviceRow, DmError> {
    let start = Instant::now();

    let query = format!(
        "INSERT INTO device_registrations (
            device_id, account_id, fingerprint, device_name, platform,
            browser, os, screen_resolution, timezone, user_agent,
            first_seen_at, last_activity_at, login_count, is_active
         )
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW(), 1, TRUE)
         RETURNING {DEVICE_COLUMNS}"
    );

    let result = sqlx::query_as::<_, DeviceRow>(&query)
        .bind(Uuid::new_v4())
        .bind(new.account_id)
        .bind(&new.fingerprint)
        .bind(&new.device_name)
        .bind(&new.platform)
        .bind(&new.browser)
        .bind(&new.os)
        .bind(&new.screen_resolution)
        .bind(&new.timezone)
        .bind(&new.user_agent)
        .fetch_one(pool)
        .await
        .map_err(|e| DmError::Database(format!("Failed to insert device: {}", e)));

    let status = if result.is_ok() { "success" } else { "error" };
    metrics::record_db_query("insert_device", status, start.elapsed());
    result
}

/// Insert a registration gated on the per-account device cap.
///
/// A single CTE counts the account's active registrations and inserts
/// only if the count is below the limit. Returns `None` when the gate
/// rejects the insert (cap reached).
#[instrument(skip_all, name = "dms.repo.insert_device_gated")]
pub async fn insert_with_limit(
    pool: &PgPool,
    new: &NewDevice,
    limit: i32,
) -> Result<Option<DeviceRow>, DmError> {
    let start = Instant::now();

    let query = format!(
        "WITH active AS (
            SELECT COUNT(*) AS cnt
            FROM device_registrations
            WHERE account_id = $2 AND is_active = true
         )
         INSERT INTO device_registrations (
            device_id, account_id, fingerprint, device_name, platform,
            browser, os, screen_resolution, timezone, user_agent,
            first_seen_at, last_activity_at, login_count, is_active
         )
         SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW(), 1, TRUE
         FROM active
         WHERE active.cnt < $11
         RETURNING {DEVICE_COLUMNS}"
    );

    let result = sqlx::query_as::<_, DeviceRow>(&query)
        .bind(Uuid::new_v4())
        .bind(new.account_id)
        .bind(&new.fingerprint)
        .bind(&new.device_name)
        .bind(&new.platform)
        .bind(&new.browser)
        .bind(&new.os)
        .bind(&new.screen_resolution)
        .bind(&new.timezone)
        .bind(&new.user_agent)
        .bind(limit)
        .fetch_optional(pool)
        .await
        .map_err(|e| DmError::Database(format!("Failed to insert device: {}", e)));

    let status = if result.is_ok() { "success" } else { "error" };
    metrics::record_db_query("insert_device_gated", status, start.elapsed());
    result
}

/// All registrations for an account, most recently active first.
pub async fn list_for_account(pool: &PgPool, account_id: Uuid) -> Result<Vec<DeviceRow>, DmError> {
    let query = format!(
        "SELECT {DEVICE_COLUMNS} FROM device_registrations
         WHERE account_id = $1
         ORDER BY last_activity_at DESC"
    );

    sqlx::query_as::<_, DeviceRow>(&query)
        .bind(account_id)
        .fetch_all(pool)
        .await
        .map_err(|e| DmError::Database(format!("Failed to list devices: {}", e)))
}

/// Deactivate all active registrations for an account.
///
/// Idempotent: returns the number of rows deactivated, zero when the
/// account was already reset.
#[instrument(skip_all, name = "dms.repo.deactivate_all")]
pub async fn deactivate_all_for_account(
    pool: &PgPool,
    account_id: Uuid,
    reason: &str,
) -> Result<u64, DmError> {
    let affected = sqlx::query(
        r#"
        UPDATE device_registrations
        SET is_active = false, deactivated_at = NOW(), deactivation_reason = $2
        WHERE account_id = $1 AND is_active = true
        "#,
    )
    .bind(account_id)
    .bind(reason)
    .execute(pool)
    .await
    .map_err(|e| DmError::Database(format!("Failed to reset devices: {}", e)))?
    .rows_affected();

    Ok(affected)
}

/// Deactivate a single registration by id, recording a reason.
///
/// Returns `None` if the registration is absent or already inactive.
pub async fn deactivate_by_id(
    pool: &PgPool,
    device_id: Uuid,
    reason: &str,
) -> Result<Option<DeviceRow>, DmError> {
    let query = format!(
        "UPDATE device_registrations
         SET is_active = false, deactivated_at = NOW(), deactivation_reason = $2
         WHERE device_id = $1 AND is_active = true
         RETURNING {DEVICE_COLUMNS}"
    );

    sqlx::query_as::<_, DeviceRow>(&query)
        .bind(device_id)
        .bind(reason)
        .fetch_optional(pool)
        .await
        .map_err(|e| DmError::Database(format!("Failed to deactivate device: {}", e)))
}

/// Accounts whose active-device count exceeds the given limit.
///
/// Unlimited-tier accounts are exempt from the cap and excluded here.
pub async fn accounts_over_limit(pool: &PgPool, limit: i32) -> Result<Vec<Uuid>, DmError> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT d.account_id
        FROM device_registrations d
        JOIN accounts a ON a.account_id = d.account_id
        WHERE d.is_active = true AND a.unlimited_devices = false
        GROUP BY d.account_id
        HAVING COUNT(*) > $1
        "#,
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await
    .map_err(|e| DmError::Database(format!("Failed to find over-limit accounts: {}", e)))?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Count of accounts currently over the given limit.
pub async fn count_accounts_over_limit(pool: &PgPool, limit: i32) -> Result<i64, DmError> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM (
            SELECT d.account_id
            FROM device_registrations d
            JOIN accounts a ON a.account_id = d.account_id
            WHERE d.is_active = true AND a.unlimited_devices = false
            GROUP BY d.account_id
            HAVING COUNT(*) > $1
        ) over_limit
        "#,
    )
    .bind(i64::from(limit))
    .fetch_one(pool)
    .await
    .map_err(|e| DmError::Database(format!("Failed to count over-limit accounts: {}", e)))?;

    Ok(count)
}

/// Total, active, and inactive registration counts.
pub async fn totals(pool: &PgPool) -> Result<(i64, i64, i64), DmError> {
    let (total, active): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active)
        FROM device_registrations
        "#,
    )
    .fetch_one(pool)
    .await
    .map_err(|e| DmError::Database(format!("Failed to count devices: {}", e)))?;

    Ok((total, active, total - active))
}

/// Active-device counts grouped by platform.
pub async fn breakdown_by_platform(pool: &PgPool) -> Result<Vec<(String, i64)>, DmError> {
    sqlx::query_as(
        r#"
        SELECT platform, COUNT(*)
        FROM device_registrations
        WHERE is_active = true
        GROUP BY platform
        ORDER BY COUNT(*) DESC
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| DmError::Database(format!("Failed to group devices by platform: {}", e)))
}

/// Active-device counts grouped by browser.
pub async fn breakdown_by_browser(pool: &PgPool) -> Result<Vec<(String, i64)>, DmError> {
    sqlx::query_as(
        r#"
        SELECT browser, COUNT(*)
        FROM device_registrations
        WHERE is_active = true
        GROUP BY browser
        ORDER BY COUNT(*) DESC
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| DmError::Database(format!("Failed to group devices by browser: {}", e)))
}

/// Per-account device summaries for the admin listing.
///
/// Searchable by display name or email, filterable by over/under-limit
/// status against the current global limit. The window count on each row
/// carries the total matching accounts.
#[instrument(skip_all, name = "dms.repo.account_summaries")]
pub async fn account_summaries(
    pool: &PgPool,
    search: Option<&str>,
    filter: DeviceStatusFilter,
    device_limit: i32,
    limit: i64,
    offset: i64,
) -> Result<Vec<AccountDeviceSummaryRow>, DmError> {
    let rows = sqlx::query_as::<_, AccountDeviceSummaryRow>(
        r#"
        SELECT
            a.account_id,
            a.display_name,
            a.email,
            a.unlimited_devices,
            COUNT(d.device_id) AS total_devices,
            COUNT(d.device_id) FILTER (WHERE d.is_active) AS active_devices,
            MAX(d.last_activity_at) AS last_activity,
            COUNT(*) OVER () AS total_count
        FROM accounts a
        LEFT JOIN device_registrations d ON d.account_id = a.account_id
        WHERE a.is_active = true
          AND ($1::text IS NULL
               OR a.display_name ILIKE '%' || $1 || '%'
               OR a.email ILIKE '%' || $1 || '%')
        GROUP BY a.account_id, a.display_name, a.email, a.unlimited_devices
        HAVING CASE $2::text
            WHEN 'over_limit' THEN
                COUNT(d.device_id) FILTER (WHERE d.is_active) > $3
                AND a.unlimited_devices = false
            WHEN 'under_limit' THEN
                COUNT(d.device_id) FILTER (WHERE d.is_active) <= $3
                OR a.unlimited_devices = true
            ELSE TRUE
        END
        ORDER BY a.display_name ASC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(search)
    .bind(filter.as_sql())
    .bind(i64::from(device_limit))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(|e| DmError::Database(format!("Failed to list account summaries: {}", e)))?;

    Ok(rows)
}
