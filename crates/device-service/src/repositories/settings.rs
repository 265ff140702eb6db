//! Persisted process-wide configuration.
//!
//! The global device limit lives in the `platform_settings` table so it
//! survives restarts; the in-memory copy in `services::limit` is loaded
//! from here at startup and written back on every update.

use crate::errors::DmError;
use sqlx::PgPool;

/// Settings key for the global device limit.
const DEVICE_LIMIT_KEY: &str = "device_limit";

/// Read the persisted global device limit, if one has been stored.
pub async fn get_device_limit(pool: &PgPool) -> Result<Option<i32>, DmError> {
    let row: Option<(i32,)> = sqlx::query_as(
        r#"
        SELECT int_value FROM platform_settings WHERE key = $1
        "#,
    )
    .bind(DEVICE_LIMIT_KEY)
    .fetch_optional(pool)
    .await
    .map_err(|e| DmError::Database(format!("Failed to fetch device limit: {}", e)))?;

    Ok(row.map(|(v,)| v))
}

/// Persist the global device limit.
pub async fn upsert_device_limit(pool: &PgPool, limit: i32) -> Result<(), DmError> {
    sqlx::query(
        r#"
        INSERT INTO platform_settings (key, int_value, updated_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (key) DO UPDATE SET int_value = $2, updated_at = NOW()
        "#,
    )
    .bind(DEVICE_LIMIT_KEY)
    .bind(limit)
    .execute(pool)
    .await
    .map_err(|e| DmError::Database(format!("Failed to persist device limit: {}", e)))?;

    Ok(())
}
