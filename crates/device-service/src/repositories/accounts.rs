//! Account directory lookups.
//!
//! The accounts table is owned by the wider platform; this service reads
//! it to resolve the unlimited-tier flag and display metadata.

use crate::errors::DmError;
use crate::models::AccountRow;
use sqlx::PgPool;
use uuid::Uuid;

/// Get an active account by id.
pub async fn get_by_id(pool: &PgPool, account_id: Uuid) -> Result<Option<AccountRow>, DmError> {
    let account = sqlx::query_as::<_, AccountRow>(
        r#"
        SELECT account_id, display_name, email, unlimited_devices
        FROM accounts
        WHERE account_id = $1 AND is_active = true
        "#,
    )
    .bind(account_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| DmError::Database(format!("Failed to fetch account: {}", e)))?;

    Ok(account)
}
