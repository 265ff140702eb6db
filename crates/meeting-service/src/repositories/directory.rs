//! Account directory lookups.
//!
//! The account, stage, and subject tables are owned by the wider platform;
//! this service only reads them to validate references and resolve names.
//! A reference can disappear between validation and write — that race is
//! accepted, matching the rest of the platform.

use crate::errors::LmError;
use sqlx::PgPool;
use uuid::Uuid;

/// Check that an account exists, is active, and holds the instructor role.
pub async fn instructor_exists(pool: &PgPool, account_id: Uuid) -> Result<bool, LmError> {
    let exists: (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM accounts
            WHERE account_id = $1 AND role = 'instructor' AND is_active = true
        )
        "#,
    )
    .bind(account_id)
    .fetch_one(pool)
    .await
    .map_err(|e| LmError::Database(format!("Failed to check instructor: {}", e)))?;

    Ok(exists.0)
}

/// Check that a stage exists and is active.
pub async fn stage_exists(pool: &PgPool, stage_id: Uuid) -> Result<bool, LmError> {
    let exists: (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM stages WHERE stage_id = $1 AND is_active = true
        )
        "#,
    )
    .bind(stage_id)
    .fetch_one(pool)
    .await
    .map_err(|e| LmError::Database(format!("Failed to check stage: {}", e)))?;

    Ok(exists.0)
}

/// Check that a subject exists and is active.
pub async fn subject_exists(pool: &PgPool, subject_id: Uuid) -> Result<bool, LmError> {
    let exists: (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM subjects WHERE subject_id = $1 AND is_active = true
        )
        "#,
    )
    .bind(subject_id)
    .fetch_one(pool)
    .await
    .map_err(|e| LmError::Database(format!("Failed to check subject: {}", e)))?;

    Ok(exists.0)
}

/// Get an account's stage, if any.
///
/// Returns `None` if the account does not exist; `Some(None)` if it exists
/// without an associated stage.
pub async fn account_stage(
    pool: &PgPool,
    account_id: Uuid,
) -> Result<Option<Option<Uuid>>, LmError> {
    let row: Option<(Option<Uuid>,)> = sqlx::query_as(
        r#"
        SELECT stage_id FROM accounts
        WHERE account_id = $1 AND is_active = true
        "#,
    )
    .bind(account_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| LmError::Database(format!("Failed to fetch account stage: {}", e)))?;

    Ok(row.map(|(stage_id,)| stage_id))
}

/// Filter a candidate id list down to active directory accounts.
///
/// Used to partition submitted attendee lists; order of the result is not
/// significant (callers re-order by submission).
pub async fn filter_existing_accounts(
    pool: &PgPool,
    account_ids: &[Uuid],
) -> Result<Vec<Uuid>, LmError> {
    if account_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT account_id FROM accounts
        WHERE account_id = ANY($1) AND is_active = true
        "#,
    )
    .bind(account_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| LmError::Database(format!("Failed to filter accounts: {}", e)))?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}
