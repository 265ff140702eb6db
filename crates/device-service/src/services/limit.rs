//! Global device limit configuration service.
//!
//! The limit is process-wide mutable state with an explicit lifecycle:
//! loaded from persisted configuration at startup, read on every
//! admission check, and updated only through [`DeviceLimitService::set`],
//! which atomically persists the new value and then sweeps over-limit
//! accounts. The sweep runs one account at a time and is best-effort: a
//! crash mid-sweep leaves a partially-applied reset with no compensation.
//!
//! Concurrent updates are last-writer-wins; there is no optimistic
//! versioning on the settings row.

use crate::errors::DmError;
use crate::observability::metrics;
use crate::repositories::{devices, settings};
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

/// Default per-account device limit.
pub const DEFAULT_DEVICE_LIMIT: i32 = 2;

/// Minimum configurable device limit.
pub const MIN_DEVICE_LIMIT: i32 = 1;

/// Maximum configurable device limit.
pub const MAX_DEVICE_LIMIT: i32 = 10;

/// Deactivation reason recorded by the limit sweep.
const SWEEP_REASON: &str = "device_limit_reduced";

/// Outcome of a limit update.
#[derive(Debug, Clone, Copy)]
pub struct LimitUpdate {
    /// The limit now in effect.
    pub limit: i32,

    /// Accounts whose devices were reset by the sweep.
    pub reset_accounts: i64,
}

/// Injected configuration service owning the global device limit.
pub struct DeviceLimitService {
    pool: PgPool,
    current: RwLock<i32>,
}

impl DeviceLimitService {
    /// Load the persisted limit, storing the default on first start.
    pub async fn load(pool: PgPool) -> Result<Self, DmError> {
        let limit = match settings::get_device_limit(&pool).await? {
            Some(limit) => limit,
            None => {
                settings::upsert_device_limit(&pool, DEFAULT_DEVICE_LIMIT).await?;
                DEFAULT_DEVICE_LIMIT
            }
        };

        metrics::record_device_limit(limit);
        info!(target: "dms.services.limit", limit, "Device limit loaded");

        Ok(Self {
            pool,
            current: RwLock::new(limit),
        })
    }

    /// The limit currently in effect. Read on every admission check.
    pub async fn get(&self) -> i32 {
        *self.current.read().await
    }

    /// Update the limit and sweep accounts that now exceed it.
    ///
    /// Validation happens before any mutation. The sweep resets each
    /// over-limit account via the equivalent of an account reset; a
    /// failing account is logged and skipped, never rolled back.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the new limit is out of bounds, or
    /// `Database` when persisting the limit itself fails.
    #[instrument(skip_all, name = "dms.services.update_limit")]
    pub async fn set(&self, new_limit: i32) -> Result<LimitUpdate, DmError> {
        if !(MIN_DEVICE_LIMIT..=MAX_DEVICE_LIMIT).contains(&new_limit) {
            return Err(DmError::Validation(format!(
                "Device limit must be between {} and {}",
                MIN_DEVICE_LIMIT, MAX_DEVICE_LIMIT
            )));
        }

        let previous = self.get().await;
        settings::upsert_device_limit(&self.pool, new_limit).await?;
        *self.current.write().await = new_limit;
        metrics::record_device_limit(new_limit);

        // Raising the limit leaves existing registrations untouched; the
        // over-limit set is empty in that case and the sweep is a no-op.
        let mut reset_accounts = 0i64;
        for account_id in devices::accounts_over_limit(&self.pool, new_limit).await? {
            match devices::deactivate_all_for_account(&self.pool, account_id, SWEEP_REASON).await {
                Ok(count) if count > 0 => reset_accounts += 1,
                Ok(_) => {}
                Err(e) => {
                    // Best-effort sweep: keep going, the account stays
                    // over-limit until the next update.
                    warn!(
                        target: "dms.services.limit",
                        account_id = %account_id,
                        error = %e,
                        "Failed to reset over-limit account during sweep"
                    );
                }
            }
        }

        info!(
            target: "dms.services.limit",
            previous,
            limit = new_limit,
            reset_accounts,
            "Device limit updated"
        );

        Ok(LimitUpdate {
            limit: new_limit,
            reset_accounts,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_bounds() {
        assert!(MIN_DEVICE_LIMIT <= DEFAULT_DEVICE_LIMIT);
        assert!(DEFAULT_DEVICE_LIMIT <= MAX_DEVICE_LIMIT);
        assert_eq!(DEFAULT_DEVICE_LIMIT, 2);
        assert_eq!(MIN_DEVICE_LIMIT, 1);
        assert_eq!(MAX_DEVICE_LIMIT, 10);
    }
}
