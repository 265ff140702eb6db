//! Device service models.
//!
//! Database row types and request/response models. Wire names are
//! camelCase to preserve the platform's public REST contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Database Rows
// ============================================================================

/// Device registration row.
///
/// One row per (account, fingerprint) registration. Deactivated rows are
/// retained for audit; active lookups always filter on `is_active`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeviceRow {
    pub device_id: Uuid,
    pub account_id: Uuid,
    pub fingerprint: String,
    pub device_name: String,
    pub platform: String,
    pub browser: String,
    pub os: String,
    pub screen_resolution: String,
    pub timezone: String,
    pub user_agent: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub login_count: i32,
    pub is_active: bool,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub deactivation_reason: Option<String>,
}

/// Fields for inserting a new device registration.
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub account_id: Uuid,
    pub fingerprint: String,
    pub device_name: String,
    pub platform: String,
    pub browser: String,
    pub os: String,
    pub screen_resolution: String,
    pub timezone: String,
    pub user_agent: String,
}

/// Account row from the platform directory (read-only here).
#[derive(Debug, Clone, sqlx::FromRow)]
#[allow(dead_code)] // Directory columns mapped for logging and future use
pub struct AccountRow {
    pub account_id: Uuid,
    pub display_name: String,
    pub email: String,
    pub unlimited_devices: bool,
}

/// Per-account device summary row for the admin listing.
///
/// `total_count` is the window count of matching accounts, carried on
/// every row so the listing needs a single query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountDeviceSummaryRow {
    pub account_id: Uuid,
    pub display_name: String,
    pub email: String,
    pub unlimited_devices: bool,
    pub total_devices: i64,
    pub active_devices: i64,
    pub last_activity: Option<DateTime<Utc>>,
    pub total_count: i64,
}

/// Admin listing filter over per-account device status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceStatusFilter {
    #[default]
    All,
    OverLimit,
    UnderLimit,
}

impl DeviceStatusFilter {
    /// Parse the `deviceStatus` query value.
    pub fn parse(s: Option<&str>) -> Option<Self> {
        match s {
            None | Some("all") => Some(DeviceStatusFilter::All),
            Some("over_limit") => Some(DeviceStatusFilter::OverLimit),
            Some("under_limit") => Some(DeviceStatusFilter::UnderLimit),
            Some(_) => None,
        }
    }

    /// SQL discriminator bound into the listing query; `None` means no
    /// filtering.
    pub fn as_sql(&self) -> Option<&'static str> {
        match self {
            DeviceStatusFilter::All => None,
            DeviceStatusFilter::OverLimit => Some("over_limit"),
            DeviceStatusFilter::UnderLimit => Some("under_limit"),
        }
    }
}

// ============================================================================
// Request Models
// ============================================================================

/// Device metadata submitted on register/check-authorization.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeviceMetadataRequest {
    /// Navigator platform string (e.g. "Win32", "MacIntel").
    pub platform: String,

    /// Screen resolution (e.g. "1920x1080").
    pub screen_resolution: String,

    /// IANA timezone (e.g. "Europe/Berlin").
    pub timezone: String,

    /// Full user agent string.
    pub user_agent: String,

    /// Free-form extra client info; stored nowhere, accepted for forward
    /// compatibility with older clients that send it.
    pub additional_info: Option<serde_json::Value>,
}

impl DeviceMetadataRequest {
    /// Validate the request fields.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.platform.trim().is_empty() {
            return Err("Platform is required");
        }
        if self.screen_resolution.trim().is_empty() {
            return Err("Screen resolution is required");
        }
        if self.timezone.trim().is_empty() {
            return Err("Timezone is required");
        }
        if self.user_agent.trim().is_empty() {
            return Err("User agent is required");
        }
        Ok(())
    }
}

/// Request to update the global device limit.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateLimitRequest {
    pub new_limit: i32,
}

/// Query parameters for the admin account listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,

    /// Case-insensitive substring match on display name or email.
    pub search: Option<String>,

    /// "all" (default), "over_limit", or "under_limit".
    pub device_status: Option<String>,
}

// ============================================================================
// Response Models
// ============================================================================

/// Device summary exposed over the API.
///
/// The raw fingerprint stays internal; clients and admins only see the
/// derived name and metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub device_id: Uuid,
    pub device_name: String,
    pub platform: String,
    pub browser: String,
    pub os: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub login_count: i32,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivation_reason: Option<String>,
}

impl From<DeviceRow> for DeviceSummary {
    fn from(row: DeviceRow) -> Self {
        Self {
            device_id: row.device_id,
            device_name: row.device_name,
            platform: row.platform,
            browser: row.browser,
            os: row.os,
            first_seen_at: row.first_seen_at,
            last_activity_at: row.last_activity_at,
            login_count: row.login_count,
            is_active: row.is_active,
            deactivated_at: row.deactivated_at,
            deactivation_reason: row.deactivation_reason,
        }
    }
}

/// Response for device registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceResponse {
    /// Whether the device may maintain the session.
    pub authorized: bool,

    /// Whether a new registration was created (false on idempotent
    /// re-registration and on policy fallback).
    pub created: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceSummary>,

    /// True when the permissive policy degraded an admission failure to
    /// an allow. Never silent.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub policy_fallback: bool,
}

/// Response for the authorization check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAuthorizationResponse {
    pub authorized: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceSummary>,

    /// Machine-readable reason when not authorized; callers react by
    /// attempting registration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub policy_fallback: bool,
}

/// Per-account summary in the admin listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDevicesSummary {
    pub account_id: Uuid,
    pub display_name: String,
    pub email: String,
    pub unlimited_devices: bool,
    pub total_devices: i64,
    pub active_devices: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
    pub over_limit: bool,
}

impl AccountDevicesSummary {
    /// Build a summary, deriving the over-limit flag against the current
    /// global limit.
    pub fn from_row(row: AccountDeviceSummaryRow, device_limit: i32) -> Self {
        let over_limit = !row.unlimited_devices && row.active_devices > i64::from(device_limit);
        Self {
            account_id: row.account_id,
            display_name: row.display_name,
            email: row.email,
            unlimited_devices: row.unlimited_devices,
            total_devices: row.total_devices,
            active_devices: row.active_devices,
            last_activity: row.last_activity,
            over_limit,
        }
    }
}

/// Response for the admin account listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountListResponse {
    pub accounts: Vec<AccountDevicesSummary>,
    pub pagination: common::types::PageMeta,
    pub device_limit: i32,
}

/// Response listing one account's devices.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDevicesResponse {
    pub account_id: Uuid,
    pub devices: Vec<DeviceSummary>,
}

/// Response for an account device reset.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetDevicesResponse {
    /// Number of registrations deactivated; zero when the account was
    /// already reset (idempotent success).
    pub reset_count: u64,
}

/// Response for reading the global device limit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitResponse {
    pub limit: i32,
}

/// Response for updating the global device limit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLimitResponse {
    pub limit: i32,

    /// Accounts whose devices were reset by the post-update sweep.
    pub reset_users_count: i64,
}

/// One entry in a per-platform or per-browser breakdown.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownEntry {
    pub name: String,
    pub count: i64,
}

/// Aggregate device statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatsResponse {
    pub total_devices: i64,
    pub active_devices: i64,
    pub inactive_devices: i64,
    pub by_platform: Vec<BreakdownEntry>,
    pub by_browser: Vec<BreakdownEntry>,
    pub accounts_over_limit: i64,
    pub device_limit: i32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample_device_row() -> DeviceRow {
        DeviceRow {
            device_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            fingerprint: "ab".repeat(32),
            device_name: "Chrome on Windows".to_string(),
            platform: "Win32".to_string(),
            browser: "Chrome".to_string(),
            os: "Windows".to_string(),
            screen_resolution: "1920x1080".to_string(),
            timezone: "Europe/Berlin".to_string(),
            user_agent: "Mozilla/5.0 ...".to_string(),
            first_seen_at: Utc::now(),
            last_activity_at: Utc::now(),
            login_count: 3,
            is_active: true,
            deactivated_at: None,
            deactivation_reason: None,
        }
    }

    #[test]
    fn test_device_summary_hides_fingerprint() {
        let row = sample_device_row();
        let fingerprint = row.fingerprint.clone();
        let summary = DeviceSummary::from(row);
        let json = serde_json::to_string(&summary).unwrap();

        assert!(!json.contains(&fingerprint));
        assert!(json.contains("\"deviceName\":\"Chrome on Windows\""));
        assert!(json.contains("\"loginCount\":3"));
        // deactivation fields omitted while active
        assert!(!json.contains("deactivatedAt"));
    }

    #[test]
    fn test_register_response_omits_false_fallback() {
        let response = RegisterDeviceResponse {
            authorized: true,
            created: true,
            device: Some(DeviceSummary::from(sample_device_row())),
            policy_fallback: false,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("policyFallback"));

        let response = RegisterDeviceResponse {
            authorized: true,
            created: false,
            device: None,
            policy_fallback: true,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"policyFallback\":true"));
    }

    #[test]
    fn test_check_authorization_response_code() {
        let response = CheckAuthorizationResponse {
            authorized: false,
            device: None,
            code: Some("DEVICE_NOT_AUTHORIZED"),
            policy_fallback: false,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"code\":\"DEVICE_NOT_AUTHORIZED\""));
    }

    #[test]
    fn test_device_status_filter_parse() {
        assert_eq!(DeviceStatusFilter::parse(None), Some(DeviceStatusFilter::All));
        assert_eq!(
            DeviceStatusFilter::parse(Some("all")),
            Some(DeviceStatusFilter::All)
        );
        assert_eq!(
            DeviceStatusFilter::parse(Some("over_limit")),
            Some(DeviceStatusFilter::OverLimit)
        );
        assert_eq!(
            DeviceStatusFilter::parse(Some("under_limit")),
            Some(DeviceStatusFilter::UnderLimit)
        );
        assert_eq!(DeviceStatusFilter::parse(Some("bogus")), None);
    }

    #[test]
    fn test_account_summary_over_limit_flag() {
        let row = AccountDeviceSummaryRow {
            account_id: Uuid::new_v4(),
            display_name: "Test".to_string(),
            email: "test@example.com".to_string(),
            unlimited_devices: false,
            total_devices: 5,
            active_devices: 3,
            last_activity: None,
            total_count: 1,
        };

        let summary = AccountDevicesSummary::from_row(row.clone(), 2);
        assert!(summary.over_limit);

        let summary = AccountDevicesSummary::from_row(row.clone(), 3);
        assert!(!summary.over_limit);

        // Unlimited-tier accounts are never over the limit.
        let mut unlimited = row;
        unlimited.unlimited_devices = true;
        let summary = AccountDevicesSummary::from_row(unlimited, 1);
        assert!(!summary.over_limit);
    }

    #[test]
    fn test_metadata_request_validation() {
        let request = DeviceMetadataRequest {
            platform: "Win32".to_string(),
            screen_resolution: "1920x1080".to_string(),
            timezone: "UTC".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            additional_info: None,
        };
        assert!(request.validate().is_ok());

        let mut bad = request.clone();
        bad.platform = "  ".to_string();
        assert_eq!(bad.validate().unwrap_err(), "Platform is required");

        let mut bad = request;
        bad.user_agent = String::new();
        assert_eq!(bad.validate().unwrap_err(), "User agent is required");
    }

    #[test]
    fn test_metadata_request_deserialization_camel_case() {
        let json = r#"{
            "platform": "MacIntel",
            "screenResolution": "2560x1600",
            "timezone": "America/New_York",
            "userAgent": "Mozilla/5.0",
            "additionalInfo": {"colorDepth": 30}
        }"#;

        let request: DeviceMetadataRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.platform, "MacIntel");
        assert_eq!(request.screen_resolution, "2560x1600");
        assert!(request.additional_info.is_some());
    }

    #[test]
    fn test_update_limit_request_deserialization() {
        let request: UpdateLimitRequest = serde_json::from_str(r#"{"newLimit": 4}"#).unwrap();
        assert_eq!(request.new_limit, 4);

        let result: Result<UpdateLimitRequest, _> =
            serde_json::from_str(r#"{"newLimit": 4, "extra": true}"#);
        assert!(result.is_err());
    }
}
