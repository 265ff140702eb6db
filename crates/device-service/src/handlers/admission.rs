//! Device admission handlers.
//!
//! - `POST /device-management/register` - Register the originating device
//! - `POST /device-management/check-authorization` - Check registration
//!
//! Both endpoints apply the configured admission policy: under
//! `permissive`, soft admission failures (store outages, directory
//! inconsistencies) degrade to an allow flagged `policyFallback` instead
//! of locking the account out. The DEVICE_LIMIT_EXCEEDED condition is
//! never degraded — clients branch on it for dedicated UX.

use crate::config::AdmissionPolicy;
use crate::errors::DmError;
use crate::models::{
    CheckAuthorizationResponse, DeviceMetadataRequest, DeviceSummary, RegisterDeviceResponse,
};
use crate::observability::metrics;
use crate::routes::AppState;
use crate::services::admission;
use axum::{extract::State, Extension, Json};
use common::jwt::UserClaims;
use std::sync::Arc;
use tracing::{error, instrument};
use uuid::Uuid;

/// Machine-readable code for the not-authorized check result.
const DEVICE_NOT_AUTHORIZED: &str = "DEVICE_NOT_AUTHORIZED";

/// Handler for POST /device-management/register
///
/// Register the originating device for the authenticated account.
///
/// # Response
///
/// - 200 OK: Device registered or reused; body carries the registration
/// - 400 Bad Request: Missing metadata fields
/// - 401 Unauthorized: Invalid or missing token
/// - 409 Conflict (DEVICE_LIMIT_EXCEEDED): Cap reached; the caller
///   surfaces the dedicated contact-admin flow
#[instrument(
    skip_all,
    name = "dms.admission.register",
    fields(method = "POST", endpoint = "/device-management/register")
)]
pub async fn register_device(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
    Json(request): Json<DeviceMetadataRequest>,
) -> Result<Json<RegisterDeviceResponse>, DmError> {
    let account = account_id(&claims)?;

    request
        .validate()
        .map_err(|e| DmError::Validation(e.to_string()))?;

    match admission::register_device(&state.pool, &state.limits, account, &request).await {
        Ok(outcome) => Ok(Json(RegisterDeviceResponse {
            authorized: true,
            created: outcome.created,
            device: Some(DeviceSummary::from(outcome.device)),
            policy_fallback: false,
        })),
        Err(e)
            if e.is_soft_admission_failure()
                && state.config.admission_policy == AdmissionPolicy::Permissive =>
        {
            // Availability over strictness: the failure is logged and
            // counted, and the session continues unregistered.
            error!(
                target: "dms.handlers.admission",
                error = %e,
                "Device registration failed; allowing session under permissive policy"
            );
            metrics::record_admission("policy_fallback");
            Ok(Json(RegisterDeviceResponse {
                authorized: true,
                created: false,
                device: None,
                policy_fallback: true,
            }))
        }
        Err(e) => Err(e),
    }
}

/// Handler for POST /device-management/check-authorization
///
/// Check whether the originating device holds an active registration.
/// Not-authorized is a 200 with a machine-readable code, not an error:
/// the caller reacts by attempting registration.
#[instrument(
    skip_all,
    name = "dms.admission.check",
    fields(method = "POST", endpoint = "/device-management/check-authorization")
)]
pub async fn check_authorization(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
    Json(request): Json<DeviceMetadataRequest>,
) -> Result<Json<CheckAuthorizationResponse>, DmError> {
    let account = account_id(&claims)?;

    request
        .validate()
        .map_err(|e| DmError::Validation(e.to_string()))?;

    match admission::check_authorization(&state.pool, account, &request).await {
        Ok(Some(device)) => Ok(Json(CheckAuthorizationResponse {
            authorized: true,
            device: Some(DeviceSummary::from(device)),
            code: None,
            policy_fallback: false,
        })),
        Ok(None) => Ok(Json(CheckAuthorizationResponse {
            authorized: false,
            device: None,
            code: Some(DEVICE_NOT_AUTHORIZED),
            policy_fallback: false,
        })),
        Err(e)
            if e.is_soft_admission_failure()
                && state.config.admission_policy == AdmissionPolicy::Permissive =>
        {
            error!(
                target: "dms.handlers.admission",
                error = %e,
                "Authorization check failed; allowing session under permissive policy"
            );
            metrics::record_admission("policy_fallback");
            Ok(Json(CheckAuthorizationResponse {
                authorized: true,
                device: None,
                code: None,
                policy_fallback: true,
            }))
        }
        Err(e) => Err(e),
    }
}

/// Parse the account id out of the authenticated claims.
fn account_id(claims: &UserClaims) -> Result<Uuid, DmError> {
    claims
        .account_id()
        .map_err(|e| DmError::InvalidToken(e.to_string()))
}
