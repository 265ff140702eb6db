//! JWT utilities shared across OpenClass services.
//!
//! This module provides common JWT validation utilities including:
//! - Size limits for DoS prevention
//! - Clock skew constants for iat validation
//! - User token claims structure and validation
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only HS256 is accepted; the algorithm is pinned, never read from the
//!   token header
//! - Generic error messages prevent information leakage
//! - The `sub` field in claims is redacted in Debug output

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this are rejected BEFORE any parsing or cryptographic
/// operations. Typical user tokens are 200-500 bytes; the limit leaves
/// room for growth while keeping oversized tokens cheap to reject.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default JWT clock skew tolerance (5 minutes per NIST SP 800-63B).
///
/// Accounts for clock drift between servers. Tokens with `iat` timestamps
/// more than this amount in the future are rejected.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Prevents misconfiguration that would weaken security by allowing
/// excessively large clock skew tolerance.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Roles that grant access to admin endpoints.
pub const ADMIN_ROLES: &[&str] = &["admin", "super_admin"];

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during JWT validation.
///
/// Note: Error messages are intentionally generic to prevent information
/// leakage. Detailed information is logged at debug level by callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token failed signature, structure, or expiry validation.
    #[error("The access token is invalid or expired")]
    InvalidToken,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,

    /// Token `sub` claim is not a well-formed account id.
    #[error("The access token is invalid or expired")]
    MalformedSubject,
}

// =============================================================================
// Claims Types
// =============================================================================

/// User token claims structure.
///
/// Carried on every request by the platform's session layer. The `sub`
/// field contains the account id and is redacted in Debug output.
#[derive(Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// Subject (account id) - redacted in Debug output.
    pub sub: String,

    /// Account role (`student`, `instructor`, `admin`, `super_admin`).
    pub role: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,
}

impl fmt::Debug for UserClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserClaims")
            .field("sub", &"[REDACTED]")
            .field("role", &self.role)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .finish()
    }
}

impl UserClaims {
    /// Whether this account holds an admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        ADMIN_ROLES.contains(&self.role.as_str())
    }

    /// Parse the subject into an account id.
    ///
    /// # Errors
    ///
    /// Returns `MalformedSubject` if `sub` is not a UUID.
    pub fn account_id(&self) -> Result<Uuid, JwtValidationError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtValidationError::MalformedSubject)
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Validate a user token and return its claims.
///
/// Checks, in order: token size, HS256 signature, `exp` (with leeway),
/// and `iat` not too far in the future.
///
/// # Errors
///
/// Returns a [`JwtValidationError`] on any failure. All variants render the
/// same generic message; callers log the variant at debug level.
pub fn validate_user_token(
    token: &str,
    secret: &[u8],
    clock_skew: Duration,
) -> Result<UserClaims, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        return Err(JwtValidationError::TokenTooLarge);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = clock_skew.as_secs();

    let data = decode::<UserClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|_| JwtValidationError::InvalidToken)?;

    validate_iat(data.claims.iat, clock_skew)?;

    Ok(data.claims)
}

/// Validate that an `iat` claim is not too far in the future.
///
/// # Errors
///
/// Returns `IatTooFarInFuture` if `iat` exceeds now + `clock_skew`.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    let max_allowed = now.saturating_add(clock_skew.as_secs() as i64);

    if iat > max_allowed {
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

/// Issue a user token for the given account.
///
/// Used by local tooling and test fixtures; the production session layer
/// issues tokens with the same claim shape.
///
/// # Errors
///
/// Returns `InvalidToken` if encoding fails.
pub fn issue_user_token(
    account_id: Uuid,
    role: &str,
    ttl: Duration,
    secret: &[u8],
) -> Result<String, JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    let claims = UserClaims {
        sub: account_id.to_string(),
        role: role.to_string(),
        exp: now.saturating_add(ttl.as_secs() as i64),
        iat: now,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|_| JwtValidationError::InvalidToken)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const TEST_SECRET: &[u8] = b"test-secret-not-for-production";

    #[test]
    fn test_round_trip_valid_token() {
        let account_id = Uuid::new_v4();
        let token = issue_user_token(
            account_id,
            "student",
            Duration::from_secs(900),
            TEST_SECRET,
        )
        .unwrap();

        let claims = validate_user_token(&token, TEST_SECRET, DEFAULT_CLOCK_SKEW).unwrap();
        assert_eq!(claims.sub, account_id.to_string());
        assert_eq!(claims.role, "student");
        assert_eq!(claims.account_id().unwrap(), account_id);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_user_token(
            Uuid::new_v4(),
            "student",
            Duration::from_secs(900),
            TEST_SECRET,
        )
        .unwrap();

        let result = validate_user_token(&token, b"a-different-secret", DEFAULT_CLOCK_SKEW);
        assert_eq!(result.unwrap_err(), JwtValidationError::InvalidToken);
    }

    #[test]
    fn test_oversized_token_rejected() {
        let token = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        let result = validate_user_token(&token, TEST_SECRET, DEFAULT_CLOCK_SKEW);
        assert_eq!(result.unwrap_err(), JwtValidationError::TokenTooLarge);
    }

    #[test]
    fn test_garbage_token_rejected() {
        let result = validate_user_token("not.a.jwt", TEST_SECRET, DEFAULT_CLOCK_SKEW);
        assert_eq!(result.unwrap_err(), JwtValidationError::InvalidToken);
    }

    #[test]
    fn test_iat_within_skew_accepted() {
        let now = chrono::Utc::now().timestamp();
        assert!(validate_iat(now, DEFAULT_CLOCK_SKEW).is_ok());
        assert!(validate_iat(now + 60, DEFAULT_CLOCK_SKEW).is_ok());
    }

    #[test]
    fn test_iat_too_far_in_future_rejected() {
        let now = chrono::Utc::now().timestamp();
        let result = validate_iat(now + 3600, DEFAULT_CLOCK_SKEW);
        assert_eq!(result.unwrap_err(), JwtValidationError::IatTooFarInFuture);
    }

    #[test]
    fn test_is_admin() {
        let mut claims = UserClaims {
            sub: Uuid::new_v4().to_string(),
            role: "admin".to_string(),
            exp: 0,
            iat: 0,
        };
        assert!(claims.is_admin());

        claims.role = "super_admin".to_string();
        assert!(claims.is_admin());

        claims.role = "student".to_string();
        assert!(!claims.is_admin());

        claims.role = "instructor".to_string();
        assert!(!claims.is_admin());
    }

    #[test]
    fn test_malformed_subject() {
        let claims = UserClaims {
            sub: "not-a-uuid".to_string(),
            role: "student".to_string(),
            exp: 0,
            iat: 0,
        };
        assert_eq!(
            claims.account_id().unwrap_err(),
            JwtValidationError::MalformedSubject
        );
    }

    #[test]
    fn test_debug_redacts_subject() {
        let claims = UserClaims {
            sub: "11111111-2222-3333-4444-555555555555".to_string(),
            role: "student".to_string(),
            exp: 0,
            iat: 0,
        };
        let debug = format!("{:?}", claims);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("11111111"));
    }

    #[test]
    fn test_error_messages_are_generic() {
        // All validation failures must render the same message so the
        // response body leaks nothing about why a token was rejected.
        let msg = "The access token is invalid or expired";
        assert_eq!(JwtValidationError::TokenTooLarge.to_string(), msg);
        assert_eq!(JwtValidationError::InvalidToken.to_string(), msg);
        assert_eq!(JwtValidationError::IatTooFarInFuture.to_string(), msg);
        assert_eq!(JwtValidationError::MalformedSubject.to_string(), msg);
    }
}
