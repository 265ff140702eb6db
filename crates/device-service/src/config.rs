//! Device service configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8082";

/// Behavior of the admission layer when registration or authorization
/// checks fail unexpectedly.
///
/// The platform historically preferred availability over strictness:
/// an admission-layer outage should not lock every account out. The
/// policy is explicit configuration so deployments can choose lockout
/// instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionPolicy {
    /// Unexpected admission failures degrade to an allow, flagged in the
    /// response and counted in metrics. Limit exhaustion still surfaces.
    Permissive,

    /// Every admission failure propagates to the caller.
    Strict,
}

impl AdmissionPolicy {
    /// Parse a policy value ("permissive" or "strict").
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "permissive" => Some(AdmissionPolicy::Permissive),
            "strict" => Some(AdmissionPolicy::Strict),
            _ => None,
        }
    }

    /// Returns the string representation of the policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionPolicy::Permissive => "permissive",
            AdmissionPolicy::Strict => "strict",
        }
    }
}

/// Device service configuration.
///
/// Loaded from environment variables with sensible defaults. Database URL
/// and JWT secret are redacted in Debug output.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8082").
    pub bind_address: String,

    /// Shared secret for validating user session tokens.
    pub jwt_secret: String,

    /// JWT clock skew tolerance in seconds for token validation.
    pub jwt_clock_skew_seconds: i64,

    /// Admission failure policy (default: permissive).
    pub admission_policy: AdmissionPolicy,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("admission_policy", &self.admission_policy)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid admission policy: {0}")]
    InvalidAdmissionPolicy(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let jwt_secret = vars
            .get("JWT_SECRET")
            .ok_or_else(|| ConfigError::MissingEnvVar("JWT_SECRET".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let jwt_clock_skew_seconds = parse_clock_skew(vars)?;

        let admission_policy = match vars.get("ADMISSION_POLICY") {
            None => AdmissionPolicy::Permissive,
            Some(value) => AdmissionPolicy::parse(value).ok_or_else(|| {
                ConfigError::InvalidAdmissionPolicy(format!(
                    "ADMISSION_POLICY must be 'permissive' or 'strict', got '{}'",
                    value
                ))
            })?,
        };

        Ok(Config {
            database_url,
            bind_address,
            jwt_secret,
            jwt_clock_skew_seconds,
            admission_policy,
        })
    }
}

/// Parse and bound the JWT clock skew tolerance.
fn parse_clock_skew(vars: &HashMap<String, String>) -> Result<i64, ConfigError> {
    let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") else {
        return Ok(DEFAULT_CLOCK_SKEW.as_secs() as i64);
    };

    let value: i64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidJwtClockSkew(format!(
            "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
            value_str, e
        ))
    })?;

    if value <= 0 {
        return Err(ConfigError::InvalidJwtClockSkew(format!(
            "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
            value
        )));
    }

    if value > MAX_CLOCK_SKEW.as_secs() as i64 {
        return Err(ConfigError::InvalidJwtClockSkew(format!(
            "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
            MAX_CLOCK_SKEW.as_secs(),
            value
        )));
    }

    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert(
            "DATABASE_URL".to_string(),
            "postgres://localhost/openclass".to_string(),
        );
        vars.insert("JWT_SECRET".to_string(), "secret".to_string());
        vars
    }

    #[test]
    fn test_from_vars_defaults() {
        let config = Config::from_vars(&base_vars()).unwrap();
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.admission_policy, AdmissionPolicy::Permissive);
    }

    #[test]
    fn test_admission_policy_parsing() {
        let mut vars = base_vars();

        vars.insert("ADMISSION_POLICY".to_string(), "strict".to_string());
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.admission_policy, AdmissionPolicy::Strict);

        vars.insert("ADMISSION_POLICY".to_string(), "permissive".to_string());
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.admission_policy, AdmissionPolicy::Permissive);

        vars.insert("ADMISSION_POLICY".to_string(), "lenient".to_string());
        assert!(matches!(
            Config::from_vars(&vars).unwrap_err(),
            ConfigError::InvalidAdmissionPolicy(_)
        ));
    }

    #[test]
    fn test_missing_required_vars() {
        let mut vars = base_vars();
        vars.remove("DATABASE_URL");
        assert!(Config::from_vars(&vars).is_err());

        let mut vars = base_vars();
        vars.remove("JWT_SECRET");
        assert!(Config::from_vars(&vars).is_err());
    }

    #[test]
    fn test_clock_skew_bounds() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "120".to_string());
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.jwt_clock_skew_seconds, 120);

        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "-1".to_string());
        assert!(Config::from_vars(&vars).is_err());

        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "601".to_string());
        assert!(Config::from_vars(&vars).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::from_vars(&base_vars()).unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("postgres://"));
    }

    #[test]
    fn test_policy_round_trip() {
        assert_eq!(
            AdmissionPolicy::parse(AdmissionPolicy::Strict.as_str()),
            Some(AdmissionPolicy::Strict)
        );
        assert_eq!(
            AdmissionPolicy::parse(AdmissionPolicy::Permissive.as_str()),
            Some(AdmissionPolicy::Permissive)
        );
        assert_eq!(AdmissionPolicy::parse("other"), None);
    }
}
