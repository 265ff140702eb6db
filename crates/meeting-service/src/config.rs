//! Meeting service configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Meeting service configuration.
///
/// Loaded from environment variables with sensible defaults. Database URL
/// and JWT secret are redacted in Debug output to prevent credential
/// leakage.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8081").
    pub bind_address: String,

    /// Shared secret for validating user session tokens.
    pub jwt_secret: String,

    /// JWT clock skew tolerance in seconds for token validation.
    pub jwt_clock_skew_seconds: i64,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),
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

        Ok(Config {
            database_url,
            bind_address,
            jwt_secret,
            jwt_clock_skew_seconds,
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
