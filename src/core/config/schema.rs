//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$BEAN_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/beanledger/config.toml`
//! 3. `~/.beanledger/config.toml` (canonical write location)
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., `default_user` must be a valid user id).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::UserId;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// default_user = "alice"
/// data_dir = "/home/alice/.local/share/beanledger"
///
/// [ledger]
/// schedule_match_tolerance_grams = 5.0
/// upcoming_horizon_days = 7
///
/// [retry]
/// max_attempts = 3
/// min_delay_ms = 50
/// max_delay_ms = 2000
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// User id to act as when `--user` is not given
    pub default_user: Option<String>,

    /// Where the file store keeps its data
    pub data_dir: Option<PathBuf>,

    /// Ledger behavior
    pub ledger: Option<LedgerSettings>,

    /// Store retry behavior
    pub retry: Option<RetrySettings>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(user) = &self.default_user {
            UserId::new(user.as_str())
                .map_err(|e| ConfigError::InvalidValue(format!("invalid default_user: {}", e)))?;
        }

        if let Some(dir) = &self.data_dir {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "data_dir cannot be empty".to_string(),
                ));
            }
        }

        if let Some(ledger) = &self.ledger {
            ledger.validate()?;
        }
        if let Some(retry) = &self.retry {
            retry.validate()?;
        }

        Ok(())
    }
}

/// Ledger behavior settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerSettings {
    /// How far a roast's green weight may differ from a schedule's planned
    /// weight and still complete it
    pub schedule_match_tolerance_grams: Option<f64>,

    /// Default horizon for upcoming-schedule listings
    pub upcoming_horizon_days: Option<u32>,
}

impl LedgerSettings {
    /// Longest accepted upcoming horizon.
    pub const MAX_HORIZON_DAYS: u32 = 366;

    /// Validate the ledger settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(tolerance) = self.schedule_match_tolerance_grams {
            if !tolerance.is_finite() || tolerance < 0.0 {
                return Err(ConfigError::InvalidValue(format!(
                    "schedule_match_tolerance_grams must be a non-negative number, got {}",
                    tolerance
                )));
            }
        }
        if let Some(days) = self.upcoming_horizon_days {
            if days > Self::MAX_HORIZON_DAYS {
                return Err(ConfigError::InvalidValue(format!(
                    "upcoming_horizon_days must be at most {}, got {}",
                    Self::MAX_HORIZON_DAYS,
                    days
                )));
            }
        }
        Ok(())
    }
}

/// Retry settings for transient store failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Total attempts including the first (1 disables retries)
    pub max_attempts: Option<usize>,

    /// First backoff delay
    pub min_delay_ms: Option<u64>,

    /// Backoff ceiling
    pub max_delay_ms: Option<u64>,
}

impl RetrySettings {
    /// Largest accepted attempt count.
    pub const MAX_ATTEMPTS: usize = 10;

    /// Validate the retry settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(attempts) = self.max_attempts {
            if attempts == 0 || attempts > Self::MAX_ATTEMPTS {
                return Err(ConfigError::InvalidValue(format!(
                    "retry.max_attempts must be between 1 and {}, got {}",
                    Self::MAX_ATTEMPTS,
                    attempts
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_delay_ms, self.max_delay_ms) {
            if min > max {
                return Err(ConfigError::InvalidValue(format!(
                    "retry.min_delay_ms ({}) cannot exceed retry.max_delay_ms ({})",
                    min, max
                )));
            }
        }
        Ok(())
    }
}
