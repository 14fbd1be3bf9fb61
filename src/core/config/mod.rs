//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! Beanledger has a single user-level configuration file. Every value is
//! optional; accessors apply defaults.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$BEAN_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/beanledger/config.toml`
//! 3. `~/.beanledger/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use beanledger::core::config::Config;
//!
//! let config = Config::load().unwrap();
//!
//! println!("Data dir: {}", config.data_dir().display());
//! println!("Tolerance: {}g", config.schedule_match_tolerance_grams());
//! ```

pub mod schema;

pub use schema::{GlobalConfig, LedgerSettings, RetrySettings};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::paths::{LedgerPaths, APP_DIR};
use crate::store::retry::RetryPolicy;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "BEAN_CONFIG";

/// Default schedule-matching tolerance in grams.
pub const DEFAULT_MATCH_TOLERANCE_GRAMS: f64 = 5.0;

/// Default horizon for upcoming schedules.
pub const DEFAULT_UPCOMING_HORIZON_DAYS: u32 = 7;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Loaded configuration.
///
/// Accessor methods apply defaults for anything the file leaves unset.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Path to the global config file (if loaded)
    global_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or
    /// fails validation. A missing config file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_global() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let global = Self::read_global_config(path)?;
        global.validate()?;
        Ok(Self {
            global,
            global_path: Some(path.to_path_buf()),
        })
    }

    /// Locate the first existing global config file.
    fn find_global() -> Option<PathBuf> {
        // 1. Check $BEAN_CONFIG
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check $XDG_CONFIG_HOME/beanledger/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join(APP_DIR).join("config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.beanledger/config.toml
        if let Some(home) = dirs::home_dir() {
            let path = home.join(format!(".{}", APP_DIR)).join("config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Read and parse a global config file.
    fn read_global_config(path: &Path) -> Result<GlobalConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Get the canonical path for global config.
    ///
    /// Returns `$BEAN_CONFIG` when set, otherwise `~/.beanledger/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(format!(".{}", APP_DIR)).join("config.toml"))
    }

    /// Write global config atomically to the canonical location.
    pub fn write_global(config: &GlobalConfig) -> Result<PathBuf, ConfigError> {
        let path = Self::global_config_path()?;
        Self::write_global_to(&path, config)?;
        Ok(path)
    }

    /// Write global config atomically to an explicit path.
    ///
    /// Validates first; an invalid config is never written.
    pub fn write_global_to(path: &Path, config: &GlobalConfig) -> Result<(), ConfigError> {
        config.validate()?;
        Self::write_config_atomic(path, config)
    }

    /// Write a config file atomically.
    fn write_config_atomic<T: serde::Serialize>(
        path: &Path,
        config: &T,
    ) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        // Write to temp file in same directory (for atomic rename)
        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        file.sync_all().map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// The configured default user, if any.
    pub fn default_user(&self) -> Option<&str> {
        self.global.default_user.as_deref()
    }

    /// The data directory for the file store.
    ///
    /// Falls back to the platform data directory, then to
    /// `./.beanledger` when the platform has none.
    pub fn data_dir(&self) -> PathBuf {
        self.global
            .data_dir
            .clone()
            .or_else(LedgerPaths::default_data_dir)
            .unwrap_or_else(|| PathBuf::from(format!(".{}", APP_DIR)))
    }

    /// Schedule-matching tolerance in grams.
    pub fn schedule_match_tolerance_grams(&self) -> f64 {
        self.global
            .ledger
            .as_ref()
            .and_then(|l| l.schedule_match_tolerance_grams)
            .unwrap_or(DEFAULT_MATCH_TOLERANCE_GRAMS)
    }

    /// Default horizon for `schedule upcoming`.
    pub fn upcoming_horizon_days(&self) -> u32 {
        self.global
            .ledger
            .as_ref()
            .and_then(|l| l.upcoming_horizon_days)
            .unwrap_or(DEFAULT_UPCOMING_HORIZON_DAYS)
    }

    /// Retry policy for transient store failures.
    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        let Some(retry) = self.global.retry.as_ref() else {
            return defaults;
        };
        let min_delay = retry
            .min_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.min_delay);
        let max_delay = retry
            .max_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_delay)
            .max(min_delay);
        RetryPolicy {
            max_attempts: retry.max_attempts.unwrap_or(defaults.max_attempts),
            min_delay,
            max_delay,
        }
    }

    /// Get the path the global config was loaded from.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }
}
