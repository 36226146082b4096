//! Application configuration
//!
//! TOML-backed; every field has a default so a partial (or empty) file works.
//!
//! ```toml
//! [auth]
//! base_url = "https://auth.example.com"
//! request_timeout_secs = 10
//!
//! [logging]
//! retention_days = 14
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// - `ConfigError::Parse` on malformed TOML
    /// - `ConfigError::Invalid` on out-of-range values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// With auth section
    #[inline]
    #[must_use]
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    /// With data directory
    #[inline]
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage.data_dir = dir.into();
        self
    }

    /// With logs directory
    #[inline]
    #[must_use]
    pub fn with_logs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.logging.dir = dir.into();
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "auth.request_timeout_secs",
                message: "must be at least 1".to_string(),
            });
        }
        if self.auth.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "auth.base_url",
                message: "must not be empty".to_string(),
            });
        }
        if self.logging.retention_days < 0 {
            return Err(ConfigError::Invalid {
                field: "logging.retention_days",
                message: "must not be negative".to_string(),
            });
        }
        Ok(())
    }
}

/// Remote auth settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Auth API root
    pub base_url: String,
    /// Deadline for each remote auth call
    pub request_timeout_secs: u64,
    /// Attempts at the local ownership rewrite before parking it
    pub migration_retries: u32,
}

impl AuthConfig {
    /// Deadline as a `Duration`
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// With request timeout
    #[inline]
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// With base url
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787".to_string(),
            request_timeout_secs: 15,
            migration_retries: 3,
        }
    }
}

/// Local storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Override for the OS machine-id file
    pub machine_id_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: app_home().join("data"),
            machine_id_path: None,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Daily JSONL log directory
    pub dir: PathBuf,
    pub retention_days: i64,
    /// Emit tracing output as JSON
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: app_home().join("logs"),
            retention_days: 7,
            json: false,
        }
    }
}

/// `~/.yorutsuke`, or under the temp dir when there is no home
fn app_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".yorutsuke")
}
