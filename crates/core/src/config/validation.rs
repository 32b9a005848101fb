//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `version_tag` is empty or contains whitespace or '/'
    /// - `origin` is not an absolute http(s) URL
    /// - `shell_document` or any manifest/blocklist entry is empty
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    ///
    /// Returns `ConfigError::Missing` if the precache manifest is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.version()?;
        let origin = self.origin_url()?;

        if self.shell_document.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "shell_document".into(), reason: "must not be empty".into() });
        }

        if self.precache_manifest.is_empty() {
            return Err(ConfigError::Missing {
                field: "precache_manifest".into(),
                hint: "list the app-shell paths, e.g. [\"./\", \"./index.html\"]".into(),
            });
        }
        if self.precache_manifest.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "precache_manifest".into(),
                reason: "entries must not be empty".into(),
            });
        }

        if self.blocklist.iter().any(|h| h.trim().is_empty()) {
            return Err(ConfigError::Invalid { field: "blocklist".into(), reason: "entries must not be empty".into() });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if let Some(host) = origin.host_str()
            && self.blocklist.iter().any(|h| h.eq_ignore_ascii_case(host))
        {
            tracing::warn!(
                host,
                "origin host is in the blocklist; same-origin requests are never blocked, so the entry has no effect"
            );
        }

        Ok(())
    }
}
