//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELLCACHE_*)
//! 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The version tag, precache manifest and blocklist are meant to be edited
//! by hand on every deploy; bumping `version_tag` is the only way to force
//! every partition to be rebuilt.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::VersionTag;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELLCACHE_*)
/// 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Current deployment generation.
    ///
    /// Set via SHELLCACHE_VERSION_TAG environment variable.
    #[serde(default = "default_version_tag")]
    pub version_tag: String,

    /// Scope URL the app shell is served from. Relative manifest paths
    /// resolve against it, and it defines "same origin".
    ///
    /// Set via SHELLCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Canonical shell document every navigation falls back to.
    ///
    /// Set via SHELLCACHE_SHELL_DOCUMENT environment variable.
    #[serde(default = "default_shell_document")]
    pub shell_document: String,

    /// Resources that must be in the precache partition before the proxy
    /// goes live.
    #[serde(default = "default_precache_manifest")]
    pub precache_manifest: Vec<String>,

    /// Hosts that are never intercepted or cached.
    #[serde(default = "default_blocklist")]
    pub blocklist: Vec<String>,

    /// Path to SQLite cache database.
    ///
    /// Set via SHELLCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for upstream requests.
    ///
    /// Set via SHELLCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Largest response body written to a cache partition. Larger
    /// responses are still returned to the caller, just never stored.
    ///
    /// Set via SHELLCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Transport request timeout in milliseconds.
    ///
    /// Set via SHELLCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_version_tag() -> String {
    "v61".into()
}

fn default_origin() -> String {
    "http://localhost:8080/".into()
}

fn default_shell_document() -> String {
    "./index.html".into()
}

fn default_precache_manifest() -> Vec<String> {
    [
        "./",
        "./index.html",
        "./style.css",
        "./script.js",
        "./firebase-config.js",
        "./manifest.json",
        "./icon-192.png",
        "./icon-512.png",
        "./libs/jsQR.js",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_blocklist() -> Vec<String> {
    [
        "www.gstatic.com",
        "www.google.com",
        "apis.google.com",
        "firebase.googleapis.com",
        "firestore.googleapis.com",
        "firebasestorage.googleapis.com",
        "identitytoolkit.googleapis.com",
        "securetoken.googleapis.com",
        "lh3.googleusercontent.com",
        "fonts.googleapis.com",
        "fonts.gstatic.com",
        "cdn.jsdelivr.net",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shellcache.sqlite")
}

fn default_user_agent() -> String {
    "shellcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version_tag: default_version_tag(),
            origin: default_origin(),
            shell_document: default_shell_document(),
            precache_manifest: default_precache_manifest(),
            blocklist: default_blocklist(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The configured version tag, validated.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the tag is empty or malformed.
    pub fn version(&self) -> Result<VersionTag, ConfigError> {
        VersionTag::new(self.version_tag.as_str())
            .map_err(|e| ConfigError::Invalid { field: "version_tag".into(), reason: e.to_string() })
    }

    /// The configured origin, parsed.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(url),
            _ => Err(ConfigError::Invalid { field: "origin".into(), reason: "must be an absolute http(s) URL".into() }),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SHELLCACHE_`
    /// 2. TOML file from `SHELLCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SHELLCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELLCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
