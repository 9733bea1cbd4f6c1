//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELLCACHE_*)
//! 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};

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
    /// Generation token. Changing it rolls every client onto a fresh store.
    ///
    /// Set via SHELLCACHE_VERSION environment variable.
    #[serde(default = "default_version", deserialize_with = "version_token")]
    pub version: String,

    /// Prefix shared by every store this system creates.
    ///
    /// Stores without this prefix are never deleted during activation.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Origin whose requests are intercepted; everything else passes through.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Static resources pre-cached on install, as origin-relative paths.
    #[serde(default = "default_static_assets")]
    pub static_assets: Vec<String>,

    /// Whether a finished install asks to activate without waiting for old pages.
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,

    /// Path prefix of content-hashed build output.
    #[serde(default = "default_asset_prefix")]
    pub asset_prefix: String,

    /// Path prefix of live API endpoints.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Path to SQLite store database.
    ///
    /// Set via SHELLCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum response body size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_version() -> String {
    "2".into()
}

/// Environment values like `SHELLCACHE_VERSION=3` arrive as numbers.
fn version_token<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Token {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Token::deserialize(deserializer)? {
        Token::Text(s) => s,
        Token::Int(n) => n.to_string(),
        Token::Float(f) => f.to_string(),
    })
}

fn default_cache_prefix() -> String {
    "shell-".into()
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_static_assets() -> Vec<String> {
    vec!["/manifest.json".into(), "/favicon.svg".into(), "/favicon.png".into()]
}

fn default_true() -> bool {
    true
}

fn default_asset_prefix() -> String {
    "/assets/".into()
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shellcache.sqlite")
}

fn default_user_agent() -> String {
    "shellcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            cache_prefix: default_cache_prefix(),
            origin: default_origin(),
            static_assets: default_static_assets(),
            skip_waiting_on_install: true,
            asset_prefix: default_asset_prefix(),
            api_prefix: default_api_prefix(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Name of the store owned by the configured generation.
    pub fn cache_name(&self) -> String {
        cache_name_for(&self.cache_prefix, &self.version)
    }

    /// Copy of this configuration pinned to another generation token.
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self { version: version.into(), ..self.clone() }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// Build the layered figment without extracting it.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SHELLCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("SHELLCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }

    /// Extract and validate a configuration from a figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

/// Store name for a generation: `{prefix}v{version}`.
pub fn cache_name_for(prefix: &str, version: &str) -> String {
    format!("{prefix}v{version}")
}
