//! Configuration module for Strongbox.

use serde::Deserialize;
use std::path::Path;

use crate::crypto::MIN_MASTER_KEY_LEN;
use crate::{Result, StrongboxError};

/// Longest share or session lifetime a config may set (ten years).
pub const MAX_LIFETIME_HOURS: i64 = 10 * 365 * 24;

/// Metadata database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/strongbox.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Blob storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory for encrypted objects.
    #[serde(default = "default_storage_root")]
    pub root: String,
    /// Base URL under which presigned object links are served.
    #[serde(default = "default_blob_base_url")]
    pub public_base_url: String,
    /// Secret used to sign presigned URLs.
    #[serde(default)]
    pub presign_secret: String,
    /// Lifetime of presigned URLs handed out for shares, in seconds.
    #[serde(default = "default_presigned_ttl")]
    pub presigned_url_ttl_secs: u64,
}

fn default_storage_root() -> String {
    "data/blobs".to_string()
}

fn default_blob_base_url() -> String {
    "http://localhost:3001/blobs".to_string()
}

fn default_presigned_ttl() -> u64 {
    3600
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            public_base_url: default_blob_base_url(),
            presign_secret: String::new(),
            presigned_url_ttl_secs: default_presigned_ttl(),
        }
    }
}

/// Key material and session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Master secret for per-file key derivation.
    #[serde(default)]
    pub master_key: String,
    /// Session lifetime in hours.
    #[serde(default = "default_session_expiry")]
    pub session_expiry_hours: i64,
}

fn default_session_expiry() -> i64 {
    168 // 7 days
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            master_key: String::new(),
            session_expiry_hours: default_session_expiry(),
        }
    }
}

/// Share link configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SharesConfig {
    /// Upper bound on a share's lifetime in hours.
    #[serde(default = "default_max_expiry_hours")]
    pub max_expiry_hours: i64,
    /// Base URL used to build public share links.
    #[serde(default = "default_share_base_url")]
    pub public_base_url: String,
}

fn default_max_expiry_hours() -> i64 {
    168
}

fn default_share_base_url() -> String {
    "http://localhost:3001/api/v1/shares".to_string()
}

impl Default for SharesConfig {
    fn default() -> Self {
        Self {
            max_expiry_hours: default_max_expiry_hours(),
            public_base_url: default_share_base_url(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/strongbox.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Metadata database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Blob storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Key material and sessions.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Share links.
    #[serde(default)]
    pub shares: SharesConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(StrongboxError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| StrongboxError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `STRONGBOX_MASTER_KEY`: master secret for key derivation
    /// - `STRONGBOX_PRESIGN_SECRET`: secret for presigned URLs
    pub fn apply_env_overrides(&mut self) {
        if let Ok(master_key) = std::env::var("STRONGBOX_MASTER_KEY") {
            if !master_key.is_empty() {
                self.security.master_key = master_key;
            }
        }
        if let Ok(secret) = std::env::var("STRONGBOX_PRESIGN_SECRET") {
            if !secret.is_empty() {
                self.storage.presign_secret = secret;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - the master key is shorter than 32 bytes
    /// - the presign secret is empty
    /// - share or session lifetimes are not positive
    pub fn validate(&self) -> Result<()> {
        if self.security.master_key.len() < MIN_MASTER_KEY_LEN {
            return Err(StrongboxError::Config(format!(
                "master_key must be at least {MIN_MASTER_KEY_LEN} bytes. \
                 Set it in config.toml or via STRONGBOX_MASTER_KEY environment variable."
            )));
        }
        if self.storage.presign_secret.is_empty() {
            return Err(StrongboxError::Config(
                "presign_secret is not set. \
                 Set it in config.toml or via STRONGBOX_PRESIGN_SECRET environment variable."
                    .to_string(),
            ));
        }
        if self.shares.max_expiry_hours < 1 || self.security.session_expiry_hours < 1 {
            return Err(StrongboxError::Config(
                "share and session lifetimes must be at least one hour".to_string(),
            ));
        }
        if self.shares.max_expiry_hours > MAX_LIFETIME_HOURS
            || self.security.session_expiry_hours > MAX_LIFETIME_HOURS
        {
            return Err(StrongboxError::Config(format!(
                "share and session lifetimes must be at most {MAX_LIFETIME_HOURS} hours"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.database.path, "data/strongbox.db");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.storage.root, "data/blobs");
        assert_eq!(config.storage.presigned_url_ttl_secs, 3600);
        assert_eq!(config.security.session_expiry_hours, 168);
        assert_eq!(config.shares.max_expiry_hours, 168);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/strongbox.log");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = format!(
            r#"
[database]
path = "/var/lib/strongbox/meta.db"
max_connections = 8

[storage]
root = "/var/lib/strongbox/blobs"
public_base_url = "https://files.example.com/o"
presign_secret = "sign-me"
presigned_url_ttl_secs = 600

[security]
master_key = "{KEY}"
session_expiry_hours = 24

[shares]
max_expiry_hours = 72
public_base_url = "https://example.com/s"

[logging]
level = "debug"
file = "/var/log/strongbox.log"
"#
        );

        let config = Config::parse(&toml).unwrap();

        assert_eq!(config.database.path, "/var/lib/strongbox/meta.db");
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.storage.public_base_url, "https://files.example.com/o");
        assert_eq!(config.storage.presigned_url_ttl_secs, 600);
        assert_eq!(config.security.session_expiry_hours, 24);
        assert_eq!(config.shares.max_expiry_hours, 72);
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_lifetime_bounds() {
        let mut config = Config::default();
        config.security.master_key = KEY.to_string();
        config.storage.presign_secret = "sign-me".to_string();
        assert!(config.validate().is_ok());

        config.shares.max_expiry_hours = MAX_LIFETIME_HOURS + 1;
        assert!(matches!(config.validate(), Err(StrongboxError::Config(_))));

        config.shares.max_expiry_hours = MAX_LIFETIME_HOURS;
        config.security.session_expiry_hours = i64::MAX;
        assert!(matches!(config.validate(), Err(StrongboxError::Config(_))));
    }

    #[test]
    fn test_parse_partial_config() {
        let config = Config::parse("[shares]\nmax_expiry_hours = 12\n").unwrap();

        assert_eq!(config.shares.max_expiry_hours, 12);
        assert_eq!(config.storage.root, "data/blobs");
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("[database\npath = ");
        assert!(matches!(result, Err(StrongboxError::Config(_))));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("/nonexistent/strongbox.toml");
        assert!(matches!(result, Err(StrongboxError::Io(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nlevel = \"warn\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_validate_short_master_key() {
        let mut config = Config::default();
        config.security.master_key = "too-short".to_string();
        config.storage.presign_secret = "secret".to_string();

        assert!(matches!(config.validate(), Err(StrongboxError::Config(_))));
    }

    #[test]
    fn test_validate_missing_presign_secret() {
        let mut config = Config::default();
        config.security.master_key = KEY.to_string();

        assert!(matches!(config.validate(), Err(StrongboxError::Config(_))));
    }

    #[test]
    fn test_validate_ok() {
        let mut config = Config::default();
        config.security.master_key = KEY.to_string();
        config.storage.presign_secret = "secret".to_string();

        assert!(config.validate().is_ok());
    }
}
