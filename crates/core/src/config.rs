//! Configuration management
//!
//! This module handles loading, saving, and migrating the s3h configuration file.
//! The configuration file is stored in TOML format at ~/.config/s3h/config.toml.
//!
//! PROTECTED FILE: Changes to schema_version require migration support.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::listing::MissingFolderPolicy;

/// Current configuration schema version
///
/// IMPORTANT: Bumping this version requires:
/// 1. Adding a migration step in `ConfigManager::migrate`
/// 2. Updating migration tests
/// 3. Marking the change as BREAKING
pub const SCHEMA_VERSION: u32 = 1;

/// Region used when nothing else is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default output format
const DEFAULT_OUTPUT: &str = "human";

/// Default batch concurrency
const DEFAULT_CONCURRENCY: usize = 8;

/// Default presigned URL lifetime
const DEFAULT_PRESIGN_TTL_SECS: u64 = 3600;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Store credentials and location
    #[serde(default)]
    pub credentials: Credentials,

    /// Default settings
    #[serde(default)]
    pub defaults: Defaults,
}

/// Credentials and endpoint for the object store
///
/// When both keys are absent the SDK's default provider chain is used.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint for S3-compatible servers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Use path-style addressing (implied by a custom endpoint)
    #[serde(default)]
    pub force_path_style: bool,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            access_key_id: None,
            secret_access_key: None,
            region: default_region(),
            endpoint: None,
            force_path_style: false,
        }
    }
}

impl Credentials {
    /// Whether static keys are configured
    pub fn has_static_keys(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

/// Default settings for helper and CLI behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    /// Emit info-level summaries for every operation
    #[serde(default)]
    pub logging_enabled: bool,

    /// Maximum concurrent items in a batch
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Presigned URL lifetime in seconds
    #[serde(default = "default_presign_ttl")]
    pub presign_ttl_secs: u64,

    /// How listing a missing folder is reported
    #[serde(default)]
    pub missing_folder: MissingFolderPolicy,

    /// Output format: "human" or "json"
    #[serde(default = "default_output")]
    pub output: String,

    /// Show progress bars
    #[serde(default = "default_true")]
    pub progress: bool,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_presign_ttl() -> u64 {
    DEFAULT_PRESIGN_TTL_SECS
}

fn default_output() -> String {
    DEFAULT_OUTPUT.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            logging_enabled: false,
            concurrency: default_concurrency(),
            presign_ttl_secs: default_presign_ttl(),
            missing_folder: MissingFolderPolicy::default(),
            output: default_output(),
            progress: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            credentials: Credentials::default(),
            defaults: Defaults::default(),
        }
    }
}

impl Config {
    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(v) = lookup("AWS_ACCESS_KEY_ID") {
            self.credentials.access_key_id = Some(v);
        }
        if let Some(v) = lookup("AWS_SECRET_ACCESS_KEY") {
            self.credentials.secret_access_key = Some(v);
        }
        if let Some(v) = lookup("AWS_REGION").or_else(|| lookup("AWS_DEFAULT_REGION")) {
            self.credentials.region = v;
        }
        if let Some(v) = lookup("S3H_ENDPOINT") {
            self.credentials.endpoint = Some(v);
        }
        if let Some(v) = lookup("S3H_LOGGING") {
            self.defaults.logging_enabled = matches!(v.as_str(), "1" | "true" | "yes" | "on");
        }
    }

    /// Check the configuration for values the store would reject later
    pub fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.credentials.endpoint {
            let url = url::Url::parse(endpoint)?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "Endpoint '{endpoint}' must use http or https"
                )));
            }
        }

        if self.credentials.access_key_id.is_some() != self.credentials.secret_access_key.is_some()
        {
            return Err(Error::Config(
                "access_key_id and secret_access_key must be set together".into(),
            ));
        }

        if self.defaults.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".into()));
        }

        Ok(())
    }
}

/// Configuration manager handles loading and saving config
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the default config path
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".into()))?;
        let config_path = config_dir.join("s3h").join("config.toml");
        Ok(Self { config_path })
    }

    /// Create a ConfigManager with a custom path (useful for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load configuration from disk
    ///
    /// If the configuration file doesn't exist, returns a default configuration.
    /// If the schema version doesn't match, attempts migration.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        if config.schema_version < SCHEMA_VERSION {
            config = self.migrate(config)?;
        } else if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade s3h.",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        Ok(config)
    }

    /// Save configuration to disk
    ///
    /// Creates parent directories if they don't exist.
    /// Sets file permissions to 600 (owner read/write only).
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)?;
        }

        Ok(())
    }

    /// Migrate configuration from older schema version
    fn migrate(&self, mut config: Config) -> Result<Config> {
        // Version 0 files predate the field; their layout is already current.
        config.schema_version = SCHEMA_VERSION;
        Ok(config)
    }
}
