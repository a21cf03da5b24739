//! Configuration module for RetroSync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//! Also resolves the device address from persisted settings and config defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for RetroSync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Device connection and pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Host used when no address is persisted in the catalog settings.
    pub default_host: String,
    /// Port used when no port is persisted in the catalog settings.
    pub default_port: u16,
    /// Minimum gap between the end of one mutating call and the start of the next.
    pub mutation_interval_ms: u64,
    pub list_timeout_secs: u64,
    /// Timeout for `create` and `delete`.
    pub mutation_timeout_secs: u64,
    pub upload_timeout_secs: u64,
    pub download_timeout_secs: u64,
    /// Extra attempts for a listing that failed with `Unavailable`.
    pub list_retries: u32,
    /// Base delay between listing retries, multiplied by the attempt number.
    pub retry_backoff_ms: u64,
    /// Pace downloads through the mutation gate as well.
    pub throttle_downloads: bool,
}

/// Local storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite catalog database file.
    pub database: PathBuf,
    /// Root of the content-hash keyed save backup store.
    pub backup_root: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/retrosync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("retrosync")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            default_host: "192.168.6.125".to_string(),
            default_port: 80,
            mutation_interval_ms: 1000,
            list_timeout_secs: 10,
            mutation_timeout_secs: 10,
            upload_timeout_secs: 120,
            download_timeout_secs: 60,
            list_retries: 2,
            retry_backoff_ms: 500,
            throttle_downloads: true,
        }
    }
}

impl DeviceConfig {
    pub fn mutation_interval(&self) -> Duration {
        Duration::from_millis(self.mutation_interval_ms)
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }

    pub fn mutation_timeout(&self) -> Duration {
        Duration::from_secs(self.mutation_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("retrosync");
        Self {
            database: data_dir.join("catalog.db"),
            backup_root: data_dir.join("backups"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"device.default_port"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- device ---
        if !is_valid_host(&self.device.default_host) {
            errors.push(ValidationError {
                field: "device.default_host".into(),
                message: format!("invalid host '{}'", self.device.default_host),
            });
        }
        if self.device.default_port == 0 {
            errors.push(ValidationError {
                field: "device.default_port".into(),
                message: "must be greater than 0".into(),
            });
        }

        let timeouts = [
            ("device.list_timeout_secs", self.device.list_timeout_secs),
            ("device.mutation_timeout_secs", self.device.mutation_timeout_secs),
            ("device.upload_timeout_secs", self.device.upload_timeout_secs),
            ("device.download_timeout_secs", self.device.download_timeout_secs),
        ];
        for (field, value) in timeouts {
            if value == 0 {
                errors.push(ValidationError {
                    field: field.into(),
                    message: "must be greater than 0".into(),
                });
            }
        }
        if self.device.list_retries > 10 {
            errors.push(ValidationError {
                field: "device.list_retries".into(),
                message: "must be in range 0..=10".into(),
            });
        }

        // --- storage ---
        if self.storage.database.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.database".into(),
                message: "must not be empty".into(),
            });
        }
        if self.storage.backup_root.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.backup_root".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

/// Accepts hostnames and IPv4 addresses; no scheme, path or port.
pub fn is_valid_host(host: &str) -> bool {
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use retrosync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .device_default_host("10.0.0.42")
///     .device_mutation_interval_ms(500)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- device ---

    pub fn device_default_host(mut self, host: impl Into<String>) -> Self {
        self.config.device.default_host = host.into();
        self
    }

    pub fn device_default_port(mut self, port: u16) -> Self {
        self.config.device.default_port = port;
        self
    }

    pub fn device_mutation_interval_ms(mut self, ms: u64) -> Self {
        self.config.device.mutation_interval_ms = ms;
        self
    }

    pub fn device_list_retries(mut self, n: u32) -> Self {
        self.config.device.list_retries = n;
        self
    }

    pub fn device_retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.device.retry_backoff_ms = ms;
        self
    }

    pub fn device_throttle_downloads(mut self, throttle: bool) -> Self {
        self.config.device.throttle_downloads = throttle;
        self
    }

    // --- storage ---

    pub fn storage_database(mut self, path: PathBuf) -> Self {
        self.config.storage.database = path;
        self
    }

    pub fn storage_backup_root(mut self, path: PathBuf) -> Self {
        self.config.storage.backup_root = path;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// DeviceAddress
// ---------------------------------------------------------------------------

/// Settings key holding the device host override.
pub const SETTING_DEVICE_HOST: &str = "device_host";
/// Settings key holding the device port override.
pub const SETTING_DEVICE_PORT: &str = "device_port";

/// Network address of the device, resolved once per invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAddress {
    pub host: String,
    pub port: u16,
}

impl DeviceAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Combine persisted settings with the config defaults
    ///
    /// Blank or unparseable settings fall back to the defaults.
    pub fn resolve(host: Option<&str>, port: Option<&str>, defaults: &DeviceConfig) -> Self {
        let host = host
            .map(str::trim)
            .filter(|h| is_valid_host(h))
            .map(str::to_string)
            .unwrap_or_else(|| defaults.default_host.clone());
        let port = port
            .and_then(|p| p.trim().parse::<u16>().ok())
            .filter(|p| *p != 0)
            .unwrap_or(defaults.default_port);
        Self { host, port }
    }

    /// Base URL of the device web server, without a trailing slash
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
