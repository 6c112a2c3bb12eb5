//! Configuration loading for Goosebin.
//!
//! # Usage
//!
//! ```rust,no_run
//! use gooseconf::GooseConfig;
//!
//! let config = GooseConfig::load().expect("Failed to load config");
//! config.validate().expect("Invalid config");
//!
//! println!("Paste TTL: {}s", config.paste.ttl_secs);
//! println!("Redis: {}", config.backend.address());
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/goosebin/config.toml` (system)
//! 2. `~/.config/goosebin/config.toml` (user)
//! 3. `./goosebin.toml`, or the `--config` path (local override)
//! 4. Environment variables (`GOOSEBIN_*` and the legacy
//!    `PASTE_TTL_SECONDS`, `PASTE_SIZE_LIMIT`, `REDIS_SERVICE_HOST`,
//!    `REDIS_SERVICE_PORT`, `REDIS_POOL_SIZE`, `HTTP_PORT`)
//!
//! # Example Config
//!
//! ```toml
//! [paste]
//! ttl_secs = 604800
//! size_limit = 65535
//!
//! [backend]
//! host = "localhost"
//! port = 6379
//! pool_size = 32
//! max_retries = -1
//! command_timeout_ms = 5000
//!
//! [bind]
//! host = "0.0.0.0"
//! http_port = 8000
//!
//! [telemetry]
//! log_level = "info"
//! otlp_endpoint = ""
//! ```

pub mod loader;
pub mod settings;

pub use loader::{apply_env_overrides, apply_env_overrides_with, discover_config_files_with_override, ConfigSources};
pub use settings::{BackendSettings, BindSettings, PasteSettings, TelemetrySettings};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Smallest accepted paste TTL, in seconds.
pub const MIN_PASTE_TTL_SECS: u64 = 1;

/// Largest accepted paste TTL, in seconds: the TTL in milliseconds must fit
/// the signed 64-bit expiry Redis accepts.
pub const MAX_PASTE_TTL_SECS: u64 = i64::MAX as u64 / 1000;

/// Smallest accepted paste size limit, in bytes.
pub const MIN_PASTE_SIZE_LIMIT: usize = 128;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value {value:?} for environment variable {name}: {message}")]
    InvalidEnv {
        name: String,
        value: String,
        message: String,
    },

    #[error("Invalid configuration for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Complete Goosebin configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GooseConfig {
    #[serde(default)]
    pub paste: PasteSettings,

    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub bind: BindSettings,

    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl GooseConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/goosebin/config.toml`
    /// 3. `~/.config/goosebin/config.toml`
    /// 4. `./goosebin.toml`
    /// 5. Environment variables
    ///
    /// The result is not validated; call [`GooseConfig::validate`].
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with an explicit file in place of `./goosebin.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report which files and variables were used.
    pub fn load_with_sources_from(config_path: Option<&Path>) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in loader::discover_config_files_with_override(config_path) {
            let table = loader::load_table_from_file(&path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path);
        }

        let origin = sources
            .files
            .last()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("<defaults>"));
        let mut config = loader::config_from_table(merged, &origin)?;

        loader::apply_env_overrides(&mut config, &mut sources)?;

        Ok((config, sources))
    }

    /// Parse a single TOML document over the compiled defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let origin = Path::new("<string>");
        let table = loader::parse_table(contents, origin)?;
        loader::config_from_table(table, origin)
    }

    /// Check the limits the service depends on. Any error here should stop
    /// startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.paste.ttl_secs < MIN_PASTE_TTL_SECS {
            return Err(ConfigError::Invalid {
                field: "paste.ttl_secs",
                message: format!("paste TTL cannot be less than {} second", MIN_PASTE_TTL_SECS),
            });
        }

        if self.paste.ttl_secs > MAX_PASTE_TTL_SECS {
            return Err(ConfigError::Invalid {
                field: "paste.ttl_secs",
                message: format!("paste TTL cannot be more than {} seconds", MAX_PASTE_TTL_SECS),
            });
        }

        if self.paste.size_limit < MIN_PASTE_SIZE_LIMIT {
            return Err(ConfigError::Invalid {
                field: "paste.size_limit",
                message: format!("paste size limit cannot be less than {} bytes", MIN_PASTE_SIZE_LIMIT),
            });
        }

        if self.backend.host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "backend.host",
                message: "backend host cannot be empty".to_string(),
            });
        }

        if self.backend.port == 0 {
            return Err(ConfigError::Invalid {
                field: "backend.port",
                message: "backend port cannot be 0".to_string(),
            });
        }

        if self.backend.pool_size < 1 {
            return Err(ConfigError::Invalid {
                field: "backend.pool_size",
                message: "backend pool size must be at least 1".to_string(),
            });
        }

        if self.backend.command_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "backend.command_timeout_ms",
                message: "backend command timeout must be positive".to_string(),
            });
        }

        Ok(())
    }

    /// Serialize config to a TOML string.
    pub fn to_toml(&self) -> String {
        let body = toml::to_string_pretty(self).unwrap_or_else(|e| format!("# failed to serialize: {}\n", e));
        format!("# Goosebin Configuration\n\n{}", body)
    }
}
