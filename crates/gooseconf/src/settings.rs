//! Configuration sections. Every field has a compiled default so a partial
//! TOML file only needs the values it changes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Paste lifetime and size limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasteSettings {
    /// Seconds a paste lives after creation. Must be at least 1.
    /// Default: 604800 (7 days)
    #[serde(default = "PasteSettings::default_ttl_secs")]
    pub ttl_secs: u64,

    /// Largest accepted paste in bytes. Must be at least 128.
    /// Default: 65535
    #[serde(default = "PasteSettings::default_size_limit")]
    pub size_limit: usize,
}

impl PasteSettings {
    fn default_ttl_secs() -> u64 {
        7 * 24 * 60 * 60
    }

    fn default_size_limit() -> usize {
        65535
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for PasteSettings {
    fn default() -> Self {
        Self {
            ttl_secs: Self::default_ttl_secs(),
            size_limit: Self::default_size_limit(),
        }
    }
}

/// Key-value backend (Redis) connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Default: localhost
    #[serde(default = "BackendSettings::default_host")]
    pub host: String,

    /// Default: 6379
    #[serde(default = "BackendSettings::default_port")]
    pub port: u16,

    /// Number of pooled connections. Must be at least 1.
    /// Default: 32
    #[serde(default = "BackendSettings::default_pool_size")]
    pub pool_size: usize,

    /// Retries per command on transient errors; negative retries until the
    /// request is cancelled.
    /// Default: -1
    #[serde(default = "BackendSettings::default_max_retries")]
    pub max_retries: i64,

    /// Deadline for one command attempt, in milliseconds.
    /// Default: 5000
    #[serde(default = "BackendSettings::default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

impl BackendSettings {
    fn default_host() -> String {
        "localhost".to_string()
    }

    fn default_port() -> u16 {
        6379
    }

    fn default_pool_size() -> usize {
        32
    }

    fn default_max_retries() -> i64 {
        -1
    }

    fn default_command_timeout_ms() -> u64 {
        5000
    }

    /// `None` when retries are unlimited.
    pub fn retry_limit(&self) -> Option<u32> {
        u32::try_from(self.max_retries).ok()
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            pool_size: Self::default_pool_size(),
            max_retries: Self::default_max_retries(),
            command_timeout_ms: Self::default_command_timeout_ms(),
        }
    }
}

/// HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindSettings {
    /// Default: 0.0.0.0
    #[serde(default = "BindSettings::default_host")]
    pub host: String,

    /// Default: 8000
    #[serde(default = "BindSettings::default_http_port")]
    pub http_port: u16,
}

impl BindSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_http_port() -> u16 {
        8000
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

impl Default for BindSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            http_port: Self::default_http_port(),
        }
    }
}

/// Logging and OpenTelemetry export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySettings {
    /// EnvFilter directive, e.g. `info` or `info,goosebin=debug`.
    /// Default: info
    #[serde(default = "TelemetrySettings::default_log_level")]
    pub log_level: String,

    /// OTLP gRPC endpoint. Empty disables export.
    /// Default: ""
    #[serde(default)]
    pub otlp_endpoint: String,
}

impl TelemetrySettings {
    fn default_log_level() -> String {
        "info".to_string()
    }

    pub fn otlp_enabled(&self) -> bool {
        !self.otlp_endpoint.trim().is_empty()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            otlp_endpoint: String::new(),
        }
    }
}
