//! Config file discovery, layered TOML merge, and environment overlay.

use crate::{ConfigError, GooseConfig};
use std::env;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// Returns paths in load order (system, user, local/cli). Only existing
/// files are returned, except that an explicit CLI path is always returned
/// so a typo fails loudly instead of silently running on defaults.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/goosebin/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("goosebin/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    // CLI override takes precedence over local
    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from("goosebin.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file into a raw table.
pub fn load_table_from_file(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_table(&contents, path)
}

pub(crate) fn parse_table(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Deep-merge `overlay` into `base`. Nested tables merge key by key; any
/// other value in `overlay` replaces the one in `base`.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let toml::Value::Table(overlay_section) = value {
            if let Some(toml::Value::Table(base_section)) = base.get_mut(&key) {
                merge_tables(base_section, overlay_section);
                continue;
            }
            base.insert(key, toml::Value::Table(overlay_section));
        } else {
            base.insert(key, value);
        }
    }
}

/// Turn a merged table into a config, filling gaps with defaults.
pub fn config_from_table(table: toml::Table, origin: &Path) -> Result<GooseConfig, ConfigError> {
    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: &mut GooseConfig, sources: &mut ConfigSources) -> Result<(), ConfigError> {
    apply_env_overrides_with(config, sources, |name| env::var(name).ok())
}

/// Apply overrides using `lookup` to read variables.
///
/// Legacy deployment names are applied first, so the `GOOSEBIN_*` names win
/// when both are set. Empty values count as unset. A value that does not
/// parse is an error.
pub fn apply_env_overrides_with<F>(
    config: &mut GooseConfig,
    sources: &mut ConfigSources,
    lookup: F,
) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut env = EnvOverlay { lookup, sources };

    // Paste limits
    env.apply(&["PASTE_TTL_SECONDS", "GOOSEBIN_PASTE_TTL_SECS"], &mut config.paste.ttl_secs)?;
    env.apply(&["PASTE_SIZE_LIMIT", "GOOSEBIN_PASTE_SIZE_LIMIT"], &mut config.paste.size_limit)?;

    // Backend
    env.apply(&["REDIS_SERVICE_HOST", "GOOSEBIN_BACKEND_HOST"], &mut config.backend.host)?;
    env.apply(&["REDIS_SERVICE_PORT", "GOOSEBIN_BACKEND_PORT"], &mut config.backend.port)?;
    env.apply(&["REDIS_POOL_SIZE", "GOOSEBIN_BACKEND_POOL_SIZE"], &mut config.backend.pool_size)?;
    env.apply(&["GOOSEBIN_BACKEND_MAX_RETRIES"], &mut config.backend.max_retries)?;
    env.apply(&["GOOSEBIN_BACKEND_COMMAND_TIMEOUT_MS"], &mut config.backend.command_timeout_ms)?;

    // Listener
    env.apply(&["HTTP_PORT", "GOOSEBIN_HTTP_PORT"], &mut config.bind.http_port)?;
    env.apply(&["GOOSEBIN_HTTP_HOST"], &mut config.bind.host)?;

    // Telemetry, including the standard names
    env.apply(&["RUST_LOG", "GOOSEBIN_LOG_LEVEL"], &mut config.telemetry.log_level)?;
    env.apply(
        &["OTEL_EXPORTER_OTLP_ENDPOINT", "GOOSEBIN_OTLP_ENDPOINT"],
        &mut config.telemetry.otlp_endpoint,
    )?;

    Ok(())
}

struct EnvOverlay<'a, F> {
    lookup: F,
    sources: &'a mut ConfigSources,
}

impl<F> EnvOverlay<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn apply<T>(&mut self, names: &[&str], target: &mut T) -> Result<(), ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        for name in names {
            let Some(raw) = (self.lookup)(name).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            *target = raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
                name: name.to_string(),
                value: raw.clone(),
                message: e.to_string(),
            })?;
            self.sources.env_overrides.push(name.to_string());
        }
        Ok(())
    }
}
