//! Configuration resolution and path discovery.
//!
//! Resolution order: CLI argument → environment variables → XDG path →
//! system path → defaults.

use std::path::{Path, PathBuf};

/// Discovered configuration file path.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Path to pipeline.json (or None if not found).
    pub pipeline: Option<PathBuf>,

    /// Source of the pipeline config (for diagnostics).
    pub source: ConfigSource,
}

/// Where a configuration file was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Found in /etc/edsteva/.
    SystemConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::SystemConfig => write!(f, "system config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable names.
pub const ENV_CONFIG_PATH: &str = "EDSTEVA_CONFIG";
pub const ENV_CONFIG_DIR: &str = "EDSTEVA_CONFIG_DIR";

/// Standard config file name.
pub const PIPELINE_FILENAME: &str = "pipeline.json";

/// Application name for XDG directories.
const APP_NAME: &str = "edsteva";

/// Resolve the pipeline configuration path.
///
/// Resolution order:
/// 1. Explicit CLI path (returned even if missing, so loading reports it)
/// 2. EDSTEVA_CONFIG (file path)
/// 3. EDSTEVA_CONFIG_DIR + pipeline.json
/// 4. XDG config directory (~/.config/edsteva/)
/// 5. System config (/etc/edsteva/)
/// 6. Built-in defaults (None)
pub fn resolve_config(cli_path: Option<&Path>) -> ConfigPaths {
    if let Some(path) = cli_path {
        return ConfigPaths {
            pipeline: Some(path.to_path_buf()),
            source: ConfigSource::CliArgument,
        };
    }

    let candidates = [
        (
            std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from),
            ConfigSource::Environment,
        ),
        (
            std::env::var(ENV_CONFIG_DIR)
                .ok()
                .map(|dir| PathBuf::from(dir).join(PIPELINE_FILENAME)),
            ConfigSource::Environment,
        ),
        (
            xdg_config_dir().map(|dir| dir.join(PIPELINE_FILENAME)),
            ConfigSource::XdgConfig,
        ),
        (
            Some(system_config_dir().join(PIPELINE_FILENAME)),
            ConfigSource::SystemConfig,
        ),
    ];

    for (path, source) in candidates {
        if let Some(path) = path.filter(|p| p.exists()) {
            return ConfigPaths {
                pipeline: Some(path),
                source,
            };
        }
    }

    ConfigPaths::default()
}

/// Get the XDG config directory for edsteva.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the system config directory.
pub fn system_config_dir() -> PathBuf {
    PathBuf::from("/etc").join(APP_NAME)
}
