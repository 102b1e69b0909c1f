//! Configuration resolution: command-line flags, environment variables,
//! compiled-in defaults, and an optional TOML defaults file.
//!
//! This mirrors the layered resolution every EVO program uses for its
//! runtime knobs: an explicit flag wins, then an environment variable,
//! then whatever the program was compiled with.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Log level for configuration (replaces `log::Level`).
///
/// Serializes to lowercase strings: "trace", "debug", "info", "warn", "error".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level verbosity.
    Trace,
    /// Debug-level verbosity.
    Debug,
    /// Info-level verbosity (default).
    Info,
    /// Warning-level verbosity.
    Warn,
    /// Error-level verbosity.
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl LogLevel {
    /// Convert to the `tracing::Level` equivalent.
    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Trait for loading configuration from TOML files.
///
/// Default implementation works for any `serde::de::DeserializeOwned` type.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

/// Optional defaults file consulted below the environment variable and
/// above the compiled-in default (`/etc/shmem_admin/defaults.toml`, say).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminDefaults {
    /// Default shared-memory base path, overridable by flag/env.
    #[serde(default)]
    pub shmem_path: Option<String>,
    /// Default log verbosity.
    #[serde(default)]
    pub log_level: Option<LogLevel>,
}

/// Resolve a configuration value through the standard EVO precedence
/// chain: explicit flag, then environment variable, then a supplied
/// default. `None`/unset at each layer falls through to the next.
///
/// This is the generic form of the `--shmem-path` / `FD_SHMEM_PATH` /
/// `/mnt/.fd` resolution used by `shmem_admin`'s topology boot.
pub fn resolve_cfg_value(flag_value: Option<&str>, env_var: &str, default: &str) -> String {
    if let Some(v) = flag_value {
        return v.to_string();
    }
    if let Ok(v) = std::env::var(env_var) {
        if !v.is_empty() {
            return v;
        }
    }
    default.to_string()
}
