//! TOML configuration plumbing for the interlock.
//!
//! A config type derives `Deserialize`, embeds a `[shared]` table and
//! implements [`Validate`]. [`ConfigLoader`] is blanket-implemented on top,
//! so `load_validated` is the single entry point the binary uses.
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use lawn_common::config::{ConfigError, ConfigLoader, SharedConfig, Validate};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct RelayBench {
//!     shared: SharedConfig,
//!     trip_after_ms: u64,
//! }
//!
//! impl Validate for RelayBench {
//!     fn validate(&self) -> Result<(), ConfigError> {
//!         self.shared.validate()?;
//!         if self.trip_after_ms == 0 {
//!             return Err(ConfigError::ValidationError("trip_after_ms is zero".into()));
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let bench = RelayBench::load_validated(Path::new("relay_bench.toml"))?;
//! assert!(!bench.shared.service_name.is_empty());
//! # Ok::<(), ConfigError>(())
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a config file could not be turned into a usable config.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("config file {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    /// Unreadable file or malformed TOML.
    #[error("cannot parse config: {0}")]
    ParseError(String),

    /// Parsed, but a value is out of its safe range.
    #[error("invalid config: {0}")]
    ValidationError(String),
}

/// `[shared] log_level`. Maps onto an `EnvFilter` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// The `[shared]` table every interlock config starts with.
///
/// ```toml
/// [shared]
/// service_name = "mower-01-interlock"
/// log_level = "debug"
/// ```
///
/// `service_name` tags every log line and audit session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    #[serde(default)]
    pub log_level: LogLevel,
    pub service_name: String,
}

impl SharedConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::ValidationError("shared.service_name is blank".into()));
        }
        Ok(())
    }
}

/// Checks that serde cannot express (ranges, cross-field limits).
pub trait Validate {
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Read a TOML file into any deserializable config.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound(path.to_path_buf()),
            _ => ConfigError::ParseError(format!("{}: {e}", path.display())),
        })?;
        Self::from_toml_str(&content)
    }

    fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// [`load`](Self::load) followed by [`Validate::validate`]. An invalid
    /// config is never returned.
    fn load_validated(path: &Path) -> Result<Self, ConfigError>
    where
        Self: Validate,
    {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
