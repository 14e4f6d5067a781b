//! Launcher configuration.
//!
//! Built-in defaults reproduce the classic start script exactly. An optional
//! TOML file can change them, and CLI flags override both.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::validate::{validate_argument, Validatable, ValidationError};

/// Default server binary, looked up on PATH
pub const DEFAULT_SERVER_BIN: &str = "ngamsServer";

/// Default location of the server config
pub const DEFAULT_CONFIG_TEMPLATE: &str = "${NGAS_STORAGE_DIR}/cfg/ngamsServer.conf";

/// Default location of the combined output log
pub const DEFAULT_LOG_TEMPLATE: &str = "${PYVOSPACE_DIR}/scripts/log/ngas.log";

const DEFAULT_VERBOSITY: u8 = 4;
const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("launcher config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read launcher config {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid launcher config {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to render launcher config")]
    Render(#[from] toml::ser::Error),
}

/// How the log file is opened on each run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogMode {
    /// Start a fresh log every run, like a shell `>` redirection
    #[default]
    Truncate,
    /// Keep earlier runs and add to the end
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LauncherConfig {
    /// Server binary name or path
    pub server_bin: String,

    /// Path template of the server config passed with `-cfg`
    pub config_template: String,

    /// Path template of the combined stdout/stderr log
    pub log_template: String,

    /// Server log verbosity passed with `-v`
    pub verbosity: u8,

    /// Pass `-force`
    pub force: bool,

    /// Pass `-autoonline`
    pub autoonline: bool,

    /// Appended after the fixed server flags
    pub extra_args: Vec<String>,

    pub log_mode: LogMode,

    /// How long a forwarded signal gets before the server is killed
    pub shutdown_grace_ms: u64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            server_bin: DEFAULT_SERVER_BIN.to_string(),
            config_template: DEFAULT_CONFIG_TEMPLATE.to_string(),
            log_template: DEFAULT_LOG_TEMPLATE.to_string(),
            verbosity: DEFAULT_VERBOSITY,
            force: true,
            autoonline: true,
            extra_args: Vec::new(),
            log_mode: LogMode::default(),
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
        }
    }
}

impl LauncherConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl Validatable for LauncherConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.server_bin.is_empty() {
            return Err(ValidationError::EmptyProgram);
        }
        validate_argument(&self.server_bin)?;
        validate_argument(&self.config_template)?;
        validate_argument(&self.log_template)?;
        for arg in &self.extra_args {
            validate_argument(arg)?;
        }
        Ok(())
    }
}

/// Values given on the command line; `None` leaves the config untouched
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub server_bin: Option<String>,
    pub verbosity: Option<u8>,
    pub append: bool,
    pub shutdown_grace_ms: Option<u64>,
    pub extra_args: Vec<String>,
}

impl ConfigOverrides {
    pub fn apply(self, config: &mut LauncherConfig) {
        if let Some(bin) = self.server_bin {
            config.server_bin = bin;
        }
        if let Some(level) = self.verbosity {
            config.verbosity = level;
        }
        if self.append {
            config.log_mode = LogMode::Append;
        }
        if let Some(ms) = self.shutdown_grace_ms {
            config.shutdown_grace_ms = ms;
        }
        config.extra_args.extend(self.extra_args);
    }
}

/// Load configuration from a file
pub fn load_config(path: &Path) -> Result<LauncherConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
