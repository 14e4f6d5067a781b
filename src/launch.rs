//! Resolving a launcher config into the concrete server invocation.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::config::{LauncherConfig, LogMode};
use crate::env::{expand_template, Environment};
use crate::error::LaunchError;
use crate::validate::{find_program, validate_config_file, Validatable, ValidationError};

/// Everything needed to start the server once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    /// Resolved path of the server binary
    pub program: PathBuf,
    /// Arguments in the order the server receives them
    pub args: Vec<OsString>,
    pub config_path: PathBuf,
    pub log_path: PathBuf,
    pub log_mode: LogMode,
    pub shutdown_grace: Duration,
}

impl LaunchPlan {
    /// Expand path templates, find the server binary and build the argument list.
    /// The binary lookup runs before the config file check so a missing
    /// install is always reported by name.
    pub fn resolve(config: &LauncherConfig, env: &Environment) -> Result<Self, ValidationError> {
        config.validate()?;

        let config_path = PathBuf::from(expand_template(&config.config_template, |name| {
            env.lookup(name)
        })?);
        let log_path = PathBuf::from(expand_template(&config.log_template, |name| {
            env.lookup(name)
        })?);
        let program = find_program(&config.server_bin)?;
        debug!(program = %program.display(), "resolved server binary");

        let plan = Self {
            program,
            args: server_args(config, &config_path),
            config_path,
            log_path,
            log_mode: config.log_mode,
            shutdown_grace: config.shutdown_grace(),
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Human-readable command line, quoted where needed
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|part| quote(&part.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Create the log directory if needed and open the log per `log_mode`
    pub fn open_log(&self) -> Result<File, LaunchError> {
        if let Some(dir) = self.log_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| LaunchError::LogDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let mut options = OpenOptions::new();
        match self.log_mode {
            LogMode::Truncate => options.write(true).create(true).truncate(true),
            LogMode::Append => options.append(true).create(true),
        };
        options.open(&self.log_path).map_err(|source| LaunchError::LogFile {
            path: self.log_path.clone(),
            source,
        })
    }
}

impl Validatable for LaunchPlan {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_config_file(&self.config_path)
    }
}

/// `[-force] -cfg <path> -v <level> [-autoonline] [extra...]`
pub fn server_args(config: &LauncherConfig, config_path: &std::path::Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(6 + config.extra_args.len());
    if config.force {
        args.push("-force".into());
    }
    args.push("-cfg".into());
    args.push(config_path.as_os_str().to_owned());
    args.push("-v".into());
    args.push(config.verbosity.to_string().into());
    if config.autoonline {
        args.push("-autoonline".into());
    }
    args.extend(config.extra_args.iter().map(OsString::from));
    args
}

fn quote(part: &str) -> String {
    if !part.is_empty() && !part.contains(|c: char| c.is_whitespace() || c == '\'' || c == '"') {
        return part.to_string();
    }
    format!("'{}'", part.replace('\'', r"'\''"))
}
