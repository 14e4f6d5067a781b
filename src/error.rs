use std::error::Error as _;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::validate::ValidationError;

/// sysexits.h `EX_IOERR`
pub const EXIT_IO_ERROR: u8 = 74;
/// sysexits.h `EX_CONFIG`
pub const EXIT_CONFIG_ERROR: u8 = 78;
/// What a shell returns for a command it cannot find
pub const EXIT_NOT_FOUND: u8 = 127;

/// Everything that can stop the launcher before the server exits on its own
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to create log directory {}", path.display())]
    LogDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open log file {}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write log file {}", path.display())]
    LogWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create output pipe")]
    Pipe(#[source] io::Error),

    #[error("failed to install signal handlers")]
    Signals(#[source] io::Error),

    #[error("failed to read server output")]
    Stream(#[source] io::Error),

    #[error("failed to start {program}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed while waiting for {program}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    /// Exit code the launcher reports for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            LaunchError::Validation(ValidationError::BinaryNotFound(_)) => EXIT_NOT_FOUND,
            LaunchError::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                EXIT_NOT_FOUND
            }
            LaunchError::Validation(_) | LaunchError::Config(_) => EXIT_CONFIG_ERROR,
            _ => EXIT_IO_ERROR,
        }
    }

    /// The error and all of its sources on one line
    pub fn report(&self) -> String {
        let mut message = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}
