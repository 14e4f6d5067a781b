use std::path::{Path, PathBuf};

use thiserror::Error;

/// Validation error types
#[derive(Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("environment variable {0} is not set or is empty")]
    MissingVar(String),

    #[error("path template '{template}' references ${{{var}}}, which is not set or is empty")]
    UnsetReference { template: String, var: String },

    #[error("'{0}' contains a NUL byte and cannot be passed to a process")]
    NulByte(String),

    #[error("server binary name must not be empty")]
    EmptyProgram,

    #[error("server config file {} does not exist", .0.display())]
    ServerConfigMissing(PathBuf),

    #[error("server binary '{0}' was not found on PATH")]
    BinaryNotFound(String),
}

/// Trait for anything that must be checked before the server is started
pub trait Validatable {
    /// Validate, returning an error if invalid
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Reject arguments the OS cannot carry in an argv entry
pub fn validate_argument(arg: &str) -> Result<(), ValidationError> {
    if arg.contains('\0') {
        return Err(ValidationError::NulByte(arg.to_string()));
    }
    Ok(())
}

/// Check that the server config file is present
pub fn validate_config_file(path: &Path) -> Result<(), ValidationError> {
    if !path.is_file() {
        return Err(ValidationError::ServerConfigMissing(path.to_path_buf()));
    }
    Ok(())
}

/// Locate a program the way a shell would.
/// Names containing a path separator are checked directly, everything else
/// is searched for on PATH.
pub fn find_program(name: &str) -> Result<PathBuf, ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyProgram);
    }
    validate_argument(name)?;
    which::which(name).map_err(|_| ValidationError::BinaryNotFound(name.to_string()))
}
