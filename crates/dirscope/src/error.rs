use std::fmt;

use filesystem::FilesystemError;

/// Unified error type for the dirscope crate.
///
/// `Clone` so that a single coalesced failure can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The path does not exist.
    NotFound(String),
    /// The path exists but cannot be read.
    PermissionDenied(String),
    /// Any other IO failure on the requested path.
    Io(String),
    /// Invalid input provided by the caller.
    InvalidInput(String),
    /// Internal error.
    Internal(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::NotFound(msg) => write!(f, "not found: {msg}"),
            CoreError::PermissionDenied(msg) => write!(f, "permission denied: {msg}"),
            CoreError::Io(msg) => write!(f, "io error: {msg}"),
            CoreError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            CoreError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<FilesystemError> for CoreError {
    fn from(error: FilesystemError) -> Self {
        match error {
            FilesystemError::NotFound(path) => CoreError::NotFound(path.display().to_string()),
            FilesystemError::PermissionDenied(path) => {
                CoreError::PermissionDenied(path.display().to_string())
            }
            error @ FilesystemError::Io { .. } => CoreError::Io(error.to_string()),
            FilesystemError::InvalidInput(msg) => CoreError::InvalidInput(msg),
            FilesystemError::Internal(msg) => CoreError::Internal(msg),
        }
    }
}

/// Result type alias using [`CoreError`].
pub type CoreResult<T> = Result<T, CoreError>;
