/// Error types for the browser engine and its backends.
use crate::model::ResourcePath;
use thiserror::Error;

/// Failures a content backend can report for a single call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("not found: {0}")]
    NotFound(ResourcePath),

    #[error("permission denied: {0}")]
    PermissionDenied(ResourcePath),

    #[error("already exists: {0}")]
    Conflict(ResourcePath),

    #[error("I/O error: {0}")]
    Io(String),
}

impl BackendError {
    /// Map an OS error onto the backend taxonomy.
    pub fn from_io(err: &std::io::Error, path: &ResourcePath) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.clone()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.clone()),
            std::io::ErrorKind::AlreadyExists => Self::Conflict(path.clone()),
            _ => Self::Io(format!("{path}: {err}")),
        }
    }
}

/// Errors surfaced by browser operations.
///
/// Validation variants are returned before any backend call is made.
/// Per-item backend failures inside a batch are reported through
/// [`crate::batch::BatchReport`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrowserError {
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("permission denied: {0}")]
    PermissionDenied(ResourcePath),

    #[error("clipboard is empty")]
    EmptyClipboard,

    #[error("'{name}' already exists in '{parent}'")]
    NameConflict { name: String, parent: ResourcePath },

    #[error("invalid name: {0:?}")]
    InvalidName(String),

    #[error("not found: {0}")]
    NotFound(ResourcePath),

    #[error("conflict: {0}")]
    Conflict(ResourcePath),

    #[error("backend error: {0}")]
    Backend(BackendError),
}

impl From<BackendError> for BrowserError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(p) => Self::NotFound(p),
            BackendError::PermissionDenied(p) => Self::PermissionDenied(p),
            BackendError::Conflict(p) => Self::Conflict(p),
            other => Self::Backend(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, BrowserError>;
