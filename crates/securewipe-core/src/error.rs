//! Error taxonomy for sanitization, validation and certificate operations

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WipeError {
    #[error("File does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("Symbolic links are not supported: {0}")]
    PathIsSymlink(PathBuf),

    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("Permission denied: {path} ({reason})")]
    PermissionDenied { path: PathBuf, reason: String },

    #[error("Refusing to wipe protected system file: {0}")]
    SystemFileProtected(PathBuf),

    #[error("I/O failure on {path}: {source}")]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation cancelled by user")]
    CancelledByUser,

    #[error("Certificate signing key unavailable: {0}")]
    CertificateKeyUnavailable(String),

    #[error("Certificate signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("Secure delete tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WipeError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WipeError::IoFailure {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WipeError::PathNotFound(_) => ErrorKind::PathNotFound,
            WipeError::PathIsSymlink(_) => ErrorKind::PathIsSymlink,
            WipeError::NotAFile(_) => ErrorKind::NotAFile,
            WipeError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            WipeError::SystemFileProtected(_) => ErrorKind::SystemFileProtected,
            WipeError::IoFailure { .. } => ErrorKind::IoFailure,
            WipeError::CancelledByUser => ErrorKind::CancelledByUser,
            WipeError::CertificateKeyUnavailable(_) => ErrorKind::CertificateKeyUnavailable,
            WipeError::SignatureInvalid(_) => ErrorKind::SignatureInvalid,
            WipeError::ToolUnavailable(_) => ErrorKind::ToolUnavailable,
            WipeError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            WipeError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, WipeError::CancelledByUser)
    }
}

/// Stable tag stored alongside error messages in results
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    PathNotFound,
    PathIsSymlink,
    NotAFile,
    PermissionDenied,
    SystemFileProtected,
    IoFailure,
    CancelledByUser,
    CertificateKeyUnavailable,
    SignatureInvalid,
    ToolUnavailable,
    InvalidConfig,
    Serialization,
}

pub type Result<T> = std::result::Result<T, WipeError>;
