//! Error types for the manifest pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Error kinds that can occur while scanning, fetching or persisting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanErrorKind {
    /// Permission denied when accessing a file or directory
    PermissionDenied,
    /// File or directory not found
    NotFound,
    /// I/O error during file operations
    IoError,
    /// Path is not usable (e.g. media root is not a directory)
    InvalidPath,
    /// Manifest file exists but is not valid JSON
    ManifestParse,
    /// Metadata service could not be reached or answered with garbage
    Metadata,
    /// Configuration rejected at startup
    InvalidConfig,
}

/// Represents an error that aborts a synchronization cycle
#[derive(Debug, Error)]
#[error("{kind:?}: {message} (path: {path:?})")]
pub struct ScanError {
    /// The kind of error
    pub kind: ScanErrorKind,
    /// The path where the error occurred
    pub path: Option<PathBuf>,
    /// Human-readable error message
    pub message: String,
}

impl ScanError {
    /// Create a new scan error
    pub fn new(kind: ScanErrorKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(path: PathBuf) -> Self {
        Self::new(
            ScanErrorKind::NotFound,
            Some(path.clone()),
            format!("Not found: {:?}", path),
        )
    }

    /// Create an I/O error
    pub fn io_error(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::IoError, path, message)
    }

    /// Attach a path to an I/O error, keeping its kind
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let mut scan_err = Self::from(err);
        scan_err.path = Some(path.into());
        scan_err
    }

    /// Create an invalid path error
    pub fn invalid_path(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::InvalidPath, Some(path), message)
    }

    /// Create a manifest parse error
    pub fn manifest_parse(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::ManifestParse, Some(path), message)
    }

    /// Create a metadata service error
    pub fn metadata(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::Metadata, None, message)
    }

    /// Create a configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::InvalidConfig, None, message)
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::PermissionDenied => ScanErrorKind::PermissionDenied,
            std::io::ErrorKind::NotFound => ScanErrorKind::NotFound,
            _ => ScanErrorKind::IoError,
        };
        Self::new(kind, None, err.to_string())
    }
}

impl From<walkdir::Error> for ScanError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf());
        let kind = match err.io_error().map(|e| e.kind()) {
            Some(std::io::ErrorKind::PermissionDenied) => ScanErrorKind::PermissionDenied,
            Some(std::io::ErrorKind::NotFound) => ScanErrorKind::NotFound,
            _ => ScanErrorKind::IoError,
        };
        Self::new(kind, path, err.to_string())
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        Self::metadata(err.to_string())
    }
}
