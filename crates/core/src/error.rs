//! Error types for ferry-core
//!
//! Every backend translates its native failures into this taxonomy so the
//! engines above the Client Contract can decide what is recoverable.

use thiserror::Error;

/// Result type alias for ferry-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for ferry-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid path or URL format
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Alias not found
    #[error("Alias not found: {0}")]
    AliasNotFound(String),

    /// Alias already exists
    #[error("Alias already exists: {0}")]
    AliasExists(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Access to the resource was refused by the backend
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A directory-only operation was attempted on a non-directory
    #[error("Not a directory: {0}")]
    NotDirectory(String),

    /// An object operation was attempted on a directory
    #[error("Is a directory: {0}")]
    IsDirectory(String),

    /// Partial read outside the object's bounds
    #[error("Invalid range: offset {offset}, length {length}, size {size}")]
    InvalidRange { offset: i64, length: i64, size: u64 },

    /// Symbolic link whose target does not exist
    #[error("Broken symlink: {0}")]
    BrokenSymlink(String),

    /// Too many levels of symbolic links
    #[error("Too many levels of symbolic links: {0}")]
    SymlinkCycle(String),

    /// Source/target combination rejected by the classifier
    #[error("Invalid copy combination: {0}")]
    InvalidCopyCombination(String),

    /// A single transfer failed
    #[error("Transfer failed for {target}: {source}")]
    TransferFailed {
        target: String,
        #[source]
        source: Box<Error>,
    },

    /// Container (bucket or directory) could not be created
    #[error("Unable to create container {name}: {reason}")]
    ContainerCreateFailed { name: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Network error (retryable)
    #[error("Network error: {0}")]
    Network(String),

    /// Conflict error
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Feature not supported by backend
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidPath(_) | Error::Config(_) | Error::InvalidCopyCombination(_) => 2,
            Error::Network(_) => 3,
            Error::Auth(_) | Error::PermissionDenied(_) => 4,
            Error::NotFound(_) | Error::AliasNotFound(_) => 5,
            Error::Conflict(_) | Error::AliasExists(_) => 6,
            Error::UnsupportedFeature(_) => 7,
            Error::TransferFailed { source, .. } => source.exit_code(),
            _ => 1,
        }
    }

    /// Whether retrying the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            Error::TransferFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Wrap this error as the failure of a transfer to `target`
    pub fn transfer_failed(self, target: impl Into<String>) -> Self {
        match self {
            err @ Error::TransferFailed { .. } => err,
            other => Error::TransferFailed {
                target: target.into(),
                source: Box::new(other),
            },
        }
    }

    /// Translate an IO error observed on `path` into the ferry taxonomy
    pub fn from_io(err: std::io::Error, path: impl Into<String>) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(path),
            std::io::ErrorKind::PermissionDenied => Error::PermissionDenied(path),
            std::io::ErrorKind::NotADirectory => Error::NotDirectory(path),
            std::io::ErrorKind::IsADirectory => Error::IsDirectory(path),
            _ if is_symlink_loop(&err) => Error::SymlinkCycle(path),
            _ => Error::Io(err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(err.to_string()),
            std::io::ErrorKind::PermissionDenied => Error::PermissionDenied(err.to_string()),
            _ if is_symlink_loop(&err) => Error::SymlinkCycle(err.to_string()),
            _ => Error::Io(err),
        }
    }
}

#[cfg(unix)]
fn is_symlink_loop(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(libc::ELOOP)
}

#[cfg(not(unix))]
fn is_symlink_loop(_err: &std::io::Error) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(Error::InvalidPath("test".into()).exit_code(), 2);
        assert_eq!(Error::Config("test".into()).exit_code(), 2);
        assert_eq!(Error::InvalidCopyCombination("test".into()).exit_code(), 2);
        assert_eq!(Error::Network("test".into()).exit_code(), 3);
        assert_eq!(Error::Auth("test".into()).exit_code(), 4);
        assert_eq!(Error::PermissionDenied("test".into()).exit_code(), 4);
        assert_eq!(Error::NotFound("test".into()).exit_code(), 5);
        assert_eq!(Error::AliasNotFound("test".into()).exit_code(), 5);
        assert_eq!(Error::Conflict("test".into()).exit_code(), 6);
        assert_eq!(Error::AliasExists("test".into()).exit_code(), 6);
        assert_eq!(Error::UnsupportedFeature("test".into()).exit_code(), 7);
        assert_eq!(Error::General("test".into()).exit_code(), 1);
    }

    #[test]
    fn test_error_display() {
        let err = Error::AliasNotFound("minio".into());
        assert_eq!(err.to_string(), "Alias not found: minio");

        let err = Error::InvalidRange {
            offset: -1,
            length: 5,
            size: 5,
        };
        assert_eq!(err.to_string(), "Invalid range: offset -1, length 5, size 5");
    }

    #[test]
    fn test_transfer_failed_wraps_once() {
        let err = Error::Network("reset".into()).transfer_failed("a/b");
        let err = err.transfer_failed("c/d");
        match &err {
            Error::TransferFailed { target, source } => {
                assert_eq!(target, "a/b");
                assert!(matches!(**source, Error::Network(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_retryable());
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_from_io_kinds() {
        let err = Error::from_io(std::io::Error::from(std::io::ErrorKind::NotFound), "/x");
        assert!(matches!(err, Error::NotFound(p) if p == "/x"));

        let err = Error::from_io(
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            "/y",
        );
        assert!(matches!(err, Error::PermissionDenied(p) if p == "/y"));
    }

    #[cfg(unix)]
    #[test]
    fn test_from_io_symlink_loop() {
        let err = Error::from_io(std::io::Error::from_raw_os_error(libc::ELOOP), "/loop");
        assert!(matches!(err, Error::SymlinkCycle(_)));
    }
}
