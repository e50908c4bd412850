//! Storage Error Types
//!
//! Errors carry the path they concern (relative to the storage root) where
//! there is one, so that callers can log it without keeping their own copy.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("no stored file at {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("not allowed to access {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// The path is empty, or would leave the storage root.
    #[display("unusable storage path {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    #[display("storage I/O failed: {_0}")]
    Io(IoError),
    /// The backend found itself in a state it can't explain.
    #[display("storage backend is inconsistent: {_0}")]
    Inconsistent(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Whether the file simply isn't there. Cleanup treats that as done.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let missing = ErrorKind::NotFound(PathBuf::from("book_1.epub"));
        assert!(missing.is_not_found());
        assert!(!missing.is_retryable());
        assert_eq!(missing.to_string(), "no stored file at book_1.epub");
        let io = ErrorKind::from(IoError::other("disk on fire"));
        assert!(io.is_retryable());
        assert!(!io.is_not_found());
    }
}
