use std::path::PathBuf;
use time::OffsetDateTime;

/// A stored file, as seen when listing a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Relative to the backend's root.
    pub path: PathBuf,
    pub size: u64,
    /// Last write. Lets maintenance leave recently uploaded files alone.
    pub modified: OffsetDateTime,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: OffsetDateTime) -> Self {
        Self { path: path.into(), size, modified }
    }
}
