//! Book records.
//!
//! [`Book`] is a plain value: the repository hands it out, callers change it,
//! and the repository persists whatever comes back through
//! [`Repository::save`](crate::Repository::save). The fields with invariants
//! attached (id, progress and its sync time, the uploaded flag) are private
//! and only change through methods that keep them consistent.

use derive_more::{Display, From};
use std::path::PathBuf;
use std::str::FromStr;
use time::OffsetDateTime;

/// Identifier assigned by the store when a book is created.
///
/// Ids are never reused, even after the book is deleted.
#[derive(Debug, Display, From, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BookId(i64);
impl BookId {
    pub fn get(self) -> i64 {
        self.0
    }
}
impl FromStr for BookId {
    type Err = std::num::ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Where a book's cover image is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cover {
    /// Image bytes embedded in the record itself.
    Inline(Vec<u8>),
    /// Path of the image, relative to the upload directory.
    Stored(PathBuf),
}

/// The fields a client supplies when creating a book.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewBook {
    pub title: String,
    pub author: Option<String>,
    pub progress: Option<f64>,
    pub favorite: Option<bool>,
}
impl NewBook {
    pub fn titled(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Self::default() }
    }
}

/// A persisted book.
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub(crate) id: BookId,
    pub title: String,
    pub author: Option<String>,
    pub(crate) progress: Option<f64>,
    pub(crate) progress_synched_at: Option<OffsetDateTime>,
    pub favorite: Option<bool>,
    pub cover: Option<Cover>,
    pub(crate) is_file_uploaded: bool,
}
impl Book {
    pub fn id(&self) -> BookId {
        self.id
    }

    /// Reading position as a fraction of the book.
    pub fn progress(&self) -> Option<f64> {
        self.progress
    }

    /// When [`progress`](Self::progress) was last written. Present exactly
    /// when progress is.
    pub fn progress_synched_at(&self) -> Option<OffsetDateTime> {
        self.progress_synched_at
    }

    /// Write the reading position, stamping the sync time in the same step.
    ///
    /// Clearing progress clears the sync time with it.
    pub fn set_progress(&mut self, progress: Option<f64>, now: OffsetDateTime) {
        self.progress = progress;
        self.progress_synched_at = progress.map(|_| now);
    }

    pub fn is_file_uploaded(&self) -> bool {
        self.is_file_uploaded
    }

    /// Record that the book file has been stored. There is no way back.
    pub fn mark_file_uploaded(&mut self) {
        self.is_file_uploaded = true;
    }
}
