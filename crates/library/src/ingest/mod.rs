//! Accepting uploads for existing books.
//!
//! Everything uploaded for a book lives flat in the upload root, named after
//! the book's id:
//!
//! | File           | Name                              |
//! |----------------|-----------------------------------|
//! | the e-book     | `book_<id>.epub`                  |
//! | a stored cover | `cover_<id>.<ext>` (`png`, `jpg`, `gif`, `webp` or `bin`) |
//!
//! Validation that needs nothing but the upload itself (empty payload, wrong
//! extension, not an image) runs before the book is even looked up, so a
//! rejected upload never touches the catalog or the disk.

mod book;
mod cover;

pub use self::cover::{CoverImage, CoverMode};
use crate::Library;
use crate::error::{ErrorKind, Result};
use shelf_catalog::BookId;
use std::path::{Path, PathBuf};

const BOOK_FILE_PREFIX: &str = "book_";
const BOOK_FILE_EXTENSION: &str = "epub";
const COVER_FILE_PREFIX: &str = "cover_";

/// Where the uploaded e-book for `id` is stored, relative to the upload root.
pub fn book_file_path(id: BookId) -> PathBuf {
    PathBuf::from(format!("{BOOK_FILE_PREFIX}{id}.{BOOK_FILE_EXTENSION}"))
}

pub(crate) fn cover_file_path(id: BookId, extension: &str) -> PathBuf {
    PathBuf::from(format!("{COVER_FILE_PREFIX}{id}.{extension}"))
}

/// Whether the client-supplied file name ends in `.epub`, in any case.
pub(crate) fn has_epub_extension(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(BOOK_FILE_EXTENSION))
}

/// A write that can still be taken back: the path and what was there before.
pub(crate) struct Replaced {
    path: PathBuf,
    previous: Option<Vec<u8>>,
}

impl Library {
    /// Write `content` to `path`, keeping the old content until the catalog
    /// has recorded the new one.
    pub(crate) async fn replace(&self, path: &Path, content: &[u8]) -> Result<Replaced> {
        let previous = match self.backend.read(path).await {
            Ok(data) => Some(data),
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(ErrorKind::storage(err)),
        };
        self.backend.write(path, content).await.map_err(ErrorKind::storage)?;
        Ok(Replaced { path: path.to_path_buf(), previous })
    }

    /// Put back what [`replace`](Self::replace) overwrote, or remove the file
    /// if there was nothing. Best-effort: failures are logged.
    pub(crate) async fn restore(&self, replaced: Replaced) {
        let Replaced { path, previous } = replaced;
        let Some(data) = previous else {
            self.release(&path).await;
            return;
        };
        match self.backend.write(&path, &data).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Restored previous file"),
            Err(err) => tracing::warn!(path = %path.display(), error = ?err, "Could not restore previous file"),
        }
    }
}

/// What a file in the upload root was stored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredKind {
    BookFile(BookId),
    Cover(BookId),
}

impl StoredKind {
    /// Recognise a file written by ingestion. Anything else in the upload
    /// root (including files in subdirectories) yields `None`.
    pub fn recognise(path: &Path) -> Option<Self> {
        if path.parent().is_some_and(|parent| !parent.as_os_str().is_empty()) {
            return None;
        }
        let name = path.file_name()?.to_str()?;
        let (stem, extension) = name.rsplit_once('.')?;
        if let Some(id) = stem.strip_prefix(BOOK_FILE_PREFIX) {
            if extension != BOOK_FILE_EXTENSION {
                return None;
            }
            return id.parse().ok().map(Self::BookFile);
        }
        let id = stem.strip_prefix(COVER_FILE_PREFIX)?;
        id.parse().ok().map(Self::Cover)
    }

    pub fn book_id(self) -> BookId {
        match self {
            Self::BookFile(id) | Self::Cover(id) => id,
        }
    }
}
