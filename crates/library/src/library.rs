use crate::error::{ErrorKind, Result};
use crate::ingest::{CoverMode, book_file_path};
use crate::locks::KeyedLocks;
use crate::update::{self, BookChanges, UpdateMode};
use exn::OptionExt;
use shelf_catalog::{Book, BookId, Cover, NewBook, Repository};
use shelf_storage::BackendHandle;
use std::path::Path;
use time::OffsetDateTime;
use tracing::instrument;

/// Per-deployment policy choices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Settings {
    /// How [`Library::update`] treats absent fields.
    pub update_mode: UpdateMode,
    /// Where ingested covers are kept.
    pub cover_mode: CoverMode,
    /// Reject covers that aren't a recognised image format.
    pub require_cover_image: bool,
}

/// The book library: records in the catalog, uploads in a storage backend,
/// and the rules tying the two together.
///
/// Every mutation of a book (update, ingestion, delete) holds that book's
/// lock for its whole duration, so a file write and the flag recording it
/// can't interleave with another write to the same record. Reads don't lock.
pub struct Library {
    pub(crate) backend: BackendHandle,
    pub(crate) books: Repository,
    pub(crate) settings: Settings,
    pub(crate) locks: KeyedLocks<BookId>,
}

impl Library {
    pub fn new(backend: BackendHandle, books: Repository, settings: Settings) -> Self {
        Self { backend, books, settings, locks: KeyedLocks::default() }
    }

    pub async fn list(&self) -> Result<Vec<Book>> {
        self.books.list().await.map_err(ErrorKind::catalog)
    }

    /// Fetch a book, failing with [`ErrorKind::NotFound`] if there is none.
    pub async fn get(&self, id: BookId) -> Result<Book> {
        self.books.get(id).await.map_err(ErrorKind::catalog)?.ok_or_raise(|| ErrorKind::NotFound(id))
    }

    /// Create a book. Fails with [`ErrorKind::TitleTaken`] if the title is in
    /// use.
    #[instrument(skip_all, fields(title = %draft.title))]
    pub async fn create(&self, draft: NewBook) -> Result<Book> {
        let book = self.books.create(draft).await.map_err(ErrorKind::catalog)?;
        tracing::info!(book_id = %book.id(), "Book created");
        Ok(book)
    }

    /// Edit a book using the deployment's [`UpdateMode`].
    pub async fn update(&self, id: BookId, changes: BookChanges) -> Result<Book> {
        self.update_with(id, changes, self.settings.update_mode).await
    }

    /// Edit a book using an explicit [`UpdateMode`].
    ///
    /// On any failure (unknown id, missing or duplicate title) the stored
    /// record is left exactly as it was.
    #[instrument(skip(self, changes))]
    pub async fn update_with(&self, id: BookId, changes: BookChanges, mode: UpdateMode) -> Result<Book> {
        if mode == UpdateMode::Replace && changes.title.is_none() {
            exn::bail!(ErrorKind::MissingTitle);
        }
        let _guard = self.locks.lock(&id).await;
        let mut book = self.get(id).await?;
        update::apply(&mut book, changes, mode, OffsetDateTime::now_utc())?;
        let book = self.books.save(book).await.map_err(ErrorKind::catalog)?;
        tracing::info!(book_id = %id, "Book updated");
        Ok(book)
    }

    /// Delete a book along with its uploaded file and stored cover.
    ///
    /// Returns `false` if there was no such book. Once the record is gone the
    /// delete has happened: files that can't be removed are logged and left
    /// for `shelf sweep`.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: BookId) -> Result<bool> {
        let _guard = self.locks.lock(&id).await;
        let Some(book) = self.books.get(id).await.map_err(ErrorKind::catalog)? else {
            return Ok(false);
        };
        if !self.books.delete(id).await.map_err(ErrorKind::catalog)? {
            return Ok(false);
        }
        if book.is_file_uploaded() {
            self.release(&book_file_path(id)).await;
        }
        if let Some(Cover::Stored(path)) = &book.cover {
            self.release(path).await;
        }
        tracing::info!(book_id = %id, "Book deleted");
        Ok(true)
    }

    /// Best-effort removal of a file nothing refers to any more.
    pub(crate) async fn release(&self, path: &Path) {
        match self.backend.delete(path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Released stored file"),
            Err(err) if err.is_not_found() => {},
            Err(err) => tracing::warn!(path = %path.display(), error = ?err, "Could not remove stored file"),
        }
    }
}
