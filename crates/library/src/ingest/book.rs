use super::{book_file_path, has_epub_extension};
use crate::Library;
use crate::error::{ErrorKind, Result, Upload};
use shelf_catalog::{Book, BookId};
use tracing::instrument;

impl Library {
    /// Store the e-book file for a book and mark it as uploaded.
    ///
    /// Fails with [`ErrorKind::EmptyPayload`] or [`ErrorKind::InvalidFormat`]
    /// (the file name must end in `.epub`) before anything else is checked,
    /// then with [`ErrorKind::NotFound`] for an unknown id. An earlier upload
    /// for the same book is replaced.
    ///
    /// The file is durably written before the flag is saved. If saving fails,
    /// whatever was stored for the book before is put back.
    #[instrument(skip(self, content), fields(bytes = content.len()))]
    pub async fn ingest_book_file(&self, id: BookId, filename: &str, content: &[u8]) -> Result<Book> {
        if content.is_empty() {
            exn::bail!(ErrorKind::EmptyPayload(Upload::BookFile));
        }
        if !has_epub_extension(filename) {
            exn::bail!(ErrorKind::InvalidFormat(Upload::BookFile));
        }
        let _guard = self.locks.lock(&id).await;
        let mut book = self.get(id).await?;
        let path = book_file_path(id);
        let replaced = self.replace(&path, content).await?;
        book.mark_file_uploaded();
        match self.books.save(book).await {
            Ok(book) => {
                tracing::info!(book_id = %id, path = %path.display(), "Book file stored");
                Ok(book)
            },
            Err(err) => {
                self.restore(replaced).await;
                Err(ErrorKind::catalog(err))
            },
        }
    }

    /// The uploaded e-book of a book.
    ///
    /// Fails with [`ErrorKind::NotFound`] if the book doesn't exist or has no
    /// file.
    pub async fn read_book_file(&self, id: BookId) -> Result<Vec<u8>> {
        let book = self.get(id).await?;
        if !book.is_file_uploaded() {
            exn::bail!(ErrorKind::NotFound(id));
        }
        let path = book_file_path(id);
        match self.backend.read(&path).await {
            Ok(content) => Ok(content),
            Err(err) if err.is_not_found() => {
                tracing::warn!(book_id = %id, path = %path.display(), "Book is marked as uploaded but its file is missing");
                Err(err.raise(ErrorKind::NotFound(id)))
            },
            Err(err) => Err(ErrorKind::storage(err)),
        }
    }
}
