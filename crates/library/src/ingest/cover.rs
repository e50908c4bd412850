use super::cover_file_path;
use crate::Library;
use crate::error::{ErrorKind, Result, Upload};
use crate::image::{ImageFormat, UNKNOWN_EXTENSION, UNKNOWN_MEDIA_TYPE};
use exn::OptionExt;
use shelf_catalog::{Book, BookId, Cover};
use tracing::instrument;

/// Where ingested covers are kept. One mode is active per deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(rename_all = "lowercase"))]
pub enum CoverMode {
    /// Image bytes embedded in the book record.
    #[default]
    Inline,
    /// Image written to `cover_<id>.<ext>` next to the book files; the
    /// record keeps the path.
    Stored,
}

/// Cover bytes with the media type they should be served as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverImage {
    pub data: Vec<u8>,
    pub media_type: &'static str,
}
impl CoverImage {
    fn new(data: Vec<u8>) -> Self {
        let media_type = ImageFormat::sniff(&data).map_or(UNKNOWN_MEDIA_TYPE, ImageFormat::media_type);
        Self { data, media_type }
    }
}

impl Library {
    /// Set the cover of a book, replacing any previous one.
    ///
    /// Fails with [`ErrorKind::EmptyPayload`] for zero bytes, and with
    /// [`ErrorKind::InvalidFormat`] for bytes that aren't a recognised image
    /// if the deployment requires one (otherwise they're accepted with a
    /// warning). Only then is the id checked ([`ErrorKind::NotFound`]).
    #[instrument(skip(self, content), fields(bytes = content.len()))]
    pub async fn ingest_cover(&self, id: BookId, content: &[u8]) -> Result<Book> {
        if content.is_empty() {
            exn::bail!(ErrorKind::EmptyPayload(Upload::Cover));
        }
        let format = ImageFormat::sniff(content);
        match format {
            Some(format) => tracing::debug!(%format, "Cover format detected"),
            None if self.settings.require_cover_image => exn::bail!(ErrorKind::InvalidFormat(Upload::Cover)),
            None => tracing::warn!("Cover is not a recognised image format, storing it anyway"),
        }

        let _guard = self.locks.lock(&id).await;
        let mut book = self.get(id).await?;
        let previous = book.cover.take();
        let (cover, replaced) = match self.settings.cover_mode {
            CoverMode::Inline => (Cover::Inline(content.to_vec()), None),
            CoverMode::Stored => {
                let path = cover_file_path(id, format.map_or(UNKNOWN_EXTENSION, ImageFormat::extension));
                let replaced = self.replace(&path, content).await?;
                (Cover::Stored(path), Some(replaced))
            },
        };
        book.cover = Some(cover.clone());

        match self.books.save(book).await {
            Ok(book) => {
                // The old file is only garbage once the record points elsewhere.
                if let Some(Cover::Stored(old)) = previous
                    && cover != Cover::Stored(old.clone())
                {
                    self.release(&old).await;
                }
                tracing::info!(book_id = %id, mode = ?self.settings.cover_mode, "Cover stored");
                Ok(book)
            },
            Err(err) => {
                if let Some(replaced) = replaced {
                    self.restore(replaced).await;
                }
                Err(ErrorKind::catalog(err))
            },
        }
    }

    /// The cover of a book, wherever it is kept.
    ///
    /// Fails with [`ErrorKind::NotFound`] if the book doesn't exist or has no
    /// cover.
    pub async fn read_cover(&self, id: BookId) -> Result<CoverImage> {
        let book = self.get(id).await?;
        self.cover_of(&book).await?.ok_or_raise(|| ErrorKind::NotFound(id))
    }

    /// The cover of a book already in hand, or `None` if it has none.
    ///
    /// A stored cover whose file is gone fails with [`ErrorKind::NotFound`].
    pub async fn cover_of(&self, book: &Book) -> Result<Option<CoverImage>> {
        let path = match &book.cover {
            None => return Ok(None),
            Some(Cover::Inline(data)) => return Ok(Some(CoverImage::new(data.clone()))),
            Some(Cover::Stored(path)) => path,
        };
        match self.backend.read(path).await {
            Ok(data) => Ok(Some(CoverImage::new(data))),
            Err(err) if err.is_not_found() => {
                tracing::warn!(book_id = %book.id(), path = %path.display(), "Stored cover is missing");
                Err(err.raise(ErrorKind::NotFound(book.id())))
            },
            Err(err) => Err(ErrorKind::storage(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Settings;
    use crate::tests::{fail_saves, library_with, library_with_db};
    use rstest::rstest;
    use shelf_catalog::NewBook;
    use shelf_storage::backend::{MockBackend, StorageBackend};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG: &[u8] = b"\xFF\xD8\xFF\xE0\0\x10JFIF";

    fn settings(cover_mode: CoverMode, require_cover_image: bool) -> Settings {
        Settings { cover_mode, require_cover_image, ..Settings::default() }
    }

    #[tokio::test]
    async fn test_inline_cover() {
        let backend = Arc::new(MockBackend::default());
        let library = library_with(backend.clone(), settings(CoverMode::Inline, false)).await;
        let book = library.create(NewBook::titled("Dune")).await.unwrap();
        let book = library.ingest_cover(book.id(), PNG).await.unwrap();
        assert_eq!(book.cover, Some(Cover::Inline(PNG.to_vec())));
        assert!(backend.is_empty().await, "inline covers never touch storage");
        let cover = library.read_cover(book.id()).await.unwrap();
        assert_eq!(cover, CoverImage { data: PNG.to_vec(), media_type: "image/png" });
    }

    #[tokio::test]
    async fn test_stored_cover() {
        let backend = Arc::new(MockBackend::default());
        let library = library_with(backend.clone(), settings(CoverMode::Stored, false)).await;
        let book = library.create(NewBook::titled("Dune")).await.unwrap();
        let book = library.ingest_cover(book.id(), JPEG).await.unwrap();
        let expected = PathBuf::from(format!("cover_{}.jpg", book.id()));
        assert_eq!(book.cover, Some(Cover::Stored(expected.clone())));
        assert_eq!(backend.read(&expected).await.unwrap(), JPEG);
        assert_eq!(library.read_cover(book.id()).await.unwrap().media_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_replacing_stored_cover_removes_old_file() {
        let backend = Arc::new(MockBackend::default());
        let library = library_with(backend.clone(), settings(CoverMode::Stored, false)).await;
        let book = library.create(NewBook::titled("Dune")).await.unwrap();
        library.ingest_cover(book.id(), JPEG).await.unwrap();
        let book = library.ingest_cover(book.id(), PNG).await.unwrap();
        assert_eq!(book.cover, Some(Cover::Stored(PathBuf::from(format!("cover_{}.png", book.id())))));
        let files: Vec<_> = backend.list(None).await.unwrap().into_iter().map(|f| f.path).collect();
        assert_eq!(files, vec![PathBuf::from(format!("cover_{}.png", book.id()))]);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_previous_cover() {
        let backend = Arc::new(MockBackend::default());
        let (library, db) = library_with_db(backend.clone(), settings(CoverMode::Stored, false)).await;
        let book = library.create(NewBook::titled("Dune")).await.unwrap();
        library.ingest_cover(book.id(), PNG).await.unwrap();
        fail_saves(&db).await;
        let replacement = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRsecond";
        let err = library.ingest_cover(book.id(), replacement).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Catalog));
        assert_eq!(library.read_cover(book.id()).await.unwrap().data, PNG);
        // A failed save in a new format leaves no stray file either.
        library.ingest_cover(book.id(), JPEG).await.unwrap_err();
        let files: Vec<_> = backend.list(None).await.unwrap().into_iter().map(|f| f.path).collect();
        assert_eq!(files, vec![PathBuf::from(format!("cover_{}.png", book.id()))]);
    }

    #[rstest]
    #[case::lenient(false)]
    #[case::strict(true)]
    #[tokio::test]
    async fn test_unrecognised_bytes(#[case] require_cover_image: bool) {
        let backend = Arc::new(MockBackend::default());
        let library = library_with(backend.clone(), settings(CoverMode::Stored, require_cover_image)).await;
        let book = library.create(NewBook::titled("Dune")).await.unwrap();
        let result = library.ingest_cover(book.id(), b"definitely not an image").await;
        if require_cover_image {
            let err = result.unwrap_err();
            assert!(matches!(&*err, ErrorKind::InvalidFormat(Upload::Cover)));
            assert!(backend.is_empty().await);
            assert!(library.get(book.id()).await.unwrap().cover.is_none());
        } else {
            let book = result.unwrap();
            let path = PathBuf::from(format!("cover_{}.bin", book.id()));
            assert_eq!(book.cover, Some(Cover::Stored(path)));
            assert_eq!(library.read_cover(book.id()).await.unwrap().media_type, UNKNOWN_MEDIA_TYPE);
        }
    }

    #[tokio::test]
    async fn test_empty_cover_is_rejected() {
        let backend = Arc::new(MockBackend::default());
        let library = library_with(backend.clone(), Settings::default()).await;
        let book = library.create(NewBook::titled("Dune")).await.unwrap();
        let err = library.ingest_cover(book.id(), b"").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::EmptyPayload(Upload::Cover)));
        assert_eq!(library.get(book.id()).await.unwrap(), book);
    }

    #[tokio::test]
    async fn test_cover_for_unknown_book() {
        let backend = Arc::new(MockBackend::default());
        let library = library_with(backend.clone(), settings(CoverMode::Stored, false)).await;
        let err = library.ingest_cover(BookId::from(9), PNG).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_read_cover_without_one() {
        let backend = Arc::new(MockBackend::default());
        let library = library_with(backend, Settings::default()).await;
        let book = library.create(NewBook::titled("Dune")).await.unwrap();
        let err = library.read_cover(book.id()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        assert_eq!(library.cover_of(&book).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cover_of_missing_stored_file() {
        let backend = Arc::new(MockBackend::default());
        let library = library_with(backend.clone(), settings(CoverMode::Stored, false)).await;
        let book = library.create(NewBook::titled("Dune")).await.unwrap();
        let book = library.ingest_cover(book.id(), PNG).await.unwrap();
        assert_eq!(library.cover_of(&book).await.unwrap().unwrap().data, PNG);
        backend.delete(Path::new(&format!("cover_{}.png", book.id()))).await.unwrap();
        let err = library.cover_of(&book).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(id) if *id == book.id()));
    }

    #[tokio::test]
    async fn test_switching_to_inline_releases_stored_file() {
        let backend = Arc::new(MockBackend::default());
        let stored = library_with(backend.clone(), settings(CoverMode::Stored, false)).await;
        let book = stored.create(NewBook::titled("Dune")).await.unwrap();
        stored.ingest_cover(book.id(), PNG).await.unwrap();
        // Same catalog, new deployment settings.
        let inline = crate::Library::new(backend.clone(), stored.books.clone(), settings(CoverMode::Inline, false));
        inline.ingest_cover(book.id(), JPEG).await.unwrap();
        assert!(!backend.exists(Path::new(&format!("cover_{}.png", book.id()))).await.unwrap());
    }
}
