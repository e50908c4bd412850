//! The book resource, independent of any transport.
//!
//! [`BookResource`] calls into the [`Library`] and turns every result into an
//! [`Outcome`]: what a client should be told, with nothing of the library's
//! error tree leaking out. Unexpected failures are logged here, in full, and
//! reported to the client only as [`Outcome::Unexpected`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use shelf_catalog::{Book, BookId, NewBook};
use shelf_library::error::{Error, ErrorKind, Upload};
use shelf_library::{BookChanges, CoverImage, Library, UpdateMode};
use std::sync::Arc;
use time::OffsetDateTime;

pub const FILE_UPLOADED: &str = "File uploaded successfully";
pub const COVER_UPLOADED: &str = "Cover uploaded successfully";
pub const FILE_EMPTY: &str = "File is empty";
pub const FILE_NOT_EPUB: &str = "File must be an epub";
pub const COVER_EMPTY: &str = "Cover file is empty";
pub const COVER_NOT_IMAGE: &str = "Cover must be a PNG, JPEG, GIF or WebP image";
pub const TITLE_TAKEN: &str = "Book with this title already exists.";
pub const TITLE_REQUIRED: &str = "Book title is required.";
pub const UNEXPECTED: &str = "An unexpected error occurred.";
pub const STATUS_OK: &str = "OK";

/// What happened, in the terms a client cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// Success with a value.
    Ok(T),
    /// Success with nothing to return but a message.
    Acknowledged(&'static str),
    /// Success with nothing to return.
    NoContent,
    NotFound,
    /// The request can't be carried out as sent; the reason says why.
    Rejected(&'static str),
    /// Something failed that the client can't do anything about.
    Unexpected,
}

impl<T> Outcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Ok(value) => Outcome::Ok(f(value)),
            Self::Acknowledged(message) => Outcome::Acknowledged(message),
            Self::NoContent => Outcome::NoContent,
            Self::NotFound => Outcome::NotFound,
            Self::Rejected(reason) => Outcome::Rejected(reason),
            Self::Unexpected => Outcome::Unexpected,
        }
    }

    fn from_error(err: Error) -> Self {
        match &*err {
            ErrorKind::NotFound(_) => Self::NotFound,
            ErrorKind::TitleTaken(_) => Self::Rejected(TITLE_TAKEN),
            ErrorKind::MissingTitle => Self::Rejected(TITLE_REQUIRED),
            ErrorKind::EmptyPayload(Upload::BookFile) => Self::Rejected(FILE_EMPTY),
            ErrorKind::EmptyPayload(Upload::Cover) => Self::Rejected(COVER_EMPTY),
            ErrorKind::InvalidFormat(Upload::BookFile) => Self::Rejected(FILE_NOT_EPUB),
            ErrorKind::InvalidFormat(Upload::Cover) => Self::Rejected(COVER_NOT_IMAGE),
            ErrorKind::Catalog | ErrorKind::Storage => {
                tracing::error!(error = ?err, "Request failed");
                Self::Unexpected
            },
        }
    }

    fn from_result(result: Result<T, Error>) -> Self {
        result.map_or_else(Self::from_error, Self::Ok)
    }
}

/// A book as clients see it.
///
/// Covers are served separately, so normally only their presence is
/// reported. A resource built with
/// [`embed_covers`](BookResource::embed_covers) also inlines them, base64
/// encoded, as `coverBlob`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookView {
    pub id: i64,
    pub title: String,
    pub author: Option<String>,
    pub progress: Option<f64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub progress_synched_at: Option<OffsetDateTime>,
    pub favorite: Option<bool>,
    pub is_file_uploaded: bool,
    pub has_cover: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_blob: Option<String>,
}
impl From<Book> for BookView {
    fn from(book: Book) -> Self {
        Self {
            id: book.id().get(),
            progress: book.progress(),
            progress_synched_at: book.progress_synched_at(),
            is_file_uploaded: book.is_file_uploaded(),
            has_cover: book.cover.is_some(),
            title: book.title,
            author: book.author,
            favorite: book.favorite,
            cover_blob: None,
        }
    }
}

/// The client-editable fields of a book, for creates and updates alike.
///
/// Any other field in the request (`id`, `isFileUploaded`, ...) is ignored:
/// those are never set by clients.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookInput {
    pub title: Option<String>,
    pub author: Option<String>,
    pub progress: Option<f64>,
    pub favorite: Option<bool>,
}
impl From<BookInput> for BookChanges {
    fn from(input: BookInput) -> Self {
        Self { title: input.title, author: input.author, progress: input.progress, favorite: input.favorite }
    }
}

/// Create, read, update, delete and upload operations over books.
///
/// Cloning is cheap: clones share the same library.
#[derive(Clone)]
pub struct BookResource {
    library: Arc<Library>,
    embed_covers: bool,
}

impl BookResource {
    pub fn new(library: Arc<Library>) -> Self {
        Self { library, embed_covers: false }
    }

    /// Inline each book's cover in the views returned.
    pub fn embed_covers(mut self, embed: bool) -> Self {
        self.embed_covers = embed;
        self
    }

    pub async fn list(&self) -> Outcome<Vec<BookView>> {
        let books = match self.library.list().await {
            Ok(books) => books,
            Err(err) => return Outcome::from_error(err),
        };
        let mut views = Vec::with_capacity(books.len());
        for book in books {
            views.push(self.view(book).await);
        }
        Outcome::Ok(views)
    }

    pub async fn get(&self, id: BookId) -> Outcome<BookView> {
        self.viewed(self.library.get(id).await).await
    }

    pub async fn create(&self, input: BookInput) -> Outcome<BookView> {
        let Some(title) = input.title else {
            return Outcome::Rejected(TITLE_REQUIRED);
        };
        let draft = NewBook { title, author: input.author, progress: input.progress, favorite: input.favorite };
        self.viewed(self.library.create(draft).await).await
    }

    /// Update with the deployment's configured [`UpdateMode`].
    pub async fn update(&self, id: BookId, input: BookInput) -> Outcome<BookView> {
        self.viewed(self.library.update(id, input.into()).await).await
    }

    /// Update overwriting every field.
    pub async fn replace(&self, id: BookId, input: BookInput) -> Outcome<BookView> {
        self.viewed(self.library.update_with(id, input.into(), UpdateMode::Replace).await).await
    }

    pub async fn delete(&self, id: BookId) -> Outcome<()> {
        match self.library.delete(id).await {
            Ok(true) => Outcome::NoContent,
            Ok(false) => Outcome::NotFound,
            Err(err) => Outcome::from_error(err),
        }
    }

    /// Store the e-book file of a book. A missing file name counts as a
    /// wrong extension.
    pub async fn upload_file(&self, id: BookId, filename: Option<&str>, content: &[u8]) -> Outcome<()> {
        match self.library.ingest_book_file(id, filename.unwrap_or_default(), content).await {
            Ok(_) => Outcome::Acknowledged(FILE_UPLOADED),
            Err(err) => Outcome::from_error(err),
        }
    }

    pub async fn upload_cover(&self, id: BookId, content: &[u8]) -> Outcome<()> {
        match self.library.ingest_cover(id, content).await {
            Ok(_) => Outcome::Acknowledged(COVER_UPLOADED),
            Err(err) => Outcome::from_error(err),
        }
    }

    pub async fn download_file(&self, id: BookId) -> Outcome<Vec<u8>> {
        Outcome::from_result(self.library.read_book_file(id).await)
    }

    pub async fn cover(&self, id: BookId) -> Outcome<CoverImage> {
        Outcome::from_result(self.library.read_cover(id).await)
    }

    /// Liveness, nothing more: the library isn't consulted.
    pub fn status(&self) -> &'static str {
        STATUS_OK
    }

    async fn viewed(&self, result: Result<Book, Error>) -> Outcome<BookView> {
        match result {
            Ok(book) => Outcome::Ok(self.view(book).await),
            Err(err) => Outcome::from_error(err),
        }
    }

    async fn view(&self, book: Book) -> BookView {
        let cover_blob = if self.embed_covers { self.cover_blob(&book).await } else { None };
        BookView { cover_blob, ..BookView::from(book) }
    }

    /// A cover that can't be read leaves the view without one; the book
    /// itself is still served.
    async fn cover_blob(&self, book: &Book) -> Option<String> {
        match self.library.cover_of(book).await {
            Ok(cover) => cover.map(|cover| BASE64.encode(cover.data)),
            Err(err) => {
                tracing::warn!(book_id = %book.id(), error = ?err, "Could not embed cover");
                None
            },
        }
    }
}
