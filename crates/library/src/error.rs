//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! The first group of variants are outcomes a client caused and can fix
//! (unknown id, duplicate title, bad upload). `Catalog` and `Storage` mean
//! something went wrong underneath; the child frame in the error tree says
//! what.

use derive_more::{Display, Error};
use shelf_catalog::BookId;
use shelf_catalog::error::{Error as CatalogError, ErrorKind as CatalogErrorKind};
use shelf_storage::error::Error as StorageError;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which kind of upload an ingestion error refers to.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Upload {
    #[display("book file")]
    BookFile,
    #[display("cover")]
    Cover,
}

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No book has this id.
    #[display("book not found: {_0}")]
    NotFound(#[error(not(source))] BookId),
    /// Another book already uses this title.
    #[display("title already taken: {_0:?}")]
    TitleTaken(#[error(not(source))] String),
    /// The uploaded content was zero-length.
    #[display("{_0} is empty")]
    EmptyPayload(#[error(not(source))] Upload),
    /// The upload isn't the kind of file it claims to be.
    #[display("{_0} has an unsupported format")]
    InvalidFormat(#[error(not(source))] Upload),
    /// A full replace must carry a title; books can't exist without one.
    #[display("replacing a book requires a title")]
    MissingTitle,
    /// The [catalog](shelf_catalog::Repository) failed.
    #[display("catalog error")]
    Catalog,
    /// A [storage backend](shelf_storage::StorageBackend) operation failed.
    #[display("storage error")]
    Storage,
}

impl ErrorKind {
    /// Raise a catalog error into the library taxonomy, keeping the catalog
    /// frame as a child in the error tree.
    ///
    /// Title collisions and vanished rows are client-visible outcomes and
    /// keep their meaning; everything else becomes [`ErrorKind::Catalog`].
    #[track_caller]
    pub fn catalog(err: CatalogError) -> Error {
        let kind = match &*err {
            CatalogErrorKind::TitleTaken(title) => Self::TitleTaken(title.clone()),
            CatalogErrorKind::BookNotFound(id) => Self::NotFound(*id),
            _ => Self::Catalog,
        };
        err.raise(kind)
    }

    #[track_caller]
    pub fn storage(err: StorageError) -> Error {
        err.raise(Self::Storage)
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Catalog | Self::Storage)
    }

    /// Returns `true` if the client caused the failure and can correct it.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Catalog | Self::Storage)
    }
}
