//! Removal of uploaded files that no book refers to any more.
//!
//! Deleting a book releases its files, but a crash between removing the
//! record and removing the files (or a failed cleanup after an aborted
//! upload) can leave files behind. [`Library::sweep`] walks the upload root
//! and releases every recognised file that isn't referenced by its book:
//!
//! - `book_<id>.epub` when the book is gone or isn't marked as uploaded,
//! - `cover_<id>.<ext>` when the book is gone or its cover is kept elsewhere.
//!
//! Files that ingestion didn't name are never touched.

use crate::Library;
use crate::error::{ErrorKind, Result};
use crate::ingest::{StoredKind, book_file_path};
use async_stream::stream;
use futures::{Stream, TryStreamExt};
use shelf_catalog::{Book, BookId, Cover};
use shelf_storage::BackendHandle;
use shelf_storage::backend::ReadOnlyBackend;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

/// Files younger than this may belong to an upload still in progress.
pub const DEFAULT_MIN_AGE: Duration = Duration::minutes(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOptions {
    /// Report what would be removed without removing anything.
    pub dry_run: bool,
    /// Leave files modified more recently than this alone.
    pub min_age: Duration,
}
impl Default for SweepOptions {
    fn default() -> Self {
        Self { dry_run: false, min_age: DEFAULT_MIN_AGE }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepEvent {
    /// The catalog has been read; `books` records are known.
    Started { books: usize },
    /// An orphaned file was released (or would have been, in a dry run).
    Released { path: PathBuf, book_id: BookId, size: u64 },
    /// An orphan candidate was too recent to remove.
    SkippedRecent { path: PathBuf },
    Complete { released: u64, bytes: u64 },
}

/// What a book record refers to in storage.
struct References {
    book_file: Option<PathBuf>,
    cover: Option<PathBuf>,
}

impl References {
    fn of(book: &Book) -> Self {
        Self {
            book_file: book.is_file_uploaded().then(|| book_file_path(book.id())),
            cover: match &book.cover {
                Some(Cover::Stored(path)) => Some(path.clone()),
                _ => None,
            },
        }
    }
}

/// Outcome of re-checking one candidate under its book's lock.
enum Verdict {
    Released { size: u64 },
    Recent,
    Kept,
}

impl Library {
    /// Stream the progress of an orphan sweep.
    ///
    /// The catalog snapshot taken at the start only nominates candidates.
    /// Each one is checked again against its book while holding that book's
    /// lock, so a file uploaded during the sweep is never removed.
    ///
    /// The stream ends after the first error.
    pub fn sweep(&self, options: SweepOptions) -> impl Stream<Item = Result<SweepEvent>> + '_ {
        let backend: BackendHandle = if options.dry_run {
            Arc::new(ReadOnlyBackend::new(self.backend.clone()))
        } else {
            self.backend.clone()
        };
        stream! {
            let references = match self.references().await {
                Ok(references) => references,
                Err(err) => {
                    yield Err(err);
                    return;
                },
            };
            yield Ok(SweepEvent::Started { books: references.len() });
            let cutoff = OffsetDateTime::now_utc() - options.min_age;
            let (mut released, mut bytes) = (0u64, 0u64);
            for await file in backend.list_stream(None) {
                let file = match file {
                    Ok(file) => file,
                    Err(err) => {
                        yield Err(ErrorKind::storage(err));
                        return;
                    },
                };
                let Some(kind) = StoredKind::recognise(&file.path) else {
                    continue;
                };
                if !is_orphan(kind, &file.path, references.get(&kind.book_id())) {
                    continue;
                }
                let verdict = if file.modified > cutoff {
                    Ok(Verdict::Recent)
                } else {
                    self.release_orphan(&backend, kind, &file.path, cutoff).await
                };
                match verdict {
                    Ok(Verdict::Released { size }) => {
                        tracing::info!(path = %file.path.display(), book_id = %kind.book_id(), dry_run = options.dry_run, "Released orphaned file");
                        released += 1;
                        bytes += size;
                        yield Ok(SweepEvent::Released { path: file.path, book_id: kind.book_id(), size });
                    },
                    Ok(Verdict::Recent) => {
                        tracing::debug!(path = %file.path.display(), "Skipping recently modified orphan");
                        yield Ok(SweepEvent::SkippedRecent { path: file.path });
                    },
                    Ok(Verdict::Kept) => {},
                    Err(err) => {
                        yield Err(err);
                        return;
                    },
                }
            }
            yield Ok(SweepEvent::Complete { released, bytes });
        }
    }

    async fn references(&self) -> Result<HashMap<BookId, References>> {
        self.books
            .list_stream()
            .map_ok(|book| (book.id(), References::of(&book)))
            .try_collect()
            .await
            .map_err(ErrorKind::catalog)
    }

    /// Remove `path` if its book, read again under the book's lock, still
    /// doesn't refer to it and it hasn't been written since `cutoff`.
    async fn release_orphan(
        &self,
        backend: &BackendHandle,
        kind: StoredKind,
        path: &Path,
        cutoff: OffsetDateTime,
    ) -> Result<Verdict> {
        let _guard = self.locks.lock(&kind.book_id()).await;
        let book = self.books.get(kind.book_id()).await.map_err(ErrorKind::catalog)?;
        if !is_orphan(kind, path, book.as_ref().map(References::of).as_ref()) {
            tracing::debug!(path = %path.display(), "Orphan candidate was claimed during the sweep");
            return Ok(Verdict::Kept);
        }
        let info = match backend.info(path).await {
            Ok(info) => info,
            Err(err) if err.is_not_found() => return Ok(Verdict::Kept),
            Err(err) => return Err(ErrorKind::storage(err)),
        };
        if info.modified > cutoff {
            return Ok(Verdict::Recent);
        }
        match backend.delete(path).await {
            Ok(()) => Ok(Verdict::Released { size: info.size }),
            Err(err) if err.is_not_found() => Ok(Verdict::Kept),
            Err(err) => Err(ErrorKind::storage(err)),
        }
    }
}

/// Whether nothing in `references` (the record of `kind`'s book, if any)
/// points at `path`.
fn is_orphan(kind: StoredKind, path: &Path, references: Option<&References>) -> bool {
    let referenced = references.and_then(|refs| match kind {
        StoredKind::BookFile(_) => refs.book_file.as_ref(),
        StoredKind::Cover(_) => refs.cover.as_ref(),
    });
    referenced.is_none_or(|referenced| referenced != path)
}
