//! Where uploaded files physically live.
//!
//! - [`LocalBackend`]: a directory on disk (the configured upload directory).
//! - [`ReadOnlyBackend`]: wraps another backend and swallows mutations, for
//!   dry runs.
//! - `MockBackend` (feature `mock`): in memory, for tests.

mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod ro;

pub use self::local::LocalBackend;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockBackend;
pub use self::ro::ReadOnlyBackend;
use crate::FileInfo;
use crate::error::Result;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;

pub(crate) type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// A flat-ish namespace of files addressed by paths relative to a root.
///
/// Implementations validate every path with
/// [`validate_path`](crate::validate_path), so a path can never reach
/// outside the root no matter where it came from.
///
/// ```
/// use std::path::Path;
/// use shelf_storage::{backend::StorageBackend, error::Result};
///
/// async fn uploaded_size(backend: &dyn StorageBackend, id: i64) -> Result<Option<usize>> {
///     let path = format!("book_{id}.epub");
///     if !backend.exists(Path::new(&path)).await? {
///         return Ok(None);
///     }
///     Ok(Some(backend.read(Path::new(&path)).await?.len()))
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Shown in logs.
    fn name(&self) -> &str;

    /// Every file under `prefix` (or the whole root), collected.
    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<FileInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Every file under `prefix` (or the whole root), in no particular
    /// order. A prefix with nothing under it yields an empty stream.
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a>;

    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Size and modification time of one file, or
    /// [`NotFound`](crate::error::ErrorKind::NotFound).
    async fn info(&self, path: &Path) -> Result<FileInfo>;

    /// The whole content of a file, or
    /// [`NotFound`](crate::error::ErrorKind::NotFound).
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Create or replace a file, creating parent directories as needed.
    ///
    /// Once this returns `Ok` the content is durable, and no reader ever
    /// observed it half-written.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Remove a file, or fail with
    /// [`NotFound`](crate::error::ErrorKind::NotFound) if there is none.
    async fn delete(&self, path: &Path) -> Result<()>;
}
