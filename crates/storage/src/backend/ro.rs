//! A backend that can be read but never changed.

use async_trait::async_trait;
use std::path::Path;

use crate::{BackendHandle, FileInfo, StorageBackend, backend::FileInfoStream, error::Result};

/// Passes reads and listings through to another backend, and pretends
/// writes and deletes succeeded while only logging them.
///
/// Lets destructive maintenance (the orphan sweep) run as a dry run without
/// a separate code path.
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StorageBackend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        self.inner.list_stream(prefix)
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn info(&self, path: &Path) -> Result<FileInfo> {
        self.inner.info(path).await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        tracing::info!(backend = self.name(), path = %path.display(), bytes = data.len(), "Would write file");
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        tracing::info!(backend = self.name(), path = %path.display(), "Would delete file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_mutations_never_reach_inner_backend() {
        let inner = Arc::new(MockBackend::with_files([("book_1.epub", b"PK".to_vec())]));
        let backend = ReadOnlyBackend::new(inner.clone());
        backend.write(Path::new("book_2.epub"), b"new").await.unwrap();
        backend.delete(Path::new("book_1.epub")).await.unwrap();
        assert_eq!(inner.len().await, 1);
        assert_eq!(backend.read(Path::new("book_1.epub")).await.unwrap(), b"PK");
        assert!(!backend.exists(Path::new("book_2.epub")).await.unwrap());
        assert_eq!(backend.list(None).await.unwrap().len(), 1);
    }
}
