//! In-memory storage for tests.

use super::FileInfoStream;
use crate::error::{ErrorKind, Result};
use crate::{FileInfo, StorageBackend, validate_path};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

struct StoredFile {
    data: Vec<u8>,
    modified: OffsetDateTime,
}

/// Keeps files in a map, and can be told to fail writes so that callers'
/// error paths can be exercised.
///
/// Listings come back sorted by path.
pub struct MockBackend {
    files: RwLock<BTreeMap<PathBuf, StoredFile>>,
    fail_writes: AtomicBool,
}

impl MockBackend {
    /// A backend already holding `files`, all modified just now.
    ///
    /// Panics on a path that doesn't validate: a broken fixture should fail
    /// the test rather than quietly test something else.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let modified = OffsetDateTime::now_utc();
        let files = files
            .into_iter()
            .map(|(path, data)| {
                let path = path.into();
                match validate_path(&path) {
                    Ok(path) => (path, StoredFile { data: data.into(), modified }),
                    Err(_) => panic!("MockBackend fixture has an invalid path: {}", path.display()),
                }
            })
            .collect();
        Self { files: RwLock::new(files), fail_writes: AtomicBool::new(false) }
    }

    /// While `true`, every [`write`](StorageBackend::write) fails with an I/O
    /// error and stores nothing.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Pretend a file was last written `age` ago.
    ///
    /// Panics if there is no such file.
    pub async fn backdate(&self, path: impl AsRef<Path>, age: Duration) {
        let path = path.as_ref();
        let mut files = self.files.write().await;
        let Some(file) = files.get_mut(path) else {
            panic!("MockBackend has no file {}", path.display());
        };
        file.modified = OffsetDateTime::now_utc() - age;
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::with_files(Vec::<(PathBuf, Vec<u8>)>::new())
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        Box::pin(async_stream::try_stream! {
            let prefix = prefix.map(validate_path).transpose()?;
            // Snapshot, so the lock isn't held while the consumer works.
            let listed: Vec<FileInfo> = self
                .files
                .read()
                .await
                .iter()
                .filter(|(path, _)| prefix.as_ref().is_none_or(|prefix| path.starts_with(prefix)))
                .map(|(path, file)| FileInfo::new(path.clone(), file.data.len() as u64, file.modified))
                .collect();
            for info in listed {
                yield info;
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.files.read().await.contains_key(&path))
    }

    async fn info(&self, path: &Path) -> Result<FileInfo> {
        let path = validate_path(path)?;
        match self.files.read().await.get(&path) {
            Some(file) => Ok(FileInfo::new(path, file.data.len() as u64, file.modified)),
            None => exn::bail!(ErrorKind::NotFound(path)),
        }
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        match self.files.read().await.get(&path) {
            Some(file) => Ok(file.data.clone()),
            None => exn::bail!(ErrorKind::NotFound(path)),
        }
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Io(std::io::Error::other("MockBackend is failing writes")));
        }
        let file = StoredFile { data: data.to_vec(), modified: OffsetDateTime::now_utc() };
        self.files.write().await.insert(path, file);
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        match self.files.write().await.remove(&path) {
            Some(_) => Ok(()),
            None => exn::bail!(ErrorKind::NotFound(path)),
        }
    }
}
