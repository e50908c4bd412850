//! Uploads kept in a directory on the local filesystem.

use crate::backend::FileInfoStream;
use crate::error::{ErrorKind, Result};
use crate::{FileInfo, StorageBackend, validate_path};
use async_stream::try_stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::ffi::OsString;
use std::io::{Error as IoError, ErrorKind as IoErrorKind};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Scratch files are named `.<target>.partial` until they are complete.
const SCRATCH_PREFIX: &str = ".";
const SCRATCH_SUFFIX: &str = ".partial";

/// Storage in a directory (the configured upload directory).
///
/// Every write lands in a hidden scratch file next to its target, is synced,
/// then renamed over the target; readers see either the old content or all
/// of the new. Scratch files left behind by a crash are never listed.
///
/// ```no_run
/// use shelf_storage::backend::{LocalBackend, StorageBackend};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let uploads = LocalBackend::new("uploads", "/var/lib/shelf/books")?;
/// uploads.write("book_1.epub".as_ref(), b"PK").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}

impl LocalBackend {
    /// Use `root` for storage, creating it if needed.
    ///
    /// Returns [`InvalidPath`](ErrorKind::InvalidPath) unless `root` is
    /// absolute and either a directory or absent.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() || (root.exists() && !root.is_dir()) {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        // Runs once at start-up, before there is anything to block.
        std::fs::create_dir_all(&root).map_err(|err| io_error(err, &root))?;
        Ok(Self { name: name.into(), root })
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        Ok(self.root.join(validate_path(path)?))
    }

    fn scratch_for(target: &Path) -> PathBuf {
        let mut name = OsString::from(SCRATCH_PREFIX);
        name.push(target.file_name().unwrap_or_default());
        name.push(SCRATCH_SUFFIX);
        target.with_file_name(name)
    }

    fn is_scratch(name: &Path) -> bool {
        name.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(SCRATCH_PREFIX) && name.ends_with(SCRATCH_SUFFIX))
    }
}

/// Keep "not found" and "permission denied" distinguishable for callers;
/// everything else is just I/O.
fn io_error(err: IoError, path: &Path) -> ErrorKind {
    match err.kind() {
        IoErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
        IoErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
        _ => ErrorKind::Io(err),
    }
}

/// Write `data` to `scratch` and make sure it reached the disk.
async fn write_synced(scratch: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(scratch).await?;
    file.write_all(data).await?;
    file.sync_all().await
}

/// Flush the entries of `dir`, so that a rename into it survives a crash.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir).await?.sync_all().await
}

/// Directories can't be opened as files here; renames are as durable as
/// the platform makes them.
#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        Box::pin(try_stream! {
            let prefix = prefix.map(validate_path).transpose()?;
            let mut pending = vec![self.root.clone()];
            while let Some(dir) = pending.pop() {
                let mut entries = match fs::read_dir(&dir).await {
                    Ok(entries) => entries,
                    // Removed while walking; nothing left to list.
                    Err(err) if err.kind() == IoErrorKind::NotFound => continue,
                    Err(err) => Err(io_error(err, &dir))?,
                };
                while let Some(entry) = entries.next_entry().await.map_err(|err| io_error(err, &dir))? {
                    let absolute = entry.path();
                    let metadata = entry.metadata().await.map_err(|err| io_error(err, &absolute))?;
                    if metadata.is_dir() {
                        pending.push(absolute);
                        continue;
                    }
                    let relative = absolute
                        .strip_prefix(&self.root)
                        .or_raise(|| ErrorKind::Inconsistent(format!("{} is outside the root", absolute.display())))?
                        .to_path_buf();
                    let wanted = prefix.as_ref().is_none_or(|prefix| relative.starts_with(prefix));
                    if !metadata.is_file() || !wanted || Self::is_scratch(&relative) {
                        continue;
                    }
                    let modified = metadata.modified().map_err(ErrorKind::Io)?;
                    yield FileInfo::new(relative, metadata.len(), modified.into());
                }
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let target = self.resolve(path)?;
        Ok(fs::try_exists(&target).await.map_err(ErrorKind::Io)?)
    }

    async fn info(&self, path: &Path) -> Result<FileInfo> {
        let relative = validate_path(path)?;
        let target = self.root.join(&relative);
        let metadata = fs::metadata(&target).await.map_err(|err| io_error(err, path))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::NotFound(relative));
        }
        let modified = metadata.modified().map_err(ErrorKind::Io)?;
        Ok(FileInfo::new(relative, metadata.len(), modified.into()))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let target = self.resolve(path)?;
        Ok(fs::read(&target).await.map_err(|err| io_error(err, path))?)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|err| io_error(err, path))?;
        }
        let scratch = Self::scratch_for(&target);
        if let Err(err) = write_synced(&scratch, data).await {
            _ = fs::remove_file(&scratch).await;
            exn::bail!(io_error(err, path));
        }
        fs::rename(&scratch, &target).await.map_err(|err| io_error(err, path))?;
        // The target's data is synced; its directory entry isn't until this.
        if let Some(parent) = target.parent() {
            sync_dir(parent).await.map_err(|err| io_error(err, path))?;
        }
        tracing::trace!(backend = %self.name, path = %path.display(), bytes = data.len(), "File written");
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let target = self.resolve(path)?;
        Ok(fs::remove_file(&target).await.map_err(|err| io_error(err, path))?)
    }
}
