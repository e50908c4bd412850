//! Path validation.
//!
//! Every path handed to a backend is relative to the upload root. Book and
//! cover names are generated by the library, but the backends don't trust
//! that and validate anyway.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a storage path so that it can never escape the storage root.
///
/// `..` components are resolved lexically; a path that would climb above the
/// root, contains a null byte, carries a Windows prefix or resolves to
/// nothing is rejected with [`InvalidPath`](crate::error::ErrorKind::InvalidPath).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use shelf_storage::validate_path;
///
/// assert!(validate_path("book_42.epub").is_ok());
/// assert!(validate_path("covers/../cover_42.png").is_ok());
/// assert!(validate_path("../book_42.epub").is_err());
/// assert!(validate_path("book\0.epub").is_err());
/// assert_eq!(validate_path("./covers//cover_7.jpg/").unwrap(), Path::new("covers/cover_7.jpg"));
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(s) => {
                // Null bytes survive Path::components() on Unix but truncate in syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(original.to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(original.to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}
