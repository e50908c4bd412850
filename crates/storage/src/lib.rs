//! Blob storage for the files that sit next to book records: uploaded e-books
//! and covers that are kept outside the database.
//!
//! Everything goes through [`StorageBackend`], so the library never touches
//! `std::fs` directly and tests can swap in the in-memory backend (`mock`
//! feature).

pub mod backend;
pub mod error;
mod models;
mod path;

use std::sync::Arc;

pub use self::backend::StorageBackend;
pub use self::models::FileInfo;
pub use self::path::validate as validate_path;

/// Shared handle on whichever backend the deployment uses.
pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
