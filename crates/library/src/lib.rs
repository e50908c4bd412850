//! The rules of the book lifecycle.
//!
//! A [`Library`] ties the [catalog](shelf_catalog) of book records to the
//! [storage backend](shelf_storage) holding uploads, and is the only thing
//! that should mutate either:
//!
//! - [`update`]: merge or replace edits of a book's metadata,
//! - [`ingest`]: accepting a book's e-book file and cover,
//! - [`sweep`]: releasing uploads that no record refers to.
//!
//! Whatever fails, it fails before anything is changed or leaves the record
//! consistent with what's in storage: a book is never marked as uploaded
//! without its file having been durably written first.

pub mod error;
mod image;
pub mod ingest;
mod library;
mod locks;
pub mod sweep;
pub mod update;

pub use crate::image::{ImageFormat, UNKNOWN_MEDIA_TYPE};
pub use crate::ingest::{CoverImage, CoverMode};
pub use crate::library::{Library, Settings};
pub use crate::sweep::{SweepEvent, SweepOptions};
pub use crate::update::{BookChanges, UpdateMode};
