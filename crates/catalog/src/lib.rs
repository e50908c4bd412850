//! SQLite store for book records.
//!
//! This crate owns the `books` table and everything about persisting a
//! [`Book`]: id assignment, the title uniqueness constraint, and the rule that
//! a book's uploaded flag can never be cleared. Uploaded files themselves live
//! in `shelf-storage`; a row only remembers whether one exists (and, for
//! stored covers, where).
//!
//! # Architecture
//! - [`Database`] manages the connection pool and runs the embedded
//!   migrations.
//! - [`Repository`] is the record store: `create`, `get`, `list`, `save` and
//!   `delete`. Constraint failures are translated into [`ErrorKind`](error::ErrorKind)
//!   here and never leave the crate as raw `sqlx` errors.

mod book;
mod db;
pub mod error;
mod models;
mod repo;

pub use crate::book::{Book, BookId, Cover, NewBook};
pub use crate::db::Database;
pub use crate::repo::Repository;
