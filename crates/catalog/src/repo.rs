//! Repository for book records.

use crate::Database;
use crate::error::{Error, ErrorKind, Result};
use crate::models::BookRow;
use crate::{Book, BookId, NewBook};
use exn::ResultExt;
use futures::{Stream, StreamExt, TryStreamExt};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::instrument;

/// Translate a failed INSERT/UPDATE: the UNIQUE constraint on `title` is the
/// only one a well-formed record can trip.
fn write_error(err: sqlx::Error, title: &str) -> Error {
    let kind = match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => ErrorKind::TitleTaken(title.to_string()),
        _ => ErrorKind::Database,
    };
    exn::Exn::from(err).raise(kind)
}

/// The book record store.
///
/// Owns persistence timing: callers get [`Book`] values out, edit them, and
/// hand them back to [`save`](Self::save). Title uniqueness is enforced by
/// the database on every write, so two writers racing to the same title
/// can't both win.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    // =========================================================================
    // Insert
    // =========================================================================

    /// Insert a new book and return it with its assigned id.
    ///
    /// New books have no file and no cover. If progress is supplied, its sync
    /// time is stamped now.
    ///
    /// Returns [`ErrorKind::TitleTaken`] if another book has the same title.
    #[instrument(skip_all, fields(title = %draft.title))]
    pub async fn create(&self, draft: NewBook) -> Result<Book> {
        let synched_at = draft.progress.map(|_| OffsetDateTime::now_utc().unix_timestamp());
        let row: BookRow = sqlx::query_as(include_str!("../queries/insert_book.sql"))
            .bind(&draft.title)
            .bind(&draft.author)
            .bind(draft.progress)
            .bind(synched_at)
            .bind(draft.favorite)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| write_error(e, &draft.title))?;
        let book = Book::try_from(row)?;
        tracing::debug!(book_id = %book.id(), "Book created");
        Ok(book)
    }

    // =========================================================================
    // Get/List
    // =========================================================================

    pub async fn get(&self, id: BookId) -> Result<Option<Book>> {
        let row: Option<BookRow> = sqlx::query_as(include_str!("../queries/get_book.sql"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Book::try_from).transpose()
    }

    /// Stream every book, in storage order.
    pub fn list_stream(&self) -> impl Stream<Item = Result<Book>> + Send + '_ {
        sqlx::query_as::<_, BookRow>(include_str!("../queries/list_books.sql"))
            .fetch(&self.pool)
            .map(|row| row.or_raise(|| ErrorKind::Database).and_then(Book::try_from))
    }

    /// Every book, in storage order. The order carries no meaning.
    pub async fn list(&self) -> Result<Vec<Book>> {
        self.list_stream().try_collect().await
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Persist every field of `book` and return the stored result.
    ///
    /// The stored uploaded flag is OR-ed with the incoming one, so a stale
    /// copy can never clear it.
    ///
    /// Returns [`ErrorKind::TitleTaken`] if another book has the same title
    /// (nothing is written), or [`ErrorKind::BookNotFound`] if the row is gone.
    #[instrument(skip_all, fields(book_id = %book.id()))]
    pub async fn save(&self, book: Book) -> Result<Book> {
        let row = BookRow::try_from(&book)?;
        let saved: Option<BookRow> = sqlx::query_as(include_str!("../queries/save_book.sql"))
            .bind(&row.title)
            .bind(&row.author)
            .bind(row.progress)
            .bind(row.progress_synched_at)
            .bind(row.favorite)
            .bind(&row.cover_blob)
            .bind(&row.cover_path)
            .bind(row.is_file_uploaded)
            .bind(row.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| write_error(e, &row.title))?;
        match saved {
            Some(row) => Book::try_from(row),
            None => exn::bail!(ErrorKind::BookNotFound(book.id())),
        }
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Delete a book record.
    ///
    /// Returns `false` if there was no such book; that is not an error.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: BookId) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/delete_book.sql"))
            .bind(id.get())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cover;
    use rstest::rstest;
    use std::collections::HashSet;
    use std::path::PathBuf;

    async fn repo() -> Repository {
        let db = Database::connect_in_memory().await.unwrap();
        Repository::from(&db)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = repo().await;
        let mut ids = HashSet::new();
        for title in ["Dune", "Emma", "Ulysses"] {
            let book = repo.create(NewBook::titled(title)).await.unwrap();
            assert!(ids.insert(book.id()), "ids must be unique");
        }
        for id in &ids {
            let book = repo.get(*id).await.unwrap().unwrap();
            assert_eq!(book.id(), *id);
            assert!(!book.is_file_uploaded());
            assert!(book.cover.is_none());
        }
        let titles: HashSet<_> = repo.list().await.unwrap().into_iter().map(|b| b.title).collect();
        assert_eq!(titles, HashSet::from(["Dune".to_string(), "Emma".to_string(), "Ulysses".to_string()]));
    }

    #[tokio::test]
    async fn test_create_stamps_progress_sync_time() {
        let repo = repo().await;
        let before = OffsetDateTime::now_utc().unix_timestamp();
        let draft = NewBook { progress: Some(0.4), ..NewBook::titled("Middlemarch") };
        let book = repo.create(draft).await.unwrap();
        assert_eq!(book.progress(), Some(0.4));
        assert!(book.progress_synched_at().unwrap().unix_timestamp() >= before);
        let book = repo.create(NewBook::titled("Persuasion")).await.unwrap();
        assert!(book.progress().is_none());
        assert!(book.progress_synched_at().is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate_title() {
        let repo = repo().await;
        let first = repo.create(NewBook { author: Some("A".into()), ..NewBook::titled("Dune") }).await.unwrap();
        let err = repo.create(NewBook::titled("Dune")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::TitleTaken(title) if title == "Dune"));
        let books = repo.list().await.unwrap();
        assert_eq!(books, vec![first]);
    }

    #[tokio::test]
    async fn test_concurrent_creates_with_same_title() {
        let repo = repo().await;
        let (a, b) = tokio::join!(repo.create(NewBook::titled("Solaris")), repo.create(NewBook::titled("Solaris")));
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1, "exactly one create must win");
        let loser = a.err().or(b.err()).unwrap();
        assert!(matches!(&*loser, ErrorKind::TitleTaken(_)));
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_to_taken_title_changes_nothing() {
        let repo = repo().await;
        repo.create(NewBook::titled("Dune")).await.unwrap();
        let emma = repo.create(NewBook::titled("Emma")).await.unwrap();
        let mut edited = emma.clone();
        edited.title = "Dune".to_string();
        edited.author = Some("Jane Austen".to_string());
        let err = repo.save(edited).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::TitleTaken(_)));
        assert_eq!(repo.get(emma.id()).await.unwrap().unwrap(), emma);
    }

    #[tokio::test]
    async fn test_save_keeping_own_title() {
        let repo = repo().await;
        let mut book = repo.create(NewBook::titled("Dune")).await.unwrap();
        book.author = Some("Frank Herbert".to_string());
        let saved = repo.save(book).await.unwrap();
        assert_eq!(saved.title, "Dune");
        assert_eq!(saved.author.as_deref(), Some("Frank Herbert"));
    }

    #[rstest]
    #[case::inline(Cover::Inline(vec![0xFF, 0xD8, 0xFF]))]
    #[case::stored(Cover::Stored(PathBuf::from("cover_1.jpg")))]
    #[tokio::test]
    async fn test_save_cover(#[case] cover: Cover) {
        let repo = repo().await;
        let mut book = repo.create(NewBook::titled("Dune")).await.unwrap();
        book.cover = Some(cover.clone());
        repo.save(book.clone()).await.unwrap();
        assert_eq!(repo.get(book.id()).await.unwrap().unwrap().cover, Some(cover));
    }

    #[tokio::test]
    async fn test_uploaded_flag_survives_stale_save() {
        let repo = repo().await;
        let stale = repo.create(NewBook::titled("Dune")).await.unwrap();
        let mut uploaded = stale.clone();
        uploaded.mark_file_uploaded();
        assert!(repo.save(uploaded).await.unwrap().is_file_uploaded());
        // A copy read before the upload still can't clear the flag.
        let saved = repo.save(stale).await.unwrap();
        assert!(saved.is_file_uploaded());
    }

    #[tokio::test]
    async fn test_save_missing_book() {
        let repo = repo().await;
        let book = repo.create(NewBook::titled("Dune")).await.unwrap();
        assert!(repo.delete(book.id()).await.unwrap());
        let err = repo.save(book).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::BookNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = repo().await;
        let dune = repo.create(NewBook::titled("Dune")).await.unwrap();
        let emma = repo.create(NewBook::titled("Emma")).await.unwrap();
        assert!(!repo.delete(BookId::from(999)).await.unwrap());
        assert_eq!(repo.list().await.unwrap().len(), 2);
        assert!(repo.delete(dune.id()).await.unwrap());
        assert!(repo.get(dune.id()).await.unwrap().is_none());
        assert_eq!(repo.list().await.unwrap(), vec![emma]);
    }

    #[tokio::test]
    async fn test_ids_are_not_reused() {
        let repo = repo().await;
        let first = repo.create(NewBook::titled("Dune")).await.unwrap();
        repo.delete(first.id()).await.unwrap();
        let second = repo.create(NewBook::titled("Dune")).await.unwrap();
        assert!(second.id() > first.id());
    }
}
