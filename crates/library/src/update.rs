//! Field-level edits to an existing book.
//!
//! Two policies share one entry point:
//!
//! - [`UpdateMode::Merge`]: `title`, `author` and `progress` are only
//!   overwritten when a value is supplied. `favorite` is the exception and is
//!   always overwritten, so omitting it clears it.
//! - [`UpdateMode::Replace`]: every editable field takes the incoming value,
//!   absent meaning cleared. A title is still mandatory.
//!
//! Neither policy touches the cover or the uploaded flag; those only change
//! through ingestion.

use crate::error::{ErrorKind, Result};
use shelf_catalog::Book;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(rename_all = "lowercase"))]
pub enum UpdateMode {
    /// Absent fields keep their stored value (except `favorite`).
    #[default]
    Merge,
    /// Every field is overwritten.
    Replace,
}

/// The editable fields of a book, as supplied by a client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookChanges {
    pub title: Option<String>,
    pub author: Option<String>,
    pub progress: Option<f64>,
    pub favorite: Option<bool>,
}

/// Apply `changes` to `book` according to `mode`.
///
/// Any progress write, including a replace that clears it, restamps the
/// sync time with `now`. Fails with [`ErrorKind::MissingTitle`] before
/// touching `book` if a replace carries no title.
pub(crate) fn apply(book: &mut Book, changes: BookChanges, mode: UpdateMode, now: OffsetDateTime) -> Result<()> {
    match mode {
        UpdateMode::Merge => {
            if let Some(title) = changes.title {
                book.title = title;
            }
            if changes.author.is_some() {
                book.author = changes.author;
            }
            if changes.progress.is_some() {
                book.set_progress(changes.progress, now);
            }
            book.favorite = changes.favorite;
        },
        UpdateMode::Replace => {
            let Some(title) = changes.title else {
                exn::bail!(ErrorKind::MissingTitle);
            };
            book.title = title;
            book.author = changes.author;
            book.set_progress(changes.progress, now);
            book.favorite = changes.favorite;
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::library;
    use rstest::rstest;
    use shelf_catalog::NewBook;

    async fn stored_book() -> Book {
        let (library, _backend) = library().await;
        let draft = NewBook {
            title: "A".to_string(),
            author: Some("B".to_string()),
            progress: Some(5.0),
            favorite: Some(true),
        };
        library.create(draft).await.unwrap()
    }

    #[tokio::test]
    async fn test_merge_keeps_absent_fields_but_clears_favorite() {
        let mut book = stored_book().await;
        let synched_at = book.progress_synched_at();
        let changes = BookChanges { author: Some("C".to_string()), ..BookChanges::default() };
        apply(&mut book, changes, UpdateMode::Merge, OffsetDateTime::now_utc()).unwrap();
        assert_eq!(book.title, "A");
        assert_eq!(book.author.as_deref(), Some("C"));
        assert_eq!(book.progress(), Some(5.0));
        assert_eq!(book.progress_synched_at(), synched_at, "progress wasn't written");
        assert_eq!(book.favorite, None);
    }

    #[tokio::test]
    async fn test_merge_progress_restamps_sync_time() {
        let mut book = stored_book().await;
        let later = OffsetDateTime::now_utc() + time::Duration::hours(1);
        let changes = BookChanges { progress: Some(0.75), favorite: Some(true), ..BookChanges::default() };
        apply(&mut book, changes, UpdateMode::Merge, later).unwrap();
        assert_eq!(book.progress(), Some(0.75));
        assert_eq!(book.progress_synched_at(), Some(later));
        assert_eq!(book.favorite, Some(true));
    }

    #[tokio::test]
    async fn test_replace_overwrites_everything() {
        let mut book = stored_book().await;
        let changes = BookChanges { title: Some("X".to_string()), favorite: Some(false), ..BookChanges::default() };
        apply(&mut book, changes, UpdateMode::Replace, OffsetDateTime::now_utc()).unwrap();
        assert_eq!(book.title, "X");
        assert_eq!(book.author, None);
        assert_eq!(book.progress(), None);
        assert_eq!(book.progress_synched_at(), None);
        assert_eq!(book.favorite, Some(false));
    }

    #[rstest]
    #[case::empty(BookChanges::default())]
    #[case::everything_but_title(BookChanges {
        author: Some("C".to_string()),
        progress: Some(0.1),
        favorite: Some(true),
        ..BookChanges::default()
    })]
    #[tokio::test]
    async fn test_replace_requires_title(#[case] changes: BookChanges) {
        let mut book = stored_book().await;
        let before = book.clone();
        let err = apply(&mut book, changes, UpdateMode::Replace, OffsetDateTime::now_utc()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::MissingTitle));
        assert_eq!(book, before);
    }

    #[tokio::test]
    async fn test_updates_never_touch_cover_or_upload_flag() {
        let mut book = stored_book().await;
        book.mark_file_uploaded();
        book.cover = Some(shelf_catalog::Cover::Inline(vec![1, 2, 3]));
        let before = book.clone();
        for mode in [UpdateMode::Merge, UpdateMode::Replace] {
            let changes = BookChanges { title: Some("Y".to_string()), ..BookChanges::default() };
            apply(&mut book, changes, mode, OffsetDateTime::now_utc()).unwrap();
            assert!(book.is_file_uploaded());
            assert_eq!(book.cover, before.cover);
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_mode_names() {
        assert_eq!(serde_json::to_string(&UpdateMode::Replace).unwrap(), "\"replace\"");
        assert_eq!(serde_json::from_str::<UpdateMode>("\"merge\"").unwrap(), UpdateMode::Merge);
    }
}
