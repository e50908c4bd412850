use crate::error::{Error, ErrorKind};
use crate::{Book, BookId, Cover};
use exn::{OptionExt, ResultExt};
use std::path::PathBuf;
use time::OffsetDateTime;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct BookRow {
    pub id: i64,
    pub title: String,
    pub author: Option<String>,
    pub progress: Option<f64>,
    pub progress_synched_at: Option<i64>,
    pub favorite: Option<bool>,
    pub cover_blob: Option<Vec<u8>>,
    pub cover_path: Option<String>,
    pub is_file_uploaded: bool,
}
impl TryFrom<&Book> for BookRow {
    type Error = Error;
    fn try_from(book: &Book) -> Result<Self, Self::Error> {
        let (cover_blob, cover_path) = match &book.cover {
            None => (None, None),
            Some(Cover::Inline(bytes)) => (Some(bytes.clone()), None),
            Some(Cover::Stored(path)) => {
                (None, Some(path.to_str().ok_or_raise(|| ErrorKind::InvalidData("cover path"))?.to_string()))
            },
        };
        Ok(Self {
            id: book.id.get(),
            title: book.title.clone(),
            author: book.author.clone(),
            progress: book.progress,
            progress_synched_at: book.progress_synched_at.map(OffsetDateTime::unix_timestamp),
            favorite: book.favorite,
            cover_blob,
            cover_path,
            is_file_uploaded: book.is_file_uploaded,
        })
    }
}
impl TryFrom<BookRow> for Book {
    type Error = Error;
    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        let cover = match (row.cover_blob, row.cover_path) {
            (None, None) => None,
            (Some(bytes), None) => Some(Cover::Inline(bytes)),
            (None, Some(path)) => Some(Cover::Stored(PathBuf::from(path))),
            (Some(_), Some(_)) => exn::bail!(ErrorKind::InvalidData("cover stored both inline and on disk")),
        };
        let progress_synched_at = row
            .progress_synched_at
            .map(OffsetDateTime::from_unix_timestamp)
            .transpose()
            .or_raise(|| ErrorKind::InvalidData("progress sync time"))?;
        if row.progress.is_some() != progress_synched_at.is_some() {
            exn::bail!(ErrorKind::InvalidData("progress without sync time"));
        }
        Ok(Self {
            id: BookId::from(row.id),
            title: row.title,
            author: row.author,
            progress: row.progress,
            progress_synched_at,
            favorite: row.favorite,
            cover,
            is_file_uploaded: row.is_file_uploaded,
        })
    }
}
