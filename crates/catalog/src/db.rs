//! The SQLite database behind the catalog.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Sizing of the connection pool.
#[derive(Debug, Clone, Copy)]
struct Pool {
    connections: u32,
    busy_timeout: Duration,
}
impl Pool {
    /// WAL allows a single writer next to any number of readers. A personal
    /// library sees a handful of concurrent requests at most.
    const FILE: Self = Self { connections: 4, busy_timeout: Duration::from_secs(2) };
    /// Each connection to `:memory:` opens a separate, empty database, so
    /// everything has to share one.
    const MEMORY: Self = Self { connections: 1, busy_timeout: Duration::from_secs(2) };
}

/// Handle on the catalog database.
///
/// Cloning is cheap: clones share the same pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the catalog at `path`, creating the file (and its directory) on
    /// first use, and bring the schema up to date.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Database)?;
        }
        tracing::debug!(path = %path.display(), "Opening catalog");
        Self::open(SqliteConnectOptions::new().filename(path).create_if_missing(true), Pool::FILE).await
    }

    /// Open a fresh catalog that lives only as long as this handle (and its
    /// clones). Meant for tests, including those of dependent crates.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::open(SqliteConnectOptions::new().filename(":memory:"), Pool::MEMORY).await
    }

    async fn open(options: SqliteConnectOptions, pool: Pool) -> Result<Self> {
        let options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(pool.busy_timeout);
        let pool = SqlitePoolOptions::new()
            .max_connections(pool.connections)
            // Runs for every connection the pool opens, not only the first.
            .after_connect(|conn, meta| Box::pin(async move { Self::tune(conn, meta).await }))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Per-connection settings with no [`SqliteConnectOptions`] equivalent.
    async fn tune(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        // Inline covers make rows large; a bigger page cache keeps listing
        // the library from rereading them.
        sqlx::query(
            r#"
                PRAGMA cache_size = -16384;
                PRAGMA temp_store = MEMORY;
                PRAGMA wal_autocheckpoint = 1000;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    #[instrument("migrating catalog schema", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Let SQLite refresh its statistics, then close every connection.
    ///
    /// Waits for checked-out connections to come back first. The handle
    /// must not be used afterwards.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_catalogs_are_separate() {
        let first = Database::connect_in_memory().await.unwrap();
        let second = Database::connect_in_memory().await.unwrap();
        sqlx::query("INSERT INTO books (title) VALUES ('Dune')").execute(first.pool()).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books").fetch_one(second.pool()).await.unwrap();
        assert_eq!(count, 0);
        first.close().await;
        second.close().await;
    }

    #[tokio::test]
    async fn test_connect_creates_file_and_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("data").join("shelf.sqlite");
        let db = Database::connect(&path).await.unwrap();
        assert!(path.is_file());
        sqlx::query("INSERT INTO books (title) VALUES ('Dune')").execute(db.pool()).await.unwrap();
        db.close().await;

        // Reopening keeps the data; migrations that already ran are skipped.
        let db = Database::connect(&path).await.unwrap();
        let title: String = sqlx::query_scalar("SELECT title FROM books").fetch_one(db.pool()).await.unwrap();
        assert_eq!(title, "Dune");
        db.close().await;
    }

    #[tokio::test]
    async fn test_connection_settings() {
        let db = Database::connect_in_memory().await.unwrap();
        let foreign_keys: i64 = sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(db.pool()).await.unwrap();
        assert_eq!(foreign_keys, 1);
        let cache_size: i64 = sqlx::query_scalar("PRAGMA cache_size").fetch_one(db.pool()).await.unwrap();
        assert_eq!(cache_size, -16384);
        db.close().await;
    }
}
