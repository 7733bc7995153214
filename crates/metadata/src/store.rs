//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::FileRow;
use crate::queries::FileQueries;
use crate::repos::{FileRepo, KeyspaceRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::instrument;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: FileRepo + KeyspaceRepo + Send + Sync {
    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;

    /// Short backend identifier for logs ("sqlite", "postgres", "memory").
    fn backend_name(&self) -> &'static str;
}

/// Run a query future under the session timeout.
pub(crate) async fn bounded<T>(
    operation: &'static str,
    after: Duration,
    fut: impl Future<Output = MetadataResult<T>>,
) -> MetadataResult<T> {
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(MetadataError::Timeout { operation, after }),
    }
}

/// SQLite-based metadata store.
///
/// Each keyspace lives in its own database file, `<dir>/<keyspace>.db`.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    keyspace: String,
    session_timeout: Duration,
    queries: FileQueries,
}

impl SqliteStore {
    /// Open (creating if needed) the database for `keyspace` under `dir`.
    ///
    /// Pass ":memory:" as `dir` for a private in-memory database.
    pub async fn new(
        dir: impl AsRef<Path>,
        keyspace: &str,
        session_timeout: Duration,
    ) -> MetadataResult<Self> {
        pinfile_core::config::validate_keyspace_name(keyspace)
            .map_err(|e| MetadataError::Config(e.to_string()))?;

        let dir = dir.as_ref();
        let in_memory = dir.as_os_str() == ":memory:";

        let opts = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            std::fs::create_dir_all(dir)?;
            let path = dir.join(format!("{keyspace}.db"));
            SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        };
        // Prevent transient "database is locked" errors under concurrent access.
        let opts = opts.busy_timeout(Duration::from_secs(5));

        let mut pool_opts = SqlitePoolOptions::new()
            // A single connection serialises writers, which is what makes the
            // conditional statements below compare-and-set.
            .max_connections(1);
        if in_memory {
            // An in-memory database lives exactly as long as its connection.
            pool_opts = pool_opts.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_opts.connect_with(opts).await?;

        let store = Self {
            pool,
            keyspace: keyspace.to_string(),
            session_timeout,
            queries: FileQueries::sqlite(),
        };
        store.init_keyspace().await?;

        tracing::debug!(keyspace = %store.keyspace, in_memory, "SQLite metadata store ready");
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn health_check(&self) -> MetadataResult<()> {
        bounded("health_check", self.session_timeout, async {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok(())
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[async_trait]
impl KeyspaceRepo for SqliteStore {
    async fn init_keyspace(&self) -> MetadataResult<()> {
        bounded("init_keyspace", self.session_timeout, async {
            sqlx::query(&self.queries.create_table)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await
    }

    async fn drop_keyspace(&self) -> MetadataResult<()> {
        bounded("drop_keyspace", self.session_timeout, async {
            sqlx::query("DROP TABLE IF EXISTS files")
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await?;
        tracing::info!(keyspace = %self.keyspace, "Dropped keyspace");
        Ok(())
    }

    fn keyspace(&self) -> &str {
        &self.keyspace
    }
}

#[async_trait]
impl FileRepo for SqliteStore {
    #[instrument(skip(self, row), fields(backend = "sqlite", filename = %row.filename))]
    async fn insert_if_absent(&self, row: &FileRow) -> MetadataResult<bool> {
        bounded("insert_if_absent", self.session_timeout, async {
            let result = sqlx::query(&self.queries.insert)
                .bind(&row.filename)
                .bind(&row.timestamp)
                .bind(&row.ipfs_cid)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn delete_if_present(&self, filename: &str) -> MetadataResult<bool> {
        bounded("delete_if_present", self.session_timeout, async {
            let result = sqlx::query(&self.queries.delete)
                .bind(filename)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn update_timestamp_if_present(
        &self,
        filename: &str,
        timestamp: &str,
    ) -> MetadataResult<bool> {
        bounded("update_timestamp_if_present", self.session_timeout, async {
            let result = sqlx::query(&self.queries.update_timestamp)
                .bind(timestamp)
                .bind(filename)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn lookup_content_id(&self, filename: &str) -> MetadataResult<Option<String>> {
        bounded("lookup_content_id", self.session_timeout, async {
            let cid = sqlx::query_scalar::<_, String>(&self.queries.select_content_id)
                .bind(filename)
                .fetch_optional(&self.pool)
                .await?;
            Ok(cid)
        })
        .await
    }

    async fn lookup_timestamp(&self, filename: &str) -> MetadataResult<Option<String>> {
        bounded("lookup_timestamp", self.session_timeout, async {
            let ts = sqlx::query_scalar::<_, String>(&self.queries.select_timestamp)
                .bind(filename)
                .fetch_optional(&self.pool)
                .await?;
            Ok(ts)
        })
        .await
    }

    async fn exists(&self, filename: &str) -> MetadataResult<bool> {
        bounded("exists", self.session_timeout, async {
            let exists = sqlx::query_scalar::<_, bool>(&self.queries.select_exists)
                .bind(filename)
                .fetch_one(&self.pool)
                .await?;
            Ok(exists)
        })
        .await
    }
}
