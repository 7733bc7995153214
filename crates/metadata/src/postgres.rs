//! PostgreSQL-based metadata store implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::FileRow;
use crate::queries::FileQueries;
use crate::repos::{FileRepo, KeyspaceRepo};
use crate::store::{MetadataStore, bounded};
use async_trait::async_trait;
use pinfile_core::config::PgSslMode;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use std::time::Duration;
use tracing::instrument;

/// PostgreSQL-based metadata store.
///
/// Each keyspace is a schema holding a single `files` table.
pub struct PostgresStore {
    pool: Pool<Postgres>,
    keyspace: String,
    session_timeout: Duration,
    queries: FileQueries,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        keyspace: &str,
        max_connections: u32,
        session_timeout: Duration,
    ) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, keyspace, max_connections, session_timeout).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    ///
    /// This allows credentials to be passed separately, enabling better
    /// secret management (e.g., passwords via environment variables).
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        keyspace: &str,
        max_connections: u32,
        session_timeout: Duration,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        // Log connection info without password
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, keyspace, max_connections, session_timeout).await
    }

    async fn connect(
        opts: PgConnectOptions,
        keyspace: &str,
        max_connections: u32,
        session_timeout: Duration,
    ) -> MetadataResult<Self> {
        pinfile_core::config::validate_keyspace_name(keyspace)
            .map_err(|e| MetadataError::Config(e.to_string()))?;

        // Let the server cancel statements the client has already given up on.
        let opts = opts.options([(
            "statement_timeout",
            format!("{}ms", session_timeout.as_millis()),
        )]);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(session_timeout)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            keyspace: keyspace.to_string(),
            session_timeout,
            queries: FileQueries::postgres(keyspace),
        };
        store.init_keyspace().await?;

        tracing::info!(keyspace = %store.keyspace, "PostgreSQL metadata store ready");
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn health_check(&self) -> MetadataResult<()> {
        bounded("health_check", self.session_timeout, async {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok(())
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl KeyspaceRepo for PostgresStore {
    async fn init_keyspace(&self) -> MetadataResult<()> {
        bounded("init_keyspace", self.session_timeout, async {
            sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", self.keyspace))
                .execute(&self.pool)
                .await?;
            sqlx::query(&self.queries.create_table)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await
    }

    async fn drop_keyspace(&self) -> MetadataResult<()> {
        bounded("drop_keyspace", self.session_timeout, async {
            sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", self.keyspace))
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
impl FileRepo for PostgresStore {
    #[instrument(skip(self, row), fields(backend = "postgres", filename = %row.filename))]
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

    #[instrument(skip(self), fields(backend = "postgres"))]
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

    #[instrument(skip(self), fields(backend = "postgres"))]
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
