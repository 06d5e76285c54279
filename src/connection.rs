//! Live connection handles to a tenant's physical database, and the translation
//! from a [`DatabaseConfig`] URL to engine-specific connect options.

use crate::config::PoolSettings;
use crate::error::AppError;
use crate::tenant::{DatabaseConfig, DatabaseType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Engine-specific pool behind a [`ConnectionHandle`].
#[derive(Clone, Debug)]
pub enum EnginePool {
    Sqlite(SqlitePool),
    Postgres(PgPool),
}

/// Run `$body` against whichever pool the handle wraps. The body is compiled once per engine.
macro_rules! on_pool {
    ($handle:expr, |$pool:ident| $body:expr) => {
        match $handle.pool() {
            $crate::connection::EnginePool::Sqlite($pool) => $body,
            $crate::connection::EnginePool::Postgres($pool) => $body,
        }
    };
}
pub(crate) use on_pool;

#[derive(Debug)]
struct HandleInner {
    pool: EnginePool,
    database_id: String,
    opened_at: DateTime<Utc>,
}

/// Shared handle to one physical database. Cloning is cheap and yields the same handle.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

impl ConnectionHandle {
    pub fn new(pool: EnginePool, database_id: impl Into<String>) -> Self {
        ConnectionHandle {
            inner: Arc::new(HandleInner {
                pool,
                database_id: database_id.into(),
                opened_at: Utc::now(),
            }),
        }
    }

    /// Open a pool for `db_type`/`url` without running migrations.
    pub async fn open(
        database_id: &str,
        db_type: DatabaseType,
        url: &str,
        settings: &PoolSettings,
    ) -> Result<Self, AppError> {
        match DatabaseType::from_url(url) {
            Some(t) if t == db_type => {}
            Some(t) => {
                return Err(AppError::Configuration(format!(
                    "database {}: url scheme is {} but type is {}",
                    database_id, t, db_type
                )))
            }
            None => {
                return Err(AppError::Configuration(format!(
                    "database {}: unsupported url scheme",
                    database_id
                )))
            }
        }
        let pool = match db_type {
            DatabaseType::Sqlite => {
                let opts = sqlite_options(url, &settings.data_dir)?;
                if let Some(parent) = opts.get_filename().parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await.map_err(|e| {
                            AppError::Configuration(format!(
                                "database {}: cannot create {}: {}",
                                database_id,
                                parent.display(),
                                e
                            ))
                        })?;
                    }
                }
                let pool = SqlitePoolOptions::new()
                    .max_connections(settings.max_connections)
                    .acquire_timeout(settings.connect_timeout)
                    .connect_with(opts)
                    .await?;
                EnginePool::Sqlite(pool)
            }
            DatabaseType::Postgres => {
                if settings.create_missing_databases {
                    ensure_database_exists(url).await?;
                }
                let opts = postgres_options(url)?;
                let pool = PgPoolOptions::new()
                    .max_connections(settings.max_connections)
                    .acquire_timeout(settings.connect_timeout)
                    .connect_with(opts)
                    .await?;
                EnginePool::Postgres(pool)
            }
        };
        Ok(ConnectionHandle::new(pool, database_id))
    }

    pub fn pool(&self) -> &EnginePool {
        &self.inner.pool
    }

    pub fn engine(&self) -> DatabaseType {
        match self.inner.pool {
            EnginePool::Sqlite(_) => DatabaseType::Sqlite,
            EnginePool::Postgres(_) => DatabaseType::Postgres,
        }
    }

    /// Id of the [`DatabaseConfig`] this handle was opened from.
    pub fn database_id(&self) -> &str {
        &self.inner.database_id
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.inner.opened_at
    }

    /// True until the pool has been closed.
    pub fn is_healthy(&self) -> bool {
        match &self.inner.pool {
            EnginePool::Sqlite(p) => !p.is_closed(),
            EnginePool::Postgres(p) => !p.is_closed(),
        }
    }

    /// Whether both handles share the same underlying pool.
    pub fn same_as(&self, other: &ConnectionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        on_pool!(self, |pool| {
            sqlx::query("SELECT 1").execute(pool).await?;
        });
        Ok(())
    }

    pub async fn close(&self) {
        match &self.inner.pool {
            EnginePool::Sqlite(p) => p.close().await,
            EnginePool::Postgres(p) => p.close().await,
        }
    }
}

/// Opens physical connections for the cache. Swappable so tests can observe opens.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &DatabaseConfig) -> Result<ConnectionHandle, AppError>;
}

/// Default connector: one sqlx pool per database config.
#[derive(Clone, Debug, Default)]
pub struct SqlxConnector {
    settings: PoolSettings,
}

impl SqlxConnector {
    pub fn new(settings: PoolSettings) -> Self {
        SqlxConnector { settings }
    }
}

#[async_trait]
impl Connector for SqlxConnector {
    async fn connect(&self, config: &DatabaseConfig) -> Result<ConnectionHandle, AppError> {
        ConnectionHandle::open(&config.id, config.db_type, &config.url, &self.settings).await
    }
}

/// Where a `sqlite:` URL points once resolved against the data directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SqliteLocation {
    Memory,
    File(PathBuf),
}

/// Resolve a `sqlite:` URL. Relative paths are joined onto `data_dir` and normalized.
pub fn sqlite_location(url: &str, data_dir: &Path) -> Result<SqliteLocation, AppError> {
    let rest = url
        .trim()
        .strip_prefix("sqlite://")
        .or_else(|| url.trim().strip_prefix("sqlite:"))
        .ok_or_else(|| AppError::Configuration(format!("not a sqlite url: {}", url)))?;
    let path = rest.split('?').next().unwrap_or("");
    if path.is_empty() {
        return Err(AppError::Configuration(format!("sqlite url has no path: {}", url)));
    }
    if path == ":memory:" {
        return Ok(SqliteLocation::Memory);
    }
    let path = Path::new(path);
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        data_dir.join(path)
    };
    Ok(SqliteLocation::File(normalize(&joined)))
}

/// Lexically drop `.` and fold `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub fn sqlite_options(url: &str, data_dir: &Path) -> Result<SqliteConnectOptions, AppError> {
    let opts = match sqlite_location(url, data_dir)? {
        SqliteLocation::Memory => SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| AppError::Configuration(format!("invalid sqlite url {}: {}", url, e)))?,
        SqliteLocation::File(path) => SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal),
    };
    Ok(opts.foreign_keys(true))
}

/// Postgres DSNs pass through unchanged.
pub fn postgres_options(url: &str) -> Result<PgConnectOptions, AppError> {
    PgConnectOptions::from_str(url.trim())
        .map_err(|e| AppError::Configuration(format!("invalid postgres url: {}", e)))
}

/// Ensure the database named in a Postgres `url` exists, creating it through the
/// `postgres` maintenance database when missing. URLs without a database path use
/// the server default and need nothing created.
pub async fn ensure_database_exists(url: &str) -> Result<(), AppError> {
    let opts = postgres_options(url)?;
    let Some(db_name) = target_database(&opts) else {
        return Ok(());
    };
    let mut conn: sqlx::PgConnection = opts.clone().database("postgres").connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating missing postgres database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

/// The database a DSN names, unless it is absent or the maintenance database.
fn target_database(opts: &PgConnectOptions) -> Option<String> {
    opts.get_database()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "postgres")
        .map(String::from)
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
