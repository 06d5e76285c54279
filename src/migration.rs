//! Embedded, ordered schema migrations for the administrative and tenant databases.
//! Applied migrations are recorded in `_migrations`; re-running a set is a no-op.

use crate::connection::{on_pool, ConnectionHandle};
use crate::error::AppError;
use crate::tenant::DatabaseType;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

/// Which schema a database carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MigrationSet {
    /// Tenant directory tables (`databases`, `tenants`).
    Admin,
    /// Tenant-scoped entity tables (`users`, `friends`).
    Tenant,
}

impl MigrationSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationSet::Admin => "admin",
            MigrationSet::Tenant => "tenant",
        }
    }

    pub fn migrations(&self) -> &'static [Migration] {
        match self {
            MigrationSet::Admin => ADMIN_MIGRATIONS,
            MigrationSet::Tenant => TENANT_MIGRATIONS,
        }
    }
}

impl fmt::Display for MigrationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One migration: statements per dialect, executed in order inside a transaction.
#[derive(Debug)]
pub struct Migration {
    pub name: &'static str,
    pub sqlite: &'static [&'static str],
    pub postgres: &'static [&'static str],
}

impl Migration {
    fn statements(&self, engine: DatabaseType) -> &'static [&'static str] {
        match engine {
            DatabaseType::Sqlite => self.sqlite,
            DatabaseType::Postgres => self.postgres,
        }
    }
}

const ADMIN_MIGRATIONS: &[Migration] = &[
    Migration {
        name: "0001_create_databases",
        sqlite: &[
            "CREATE TABLE IF NOT EXISTS databases (
                id TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('sqlite', 'postgres')),
                url TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS databases_name_live ON databases (name) WHERE deleted_at IS NULL",
        ],
        postgres: &[
            "CREATE TABLE IF NOT EXISTS databases (
                id VARCHAR(36) PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                type VARCHAR(16) NOT NULL CHECK (type IN ('sqlite', 'postgres')),
                url TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                deleted_at TIMESTAMPTZ
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS databases_name_live ON databases (name) WHERE deleted_at IS NULL",
        ],
    },
    Migration {
        name: "0002_create_tenants",
        sqlite: &[
            "CREATE TABLE IF NOT EXISTS tenants (
                id TEXT PRIMARY KEY NOT NULL,
                slug TEXT NOT NULL,
                name TEXT NOT NULL,
                external_id TEXT,
                status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive')),
                database_id TEXT NOT NULL REFERENCES databases (id),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS tenants_slug_live ON tenants (slug) WHERE deleted_at IS NULL",
            "CREATE INDEX IF NOT EXISTS tenants_database_id ON tenants (database_id)",
        ],
        postgres: &[
            "CREATE TABLE IF NOT EXISTS tenants (
                id VARCHAR(36) PRIMARY KEY,
                slug VARCHAR(50) NOT NULL,
                name VARCHAR(255) NOT NULL,
                external_id VARCHAR(255),
                status VARCHAR(16) NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive')),
                database_id VARCHAR(36) NOT NULL REFERENCES databases (id),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                deleted_at TIMESTAMPTZ
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS tenants_slug_live ON tenants (slug) WHERE deleted_at IS NULL",
            "CREATE INDEX IF NOT EXISTS tenants_database_id ON tenants (database_id)",
        ],
    },
];

const TENANT_MIGRATIONS: &[Migration] = &[
    Migration {
        name: "0001_create_users",
        sqlite: &[
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY NOT NULL,
                tenant_id TEXT NOT NULL,
                email TEXT NOT NULL,
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                active BOOLEAN NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS users_tenant_email ON users (tenant_id, email)",
        ],
        postgres: &[
            "CREATE TABLE IF NOT EXISTS users (
                id VARCHAR(36) PRIMARY KEY,
                tenant_id VARCHAR(36) NOT NULL,
                email VARCHAR(255) NOT NULL,
                name VARCHAR(255) NOT NULL,
                password_hash TEXT NOT NULL,
                active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS users_tenant_email ON users (tenant_id, email)",
        ],
    },
    Migration {
        name: "0002_create_friends",
        sqlite: &[
            "CREATE TABLE IF NOT EXISTS friends (
                id TEXT PRIMARY KEY NOT NULL,
                tenant_id TEXT NOT NULL,
                name TEXT NOT NULL,
                phone_number TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS friends_tenant_id ON friends (tenant_id)",
        ],
        postgres: &[
            "CREATE TABLE IF NOT EXISTS friends (
                id VARCHAR(36) PRIMARY KEY,
                tenant_id VARCHAR(36) NOT NULL,
                name VARCHAR(255) NOT NULL,
                phone_number VARCHAR(32),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
            "CREATE INDEX IF NOT EXISTS friends_tenant_id ON friends (tenant_id)",
        ],
    },
    Migration {
        name: "0003_add_friends_preferred_drink",
        sqlite: &["ALTER TABLE friends ADD COLUMN preferred_drink VARCHAR(100)"],
        postgres: &["ALTER TABLE friends ADD COLUMN IF NOT EXISTS preferred_drink VARCHAR(100)"],
    },
];

const CREATE_LEDGER_SQLITE: &str = "CREATE TABLE IF NOT EXISTS _migrations (
    name TEXT NOT NULL,
    set_name TEXT NOT NULL,
    applied_at TEXT NOT NULL,
    PRIMARY KEY (set_name, name)
)";

const CREATE_LEDGER_POSTGRES: &str = "CREATE TABLE IF NOT EXISTS _migrations (
    name VARCHAR(255) NOT NULL,
    set_name VARCHAR(32) NOT NULL,
    applied_at TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (set_name, name)
)";

/// Applies a migration set to a connection and reports what it applied.
#[async_trait]
pub trait MigrationRunner: Send + Sync {
    /// Apply pending migrations of `set` in order. Returns the names applied by this call.
    async fn run(&self, handle: &ConnectionHandle, set: MigrationSet) -> Result<Vec<String>, AppError>;
}

/// Runs the embedded migration sets. Runs against the same database id are serialized,
/// so tenants sharing a physical database do not race on its schema.
#[derive(Default)]
pub struct SqlMigrationRunner {
    locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl SqlMigrationRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, database_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.entry(database_id.to_string()).or_default().clone()
    }
}

#[async_trait]
impl MigrationRunner for SqlMigrationRunner {
    async fn run(&self, handle: &ConnectionHandle, set: MigrationSet) -> Result<Vec<String>, AppError> {
        let lock = self.lock_for(handle.database_id());
        let _guard = lock.lock().await;
        apply_set(handle, set).await
    }
}

async fn apply_set(handle: &ConnectionHandle, set: MigrationSet) -> Result<Vec<String>, AppError> {
    let engine = handle.engine();
    let ledger = match engine {
        DatabaseType::Sqlite => CREATE_LEDGER_SQLITE,
        DatabaseType::Postgres => CREATE_LEDGER_POSTGRES,
    };
    let done: Vec<(String,)> = on_pool!(handle, |pool| {
        sqlx::query(ledger).execute(pool).await?;
        sqlx::query_as("SELECT name FROM _migrations WHERE set_name = $1")
            .bind(set.as_str())
            .fetch_all(pool)
            .await?
    });
    let done: Vec<String> = done.into_iter().map(|(n,)| n).collect();

    let mut applied = Vec::new();
    for migration in set.migrations() {
        if done.iter().any(|n| n == migration.name) {
            continue;
        }
        tracing::debug!(set = %set, migration = migration.name, "applying migration");
        on_pool!(handle, |pool| {
            let mut tx = pool.begin().await?;
            for stmt in migration.statements(engine) {
                sqlx::query(stmt).execute(&mut *tx).await?;
            }
            sqlx::query("INSERT INTO _migrations (name, set_name, applied_at) VALUES ($1, $2, $3)")
                .bind(migration.name)
                .bind(set.as_str())
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        });
        applied.push(migration.name.to_string());
    }
    Ok(applied)
}
