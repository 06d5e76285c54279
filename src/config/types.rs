//! Runtime settings for the router, the cache and the HTTP binary.

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable names read by [`Settings::from_env`](super::Settings::from_env).
pub mod keys {
    pub const ADMIN_DATABASE_URL: &str = "ADMIN_DATABASE_URL";
    pub const TENANT_JWT_SECRET: &str = "TENANT_JWT_SECRET";
    pub const ADMIN_JWT_SECRET: &str = "ADMIN_JWT_SECRET";
    pub const TENANT_DATA_DIR: &str = "TENANT_DATA_DIR";
    pub const TENANT_POOL_MAX_CONNECTIONS: &str = "TENANT_POOL_MAX_CONNECTIONS";
    pub const TENANT_CONNECT_TIMEOUT_SECS: &str = "TENANT_CONNECT_TIMEOUT_SECS";
    pub const CREATE_MISSING_DATABASES: &str = "CREATE_MISSING_DATABASES";
    pub const BIND_ADDR: &str = "BIND_ADDR";
}

pub const DEFAULT_ADMIN_DATABASE_URL: &str = "sqlite://./admin.sqlite";
pub const DEFAULT_POOL_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Connection parameters shared by every tenant pool.
#[derive(Clone, Debug)]
pub struct PoolSettings {
    /// Base directory for relative SQLite paths (`sqlite://./tenant.sqlite`).
    pub data_dir: PathBuf,
    pub max_connections: u32,
    /// Upper bound on opening and migrating a tenant database on first use.
    pub connect_timeout: Duration,
    /// Issue `CREATE DATABASE` for a missing Postgres database before connecting.
    pub create_missing_databases: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        PoolSettings {
            data_dir: PathBuf::from("."),
            max_connections: DEFAULT_POOL_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            create_missing_databases: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub admin_database_url: String,
    /// HS256 secret for tenant bearer tokens. Tokens are rejected when unset.
    pub tenant_jwt_secret: Option<String>,
    /// HS256 secret for the admin guard. Admin routes are unguarded when unset.
    pub admin_jwt_secret: Option<String>,
    pub pool: PoolSettings,
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            admin_database_url: DEFAULT_ADMIN_DATABASE_URL.into(),
            tenant_jwt_secret: None,
            admin_jwt_secret: None,
            pool: PoolSettings::default(),
            bind_addr: DEFAULT_BIND_ADDR.into(),
        }
    }
}
