#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tenant_router::auth::{Claims, JwtVerifier, RejectAll};
use tenant_router::config::{PoolSettings, Settings};
use tenant_router::tenant::{NewDatabaseConfig, NewTenant};
use tenant_router::{
    AppError, AppState, ConnectionCache, ConnectionHandle, Connector, DatabaseConfig, DatabaseType,
    MigrationRunner, MigrationSet, SqlMigrationRunner, SqlTenantDirectory, SqlxConnector,
    TenantDirectory, TenantRecord, TenantResolver,
};

pub const TENANT_SECRET: &str = "tenant-secret-for-tests";
pub const ADMIN_SECRET: &str = "admin-secret-for-tests";

/// Wraps the real connector, counting opens and optionally stalling first.
pub struct CountingConnector {
    inner: SqlxConnector,
    delay: Duration,
    opens: AtomicUsize,
}

impl CountingConnector {
    pub fn new(settings: PoolSettings, delay: Duration) -> Self {
        CountingConnector {
            inner: SqlxConnector::new(settings),
            delay,
            opens: AtomicUsize::new(0),
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for CountingConnector {
    async fn connect(&self, config: &DatabaseConfig) -> Result<ConnectionHandle, AppError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.connect(config).await
    }
}

/// An administrative SQLite database plus tenant databases, all under one temp dir.
pub struct Harness {
    pub dir: TempDir,
    pub settings: Settings,
    pub admin: ConnectionHandle,
    pub directory: Arc<dyn TenantDirectory>,
    pub connector: Arc<CountingConnector>,
    pub cache: Arc<ConnectionCache>,
}

pub async fn harness() -> Harness {
    harness_with(Duration::ZERO, Duration::from_secs(10)).await
}

pub async fn harness_with(connect_delay: Duration, connect_timeout: Duration) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let pool = PoolSettings {
        data_dir: dir.path().to_path_buf(),
        max_connections: 2,
        connect_timeout,
        create_missing_databases: false,
    };
    let settings = Settings {
        admin_database_url: "sqlite://admin.sqlite".into(),
        tenant_jwt_secret: Some(TENANT_SECRET.into()),
        admin_jwt_secret: Some(ADMIN_SECRET.into()),
        pool: pool.clone(),
        ..Default::default()
    };
    let admin = ConnectionHandle::open("admin", DatabaseType::Sqlite, &settings.admin_database_url, &pool)
        .await
        .unwrap();
    let migrator = Arc::new(SqlMigrationRunner::new());
    migrator.run(&admin, MigrationSet::Admin).await.unwrap();

    let directory: Arc<dyn TenantDirectory> = Arc::new(SqlTenantDirectory::new(admin.clone()));
    let connector = Arc::new(CountingConnector::new(pool, connect_delay));
    let cache = Arc::new(ConnectionCache::new(
        directory.clone(),
        connector.clone(),
        migrator,
        connect_timeout,
    ));
    Harness {
        dir,
        settings,
        admin,
        directory,
        connector,
        cache,
    }
}

impl Harness {
    pub async fn add_database(&self, name: &str) -> DatabaseConfig {
        self.directory
            .create_database(NewDatabaseConfig {
                name: name.into(),
                db_type: DatabaseType::Sqlite,
                url: format!("sqlite://{}.sqlite", name),
            })
            .await
            .unwrap()
    }

    pub async fn add_tenant(&self, name: &str, database_id: &str) -> TenantRecord {
        self.directory
            .create(NewTenant {
                name: name.into(),
                slug: None,
                external_id: None,
                status: None,
                database_id: database_id.into(),
            })
            .await
            .unwrap()
    }

    pub fn resolver(&self) -> TenantResolver {
        TenantResolver::new(
            self.directory.clone(),
            self.cache.clone(),
            Arc::new(JwtVerifier::hs256(TENANT_SECRET)),
        )
    }

    pub fn resolver_without_tokens(&self) -> TenantResolver {
        TenantResolver::new(self.directory.clone(), self.cache.clone(), Arc::new(RejectAll))
    }

    /// Full application state sharing this harness's admin database.
    pub fn state(&self) -> AppState {
        AppState::assemble(
            self.settings.clone(),
            self.admin.clone(),
            self.connector.clone(),
            Arc::new(SqlMigrationRunner::new()),
        )
    }
}

pub fn tenant_token(tenant_id: Option<&str>) -> String {
    sign(TENANT_SECRET, tenant_id, None)
}

pub fn admin_token() -> String {
    sign(ADMIN_SECRET, None, Some("admin"))
}

fn sign(secret: &str, tenant_id: Option<&str>, role: Option<&str>) -> String {
    let exp = (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize;
    JwtVerifier::hs256(secret)
        .sign(&Claims {
            sub: "user-1".into(),
            tenant_id: tenant_id.map(String::from),
            role: role.map(String::from),
            exp,
        })
        .unwrap()
}

pub fn fields(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap()
}

