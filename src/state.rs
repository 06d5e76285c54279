//! Shared application state, built once at startup and cloned into every handler.

use crate::auth::{JwtVerifier, RejectAll, TokenVerifier};
use crate::cache::ConnectionCache;
use crate::config::Settings;
use crate::connection::{ConnectionHandle, Connector, SqlxConnector};
use crate::context::TenantResolver;
use crate::directory::{SqlTenantDirectory, TenantDirectory};
use crate::error::{AppError, ConfigError};
use crate::migration::{MigrationRunner, MigrationSet, SqlMigrationRunner};
use crate::service::TenantProvisioner;
use crate::tenant::DatabaseType;
use std::sync::Arc;

const ADMIN_DATABASE_ID: &str = "admin";

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// The administrative database; never tenant-routed.
    pub admin: ConnectionHandle,
    pub directory: Arc<dyn TenantDirectory>,
    pub cache: Arc<ConnectionCache>,
    pub resolver: Arc<TenantResolver>,
    pub provisioner: Arc<TenantProvisioner>,
    /// `None` leaves admin routes unguarded.
    pub admin_verifier: Option<Arc<dyn TokenVerifier>>,
}

impl AppState {
    /// Open and migrate the administrative database, then wire the directory, cache and resolver.
    pub async fn build(settings: Settings) -> Result<Self, AppError> {
        settings.validate()?;
        let db_type = DatabaseType::from_url(&settings.admin_database_url)
            .ok_or_else(|| ConfigError::UnsupportedUrl(settings.admin_database_url.clone()))?;
        let admin = ConnectionHandle::open(
            ADMIN_DATABASE_ID,
            db_type,
            &settings.admin_database_url,
            &settings.pool,
        )
        .await?;

        let migrator = Arc::new(SqlMigrationRunner::new());
        let applied = migrator.run(&admin, MigrationSet::Admin).await?;
        tracing::info!(engine = %db_type, migrations_applied = applied.len(), "administrative database ready");

        let connector = Arc::new(SqlxConnector::new(settings.pool.clone()));
        Ok(Self::assemble(settings, admin, connector, migrator))
    }

    /// Wire the state around an already migrated admin handle.
    pub fn assemble(
        settings: Settings,
        admin: ConnectionHandle,
        connector: Arc<dyn Connector>,
        migrator: Arc<dyn MigrationRunner>,
    ) -> Self {
        let directory: Arc<dyn TenantDirectory> = Arc::new(SqlTenantDirectory::new(admin.clone()));
        let cache = Arc::new(ConnectionCache::new(
            directory.clone(),
            connector,
            migrator,
            settings.pool.connect_timeout,
        ));

        let tenant_verifier: Arc<dyn TokenVerifier> = match &settings.tenant_jwt_secret {
            Some(secret) => Arc::new(JwtVerifier::hs256(secret)),
            None => {
                tracing::warn!("TENANT_JWT_SECRET is not set; bearer tokens will be rejected");
                Arc::new(RejectAll)
            }
        };
        let admin_verifier: Option<Arc<dyn TokenVerifier>> = match &settings.admin_jwt_secret {
            Some(secret) => Some(Arc::new(JwtVerifier::hs256(secret))),
            None => {
                tracing::warn!("ADMIN_JWT_SECRET is not set; admin routes are unguarded");
                None
            }
        };

        let resolver = Arc::new(TenantResolver::new(directory.clone(), cache.clone(), tenant_verifier));
        let provisioner = Arc::new(TenantProvisioner::new(directory.clone(), cache.clone()));
        AppState {
            settings: Arc::new(settings),
            admin,
            directory,
            cache,
            resolver,
            provisioner,
            admin_verifier,
        }
    }
}
