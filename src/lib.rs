//! Tenant router: per-request tenant resolution, lazily opened per-tenant connections,
//! and a data access layer that confines every query to the resolved tenant.

pub mod auth;
pub mod cache;
pub mod case;
pub mod config;
pub mod connection;
pub mod context;
pub mod directory;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod tenant;

pub use auth::{Claims, JwtVerifier, TokenVerifier};
pub use cache::{CachedConnection, ConnectionCache};
pub use config::{PoolSettings, Settings};
pub use connection::{ConnectionHandle, Connector, EnginePool, SqlxConnector};
pub use context::{ResolvedTenant, TenantContext, TenantLookup, TenantResolver, TenantSource};
pub use directory::{SqlTenantDirectory, TenantDirectory};
pub use error::{AppError, ConfigError};
pub use migration::{MigrationRunner, MigrationSet, SqlMigrationRunner};
pub use routes::{admin_routes, common_routes, tenant_routes};
pub use service::{FriendsService, TenantProvisioner, TenantScopedStore, UsersService};
pub use state::AppState;
pub use tenant::{DatabaseConfig, DatabaseType, TenantRecord, TenantStatus};

use axum::Router;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// The full HTTP surface: common routes at the root, tenant-scoped routes at the root,
/// directory administration under `/admin`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(common_routes(state.clone()))
        .merge(tenant_routes(state.clone()))
        .nest("/admin", admin_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
}
