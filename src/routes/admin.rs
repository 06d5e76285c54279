//! Administrative routes, mounted under `/admin`.

use crate::handlers::admin::{
    cached_connections, create_database, create_tenant, delete_database, delete_tenant, evict_tenant,
    list_databases, list_tenants, provision_tenant, read_database, read_tenant, update_database,
    update_tenant,
};
use crate::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};

pub fn admin_routes(state: AppState) -> Router {
    Router::new()
        .route("/databases", get(list_databases).post(create_database))
        .route(
            "/databases/:id",
            get(read_database).patch(update_database).delete(delete_database),
        )
        .route("/tenants", get(list_tenants).post(create_tenant))
        .route("/tenants/provision", post(provision_tenant))
        .route(
            "/tenants/:id",
            get(read_tenant).patch(update_tenant).delete(delete_tenant),
        )
        .route("/cache", get(cached_connections))
        .route("/cache/:tenant_id", delete(evict_tenant))
        .with_state(state)
}
