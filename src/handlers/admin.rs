//! Administrative directory handlers: database configs, tenants, provisioning and the connection cache.
//! Every handler takes [`AdminGuard`]; none is tenant-routed.

use crate::error::AppError;
use crate::extractors::AdminGuard;
use crate::response::{created, many, ok};
use crate::service::ProvisionRequest;
use crate::state::AppState;
use crate::tenant::{DatabaseConfigUpdate, NewDatabaseConfig, NewTenant, TenantUpdate};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

pub async fn list_databases(_: AdminGuard, State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(many(state.directory.list_databases().await?))
}

pub async fn read_database(
    _: AdminGuard,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let config = state
        .directory
        .find_database(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("database config {}", id)))?;
    Ok(ok(config))
}

pub async fn create_database(
    _: AdminGuard,
    State(state): State<AppState>,
    Json(input): Json<NewDatabaseConfig>,
) -> Result<impl IntoResponse, AppError> {
    Ok(created(state.directory.create_database(input).await?))
}

/// Changing a config drops every cached connection opened from it.
pub async fn update_database(
    _: AdminGuard,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(changes): Json<DatabaseConfigUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let config = state.directory.update_database(&id, changes).await?;
    state.cache.invalidate_database(&id);
    Ok(ok(config))
}

pub async fn delete_database(
    _: AdminGuard,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.directory.delete_database(&id).await?;
    state.cache.invalidate_database(&id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_tenants(_: AdminGuard, State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(many(state.directory.list_tenants().await?))
}

pub async fn read_tenant(
    _: AdminGuard,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = state
        .directory
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("tenant {}", id)))?;
    Ok(ok(tenant))
}

pub async fn create_tenant(
    _: AdminGuard,
    State(state): State<AppState>,
    Json(input): Json<NewTenant>,
) -> Result<impl IntoResponse, AppError> {
    Ok(created(state.directory.create(input).await?))
}

/// A tenant moved to another database, or deactivated, must not keep its old connection.
pub async fn update_tenant(
    _: AdminGuard,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(changes): Json<TenantUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = state.directory.update(&id, changes).await?;
    state.cache.invalidate(&id);
    Ok(ok(tenant))
}

pub async fn delete_tenant(
    _: AdminGuard,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.directory.soft_delete(&id).await?;
    state.cache.invalidate(&id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn provision_tenant(
    _: AdminGuard,
    State(state): State<AppState>,
    Json(request): Json<ProvisionRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(created(state.provisioner.provision(request).await?))
}

pub async fn cached_connections(_: AdminGuard, State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(many(state.cache.cached_connections()))
}

pub async fn evict_tenant(
    _: AdminGuard,
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.cache.invalidate(&tenant_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("no cached connection for tenant {}", tenant_id)))
    }
}
