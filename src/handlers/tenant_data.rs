//! Tenant-scoped CRUD handlers. The tenant comes from the [`Tenant`] extractor; bodies never choose it.

use crate::case::object_keys_to_snake_case;
use crate::error::AppError;
use crate::extractors::Tenant;
use crate::response::{created, many, ok};
use crate::service::{Fields, FriendsService, UsersService};
use axum::{extract::Path, http::StatusCode, response::IntoResponse, Json};
use serde_json::Value;

fn body_to_fields(value: Value) -> Result<Fields, AppError> {
    match value {
        Value::Object(m) => Ok(object_keys_to_snake_case(m)),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

pub async fn list_friends(Tenant(ctx): Tenant) -> Result<impl IntoResponse, AppError> {
    Ok(many(FriendsService::new(&ctx)?.list().await?))
}

pub async fn read_friend(Tenant(ctx): Tenant, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(FriendsService::new(&ctx)?.get(&id).await?))
}

pub async fn create_friend(Tenant(ctx): Tenant, Json(body): Json<Value>) -> Result<impl IntoResponse, AppError> {
    let service = FriendsService::new(&ctx)?;
    Ok(created(service.create(body_to_fields(body)?).await?))
}

pub async fn update_friend(
    Tenant(ctx): Tenant,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let service = FriendsService::new(&ctx)?;
    Ok(ok(service.update(&id, body_to_fields(body)?).await?))
}

pub async fn delete_friend(Tenant(ctx): Tenant, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    FriendsService::new(&ctx)?.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_users(Tenant(ctx): Tenant) -> Result<impl IntoResponse, AppError> {
    Ok(many(UsersService::new(&ctx)?.list().await?))
}

pub async fn read_user(Tenant(ctx): Tenant, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(UsersService::new(&ctx)?.get(&id).await?))
}

pub async fn create_user(Tenant(ctx): Tenant, Json(body): Json<Value>) -> Result<impl IntoResponse, AppError> {
    let service = UsersService::new(&ctx)?;
    Ok(created(service.create(body_to_fields(body)?).await?))
}

pub async fn update_user(
    Tenant(ctx): Tenant,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let service = UsersService::new(&ctx)?;
    Ok(ok(service.update(&id, body_to_fields(body)?).await?))
}

pub async fn delete_user(Tenant(ctx): Tenant, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    UsersService::new(&ctx)?.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
