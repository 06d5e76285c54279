//! Tenant users. Passwords arrive in clear as `password` and are stored as a bcrypt hash.

use super::scoped::{Fields, TenantEntity, TenantScopedStore};
use super::validation::{FieldRule, RequestValidator, Rules};
use crate::context::TenantContext;
use crate::error::AppError;
use crate::sql::{Filter, TableSpec};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

const PASSWORD_COST: u32 = 10;

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub tenant_id: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn check_password(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }
}

impl TenantEntity for User {
    const SPEC: TableSpec = TableSpec {
        table: "users",
        columns: &[
            "id",
            "tenant_id",
            "email",
            "name",
            "password_hash",
            "active",
            "created_at",
            "updated_at",
        ],
    };
}

const USER_RULES: Rules = &[
    ("email", FieldRule::text().required().email().max_length(255)),
    ("name", FieldRule::text().required().length(1, 255)),
    ("password", FieldRule::text().required().length(8, 128)),
    ("active", FieldRule::boolean()),
];

pub struct UsersService {
    store: TenantScopedStore<User>,
}

impl UsersService {
    pub fn new(ctx: &TenantContext) -> Result<Self, AppError> {
        Ok(UsersService {
            store: TenantScopedStore::bind(ctx)?,
        })
    }

    pub async fn list(&self) -> Result<Vec<User>, AppError> {
        self.store.find_all().await
    }

    pub async fn get(&self, id: &str) -> Result<User, AppError> {
        self.store
            .find_one(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", id)))
    }

    /// Email lookup within the bound tenant only.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let mut found = self.store.find_by(&Filter::new().eq("email", email.trim())).await?;
        Ok(found.pop())
    }

    pub async fn create(&self, mut body: Fields) -> Result<User, AppError> {
        RequestValidator::validate(&body, USER_RULES)?;
        hash_password_field(&mut body).await?;
        self.store.create(body).await.map_err(email_conflict)
    }

    pub async fn update(&self, id: &str, mut body: Fields) -> Result<User, AppError> {
        RequestValidator::validate_partial(&body, USER_RULES)?;
        hash_password_field(&mut body).await?;
        self.store
            .update(id, body)
            .await
            .map_err(email_conflict)?
            .ok_or_else(|| AppError::NotFound(format!("user {}", id)))
    }

    pub async fn remove(&self, id: &str) -> Result<(), AppError> {
        self.store.remove(id).await
    }
}

fn email_conflict(e: AppError) -> AppError {
    match e {
        AppError::Db(ref db) if crate::error::is_unique_violation(db) => {
            AppError::Conflict("email is already registered for this tenant".into())
        }
        other => other,
    }
}

/// Replace `password` with `password_hash`.
async fn hash_password_field(body: &mut Fields) -> Result<(), AppError> {
    let Some(Value::String(password)) = body.remove("password") else {
        return Ok(());
    };
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, PASSWORD_COST))
        .await
        .map_err(|e| AppError::Internal(format!("password hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))?;
    body.insert("password_hash".into(), Value::String(hashed));
    Ok(())
}
