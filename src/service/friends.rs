//! Friends: the reference tenant-scoped entity.

use super::scoped::{Fields, TenantEntity, TenantScopedStore};
use super::validation::{FieldRule, RequestValidator, Rules};
use crate::context::TenantContext;
use crate::error::AppError;
use crate::sql::TableSpec;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub phone_number: Option<String>,
    pub preferred_drink: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantEntity for Friend {
    const SPEC: TableSpec = TableSpec {
        table: "friends",
        columns: &[
            "id",
            "tenant_id",
            "name",
            "phone_number",
            "preferred_drink",
            "created_at",
            "updated_at",
        ],
    };
}

const FRIEND_RULES: Rules = &[
    ("name", FieldRule::text().required().length(1, 255)),
    ("phone_number", FieldRule::text().nullable().max_length(32)),
    ("preferred_drink", FieldRule::text().nullable().max_length(100)),
];

pub struct FriendsService {
    store: TenantScopedStore<Friend>,
}

impl FriendsService {
    pub fn new(ctx: &TenantContext) -> Result<Self, AppError> {
        Ok(FriendsService {
            store: TenantScopedStore::bind(ctx)?,
        })
    }

    pub async fn list(&self) -> Result<Vec<Friend>, AppError> {
        self.store.find_all().await
    }

    pub async fn get(&self, id: &str) -> Result<Friend, AppError> {
        self.store
            .find_one(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("friend {}", id)))
    }

    pub async fn create(&self, body: Fields) -> Result<Friend, AppError> {
        RequestValidator::validate(&body, FRIEND_RULES)?;
        self.store.create(body).await
    }

    pub async fn update(&self, id: &str, body: Fields) -> Result<Friend, AppError> {
        RequestValidator::validate_partial(&body, FRIEND_RULES)?;
        self.store
            .update(id, body)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("friend {}", id)))
    }

    pub async fn remove(&self, id: &str) -> Result<(), AppError> {
        self.store.remove(id).await
    }
}
