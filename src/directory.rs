//! Tenant directory: tenant and database-config records in the administrative database.

use crate::connection::{on_pool, ConnectionHandle};
use crate::error::{is_unique_violation, AppError};
use crate::tenant::{
    slugify, validate_slug, DatabaseConfig, DatabaseConfigUpdate, DatabaseType, NewDatabaseConfig, NewTenant,
    TenantRecord, TenantStatus, TenantUpdate,
};
use async_trait::async_trait;
use chrono::Utc;

/// Lookups return `Ok(None)` for missing or soft-deleted rows; mutations on a
/// missing id return [`AppError::NotFound`].
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<TenantRecord>, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<TenantRecord>, AppError>;
    async fn list_tenants(&self) -> Result<Vec<TenantRecord>, AppError>;
    async fn create(&self, input: NewTenant) -> Result<TenantRecord, AppError>;
    async fn update(&self, id: &str, changes: TenantUpdate) -> Result<TenantRecord, AppError>;
    async fn soft_delete(&self, id: &str) -> Result<(), AppError>;
    /// Remove the row outright. Only used to roll back a failed provisioning.
    async fn purge(&self, id: &str) -> Result<(), AppError>;

    async fn find_database(&self, id: &str) -> Result<Option<DatabaseConfig>, AppError>;
    async fn list_databases(&self) -> Result<Vec<DatabaseConfig>, AppError>;
    async fn create_database(&self, input: NewDatabaseConfig) -> Result<DatabaseConfig, AppError>;
    async fn update_database(&self, id: &str, changes: DatabaseConfigUpdate) -> Result<DatabaseConfig, AppError>;
    async fn delete_database(&self, id: &str) -> Result<(), AppError>;
}

const TENANT_COLUMNS: &str = "id, slug, name, external_id, status, database_id, created_at, updated_at, deleted_at";
const DATABASE_COLUMNS: &str = "id, name, type, url, created_at, updated_at, deleted_at";

/// [`TenantDirectory`] over the administrative database. Never tenant-routed.
#[derive(Clone, Debug)]
pub struct SqlTenantDirectory {
    admin: ConnectionHandle,
}

impl SqlTenantDirectory {
    pub fn new(admin: ConnectionHandle) -> Self {
        SqlTenantDirectory { admin }
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.admin
    }

    async fn tenant_where(&self, predicate: &str, value: &str) -> Result<Option<TenantRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM tenants WHERE {} = $1 AND deleted_at IS NULL",
            TENANT_COLUMNS, predicate
        );
        let row = on_pool!(self.admin, |pool| {
            sqlx::query_as::<_, TenantRecord>(&sql)
                .bind(value)
                .fetch_optional(pool)
                .await?
        });
        Ok(row)
    }

    async fn require_database(&self, id: &str) -> Result<DatabaseConfig, AppError> {
        self.find_database(id)
            .await?
            .ok_or_else(|| AppError::Validation(format!("database config {} does not exist", id)))
    }

    async fn live_tenants_on(&self, database_id: &str) -> Result<i64, AppError> {
        let (count,): (i64,) = on_pool!(self.admin, |pool| {
            sqlx::query_as("SELECT COUNT(*) FROM tenants WHERE database_id = $1 AND deleted_at IS NULL")
                .bind(database_id)
                .fetch_one(pool)
                .await?
        });
        Ok(count)
    }
}

fn slug_conflict(slug: &str, e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict(format!("slug '{}' is already in use", slug))
    } else {
        AppError::Db(e)
    }
}

fn database_name_conflict(name: &str, e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict(format!("database name '{}' is already in use", name))
    } else {
        AppError::Db(e)
    }
}

fn check_url(db_type: DatabaseType, url: &str) -> Result<(), AppError> {
    match DatabaseType::from_url(url) {
        Some(t) if t == db_type => Ok(()),
        _ => Err(AppError::Validation(format!(
            "url does not match database type {}",
            db_type
        ))),
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

#[async_trait]
impl TenantDirectory for SqlTenantDirectory {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<TenantRecord>, AppError> {
        self.tenant_where("slug", slug).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<TenantRecord>, AppError> {
        self.tenant_where("id", id).await
    }

    async fn list_tenants(&self) -> Result<Vec<TenantRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM tenants WHERE deleted_at IS NULL ORDER BY slug",
            TENANT_COLUMNS
        );
        let rows = on_pool!(self.admin, |pool| {
            sqlx::query_as::<_, TenantRecord>(&sql).fetch_all(pool).await?
        });
        Ok(rows)
    }

    async fn create(&self, input: NewTenant) -> Result<TenantRecord, AppError> {
        require_non_empty("name", &input.name)?;
        let slug = match input.slug {
            Some(s) => s.trim().to_string(),
            None => slugify(&input.name),
        };
        validate_slug(&slug)?;
        self.require_database(&input.database_id).await?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let status = input.status.unwrap_or(TenantStatus::Active);
        let sql = "INSERT INTO tenants (id, slug, name, external_id, status, database_id, created_at, updated_at) \
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $7)";
        on_pool!(self.admin, |pool| {
            sqlx::query(sql)
                .bind(&id)
                .bind(&slug)
                .bind(input.name.trim())
                .bind(&input.external_id)
                .bind(status.as_str())
                .bind(&input.database_id)
                .bind(now)
                .execute(pool)
                .await
                .map_err(|e| slug_conflict(&slug, e))?;
        });
        tracing::info!(tenant_id = %id, slug = %slug, "tenant created");
        self.find_by_id(&id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tenant {}", id)))
    }

    async fn update(&self, id: &str, changes: TenantUpdate) -> Result<TenantRecord, AppError> {
        let current = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tenant {}", id)))?;

        let name = changes.name.unwrap_or(current.name);
        require_non_empty("name", &name)?;
        let slug = changes.slug.map(|s| s.trim().to_string()).unwrap_or(current.slug);
        validate_slug(&slug)?;
        let database_id = changes.database_id.unwrap_or(current.database_id);
        self.require_database(&database_id).await?;
        let external_id = changes.external_id.or(current.external_id);
        let status = changes.status.unwrap_or(current.status);

        let sql = "UPDATE tenants SET slug = $1, name = $2, external_id = $3, status = $4, database_id = $5, updated_at = $6 \
                   WHERE id = $7 AND deleted_at IS NULL";
        let affected = on_pool!(self.admin, |pool| {
            sqlx::query(sql)
                .bind(&slug)
                .bind(name.trim())
                .bind(&external_id)
                .bind(status.as_str())
                .bind(&database_id)
                .bind(Utc::now())
                .bind(id)
                .execute(pool)
                .await
                .map_err(|e| slug_conflict(&slug, e))?
                .rows_affected()
        });
        if affected == 0 {
            return Err(AppError::NotFound(format!("tenant {}", id)));
        }
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tenant {}", id)))
    }

    async fn soft_delete(&self, id: &str) -> Result<(), AppError> {
        let affected = on_pool!(self.admin, |pool| {
            sqlx::query("UPDATE tenants SET deleted_at = $1, updated_at = $1 WHERE id = $2 AND deleted_at IS NULL")
                .bind(Utc::now())
                .bind(id)
                .execute(pool)
                .await?
                .rows_affected()
        });
        if affected == 0 {
            return Err(AppError::NotFound(format!("tenant {}", id)));
        }
        tracing::info!(tenant_id = %id, "tenant soft-deleted");
        Ok(())
    }

    async fn purge(&self, id: &str) -> Result<(), AppError> {
        on_pool!(self.admin, |pool| {
            sqlx::query("DELETE FROM tenants WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await?;
        });
        Ok(())
    }

    async fn find_database(&self, id: &str) -> Result<Option<DatabaseConfig>, AppError> {
        let sql = format!(
            "SELECT {} FROM databases WHERE id = $1 AND deleted_at IS NULL",
            DATABASE_COLUMNS
        );
        let row = on_pool!(self.admin, |pool| {
            sqlx::query_as::<_, DatabaseConfig>(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await?
        });
        Ok(row)
    }

    async fn list_databases(&self) -> Result<Vec<DatabaseConfig>, AppError> {
        let sql = format!(
            "SELECT {} FROM databases WHERE deleted_at IS NULL ORDER BY name",
            DATABASE_COLUMNS
        );
        let rows = on_pool!(self.admin, |pool| {
            sqlx::query_as::<_, DatabaseConfig>(&sql).fetch_all(pool).await?
        });
        Ok(rows)
    }

    async fn create_database(&self, input: NewDatabaseConfig) -> Result<DatabaseConfig, AppError> {
        require_non_empty("name", &input.name)?;
        check_url(input.db_type, &input.url)?;
        let id = uuid::Uuid::new_v4().to_string();
        let name = input.name.trim().to_string();
        on_pool!(self.admin, |pool| {
            sqlx::query(
                "INSERT INTO databases (id, name, type, url, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $5)",
            )
            .bind(&id)
            .bind(&name)
            .bind(input.db_type.as_str())
            .bind(input.url.trim())
            .bind(Utc::now())
            .execute(pool)
            .await
            .map_err(|e| database_name_conflict(&name, e))?;
        });
        tracing::info!(database_id = %id, name = %name, engine = %input.db_type, "database config created");
        self.find_database(&id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("database config {}", id)))
    }

    async fn update_database(&self, id: &str, changes: DatabaseConfigUpdate) -> Result<DatabaseConfig, AppError> {
        let current = self
            .find_database(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("database config {}", id)))?;
        let name = changes.name.map(|n| n.trim().to_string()).unwrap_or(current.name);
        require_non_empty("name", &name)?;
        let db_type = changes.db_type.unwrap_or(current.db_type);
        let url = changes.url.map(|u| u.trim().to_string()).unwrap_or(current.url);
        check_url(db_type, &url)?;

        on_pool!(self.admin, |pool| {
            sqlx::query(
                "UPDATE databases SET name = $1, type = $2, url = $3, updated_at = $4 WHERE id = $5 AND deleted_at IS NULL",
            )
            .bind(&name)
            .bind(db_type.as_str())
            .bind(&url)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| database_name_conflict(&name, e))?;
        });
        self.find_database(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("database config {}", id)))
    }

    async fn delete_database(&self, id: &str) -> Result<(), AppError> {
        // The live-tenant check and the soft delete are one statement.
        let affected = on_pool!(self.admin, |pool| {
            sqlx::query(
                "UPDATE databases SET deleted_at = $1, updated_at = $1 \
                 WHERE id = $2 AND deleted_at IS NULL \
                 AND NOT EXISTS (SELECT 1 FROM tenants WHERE database_id = $2 AND deleted_at IS NULL)",
            )
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?
            .rows_affected()
        });
        if affected == 0 {
            if self.find_database(id).await?.is_none() {
                return Err(AppError::NotFound(format!("database config {}", id)));
            }
            let live = self.live_tenants_on(id).await?;
            return Err(AppError::Conflict(format!(
                "database config {} is still used by {} tenant(s)",
                id, live
            )));
        }
        tracing::info!(database_id = %id, "database config soft-deleted");
        Ok(())
    }
}
