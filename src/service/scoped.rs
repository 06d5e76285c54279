//! Tenant-scoped data access.
//!
//! A [`TenantScopedStore`] is bound to one resolved tenant and its connection at
//! construction. Every statement it issues comes from [`crate::sql`] builders,
//! which always predicate on the bound `tenant_id`; rows of other tenants are
//! indistinguishable from rows that do not exist.

use crate::connection::{on_pool, ConnectionHandle};
use crate::context::{ResolvedTenant, TenantContext};
use crate::error::AppError;
use crate::sql::{
    count_where, delete, insert, select_by_id, select_where, update, Assignments, Filter, QueryBuf, SqlValue,
    TableSpec, RESERVED_COLUMNS, TENANT_COLUMN,
};
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::FromRow;
use std::marker::PhantomData;

/// Caller-supplied column values, keyed by snake_case column name.
pub type Fields = Map<String, Value>;

/// A row type stored in a tenant database with a `tenant_id` column.
pub trait TenantEntity:
    for<'r> FromRow<'r, SqliteRow> + for<'r> FromRow<'r, PgRow> + Send + Sync + Unpin + 'static
{
    const SPEC: TableSpec;
}

pub struct TenantScopedStore<E> {
    tenant_id: String,
    connection: ConnectionHandle,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for TenantScopedStore<E> {
    fn clone(&self) -> Self {
        TenantScopedStore {
            tenant_id: self.tenant_id.clone(),
            connection: self.connection.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: TenantEntity> TenantScopedStore<E> {
    /// Bind to the request's tenant. Fails with [`AppError::Unauthorized`] when unresolved.
    pub fn bind(ctx: &TenantContext) -> Result<Self, AppError> {
        Ok(Self::for_tenant(ctx.require()?))
    }

    pub fn for_tenant(tenant: &ResolvedTenant) -> Self {
        TenantScopedStore {
            tenant_id: tenant.tenant_id().to_string(),
            connection: tenant.connection().clone(),
            _entity: PhantomData,
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub async fn find_all(&self) -> Result<Vec<E>, AppError> {
        self.find_by(&Filter::new()).await
    }

    /// Rows of the bound tenant matching every equality in `filter`.
    pub async fn find_by(&self, filter: &Filter) -> Result<Vec<E>, AppError> {
        let q = select_where(&E::SPEC, &self.tenant_id, filter)?;
        self.fetch_all(&q).await
    }

    pub async fn find_one(&self, id: &str) -> Result<Option<E>, AppError> {
        let q = select_by_id(&E::SPEC, &self.tenant_id, id);
        self.fetch_optional(&q).await
    }

    pub async fn count(&self, filter: &Filter) -> Result<i64, AppError> {
        let q = count_where(&E::SPEC, &self.tenant_id, filter)?;
        tracing::debug!(tenant_id = %self.tenant_id, sql = %q.sql, "scoped count");
        let (n,): (i64,) = on_pool!(self.connection, |pool| {
            let mut query = sqlx::query_as(&q.sql);
            for p in &q.params {
                query = query.bind(p.clone());
            }
            query.fetch_one(pool).await?
        });
        Ok(n)
    }

    /// Insert a row owned by the bound tenant. Any `tenant_id` or `id` in `data` is ignored.
    pub async fn create(&self, data: Fields) -> Result<E, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let values = self.assignments(data)?;
        let q = insert(&E::SPEC, &self.tenant_id, &id, &values, Utc::now())?;
        self.execute(&q).await?;
        self.find_one(&id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", E::SPEC.table, id)))
    }

    /// Update the bound tenant's row `id`. `None` when no such row exists for this tenant.
    pub async fn update(&self, id: &str, data: Fields) -> Result<Option<E>, AppError> {
        let values = self.assignments(data)?;
        let q = update(&E::SPEC, &self.tenant_id, id, &values, Utc::now())?;
        if self.execute(&q).await? == 0 {
            return Ok(None);
        }
        self.find_one(id).await
    }

    /// Delete the bound tenant's row `id`, or [`AppError::NotFound`] when it has none.
    pub async fn remove(&self, id: &str) -> Result<(), AppError> {
        let q = delete(&E::SPEC, &self.tenant_id, id);
        if self.execute(&q).await? == 0 {
            return Err(AppError::NotFound(format!("{} {}", E::SPEC.table, id)));
        }
        Ok(())
    }

    fn assignments(&self, data: Fields) -> Result<Assignments, AppError> {
        let mut out = Vec::with_capacity(data.len());
        for (col, v) in data {
            if RESERVED_COLUMNS.contains(&col.as_str()) {
                if col == TENANT_COLUMN {
                    tracing::debug!(tenant_id = %self.tenant_id, "ignoring caller-supplied tenant_id");
                }
                continue;
            }
            out.push((col, SqlValue::from_json(&v)?));
        }
        Ok(out)
    }

    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<E>, AppError> {
        tracing::debug!(tenant_id = %self.tenant_id, sql = %q.sql, "scoped query");
        let rows = on_pool!(self.connection, |pool| {
            let mut query = sqlx::query_as::<_, E>(&q.sql);
            for p in &q.params {
                query = query.bind(p.clone());
            }
            query.fetch_all(pool).await?
        });
        Ok(rows)
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<E>, AppError> {
        tracing::debug!(tenant_id = %self.tenant_id, sql = %q.sql, "scoped query");
        let row = on_pool!(self.connection, |pool| {
            let mut query = sqlx::query_as::<_, E>(&q.sql);
            for p in &q.params {
                query = query.bind(p.clone());
            }
            query.fetch_optional(pool).await?
        });
        Ok(row)
    }

    async fn execute(&self, q: &QueryBuf) -> Result<u64, AppError> {
        tracing::debug!(tenant_id = %self.tenant_id, sql = %q.sql, "scoped write");
        let affected = on_pool!(self.connection, |pool| {
            let mut query = sqlx::query(&q.sql);
            for p in &q.params {
                query = query.bind(p.clone());
            }
            query.execute(pool).await?.rows_affected()
        });
        Ok(affected)
    }
}
