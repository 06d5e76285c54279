//! Per-tenant connection cache.
//!
//! ```text
//! ConnectionCache
//!        │
//!        └── slots: DashMap<tenant_id, Arc<Slot>>
//!              ├── "acme"   → OnceCell (filled: live handle)
//!              └── "globex" → OnceCell (empty: cold start in flight)
//! ```
//!
//! A cold tenant is resolved through the [`TenantDirectory`], opened by the
//! [`Connector`] and migrated by the [`MigrationRunner`] inside its slot's
//! `OnceCell`, so concurrent first requests share one initialization and
//! different tenants initialize concurrently. Failures are returned to the
//! caller and never cached.
//!
//! Invalidation removes the slot. A cold start whose slot was removed while it
//! ran may have read a stale config, so its handle is not served and the
//! initialization is repeated against the current directory state.

use crate::connection::{ConnectionHandle, Connector};
use crate::directory::TenantDirectory;
use crate::error::AppError;
use crate::migration::{MigrationRunner, MigrationSet};
use crate::tenant::DatabaseType;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Cold starts per call before giving up on a config that keeps changing.
const MAX_INIT_ATTEMPTS: usize = 3;

#[derive(Default)]
struct Slot {
    cell: OnceCell<ConnectionHandle>,
}

/// A cached connection, as reported to administrators.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedConnection {
    pub tenant_id: String,
    pub database_id: String,
    pub engine: DatabaseType,
    pub opened_at: DateTime<Utc>,
}

pub struct ConnectionCache {
    directory: Arc<dyn TenantDirectory>,
    connector: Arc<dyn Connector>,
    migrator: Arc<dyn MigrationRunner>,
    connect_timeout: Duration,
    slots: DashMap<String, Arc<Slot>>,
}

impl ConnectionCache {
    pub fn new(
        directory: Arc<dyn TenantDirectory>,
        connector: Arc<dyn Connector>,
        migrator: Arc<dyn MigrationRunner>,
        connect_timeout: Duration,
    ) -> Self {
        ConnectionCache {
            directory,
            connector,
            migrator,
            connect_timeout,
            slots: DashMap::new(),
        }
    }

    /// Return the live, migrated connection for `tenant_id`, opening it on first use.
    pub async fn get_connection(&self, tenant_id: &str) -> Result<ConnectionHandle, AppError> {
        for _ in 0..MAX_INIT_ATTEMPTS {
            let slot = self.slot(tenant_id);
            if let Some(handle) = slot.cell.get() {
                if handle.is_healthy() {
                    tracing::debug!(tenant_id = %tenant_id, "connection cache hit");
                    return Ok(handle.clone());
                }
                tracing::warn!(tenant_id = %tenant_id, "cached connection is closed, reopening");
                self.discard(tenant_id, &slot);
                continue;
            }

            let init = slot.cell.get_or_try_init(|| self.initialize(tenant_id));
            let handle = match tokio::time::timeout(self.connect_timeout, init).await {
                Ok(Ok(handle)) => handle.clone(),
                Ok(Err(e)) => {
                    self.discard_empty(tenant_id, &slot);
                    tracing::error!(tenant_id = %tenant_id, error = %e, "tenant connection failed");
                    return Err(e);
                }
                Err(_) => {
                    self.discard_empty(tenant_id, &slot);
                    tracing::error!(
                        tenant_id = %tenant_id,
                        timeout_ms = self.connect_timeout.as_millis() as u64,
                        "tenant connection timed out"
                    );
                    return Err(AppError::connection_failure(
                        tenant_id,
                        format!("open and migrate timed out after {:?}", self.connect_timeout),
                    ));
                }
            };

            if self.is_current(tenant_id, &slot) {
                return Ok(handle);
            }
            tracing::info!(tenant_id = %tenant_id, "invalidated during initialization, reopening");
        }
        Err(AppError::connection_failure(
            tenant_id,
            "configuration kept changing during initialization",
        ))
    }

    fn slot(&self, tenant_id: &str) -> Arc<Slot> {
        let existing = self.slots.get(tenant_id).map(|s| s.value().clone());
        match existing {
            Some(slot) => slot,
            None => self.slots.entry(tenant_id.to_string()).or_default().value().clone(),
        }
    }

    fn is_current(&self, tenant_id: &str, slot: &Arc<Slot>) -> bool {
        self.slots
            .get(tenant_id)
            .map(|s| Arc::ptr_eq(s.value(), slot))
            .unwrap_or(false)
    }

    fn discard(&self, tenant_id: &str, slot: &Arc<Slot>) {
        self.slots.remove_if(tenant_id, |_, s| Arc::ptr_eq(s, slot));
    }

    /// Drop a slot whose initialization failed, unless a concurrent caller filled it.
    fn discard_empty(&self, tenant_id: &str, slot: &Arc<Slot>) {
        self.slots
            .remove_if(tenant_id, |_, s| Arc::ptr_eq(s, slot) && !s.cell.initialized());
    }

    async fn initialize(&self, tenant_id: &str) -> Result<ConnectionHandle, AppError> {
        let tenant = self
            .directory
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tenant {}", tenant_id)))?;
        let config = self
            .directory
            .find_database(&tenant.database_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "database config {} for tenant {}",
                    tenant.database_id, tenant_id
                ))
            })?;

        let handle = self.connector.connect(&config).await.map_err(|e| match e {
            AppError::Configuration(_) => e,
            other => AppError::connection_failure(tenant_id, other),
        })?;

        let applied = match self.migrator.run(&handle, MigrationSet::Tenant).await {
            Ok(applied) => applied,
            Err(e) => {
                handle.close().await;
                return Err(AppError::connection_failure(tenant_id, format!("migration failed: {}", e)));
            }
        };
        tracing::info!(
            tenant_id = %tenant_id,
            database = %config.name,
            engine = %config.db_type,
            migrations_applied = applied.len(),
            "tenant connection initialized"
        );
        Ok(handle)
    }

    /// Drop the tenant's entry, including a cold start in flight. Returns whether a live
    /// handle was cached. In-flight users keep their clone until they finish.
    pub fn invalidate(&self, tenant_id: &str) -> bool {
        let removed = self
            .slots
            .remove(tenant_id)
            .map(|(_, slot)| slot.cell.initialized())
            .unwrap_or(false);
        if removed {
            tracing::info!(tenant_id = %tenant_id, "invalidated tenant connection");
        }
        removed
    }

    /// Drop every cached handle opened from database config `database_id`, and every cold
    /// start in flight since its config may predate the change. Returns the tenants whose
    /// live handle was evicted, sorted.
    pub fn invalidate_database(&self, database_id: &str) -> Vec<String> {
        let mut evicted = Vec::new();
        self.slots.retain(|tenant_id, slot| match slot.cell.get() {
            Some(handle) if handle.database_id() == database_id => {
                evicted.push(tenant_id.clone());
                false
            }
            Some(_) => true,
            None => false,
        });
        evicted.sort();
        if !evicted.is_empty() {
            tracing::info!(database_id = %database_id, tenants = evicted.len(), "invalidated database connections");
        }
        evicted
    }

    /// Tenant ids with a live cached handle, sorted.
    pub fn cached_tenants(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .slots
            .iter()
            .filter(|e| e.value().cell.initialized())
            .map(|e| e.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Every live cached handle, sorted by tenant id.
    pub fn cached_connections(&self) -> Vec<CachedConnection> {
        let mut out: Vec<CachedConnection> = self
            .slots
            .iter()
            .filter_map(|e| {
                e.value().cell.get().map(|h| CachedConnection {
                    tenant_id: e.key().clone(),
                    database_id: h.database_id().to_string(),
                    engine: h.engine(),
                    opened_at: h.opened_at(),
                })
            })
            .collect();
        out.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));
        out
    }

    /// Close and forget every cached pool.
    pub async fn shutdown(&self) {
        let drained: Vec<Arc<Slot>> = self.slots.iter().map(|e| e.value().clone()).collect();
        self.slots.clear();
        let mut closed = 0;
        for slot in &drained {
            if let Some(handle) = slot.cell.get() {
                handle.close().await;
                closed += 1;
            }
        }
        tracing::info!(closed, "connection cache shut down");
    }
}
