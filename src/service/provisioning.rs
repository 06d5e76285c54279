//! Create a tenant together with its first user.
//!
//! The directory row and the tenant database live in different databases, so
//! there is no shared transaction. If the user cannot be created the tenant row
//! is purged, then its cached connection dropped; the caller sees the original
//! error. A failed purge is reported as [`AppError::Internal`] naming the
//! tenant left behind.

use super::scoped::Fields;
use super::users::{User, UsersService};
use crate::cache::ConnectionCache;
use crate::context::{ResolvedTenant, TenantContext, TenantSource};
use crate::directory::TenantDirectory;
use crate::error::AppError;
use crate::tenant::{NewTenant, TenantRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    #[serde(flatten)]
    pub tenant: NewTenant,
    /// Body for the first user, as accepted by [`UsersService::create`].
    pub owner: Fields,
}

#[derive(Clone, Debug, Serialize)]
pub struct Provisioned {
    pub tenant: TenantRecord,
    pub owner: User,
}

pub struct TenantProvisioner {
    directory: Arc<dyn TenantDirectory>,
    cache: Arc<ConnectionCache>,
}

impl TenantProvisioner {
    pub fn new(directory: Arc<dyn TenantDirectory>, cache: Arc<ConnectionCache>) -> Self {
        TenantProvisioner { directory, cache }
    }

    pub async fn provision(&self, request: ProvisionRequest) -> Result<Provisioned, AppError> {
        let tenant = self.directory.create(request.tenant).await?;
        match self.create_owner(&tenant, request.owner).await {
            Ok(owner) => {
                tracing::info!(tenant_id = %tenant.id, slug = %tenant.slug, "tenant provisioned");
                Ok(Provisioned { tenant, owner })
            }
            Err(e) => {
                tracing::warn!(tenant_id = %tenant.id, error = %e, "provisioning failed, rolling back tenant");
                let purged = self.directory.purge(&tenant.id).await;
                self.cache.invalidate(&tenant.id);
                if let Err(rollback) = purged {
                    tracing::error!(tenant_id = %tenant.id, error = %rollback, "rollback failed");
                    return Err(AppError::Internal(format!(
                        "provisioning failed ({}) and rollback failed ({}); tenant {} needs manual cleanup",
                        e, rollback, tenant.id
                    )));
                }
                Err(e)
            }
        }
    }

    async fn create_owner(&self, tenant: &TenantRecord, owner: Fields) -> Result<User, AppError> {
        let connection = self.cache.get_connection(&tenant.id).await?;
        let ctx = TenantContext::Resolved(ResolvedTenant::new(tenant.clone(), connection, TenantSource::Admin));
        UsersService::new(&ctx)?.create(owner).await
    }
}
