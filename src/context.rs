//! Per-request tenant resolution.
//!
//! Precedence, first match wins:
//! 1. `tenant_id` claim of a verified bearer token
//! 2. `X-Tenant-ID` header
//! 3. `tenant_slug` query parameter, looked up in the directory
//!
//! A bearer token that fails verification rejects the request outright. When
//! nothing identifies a tenant the context is [`TenantContext::Unresolved`];
//! there is no fallback tenant.

use crate::auth::{extract_bearer_token, TokenVerifier};
use crate::cache::ConnectionCache;
use crate::connection::ConnectionHandle;
use crate::directory::TenantDirectory;
use crate::error::AppError;
use crate::tenant::TenantRecord;
use axum::extract::Query;
use axum::http::{HeaderMap, Uri};
use std::collections::HashMap;
use std::sync::Arc;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const TENANT_SLUG_PARAM: &str = "tenant_slug";

/// Raw tenant hints taken from one request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TenantLookup {
    pub bearer: Option<String>,
    pub header_tenant_id: Option<String>,
    pub slug: Option<String>,
}

impl TenantLookup {
    pub fn from_request(headers: &HeaderMap, uri: &Uri) -> Self {
        let header_tenant_id = headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);
        let slug = Query::<HashMap<String, String>>::try_from_uri(uri)
            .ok()
            .and_then(|Query(mut params)| params.remove(TENANT_SLUG_PARAM))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        TenantLookup {
            bearer: extract_bearer_token(headers),
            header_tenant_id,
            slug,
        }
    }
}

/// Which hint identified the tenant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TenantSource {
    Token,
    Header,
    Slug,
    /// Built by an administrative operation rather than a request.
    Admin,
}

/// An active tenant and its live connection, fixed for one request.
#[derive(Clone, Debug)]
pub struct ResolvedTenant {
    tenant: TenantRecord,
    connection: ConnectionHandle,
    source: TenantSource,
}

impl ResolvedTenant {
    pub fn new(tenant: TenantRecord, connection: ConnectionHandle, source: TenantSource) -> Self {
        ResolvedTenant {
            tenant,
            connection,
            source,
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant.id
    }

    pub fn tenant(&self) -> &TenantRecord {
        &self.tenant
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    pub fn source(&self) -> TenantSource {
        self.source
    }
}

#[derive(Clone, Debug)]
pub enum TenantContext {
    Resolved(ResolvedTenant),
    Unresolved,
}

impl TenantContext {
    /// The resolved tenant, or [`AppError::Unauthorized`] for tenant-scoped callers.
    pub fn require(&self) -> Result<&ResolvedTenant, AppError> {
        match self {
            TenantContext::Resolved(t) => Ok(t),
            TenantContext::Unresolved => Err(AppError::Unauthorized("tenant could not be determined".into())),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, TenantContext::Resolved(_))
    }

    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            TenantContext::Resolved(t) => Some(t.tenant_id()),
            TenantContext::Unresolved => None,
        }
    }
}

pub struct TenantResolver {
    directory: Arc<dyn TenantDirectory>,
    cache: Arc<ConnectionCache>,
    verifier: Arc<dyn TokenVerifier>,
}

impl TenantResolver {
    pub fn new(
        directory: Arc<dyn TenantDirectory>,
        cache: Arc<ConnectionCache>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        TenantResolver {
            directory,
            cache,
            verifier,
        }
    }

    pub async fn resolve(&self, lookup: &TenantLookup) -> Result<TenantContext, AppError> {
        if let Some(token) = &lookup.bearer {
            let claims = self.verifier.verify(token)?;
            match claims.tenant_id.filter(|t| !t.trim().is_empty()) {
                Some(tenant_id) => {
                    tracing::debug!(tenant_id = %tenant_id, "tenant from token claim");
                    return self.admit_id(&tenant_id, TenantSource::Token).await;
                }
                None => tracing::warn!(sub = %claims.sub, "token carries no tenant claim"),
            }
        }

        if let Some(tenant_id) = &lookup.header_tenant_id {
            tracing::debug!(tenant_id = %tenant_id, "tenant from header");
            return self.admit_id(tenant_id, TenantSource::Header).await;
        }

        if let Some(slug) = &lookup.slug {
            match self.directory.find_by_slug(slug).await? {
                Some(tenant) => {
                    tracing::debug!(tenant_id = %tenant.id, slug = %slug, "tenant from slug");
                    return self.admit(tenant, TenantSource::Slug).await;
                }
                None => tracing::warn!(slug = %slug, "no tenant with slug"),
            }
        }

        Ok(TenantContext::Unresolved)
    }

    async fn admit_id(&self, tenant_id: &str, source: TenantSource) -> Result<TenantContext, AppError> {
        match self.directory.find_by_id(tenant_id).await? {
            Some(tenant) => self.admit(tenant, source).await,
            None => {
                tracing::warn!(tenant_id = %tenant_id, "unknown tenant");
                Err(AppError::Unauthorized(format!("unknown tenant {}", tenant_id)))
            }
        }
    }

    async fn admit(&self, tenant: TenantRecord, source: TenantSource) -> Result<TenantContext, AppError> {
        if !tenant.is_active() {
            tracing::warn!(tenant_id = %tenant.id, status = tenant.status.as_str(), "tenant is not active");
            return Err(AppError::Unauthorized(format!("tenant {} is not active", tenant.id)));
        }
        let connection = self.cache.get_connection(&tenant.id).await?;
        Ok(TenantContext::Resolved(ResolvedTenant::new(tenant, connection, source)))
    }
}
