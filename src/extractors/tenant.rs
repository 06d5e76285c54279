//! Resolve the request's tenant from the bearer token, `X-Tenant-ID` header or `tenant_slug` query.

use crate::context::{TenantContext, TenantLookup};
use crate::error::AppError;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Extractor yielding the request's [`TenantContext`]. Unresolved requests still extract;
/// services bound to the context reject them.
#[derive(Clone, Debug)]
pub struct Tenant(pub TenantContext);

#[async_trait]
impl FromRequestParts<AppState> for Tenant {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let lookup = TenantLookup::from_request(&parts.headers, &parts.uri);
        let ctx = state.resolver.resolve(&lookup).await?;
        Ok(Tenant(ctx))
    }
}
