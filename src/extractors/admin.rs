//! Guard for the administrative routes.

use crate::auth::{extract_bearer_token, Claims};
use crate::error::AppError;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Proof that the caller presented a token signed with the admin secret.
/// Holds `None` when no admin secret is configured.
#[derive(Clone, Debug)]
pub struct AdminGuard(pub Option<Claims>);

#[async_trait]
impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(verifier) = &state.admin_verifier else {
            return Ok(AdminGuard(None));
        };
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("admin token required".into()))?;
        let claims = verifier.verify(&token)?;
        Ok(AdminGuard(Some(claims)))
    }
}
