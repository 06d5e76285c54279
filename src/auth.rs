//! Bearer token verification. Token issuance is out of scope; [`JwtVerifier::sign`]
//! exists for tooling and tests.

use crate::error::AppError;
use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Verified claim set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, alias = "tenantId", skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub exp: usize,
}

/// Turns a bearer credential into verified claims or fails with [`AppError::Unauthorized`].
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Claims, AppError>;
}

/// HS256 verifier with `exp` required.
#[derive(Clone)]
pub struct JwtVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn hs256(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        JwtVerifier {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AppError::BadRequest(format!("cannot sign token: {}", e)))
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(format!("invalid token: {}", e)))
    }
}

/// Rejects every token. Used when no signing secret is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct RejectAll;

impl TokenVerifier for RejectAll {
    fn verify(&self, _token: &str) -> Result<Claims, AppError> {
        Err(AppError::Unauthorized("token verification is not configured".into()))
    }
}

/// `Authorization: Bearer <token>`, trimmed. `None` when absent or another scheme.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let v = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let token = v.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn claims(tenant_id: Option<&str>) -> Claims {
        Claims {
            sub: "user-1".into(),
            tenant_id: tenant_id.map(String::from),
            role: None,
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        }
    }

    #[test]
    fn test_sign_then_verify() {
        let v = JwtVerifier::hs256("s3cret");
        let token = v.sign(&claims(Some("t-1"))).unwrap();
        let got = v.verify(&token).unwrap();
        assert_eq!(got.tenant_id.as_deref(), Some("t-1"));
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let token = JwtVerifier::hs256("a").sign(&claims(None)).unwrap();
        let err = JwtVerifier::hs256("b").verify(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_expired_token_is_unauthorized() {
        let v = JwtVerifier::hs256("s3cret");
        let mut c = claims(Some("t-1"));
        c.exp = (chrono::Utc::now().timestamp() - 3600) as usize;
        let token = v.sign(&c).unwrap();
        assert!(matches!(v.verify(&token), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_camel_case_tenant_claim_accepted() {
        let raw = serde_json::json!({"sub": "u", "tenantId": "t-9", "exp": 1});
        let c: Claims = serde_json::from_value(raw).unwrap();
        assert_eq!(c.tenant_id.as_deref(), Some("t-9"));
    }

    #[test]
    fn test_reject_all() {
        assert!(matches!(RejectAll.verify("x"), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut h = HeaderMap::new();
        assert_eq!(extract_bearer_token(&h), None);
        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&h), None);
        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   tok.en  "));
        assert_eq!(extract_bearer_token(&h).as_deref(), Some("tok.en"));
        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&h), None);
    }
}
