//! Tenant directory records: tenants, their database configs, and slug rules.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Maximum slug length.
pub const MAX_SLUG_LEN: usize = 50;

/// Engine backing a tenant's physical database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// File-based embedded engine.
    Sqlite,
    /// Network relational engine.
    Postgres,
}

impl DatabaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseType::Sqlite => "sqlite",
            DatabaseType::Postgres => "postgres",
        }
    }

    /// Infer the engine from a connection URL scheme.
    pub fn from_url(url: &str) -> Option<Self> {
        let url = url.trim();
        if url.starts_with("sqlite:") {
            Some(DatabaseType::Sqlite)
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some(DatabaseType::Postgres)
        } else {
            None
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DatabaseType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(DatabaseType::Sqlite),
            "postgres" | "postgresql" => Ok(DatabaseType::Postgres),
            _ => Err(AppError::Configuration(format!(
                "invalid database type: {} (expected sqlite or postgres)",
                s
            ))),
        }
    }
}

impl TryFrom<String> for DatabaseType {
    type Error = AppError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Inactive,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for TenantStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(TenantStatus::Active),
            "inactive" => Ok(TenantStatus::Inactive),
            _ => Err(AppError::Validation(format!(
                "invalid tenant status: {} (expected active or inactive)",
                s
            ))),
        }
    }
}

impl TryFrom<String> for TenantStatus {
    type Error = AppError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A physical database that one or more tenants route to.
#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type", try_from = "String")]
    pub db_type: DatabaseType,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Directory entry for one tenant.
#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TenantRecord {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub external_id: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: TenantStatus,
    pub database_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TenantRecord {
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active && self.deleted_at.is_none()
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDatabaseConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub db_type: DatabaseType,
    pub url: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfigUpdate {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub db_type: Option<DatabaseType>,
    pub url: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTenant {
    pub name: String,
    /// Derived from `name` when omitted.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub status: Option<TenantStatus>,
    pub database_id: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub external_id: Option<String>,
    pub status: Option<TenantStatus>,
    pub database_id: Option<String>,
}

const SLUG_PATTERN: &str = r"^[a-z0-9]+(?:-[a-z0-9]+)*$";

static SLUG_RE: OnceLock<Regex> = OnceLock::new();

fn slug_regex() -> Result<&'static Regex, AppError> {
    if let Some(re) = SLUG_RE.get() {
        return Ok(re);
    }
    let re = Regex::new(SLUG_PATTERN)
        .map_err(|e| AppError::Validation(format!("invalid slug pattern: {}", e)))?;
    Ok(SLUG_RE.get_or_init(|| re))
}

/// Lowercase alphanumerics separated by single hyphens, at most [`MAX_SLUG_LEN`] chars.
pub fn validate_slug(slug: &str) -> Result<(), AppError> {
    if slug.is_empty() || slug.len() > MAX_SLUG_LEN {
        return Err(AppError::Validation(format!(
            "slug must be 1-{} characters, got {}",
            MAX_SLUG_LEN,
            slug.len()
        )));
    }
    if !slug_regex()?.is_match(slug) {
        return Err(AppError::Validation(format!(
            "slug '{}' must be lowercase alphanumeric words separated by hyphens",
            slug
        )));
    }
    Ok(())
}

/// Derive a slug from a display name: "Acme Corp." -> "acme-corp".
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    if out.len() > MAX_SLUG_LEN {
        out.truncate(MAX_SLUG_LEN);
        while out.ends_with('-') {
            out.pop();
        }
    }
    out
}
