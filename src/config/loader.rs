//! Load settings from the process environment (optionally seeded from `.env`).

use crate::config::types::{keys, PoolSettings, Settings, DEFAULT_ADMIN_DATABASE_URL, DEFAULT_BIND_ADDR};
use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

impl Settings {
    /// Read settings from the environment after loading `.env` if present, then validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = PoolSettings::default();

        let max_connections = match get(keys::TENANT_POOL_MAX_CONNECTIONS) {
            Some(v) => v.parse::<u32>().map_err(|e| ConfigError::InvalidValue {
                key: keys::TENANT_POOL_MAX_CONNECTIONS,
                reason: e.to_string(),
            })?,
            None => defaults.max_connections,
        };
        let connect_timeout = match get(keys::TENANT_CONNECT_TIMEOUT_SECS) {
            Some(v) => Duration::from_secs(v.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                key: keys::TENANT_CONNECT_TIMEOUT_SECS,
                reason: e.to_string(),
            })?),
            None => defaults.connect_timeout,
        };
        let create_missing_databases = match get(keys::CREATE_MISSING_DATABASES) {
            Some(v) => parse_bool(&v).ok_or_else(|| ConfigError::InvalidValue {
                key: keys::CREATE_MISSING_DATABASES,
                reason: format!("expected true/false, got {}", v),
            })?,
            None => defaults.create_missing_databases,
        };

        let settings = Settings {
            admin_database_url: get(keys::ADMIN_DATABASE_URL).unwrap_or_else(|| DEFAULT_ADMIN_DATABASE_URL.into()),
            tenant_jwt_secret: get(keys::TENANT_JWT_SECRET),
            admin_jwt_secret: get(keys::ADMIN_JWT_SECRET),
            pool: PoolSettings {
                data_dir: get(keys::TENANT_DATA_DIR).map(PathBuf::from).unwrap_or(defaults.data_dir),
                max_connections,
                connect_timeout,
                create_missing_databases,
            },
            bind_addr: get(keys::BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
        };
        settings.validate()?;
        Ok(settings)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.admin_database_url, DEFAULT_ADMIN_DATABASE_URL);
        assert!(settings.tenant_jwt_secret.is_none());
        assert!(settings.admin_jwt_secret.is_none());
        assert_eq!(settings.pool.max_connections, 5);
        assert_eq!(settings.pool.connect_timeout, Duration::from_secs(30));
        assert!(!settings.pool.create_missing_databases);
        assert_eq!(settings.bind_addr, DEFAULT_BIND_ADDR);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let settings = Settings::from_lookup(lookup(&[
            (keys::ADMIN_DATABASE_URL, "postgres://u:p@db:5432/admin"),
            (keys::TENANT_JWT_SECRET, "s3cret"),
            (keys::TENANT_DATA_DIR, "/var/lib/tenants"),
            (keys::TENANT_POOL_MAX_CONNECTIONS, "12"),
            (keys::TENANT_CONNECT_TIMEOUT_SECS, "3"),
            (keys::CREATE_MISSING_DATABASES, "yes"),
        ]))
        .unwrap();
        assert_eq!(settings.admin_database_url, "postgres://u:p@db:5432/admin");
        assert_eq!(settings.tenant_jwt_secret.as_deref(), Some("s3cret"));
        assert_eq!(settings.pool.data_dir, PathBuf::from("/var/lib/tenants"));
        assert_eq!(settings.pool.max_connections, 12);
        assert_eq!(settings.pool.connect_timeout, Duration::from_secs(3));
        assert!(settings.pool.create_missing_databases);
    }

    #[test]
    fn test_blank_secret_counts_as_unset() {
        let settings = Settings::from_lookup(lookup(&[(keys::TENANT_JWT_SECRET, "   ")])).unwrap();
        assert!(settings.tenant_jwt_secret.is_none());
    }

    #[test]
    fn test_rejects_non_numeric_pool_size() {
        let err = Settings::from_lookup(lookup(&[(keys::TENANT_POOL_MAX_CONNECTIONS, "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == keys::TENANT_POOL_MAX_CONNECTIONS));
    }
}
