//! Settings validation.

use crate::config::Settings;
use crate::error::ConfigError;
use crate::tenant::DatabaseType;

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                key: crate::config::keys::TENANT_POOL_MAX_CONNECTIONS,
                reason: "must be at least 1".into(),
            });
        }
        if self.pool.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: crate::config::keys::TENANT_CONNECT_TIMEOUT_SECS,
                reason: "must be at least 1 second".into(),
            });
        }
        if DatabaseType::from_url(&self.admin_database_url).is_none() {
            return Err(ConfigError::UnsupportedUrl(self.admin_database_url.clone()));
        }
        Ok(())
    }
}
