//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.connection.host.is_empty() {
        return Err(MigrateError::Config("connection.host is required".into()));
    }
    if config.connection.database.is_empty() {
        return Err(MigrateError::Config(
            "connection.database is required".into(),
        ));
    }
    if config.connection.user.is_empty() {
        return Err(MigrateError::Config("connection.user is required".into()));
    }
    match config.connection.ssl_mode.to_lowercase().as_str() {
        "disable" | "prefer" | "require" | "verify-ca" | "verify_ca" | "verify-full"
        | "verify_identity" => {}
        other => {
            return Err(MigrateError::Config(format!(
                "connection.ssl_mode '{}' is not one of disable, prefer, require, verify-ca, verify-full",
                other
            )));
        }
    }

    if config.retry.tries == 0 {
        return Err(MigrateError::Config(
            "retry.tries must be at least 1".into(),
        ));
    }
    if !config.retry.base_interval.is_finite() || config.retry.base_interval < 0.0 {
        return Err(MigrateError::Config(format!(
            "retry.base_interval must be a non-negative number of seconds, got {}",
            config.retry.base_interval
        )));
    }

    if config.migration.stride == 0 {
        return Err(MigrateError::Config(
            "migration.stride must be at least 1".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionConfig, MigrationConfig, RetryConfig};

    fn valid_config() -> Config {
        Config {
            connection: ConnectionConfig {
                host: "localhost".to_string(),
                port: 3306,
                database: "app".to_string(),
                user: "migrator".to_string(),
                password: "password".to_string(),
                ssl_mode: "disable".to_string(),
            },
            retry: RetryConfig::default(),
            migration: MigrationConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_host() {
        let mut config = valid_config();
        config.connection.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_ssl_mode() {
        let mut config = valid_config();
        config.connection.ssl_mode = "sometimes".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("ssl_mode"));
    }

    #[test]
    fn test_zero_tries() {
        let mut config = valid_config();
        config.retry.tries = 0;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("retry.tries"));
    }

    #[test]
    fn test_negative_or_nan_base_interval() {
        let mut config = valid_config();
        config.retry.base_interval = -1.0;
        assert!(validate(&config).is_err());
        config.retry.base_interval = f64::NAN;
        assert!(validate(&config).is_err());
        config.retry.base_interval = 0.0;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_stride() {
        let mut config = valid_config();
        config.migration.stride = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_connection_config_debug_redacts_password() {
        let mut config = valid_config();
        config.connection.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.connection);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }

    #[test]
    fn test_connection_config_password_not_serialized() {
        let mut config = valid_config();
        config.connection.password = "secret_password".to_string();
        let json = serde_json::to_string(&config.connection).unwrap();
        assert!(
            !json.contains("secret_password"),
            "Password was serialized: {}",
            json
        );
    }
}
