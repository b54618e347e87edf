//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::connection::RetryPolicy;
use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA256 hash of the configuration.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl RetryConfig {
    /// Resolve into the policy the executor runs with.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            tries: self.tries.max(1),
            base_interval: Duration::try_from_secs_f64(self.base_interval).unwrap_or_default(),
            reconnect_with_consistent_host: self.reconnect_with_consistent_host,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
connection:
  host: db1.internal
  database: app
  user: migrator
  password: hunter2
"#;

    #[test]
    fn test_minimal_yaml_gets_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.connection.port, 3306);
        assert_eq!(config.connection.ssl_mode, "prefer");
        assert_eq!(config.retry.tries, 10);
        assert_eq!(config.retry.base_interval, 1.0);
        assert!(config.retry.reconnect_with_consistent_host);
        assert_eq!(config.migration.stride, 2000);
        assert_eq!(config.migration.throttle_ms, 100);
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
connection:
  host: db1.internal
  port: 3307
  database: app
  user: migrator
  password: hunter2
  ssl_mode: disable
retry:
  tries: 5
  base_interval: 0.5
  reconnect_with_consistent_host: false
migration:
  stride: 500
  throttle_ms: 0
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.connection.port, 3307);
        let policy = config.retry.policy();
        assert_eq!(policy.tries, 5);
        assert_eq!(policy.base_interval, Duration::from_millis(500));
        assert!(!policy.reconnect_with_consistent_host);
        assert_eq!(config.migration.stride, 500);
        assert_eq!(config.migration.throttle(), Duration::ZERO);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(Config::from_yaml("connection: [").is_err());
        assert!(Config::from_yaml("").is_err());
    }

    #[test]
    fn test_validation_runs_on_parse() {
        let yaml = MINIMAL.replace("user: migrator", "user: \"\"");
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("connection.user"));
    }

    #[test]
    fn test_hash_ignores_password() {
        let a = Config::from_yaml(MINIMAL).unwrap();
        let b = Config::from_yaml(&MINIMAL.replace("hunter2", "other")).unwrap();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.hash().len(), 64);
    }
}
