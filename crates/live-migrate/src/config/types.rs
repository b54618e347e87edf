//! Configuration type definitions.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection settings.
    pub connection: ConnectionConfig,

    /// Retry policy for statements issued during the migration.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Row copy behaviour.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// MySQL connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database (schema) name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password. Never serialized.
    #[serde(default, skip_serializing)]
    pub password: String,

    /// SSL mode (default: "prefer").
    #[serde(default = "default_prefer")]
    pub ssl_mode: String,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Retry configuration for lock wait timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts per statement (default: 10).
    #[serde(default = "default_tries")]
    pub tries: u32,

    /// Backoff unit in seconds (default: 1.0). Attempt `n` waits `n` units.
    #[serde(default = "default_base_interval")]
    pub base_interval: f64,

    /// Reconnect to the same physical server after a failure (default: true).
    #[serde(default = "default_true")]
    pub reconnect_with_consistent_host: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            tries: default_tries(),
            base_interval: default_base_interval(),
            reconnect_with_consistent_host: true,
        }
    }
}

/// Row copy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Primary key values covered by one chunk (default: 2000).
    #[serde(default = "default_stride")]
    pub stride: u64,

    /// Pause between chunks in milliseconds (default: 100).
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            stride: default_stride(),
            throttle_ms: default_throttle_ms(),
        }
    }
}

impl MigrationConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_prefer() -> String {
    "prefer".to_string()
}

fn default_tries() -> u32 {
    10
}

fn default_base_interval() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_stride() -> u64 {
    2000
}

fn default_throttle_ms() -> u64 {
    100
}
