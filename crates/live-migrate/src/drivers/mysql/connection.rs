//! MySQL/MariaDB connection implementation.
//!
//! Implements the `Connection` trait on top of a single `mysql_async::Conn`.
//! At connect time the host name is resolved once and the server's
//! `@@hostname` is recorded, so a consistent-host reconnect can dial the same
//! address and prove it reached the same server.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, SslOpts, Value};
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::core::traits::{Connection, Row, Rows};
use crate::error::{DbError, MigrateError, Result};

/// A single MySQL connection that can be re-established.
pub struct MysqlConnection {
    config: ConnectionConfig,
    conn: Option<Conn>,
    /// IP address the host name resolved to on first connect.
    resolved_addr: String,
    /// `@@hostname` reported by the server on first connect.
    server_hostname: Option<String>,
}

impl MysqlConnection {
    /// Connect using the configuration.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let resolved_addr = resolve(&config.host, config.port).await?;

        let mut conn = Conn::new(build_opts(config, &config.host))
            .await
            .map_err(|e| {
                MigrateError::Connection(format!(
                    "connecting to MySQL at {}:{}: {}",
                    config.host, config.port, e
                ))
            })?;

        let server_hostname = query_hostname(&mut conn)
            .await
            .map_err(|e| MigrateError::Connection(format!("reading @@hostname: {}", e)))?;

        info!(
            "Connected to MySQL: {}:{}/{} (server {}, address {})",
            config.host,
            config.port,
            config.database,
            server_hostname.as_deref().unwrap_or("unknown"),
            resolved_addr
        );

        Ok(Self {
            config: config.clone(),
            conn: Some(conn),
            resolved_addr,
            server_hostname,
        })
    }

    /// Server hostname recorded on first connect.
    pub fn server_hostname(&self) -> Option<&str> {
        self.server_hostname.as_deref()
    }

    /// The live connection, reopened against the original server if an
    /// earlier [`close`](Self::close) left none.
    async fn conn_mut(&mut self) -> std::result::Result<&mut Conn, DbError> {
        if self.conn.is_none() {
            let addr = self.resolved_addr.clone();
            let conn = self.open(&addr, true).await?;
            debug!("Reopened closed connection to {}", addr);
            self.conn = Some(conn);
        }
        self.conn
            .as_mut()
            .ok_or_else(|| DbError::client("connection is closed"))
    }

    /// Dial `host` and, when `verify_host` is set, check it is the server
    /// recorded on first connect.
    async fn open(&self, host: &str, verify_host: bool) -> std::result::Result<Conn, DbError> {
        let mut conn = Conn::new(build_opts(&self.config, host))
            .await
            .map_err(DbError::from)?;

        if verify_host {
            let hostname = query_hostname(&mut conn).await?;
            if hostname != self.server_hostname {
                if let Err(e) = conn.disconnect().await {
                    debug!("Error while disconnecting from the wrong server: {}", e);
                }
                return Err(DbError::client(format!(
                    "reconnected to server {:?}, expected {:?}",
                    hostname, self.server_hostname
                )));
            }
        }
        Ok(conn)
    }

    /// Close the connection.
    pub async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.disconnect().await {
                debug!("Error while disconnecting: {}", e);
            }
        }
    }
}

#[async_trait]
impl Connection for MysqlConnection {
    async fn execute(&mut self, sql: &str) -> std::result::Result<Rows, DbError> {
        let conn = self.conn_mut().await?;
        let rows: Vec<mysql_async::Row> = conn.query(sql).await.map_err(DbError::from)?;
        Ok(rows.iter().map(convert_row).collect())
    }

    async fn is_active(&mut self) -> bool {
        match self.conn.as_mut() {
            Some(conn) => conn.ping().await.is_ok(),
            None => false,
        }
    }

    async fn reconnect(&mut self, consistent_host: bool) -> std::result::Result<(), DbError> {
        let host = if consistent_host {
            self.resolved_addr.clone()
        } else {
            self.config.host.clone()
        };

        // The old handle stays in place until its replacement is verified.
        let conn = self.open(&host, consistent_host).await?;
        if let Some(old) = self.conn.replace(conn) {
            if let Err(e) = old.disconnect().await {
                debug!("Error while disconnecting the old connection: {}", e);
            }
        }

        debug!("Reconnected to {} (consistent_host={})", host, consistent_host);
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mysql"
    }
}

impl From<mysql_async::Error> for DbError {
    fn from(err: mysql_async::Error) -> Self {
        match err {
            mysql_async::Error::Server(server) => DbError::server(server.code, server.message),
            other => DbError::client(other.to_string()),
        }
    }
}

fn build_opts(config: &ConnectionConfig, host: &str) -> Opts {
    let ssl_opts = match config.ssl_mode.to_lowercase().as_str() {
        "disable" => {
            warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
            None
        }
        "prefer" | "require" => Some(SslOpts::default().with_danger_accept_invalid_certs(true)),
        "verify-ca" | "verify_ca" => {
            Some(SslOpts::default().with_danger_skip_domain_validation(true))
        }
        "verify-full" | "verify_identity" => Some(SslOpts::default()),
        _ => {
            warn!(
                "Unknown ssl_mode '{}', defaulting to Preferred",
                config.ssl_mode
            );
            Some(SslOpts::default().with_danger_accept_invalid_certs(true))
        }
    };

    let mut builder = OptsBuilder::default()
        .ip_or_hostname(host)
        .tcp_port(config.port)
        .db_name(Some(&config.database))
        .user(Some(&config.user))
        .pass(Some(&config.password))
        // Use utf8mb4 for full Unicode support
        .init(vec!["SET NAMES utf8mb4"]);

    if let Some(ssl) = ssl_opts {
        builder = builder.ssl_opts(ssl);
    }

    builder.into()
}

async fn resolve(host: &str, port: u16) -> Result<String> {
    let mut addrs = tokio::net::lookup_host((host, port)).await.map_err(|e| {
        MigrateError::Connection(format!("resolving {}:{}: {}", host, port, e))
    })?;
    addrs
        .next()
        .map(|addr| addr.ip().to_string())
        .ok_or_else(|| MigrateError::Connection(format!("{} resolved to no address", host)))
}

async fn query_hostname(conn: &mut Conn) -> std::result::Result<Option<String>, DbError> {
    let hostname: Option<String> = conn
        .query_first("SELECT @@hostname")
        .await
        .map_err(DbError::from)?;
    Ok(hostname)
}

fn convert_row(row: &mysql_async::Row) -> Row {
    (0..row.len())
        .map(|i| row.as_ref(i).and_then(value_to_string))
        .collect()
}

/// Text form of a MySQL value; `None` for NULL.
pub(crate) fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::Int(v) => Some(v.to_string()),
        Value::UInt(v) => Some(v.to_string()),
        Value::Float(v) => Some(v.to_string()),
        Value::Double(v) => Some(v.to_string()),
        Value::Date(y, mo, d, h, mi, s, us) => Some(format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}",
            y, mo, d, h, mi, s, us
        )),
        Value::Time(neg, days, h, mi, s, us) => {
            let hours = *days * 24 + u32::from(*h);
            Some(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                if *neg { "-" } else { "" },
                hours,
                mi,
                s,
                us
            ))
        }
    }
}
