//! Resilient statement execution.
//!
//! [`ResilientExecutor`] owns the single connection a migration run uses and
//! runs every statement through a retry policy:
//!
//! - fatal errors (syntax, permissions, read-only server, ...) are returned
//!   on first occurrence
//! - lock wait timeouts reconnect, wait `base_interval * attempt` and re-issue
//!   the same statement, up to `tries` attempts in total
//!
//! `CREATE TRIGGER` and `DROP TRIGGER` need a metadata lock on the origin
//! table, which long transactions or concurrent DDL can hold for a while.
//! Without retries a single timeout would abort the run.

use std::time::Duration;

use tracing::{debug, warn};

use crate::core::traits::{Connection, Rows};
use crate::error::{ErrorKind, MigrateError, Result};

/// Retry policy for one executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts per statement, including the first.
    pub tries: u32,

    /// Backoff unit. Retry `n` waits `n * base_interval`.
    pub base_interval: Duration,

    /// Reconnect to the server the executor was first bound to, never to
    /// another member of a pool.
    pub reconnect_with_consistent_host: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            tries: 10,
            base_interval: Duration::from_secs(1),
            reconnect_with_consistent_host: true,
        }
    }
}

impl RetryPolicy {
    /// Set the maximum number of attempts (at least 1).
    pub fn with_tries(mut self, tries: u32) -> Self {
        self.tries = tries.max(1);
        self
    }

    /// Set the backoff unit.
    pub fn with_base_interval(mut self, base_interval: Duration) -> Self {
        self.base_interval = base_interval;
        self
    }

    /// Require reconnects to reach the original server.
    pub fn with_consistent_host(mut self, enabled: bool) -> Self {
        self.reconnect_with_consistent_host = enabled;
        self
    }

    /// Wait before re-issuing after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_interval.saturating_mul(attempt)
    }
}

/// Executes statements on one owned connection with retries.
pub struct ResilientExecutor {
    conn: Box<dyn Connection>,
    policy: RetryPolicy,
}

impl ResilientExecutor {
    pub fn new(conn: Box<dyn Connection>, policy: RetryPolicy) -> Self {
        Self { conn, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run one statement, retrying lock wait timeouts.
    ///
    /// Returns the last error once `tries` attempts have timed out.
    pub async fn execute(&mut self, sql: &str) -> Result<Rows> {
        let tries = self.policy.tries.max(1);
        let mut attempt: u32 = 1;

        loop {
            let err = match self.conn.execute(sql).await {
                Ok(rows) => return Ok(rows),
                Err(err) => err,
            };

            match err.kind() {
                ErrorKind::Fatal => {
                    debug!("Statement failed with non-retriable error: {}", err);
                    return Err(MigrateError::Database(err));
                }
                ErrorKind::RetriableLockTimeout if attempt >= tries => {
                    warn!(
                        "Lock wait timeout persisted after {} attempts, giving up: {}",
                        attempt, sql
                    );
                    return Err(MigrateError::Database(err));
                }
                ErrorKind::RetriableLockTimeout => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        "Lock wait timeout, retry {}/{} in {:?}: {}",
                        attempt,
                        tries - 1,
                        delay,
                        sql
                    );
                    self.reconnect().await?;
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Run statements in order, stopping at the first failure.
    pub async fn execute_all<S: AsRef<str>>(&mut self, statements: &[S]) -> Result<()> {
        for sql in statements {
            self.execute(sql.as_ref()).await?;
        }
        Ok(())
    }

    /// Whether the underlying connection responds.
    pub async fn is_active(&mut self) -> bool {
        self.conn.is_active().await
    }

    pub fn db_type(&self) -> &str {
        self.conn.db_type()
    }

    async fn reconnect(&mut self) -> Result<()> {
        let consistent_host = self.policy.reconnect_with_consistent_host;
        self.conn.reconnect(consistent_host).await.map_err(|e| {
            MigrateError::Connection(format!(
                "reconnect (consistent_host={}) failed: {}",
                consistent_host, e
            ))
        })?;

        if !self.conn.is_active().await {
            return Err(MigrateError::Connection(
                "connection is not active after reconnect".into(),
            ));
        }
        debug!("Reconnected (consistent_host={})", consistent_host);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::testing::{dummy, ScriptedConnection};

    fn policy(tries: u32) -> RetryPolicy {
        RetryPolicy::default()
            .with_tries(tries)
            .with_base_interval(Duration::ZERO)
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.tries, 10);
        assert!(policy.base_interval > Duration::ZERO);
        assert!(policy.reconnect_with_consistent_host);
    }

    #[test]
    fn test_backoff_is_linear() {
        let policy = RetryPolicy::default().with_base_interval(Duration::from_millis(200));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(5), Duration::from_millis(1000));
    }

    #[test]
    fn test_with_tries_floors_at_one() {
        assert_eq!(RetryPolicy::default().with_tries(0).tries, 1);
    }

    #[tokio::test]
    async fn test_success_needs_no_retry() {
        let (conn, handle) = ScriptedConnection::new();
        let mut exec = ResilientExecutor::new(Box::new(conn.with_script(vec![dummy()])), policy(3));

        let rows = exec.execute("select 1").await.unwrap();
        assert_eq!(rows, vec![vec![Some("dummy".to_string())]]);
        assert_eq!(handle.attempts(), 1);
        assert!(handle.reconnects().is_empty());
    }

    #[tokio::test]
    async fn test_lock_timeout_then_success() {
        let (conn, handle) = ScriptedConnection::new();
        let conn = conn.with_script(vec![Err(DbError::lock_wait_timeout()), dummy()]);
        let mut exec = ResilientExecutor::new(Box::new(conn), policy(3));

        assert!(exec.execute("create trigger t").await.is_ok());
        assert_eq!(handle.attempts(), 2);
        assert_eq!(handle.reconnects(), vec![true]);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let (conn, handle) = ScriptedConnection::new();
        let conn = conn.with_script(vec![Err(DbError::server(1290, "read-only"))]);
        let mut exec = ResilientExecutor::new(Box::new(conn), policy(10));

        let err = exec.execute("create trigger t").await.unwrap_err();
        assert_eq!(err.db_error().unwrap().code, Some(1290));
        assert_eq!(handle.attempts(), 1);
        assert!(handle.reconnects().is_empty());
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_timeout() {
        let (conn, handle) = ScriptedConnection::new();
        let conn = conn.with_script((0..10).map(|_| Err(DbError::lock_wait_timeout())).collect());
        let mut exec = ResilientExecutor::new(Box::new(conn), policy(4));

        let err = exec.execute("create trigger t").await.unwrap_err();
        assert_eq!(err.db_error().unwrap().kind(), ErrorKind::RetriableLockTimeout);
        assert_eq!(handle.attempts(), 4);
        assert_eq!(handle.reconnects().len(), 3);
    }

    #[tokio::test]
    async fn test_attempt_counter_resets_per_call() {
        let (conn, handle) = ScriptedConnection::new();
        let conn = conn.with_script(vec![
            Err(DbError::lock_wait_timeout()),
            dummy(),
            Err(DbError::lock_wait_timeout()),
            dummy(),
        ]);
        let mut exec = ResilientExecutor::new(Box::new(conn), policy(2));

        exec.execute("first").await.unwrap();
        exec.execute("second").await.unwrap();
        assert_eq!(handle.statements(), vec!["first", "first", "second", "second"]);
    }

    #[tokio::test]
    async fn test_reconnect_honours_host_mode() {
        let (conn, handle) = ScriptedConnection::new();
        let conn = conn.with_script(vec![Err(DbError::lock_wait_timeout())]);
        let mut exec = ResilientExecutor::new(
            Box::new(conn),
            policy(2).with_consistent_host(false),
        );

        exec.execute("select 1").await.unwrap();
        assert_eq!(handle.reconnects(), vec![false]);
    }

    #[tokio::test]
    async fn test_failed_reconnect_is_fatal() {
        let (conn, handle) = ScriptedConnection::new();
        let conn = conn
            .with_script(vec![Err(DbError::lock_wait_timeout())])
            .failing_reconnect(DbError::client("connection refused"));
        let mut exec = ResilientExecutor::new(Box::new(conn), policy(5));

        let err = exec.execute("select 1").await.unwrap_err();
        assert!(matches!(err, MigrateError::Connection(_)));
        assert_eq!(handle.attempts(), 1);
    }

    #[tokio::test]
    async fn test_inactive_after_reconnect_is_fatal() {
        let (conn, _handle) = ScriptedConnection::new();
        let conn = conn
            .with_script(vec![Err(DbError::lock_wait_timeout())])
            .inactive();
        let mut exec = ResilientExecutor::new(Box::new(conn), policy(5));

        let err = exec.execute("select 1").await.unwrap_err();
        assert!(err.to_string().contains("not active"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_between_attempts() {
        let (conn, _handle) = ScriptedConnection::new();
        let conn = conn.with_script(vec![
            Err(DbError::lock_wait_timeout()),
            Err(DbError::lock_wait_timeout()),
            dummy(),
        ]);
        let policy = RetryPolicy::default()
            .with_tries(3)
            .with_base_interval(Duration::from_secs(1));
        let mut exec = ResilientExecutor::new(Box::new(conn), policy);

        let start = tokio::time::Instant::now();
        exec.execute("select 1").await.unwrap();
        // 1s after the first failure, 2s after the second
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
