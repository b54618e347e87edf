//! Scripted in-memory connection for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::core::traits::{Connection, Rows};
use crate::error::DbError;

type Responder = Box<dyn FnMut(&str) -> Option<Result<Rows, DbError>> + Send>;

#[derive(Default)]
struct ScriptState {
    script: VecDeque<Result<Rows, DbError>>,
    responder: Option<Responder>,
    statements: Vec<String>,
    reconnects: Vec<bool>,
    inactive: bool,
    reconnect_error: Option<DbError>,
}

/// A connection that replays canned results.
///
/// Each `execute` first asks the responder (if any), then pops the next
/// scripted result, and falls back to an empty success.
pub(crate) struct ScriptedConnection {
    state: Arc<Mutex<ScriptState>>,
}

/// Inspection handle that stays with the test after the connection is boxed.
#[derive(Clone)]
pub(crate) struct ScriptHandle {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedConnection {
    pub(crate) fn new() -> (Self, ScriptHandle) {
        let state = Arc::new(Mutex::new(ScriptState::default()));
        (
            Self {
                state: state.clone(),
            },
            ScriptHandle { state },
        )
    }

    /// Queue results in order.
    pub(crate) fn with_script(self, results: Vec<Result<Rows, DbError>>) -> Self {
        self.state.lock().unwrap().script.extend(results);
        self
    }

    /// Answer statements by content.
    pub(crate) fn with_responder<F>(self, responder: F) -> Self
    where
        F: FnMut(&str) -> Option<Result<Rows, DbError>> + Send + 'static,
    {
        self.state.lock().unwrap().responder = Some(Box::new(responder));
        self
    }

    /// Report the connection as inactive after every reconnect.
    pub(crate) fn inactive(self) -> Self {
        self.state.lock().unwrap().inactive = true;
        self
    }

    /// Fail every reconnect with `err`.
    pub(crate) fn failing_reconnect(self, err: DbError) -> Self {
        self.state.lock().unwrap().reconnect_error = Some(err);
        self
    }
}

impl ScriptHandle {
    /// Every statement passed to `execute`, in order.
    pub(crate) fn statements(&self) -> Vec<String> {
        self.state.lock().unwrap().statements.clone()
    }

    pub(crate) fn attempts(&self) -> usize {
        self.state.lock().unwrap().statements.len()
    }

    /// The `consistent_host` flag of every reconnect, in order.
    pub(crate) fn reconnects(&self) -> Vec<bool> {
        self.state.lock().unwrap().reconnects.clone()
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn execute(&mut self, sql: &str) -> Result<Rows, DbError> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(sql.to_string());
        if let Some(responder) = state.responder.as_mut() {
            if let Some(result) = responder(sql) {
                return result;
            }
        }
        state.script.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn is_active(&mut self) -> bool {
        !self.state.lock().unwrap().inactive
    }

    async fn reconnect(&mut self, consistent_host: bool) -> Result<(), DbError> {
        let mut state = self.state.lock().unwrap();
        state.reconnects.push(consistent_host);
        match &state.reconnect_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn db_type(&self) -> &str {
        "scripted"
    }
}

/// A single-row, single-column result.
pub(crate) fn single(value: Option<&str>) -> Rows {
    vec![vec![value.map(str::to_string)]]
}

/// The canned "dummy" success.
pub(crate) fn dummy() -> Result<Rows, DbError> {
    Ok(single(Some("dummy")))
}
