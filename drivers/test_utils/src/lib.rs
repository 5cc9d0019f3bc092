//! Scripted driver used to test command execution without a database.
//!
//! A [`ScriptedDriver`] answers commands by their text with canned row sets, affected row
//! counts or errors, and records every connection it hands out in a [`ConnectionLog`] so tests
//! can assert how connections were opened, used and closed.

#![forbid(unsafe_code)]
#![forbid(clippy::allow_attributes)]
#![deny(clippy::pedantic)]

use dbexec_driver::{
    Command, Connection, ConnectionState, Driver, Error, MemoryQueryResult, Parameter,
    ParameterSpec, QueryResult, Result, Row,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Canned answer for one command text
#[derive(Clone, Debug)]
pub enum Response {
    /// Result sets returned by a query; `execute` reports the row count of all sets
    Rows(Vec<(Vec<String>, Vec<Row>)>),
    /// Number of affected rows returned by `execute`; queries return no result sets
    Affected(u64),
    /// Error returned by both `execute` and `query`
    Fail(Error),
}

/// What happened to one connection handed out by a [`ScriptedDriver`]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectionRecord {
    pub id: usize,
    pub connection_string: String,
    pub opens: usize,
    pub close_calls: usize,
    pub state: ConnectionState,
    pub commands: Vec<Command>,
}

/// Shared, thread safe record of the connections created by a driver
#[derive(Clone, Debug, Default)]
pub struct ConnectionLog {
    records: Arc<Mutex<Vec<ConnectionRecord>>>,
}

impl ConnectionLog {
    fn lock(&self) -> MutexGuard<'_, Vec<ConnectionRecord>> {
        match self.records.lock() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn update<F: FnOnce(&mut ConnectionRecord)>(&self, id: usize, update: F) {
        if let Some(record) = self.lock().iter_mut().find(|record| record.id == id) {
            update(record);
        }
    }

    /// Snapshot of every connection created so far, in creation order
    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionRecord> {
        self.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Most recently created connection
    #[must_use]
    pub fn last(&self) -> Option<ConnectionRecord> {
        self.lock().last().cloned()
    }

    /// Number of connections currently open
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|record| record.state == ConnectionState::Open)
            .count()
    }

    /// True when every connection that was opened has been closed exactly once
    #[must_use]
    pub fn all_closed_once(&self) -> bool {
        self.lock()
            .iter()
            .filter(|record| record.opens > 0)
            .all(|record| record.state == ConnectionState::Closed && record.close_calls == 1)
    }
}

/// Driver whose connections answer commands from a script
#[derive(Debug)]
pub struct ScriptedDriver {
    identifier: &'static str,
    responses: Arc<Mutex<HashMap<String, Response>>>,
    open_error: Option<Error>,
    close_error: Option<Error>,
    log: ConnectionLog,
    next_id: AtomicUsize,
}

impl ScriptedDriver {
    #[must_use]
    pub fn new(identifier: &'static str) -> Self {
        Self {
            identifier,
            responses: Arc::new(Mutex::new(HashMap::new())),
            open_error: None,
            close_error: None,
            log: ConnectionLog::default(),
            next_id: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_response<S: Into<String>>(self, command_text: S, response: Response) -> Self {
        match self.responses.lock() {
            Ok(mut responses) => {
                responses.insert(command_text.into(), response);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(command_text.into(), response);
            }
        }
        self
    }

    /// Answer `command_text` with a single result set
    #[must_use]
    pub fn with_rows<S: Into<String>>(
        self,
        command_text: S,
        columns: &[&str],
        rows: Vec<Row>,
    ) -> Self {
        let columns = columns.iter().map(ToString::to_string).collect();
        self.with_response(command_text, Response::Rows(vec![(columns, rows)]))
    }

    #[must_use]
    pub fn with_result_sets<S: Into<String>>(
        self,
        command_text: S,
        result_sets: Vec<(Vec<String>, Vec<Row>)>,
    ) -> Self {
        self.with_response(command_text, Response::Rows(result_sets))
    }

    #[must_use]
    pub fn with_affected<S: Into<String>>(self, command_text: S, rows: u64) -> Self {
        self.with_response(command_text, Response::Affected(rows))
    }

    #[must_use]
    pub fn with_error<S: Into<String>>(self, command_text: S, error: Error) -> Self {
        self.with_response(command_text, Response::Fail(error))
    }

    /// Make every `open` fail with `error`
    #[must_use]
    pub fn with_open_error(mut self, error: Error) -> Self {
        self.open_error = Some(error);
        self
    }

    /// Make every `close` fail with `error` after the connection is released
    #[must_use]
    pub fn with_close_error(mut self, error: Error) -> Self {
        self.close_error = Some(error);
        self
    }

    #[must_use]
    pub fn log(&self) -> ConnectionLog {
        self.log.clone()
    }
}

impl Driver for ScriptedDriver {
    fn identifier(&self) -> &'static str {
        self.identifier
    }

    fn create_connection(&self, connection_string: &str) -> Result<Box<dyn Connection>> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(ConnectionRecord {
            id,
            connection_string: connection_string.to_string(),
            ..ConnectionRecord::default()
        });
        Ok(Box::new(ScriptedConnection {
            id,
            connection_string: connection_string.to_string(),
            state: ConnectionState::Closed,
            responses: Arc::clone(&self.responses),
            open_error: self.open_error.clone(),
            close_error: self.close_error.clone(),
            log: self.log.clone(),
        }))
    }

    fn create_parameter(&self, spec: &ParameterSpec) -> Parameter {
        let mut parameter = Parameter::from(spec);
        if !parameter.name.is_empty() && !parameter.name.starts_with('@') {
            parameter.name = format!("@{}", parameter.name);
        }
        parameter
    }
}

#[derive(Debug)]
struct ScriptedConnection {
    id: usize,
    connection_string: String,
    state: ConnectionState,
    responses: Arc<Mutex<HashMap<String, Response>>>,
    open_error: Option<Error>,
    close_error: Option<Error>,
    log: ConnectionLog,
}

impl ScriptedConnection {
    fn respond(&self, command: &Command) -> Result<Response> {
        if self.state != ConnectionState::Open {
            return Err(Error::ConnectionStateError(
                "connection is not open".to_string(),
            ));
        }
        self.log
            .update(self.id, |record| record.commands.push(command.clone()));
        let responses = match self.responses.lock() {
            Ok(responses) => responses,
            Err(error) => return Err(Error::IoError(error.to_string())),
        };
        match responses.get(&command.text) {
            Some(Response::Fail(error)) => Err(error.clone()),
            Some(response) => Ok(response.clone()),
            None => Err(Error::execution(format!(
                "no response scripted for: {}",
                command.text
            ))),
        }
    }
}

impl Connection for ScriptedConnection {
    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn open(&mut self) -> Result<()> {
        if self.state == ConnectionState::Open {
            return Err(Error::ConnectionStateError(
                "connection is already open".to_string(),
            ));
        }
        if let Some(error) = &self.open_error {
            return Err(error.clone());
        }
        self.state = ConnectionState::Open;
        self.log.update(self.id, |record| {
            record.opens += 1;
            record.state = ConnectionState::Open;
        });
        debug!(id = self.id, "scripted connection opened");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.state = ConnectionState::Closed;
        self.log.update(self.id, |record| {
            record.close_calls += 1;
            record.state = ConnectionState::Closed;
        });
        debug!(id = self.id, "scripted connection closed");
        match &self.close_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn execute(&mut self, command: &Command) -> Result<u64> {
        match self.respond(command)? {
            Response::Affected(rows) => Ok(rows),
            Response::Rows(result_sets) => {
                let rows: usize = result_sets.iter().map(|(_, rows)| rows.len()).sum();
                Ok(u64::try_from(rows).unwrap_or(u64::MAX))
            }
            Response::Fail(error) => Err(error),
        }
    }

    fn query(&mut self, command: &Command) -> Result<Box<dyn QueryResult>> {
        match self.respond(command)? {
            Response::Rows(result_sets) => {
                Ok(Box::new(MemoryQueryResult::with_result_sets(result_sets)))
            }
            Response::Affected(_) => Ok(Box::new(MemoryQueryResult::default())),
            Response::Fail(error) => Err(error),
        }
    }
}

/// Connection string for a SQLite database file at `path`
#[must_use]
pub fn sqlite_url(path: &Path) -> String {
    let path = path.to_string_lossy().replace('\\', "/");
    if path.starts_with('/') {
        format!("sqlite://{path}")
    } else {
        format!("sqlite:///{path}")
    }
}
