use crate::error::Result;
use crate::{Command, Value};
use std::collections::VecDeque;
use std::fmt::Debug;

/// A single row of a query result
pub type Row = Vec<Value>;

/// Rows and result sets produced by a query, consumed one row at a time
pub trait QueryResult: Debug + Send {
    /// Column names of the current result set
    fn columns(&self) -> &[String];

    /// Next row of the current result set, or `None` once it is exhausted
    ///
    /// # Errors
    /// * If the driver fails while producing the row
    fn next(&mut self) -> Result<Option<Row>>;

    /// Advance to the next result set; returns false when there are no more result sets
    ///
    /// # Errors
    /// * If the driver fails while producing the result set
    fn next_result(&mut self) -> Result<bool> {
        Ok(false)
    }
}

/// In-memory query result
#[derive(Clone, Debug, Default)]
pub struct MemoryQueryResult {
    columns: Vec<String>,
    rows: VecDeque<Row>,
    pending: VecDeque<(Vec<String>, Vec<Row>)>,
}

impl MemoryQueryResult {
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows: rows.into(),
            pending: VecDeque::new(),
        }
    }

    /// Create a result with several result sets; the first one is current
    #[must_use]
    pub fn with_result_sets(result_sets: Vec<(Vec<String>, Vec<Row>)>) -> Self {
        let mut pending: VecDeque<_> = result_sets.into();
        match pending.pop_front() {
            Some((columns, rows)) => Self {
                columns,
                rows: rows.into(),
                pending,
            },
            None => Self::default(),
        }
    }
}

impl QueryResult for MemoryQueryResult {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.pop_front())
    }

    fn next_result(&mut self) -> Result<bool> {
        match self.pending.pop_front() {
            Some((columns, rows)) => {
                self.columns = columns;
                self.rows = rows.into();
                Ok(true)
            }
            None => {
                self.columns.clear();
                self.rows.clear();
                Ok(false)
            }
        }
    }
}

/// State of a [`Connection`]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConnectionState {
    #[default]
    Closed,
    Open,
}

/// Connection to a database.  Connections are created closed; the caller opens them before
/// running commands and closes them when done.
pub trait Connection: Debug + Send {
    fn connection_string(&self) -> &str;

    fn state(&self) -> ConnectionState;

    /// # Errors
    /// * If the connection cannot be established or is already open
    fn open(&mut self) -> Result<()>;

    /// # Errors
    /// * If the driver fails to release the connection
    fn close(&mut self) -> Result<()>;

    /// Run a command that does not return rows; returns the number of affected rows
    ///
    /// # Errors
    /// * If the driver fails to run the command
    fn execute(&mut self, command: &Command) -> Result<u64>;

    /// Run a command that returns rows
    ///
    /// # Errors
    /// * If the driver fails to run the command
    fn query(&mut self, command: &Command) -> Result<Box<dyn QueryResult>>;
}
