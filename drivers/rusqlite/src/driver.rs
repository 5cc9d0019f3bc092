use crate::results::{bind_parameters, convert_to_value, map_error};
use dbexec_driver::{
    Command, CommandKind, ConnectionState, Error, MemoryQueryResult, QueryResult, Result, Row,
    UrlExtension,
};
use rusqlite::Batch;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use url::Url;

const SCHEME: &str = "sqlite";

#[derive(Debug)]
pub struct Driver;

impl dbexec_driver::Driver for Driver {
    fn identifier(&self) -> &'static str {
        "sqlite"
    }

    fn create_connection(
        &self,
        connection_string: &str,
    ) -> Result<Box<dyn dbexec_driver::Connection>> {
        let connection = Connection::new(connection_string)?;
        Ok(Box::new(connection))
    }
}

#[derive(Debug)]
pub struct Connection {
    connection_string: String,
    path: Option<PathBuf>,
    busy_timeout: Option<Duration>,
    connection: Option<rusqlite::Connection>,
}

impl Connection {
    pub(crate) fn new(connection_string: &str) -> Result<Connection> {
        let url = Url::parse(connection_string)?;
        if url.scheme() != SCHEME {
            return Err(Error::ConfigurationError(format!(
                "unsupported connection string scheme [{}]; expected [{SCHEME}]",
                url.scheme()
            )));
        }
        let busy_timeout = match url.query_parameter("busy_timeout") {
            Some(millis) => {
                let millis = millis.parse::<u64>().map_err(|error| {
                    Error::ConfigurationError(format!("invalid busy_timeout [{millis}]: {error}"))
                })?;
                Some(Duration::from_millis(millis))
            }
            None => None,
        };

        Ok(Connection {
            connection_string: connection_string.to_string(),
            path: url.database_path(),
            busy_timeout,
            connection: None,
        })
    }

    fn connection(&self) -> Result<&rusqlite::Connection> {
        self.connection
            .as_ref()
            .ok_or_else(|| Error::ConnectionStateError("connection is not open".to_string()))
    }

    /// Validate the command and prepare the connection to run it
    fn prepare_command(&self, command: &Command) -> Result<&rusqlite::Connection> {
        let connection = self.connection()?;
        if command.kind == CommandKind::StoredProcedure {
            return Err(Error::execution(format!(
                "stored procedures are not supported by sqlite: {}",
                command.text
            )));
        }
        if let Some(parameter) = command
            .parameters
            .iter()
            .find(|parameter| !parameter.direction.is_input())
        {
            return Err(Error::execution(format!(
                "{:?} parameters are not supported by sqlite: {}",
                parameter.direction, parameter.name
            )));
        }

        let timeout = command.timeout.or(self.busy_timeout);
        if let Some(timeout) = timeout {
            connection.busy_timeout(timeout).map_err(map_error)?;
        }
        Ok(connection)
    }
}

impl dbexec_driver::Connection for Connection {
    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    fn state(&self) -> ConnectionState {
        if self.connection.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    fn open(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Err(Error::ConnectionStateError(
                "connection is already open".to_string(),
            ));
        }
        let connection = match &self.path {
            Some(path) => rusqlite::Connection::open(path),
            None => rusqlite::Connection::open_in_memory(),
        }
        .map_err(map_error)?;
        debug!(path = ?self.path, "sqlite connection opened");
        self.connection = Some(connection);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(connection) = self.connection.take() else {
            return Ok(());
        };
        connection
            .close()
            .map_err(|(_connection, error)| map_error(error))?;
        debug!(path = ?self.path, "sqlite connection closed");
        Ok(())
    }

    fn execute(&mut self, command: &Command) -> Result<u64> {
        let connection = self.prepare_command(command)?;
        let mut batch = Batch::new(connection, &command.text);
        let mut rows = 0;

        while let Some(mut statement) = batch.next().map_err(map_error)? {
            bind_parameters(&mut statement, &command.parameters)?;
            if statement.column_count() > 0 {
                let mut query_rows = statement.raw_query();
                while query_rows.next().map_err(map_error)?.is_some() {}
            } else {
                let changed = statement.raw_execute().map_err(map_error)?;
                rows += u64::try_from(changed)
                    .map_err(|error| Error::execution(error.to_string()))?;
            }
        }

        Ok(rows)
    }

    fn query(&mut self, command: &Command) -> Result<Box<dyn QueryResult>> {
        let connection = self.prepare_command(command)?;
        let mut batch = Batch::new(connection, &command.text);
        let mut result_sets = Vec::new();

        while let Some(mut statement) = batch.next().map_err(map_error)? {
            bind_parameters(&mut statement, &command.parameters)?;
            if statement.column_count() == 0 {
                let _ = statement.raw_execute().map_err(map_error)?;
                continue;
            }

            let columns: Vec<String> = statement
                .column_names()
                .iter()
                .map(ToString::to_string)
                .collect();
            let mut query_rows = statement.raw_query();
            let mut rows = Vec::new();
            while let Some(query_row) = query_rows.next().map_err(map_error)? {
                let row = (0..columns.len())
                    .map(|index| convert_to_value(query_row, index))
                    .collect::<Result<Row>>()?;
                rows.push(row);
            }
            result_sets.push((columns, rows));
        }

        let query_result = MemoryQueryResult::with_result_sets(result_sets);
        Ok(Box::new(query_result))
    }
}
