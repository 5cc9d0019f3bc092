use crate::builder::{BoundCommand, CommandBuilder};
use crate::connection_config::ConnectionConfig;
use crate::cursor::Cursor;
use dbexec_driver::{
    Command, CommandSpec, Connection, DataRow, DataSet, DataTable, Error, FromRow, FromValue,
    ProviderRegistry, QueryResult, Result, Value,
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Runs commands against the driver resolved for each [`ConnectionConfig`].
///
/// Every call builds a fresh connection and command.  Except for
/// [`execute_reader`](CommandExecutor::execute_reader), the connection is closed exactly once
/// before the call returns, whether it succeeds or fails.
#[derive(Clone, Debug)]
pub struct CommandExecutor {
    registry: Arc<ProviderRegistry>,
}

impl CommandExecutor {
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn builder(&self) -> CommandBuilder<'_> {
        CommandBuilder::new(&self.registry)
    }

    fn open(&self, config: &ConnectionConfig, spec: &CommandSpec) -> Result<OpenCommand> {
        let bound = self.builder().build(config, spec)?;
        OpenCommand::open(bound)
    }

    /// Run a command that does not return rows
    ///
    /// # Errors
    /// * If the driver cannot be resolved or the command fails
    #[instrument(level = "debug", skip_all, fields(command = spec.command_text()))]
    pub fn execute_non_query(&self, config: &ConnectionConfig, spec: &CommandSpec) -> Result<u64> {
        let mut open = self.open(config, spec)?;
        let rows = open.execute();
        let rows = open.finish(rows)?;
        debug!(rows, "non-query executed");
        Ok(rows)
    }

    /// First column of the first row converted to `T`, or `None` when the query returns no rows
    /// or a null value
    ///
    /// # Errors
    /// * [`ScalarConversionError`](dbexec_driver::Error::ScalarConversionError) if the value
    ///   cannot be converted to `T`
    /// * If the driver cannot be resolved or the command fails
    #[instrument(level = "debug", skip_all, fields(command = spec.command_text()))]
    pub fn execute_scalar<T: FromValue>(
        &self,
        config: &ConnectionConfig,
        spec: &CommandSpec,
    ) -> Result<Option<T>> {
        let mut open = self.open(config, spec)?;
        let value = open.scalar();
        match open.finish(value)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::from_value(value).map(Some),
        }
    }

    /// Like [`execute_scalar`](CommandExecutor::execute_scalar), returning `T::default()` when
    /// there is no value
    ///
    /// # Errors
    /// * [`ScalarConversionError`](dbexec_driver::Error::ScalarConversionError) if the value
    ///   cannot be converted to `T`
    /// * If the driver cannot be resolved or the command fails
    pub fn execute_scalar_or_default<T: FromValue + Default>(
        &self,
        config: &ConnectionConfig,
        spec: &CommandSpec,
    ) -> Result<T> {
        Ok(self.execute_scalar(config, spec)?.unwrap_or_default())
    }

    /// Start a query and return a cursor that owns the open connection
    ///
    /// # Errors
    /// * If the driver cannot be resolved or the command fails; the connection is closed first
    #[instrument(level = "debug", skip_all, fields(command = spec.command_text()))]
    pub fn execute_reader(&self, config: &ConnectionConfig, spec: &CommandSpec) -> Result<Cursor> {
        let open = self.open(config, spec)?;
        open.into_cursor()
    }

    /// First row of the query, or `None` when it returns no rows
    ///
    /// # Errors
    /// * If the driver cannot be resolved or the command fails
    #[instrument(level = "debug", skip_all, fields(command = spec.command_text()))]
    pub fn execute_row(
        &self,
        config: &ConnectionConfig,
        spec: &CommandSpec,
    ) -> Result<Option<DataRow>> {
        let table = self.execute_table(config, spec)?;
        Ok(table.into_rows().into_iter().next())
    }

    /// Every row of the first result set
    ///
    /// # Errors
    /// * If the driver cannot be resolved or the command fails
    #[instrument(level = "debug", skip_all, fields(command = spec.command_text()))]
    pub fn execute_table(
        &self,
        config: &ConnectionConfig,
        spec: &CommandSpec,
    ) -> Result<DataTable> {
        let mut open = self.open(config, spec)?;
        let table = open.table();
        let table = open.finish(table)?;
        debug!(rows = table.len(), "table materialized");
        Ok(table)
    }

    /// Every result set, as tables named `Table`, `Table1`, `Table2`, ...
    ///
    /// # Errors
    /// * If the driver cannot be resolved or the command fails
    #[instrument(level = "debug", skip_all, fields(command = spec.command_text()))]
    pub fn execute_data_set(
        &self,
        config: &ConnectionConfig,
        spec: &CommandSpec,
    ) -> Result<DataSet> {
        let mut open = self.open(config, spec)?;
        let data_set = open.data_set();
        let data_set = open.finish(data_set)?;
        debug!(tables = data_set.len(), "data set materialized");
        Ok(data_set)
    }

    /// First row mapped to `T`, or `None` when the query returns no rows
    ///
    /// # Errors
    /// * If the command fails or the row cannot be mapped
    pub fn execute_row_as<T: FromRow>(
        &self,
        config: &ConnectionConfig,
        spec: &CommandSpec,
    ) -> Result<Option<T>> {
        self.execute_row(config, spec)?
            .map(|row| row.map::<T>())
            .transpose()
    }

    /// Every row of the first result set mapped to `T`
    ///
    /// # Errors
    /// * If the command fails or any row cannot be mapped
    pub fn execute_table_as<T: FromRow>(
        &self,
        config: &ConnectionConfig,
        spec: &CommandSpec,
    ) -> Result<Vec<T>> {
        self.execute_table(config, spec)?.map::<T>()
    }
}

/// An opened connection with its command.  Dropping it closes the connection if
/// [`finish`](OpenCommand::finish) was not reached, e.g. on panic.
#[derive(Debug)]
struct OpenCommand {
    command: Command,
    connection: Option<Box<dyn Connection>>,
}

impl OpenCommand {
    fn open(bound: BoundCommand) -> Result<Self> {
        let (command, mut connection) = bound.into_parts();
        connection.open()?;
        debug!("connection opened");
        Ok(Self {
            command,
            connection: Some(connection),
        })
    }

    fn execute(&mut self) -> Result<u64> {
        let Self {
            command,
            connection,
        } = self;
        match connection {
            Some(connection) => connection.execute(command),
            None => Err(not_open()),
        }
    }

    fn query(&mut self) -> Result<Box<dyn QueryResult>> {
        let Self {
            command,
            connection,
        } = self;
        match connection {
            Some(connection) => connection.query(command),
            None => Err(not_open()),
        }
    }

    fn scalar(&mut self) -> Result<Option<Value>> {
        let mut result = self.query()?;
        Ok(result.next()?.and_then(|row| row.into_iter().next()))
    }

    fn table(&mut self) -> Result<DataTable> {
        let mut result = self.query()?;
        read_table(result.as_mut(), DataSet::default_table_name(0))
    }

    fn data_set(&mut self) -> Result<DataSet> {
        let mut result = self.query()?;
        let mut data_set = DataSet::new();
        let mut index = 0;
        loop {
            if !result.columns().is_empty() {
                let table = read_table(result.as_mut(), DataSet::default_table_name(index))?;
                data_set.push(table);
                index += 1;
            }
            if !result.next_result()? {
                break;
            }
        }
        Ok(data_set)
    }

    /// Close the connection and return `result`.  A close failure is returned when the command
    /// succeeded and logged when the command already failed.
    fn finish<T>(mut self, result: Result<T>) -> Result<T> {
        let closed = match self.connection.take() {
            Some(mut connection) => connection.close(),
            None => Ok(()),
        };
        match (result, closed) {
            (result, Ok(())) => {
                debug!("connection closed");
                result
            }
            (Ok(_), Err(error)) => {
                warn!(%error, "failed to close connection");
                Err(error)
            }
            (Err(error), Err(close_error)) => {
                warn!(%close_error, "failed to close connection after command error");
                Err(error)
            }
        }
    }

    fn into_cursor(mut self) -> Result<Cursor> {
        let result = match self.query() {
            Ok(result) => result,
            Err(error) => return self.finish(Err(error)),
        };
        match self.connection.take() {
            Some(connection) => Ok(Cursor::new(connection, result)),
            None => Err(not_open()),
        }
    }
}

impl Drop for OpenCommand {
    fn drop(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            if let Err(error) = connection.close() {
                warn!(%error, "failed to close connection");
            }
        }
    }
}

fn not_open() -> Error {
    Error::ConnectionStateError("connection is not open".to_string())
}

fn read_table(result: &mut dyn QueryResult, name: String) -> Result<DataTable> {
    let mut table = DataTable::new(name, result.columns().to_vec());
    while let Some(row) = result.next()? {
        table.push_row(row)?;
    }
    Ok(table)
}
