//! # dbexec
//!
//! Runs parameterized commands against relational databases chosen at runtime by
//! [`ProviderKind`].  A [`CommandExecutor`] resolves the driver for each call through a shared
//! [`ProviderRegistry`], builds a fresh connection and command with the [`CommandBuilder`], and
//! returns the result as an affected row count, a scalar, a row, a [`DataTable`], a [`DataSet`]
//! or a streaming [`Cursor`].
//!
//! ```no_run
//! use dbexec::{CommandExecutor, CommandSpec, ConnectionConfig, ProviderKind, default_registry};
//!
//! # fn main() -> dbexec::Result<()> {
//! let executor = CommandExecutor::new(default_registry()?);
//! let config = ConnectionConfig::new(ProviderKind::Sqlite, "sqlite:///var/lib/app/app.db");
//! let spec = CommandSpec::text("SELECT name FROM users WHERE id = @id").with_parameter("id", 7);
//! let name: Option<String> = executor.execute_scalar(&config, &spec)?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![forbid(clippy::allow_attributes)]
#![deny(clippy::pedantic)]

mod builder;
mod configuration;
mod connection_config;
mod cursor;
mod driver_manager;
mod executor;

pub use builder::{BoundCommand, CommandBuilder};
pub use configuration::{
    Configuration, ConfigurationBuilder, ConnectionSettings, DEFAULT_ENV_PREFIX,
};
pub use connection_config::{ConnectionConfig, ProviderSource};
pub use cursor::Cursor;
pub use dbexec_driver::{
    Command, CommandKind, CommandSpec, Connection, ConnectionState, DataRow, DataSet, DataTable,
    Driver, DriverLoader, DriverNameTable, Error, FromRow, FromValue, MemoryQueryResult,
    MockDriver, Parameter, ParameterDirection, ParameterSpec, ProviderKind, ProviderRegistry,
    QueryResult, Result, Row, Value,
};
pub use driver_manager::{default_registry, initialize};
pub use executor::CommandExecutor;
