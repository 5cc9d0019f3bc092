//! # dbexec driver
//!
//! Contracts implemented by database drivers (driver factories, connections, query results
//! and values) and the [`ProviderRegistry`] that resolves a symbolic [`ProviderKind`] to a
//! loaded driver.

#![forbid(unsafe_code)]
#![forbid(clippy::allow_attributes)]
#![deny(clippy::pedantic)]

mod command;
mod connection;
mod convert;
mod driver;
mod error;
mod provider;
mod provider_registry;
mod results;
mod url;
mod value;

pub use command::{
    Command, CommandKind, CommandSpec, Parameter, ParameterDirection, ParameterSpec,
};
pub use connection::{Connection, ConnectionState, MemoryQueryResult, QueryResult, Row};
pub use convert::FromValue;
pub use driver::{Driver, MockDriver};
pub use error::{Error, Result};
pub use provider::{DriverNameTable, ProviderKind};
pub use provider_registry::{DriverLoader, ProviderRegistry};
pub use results::{DataRow, DataSet, DataTable, FromRow};
pub use url::UrlExtension;
pub use value::Value;
