//! SQLite driver for dbexec
//!
//! Connection strings use the `sqlite` scheme: `sqlite://` opens an in-memory database and
//! `sqlite:///path/to/file.db` opens (or creates) a database file.  The optional
//! `busy_timeout` query parameter sets the default busy timeout in milliseconds.
//!
//! Queries are read to completion before `query` returns: every result set is
//! held in memory, so a cursor over this driver does not stream rows from the database.

#![forbid(unsafe_code)]
#![forbid(clippy::allow_attributes)]
#![deny(clippy::pedantic)]

mod driver;
mod results;

pub use driver::{Connection, Driver};
