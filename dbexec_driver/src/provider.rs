use crate::Error::ConfigurationError;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Symbolic identifier for a relational backend
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    SqlServer,
    MySql,
    Sqlite,
    Oracle,
    Odbc,
    OleDb,
    Firebird,
    Postgres,
    Db2,
    Informix,
    SqlServerCe,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 11] = [
        ProviderKind::SqlServer,
        ProviderKind::MySql,
        ProviderKind::Sqlite,
        ProviderKind::Oracle,
        ProviderKind::Odbc,
        ProviderKind::OleDb,
        ProviderKind::Firebird,
        ProviderKind::Postgres,
        ProviderKind::Db2,
        ProviderKind::Informix,
        ProviderKind::SqlServerCe,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::SqlServer => "sqlserver",
            ProviderKind::MySql => "mysql",
            ProviderKind::Sqlite => "sqlite",
            ProviderKind::Oracle => "oracle",
            ProviderKind::Odbc => "odbc",
            ProviderKind::OleDb => "oledb",
            ProviderKind::Firebird => "firebird",
            ProviderKind::Postgres => "postgres",
            ProviderKind::Db2 => "db2",
            ProviderKind::Informix => "informix",
            ProviderKind::SqlServerCe => "sqlserverce",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim().to_ascii_lowercase();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| ConfigurationError(format!("invalid provider kind: {value}")))
    }
}

/// Mapping of provider kinds to driver names.  The table is fixed once it is handed to a
/// [`ProviderRegistry`](crate::ProviderRegistry).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DriverNameTable {
    names: BTreeMap<ProviderKind, &'static str>,
}

impl DriverNameTable {
    /// Create a table without any entries
    #[must_use]
    pub fn empty() -> Self {
        Self {
            names: BTreeMap::new(),
        }
    }

    /// Add or replace the driver name for a provider kind
    #[must_use]
    pub fn with(mut self, kind: ProviderKind, driver_name: &'static str) -> Self {
        let _ = self.names.insert(kind, driver_name);
        self
    }

    /// Remove the entry for a provider kind
    #[must_use]
    pub fn without(mut self, kind: ProviderKind) -> Self {
        let _ = self.names.remove(&kind);
        self
    }

    #[must_use]
    pub fn get(&self, kind: ProviderKind) -> Option<&'static str> {
        self.names.get(&kind).copied()
    }

    /// Entries in provider kind order
    pub fn entries(&self) -> impl Iterator<Item = (ProviderKind, &'static str)> + '_ {
        self.names.iter().map(|(kind, name)| (*kind, *name))
    }
}

impl Default for DriverNameTable {
    fn default() -> Self {
        Self::empty()
            .with(ProviderKind::SqlServer, "sqlclient")
            .with(ProviderKind::MySql, "mysqlclient")
            .with(ProviderKind::Sqlite, "sqlite")
            .with(ProviderKind::Oracle, "oracleclient")
            .with(ProviderKind::Odbc, "odbc")
            .with(ProviderKind::OleDb, "oledb")
            .with(ProviderKind::Firebird, "firebirdclient")
            .with(ProviderKind::Postgres, "npgsql")
            .with(ProviderKind::Db2, "db2client")
            .with(ProviderKind::Informix, "informix")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_provider_kind_round_trip_names() -> Result<()> {
        for kind in ProviderKind::ALL {
            assert_eq!(ProviderKind::from_str(kind.as_str())?, kind);
        }
        assert_eq!(ProviderKind::from_str(" MySQL ")?, ProviderKind::MySql);
        Ok(())
    }

    #[test]
    fn test_provider_kind_invalid() {
        let error = ProviderKind::from_str("access").expect_err("invalid kind");
        assert_eq!(error.to_string(), "invalid provider kind: access");
    }

    #[test]
    fn test_provider_kind_serde() -> anyhow::Result<()> {
        let kind: ProviderKind = serde_json::from_str(r#""oledb""#)?;
        assert_eq!(kind, ProviderKind::OleDb);
        assert_eq!(serde_json::to_string(&ProviderKind::SqlServer)?, r#""sqlserver""#);
        Ok(())
    }

    #[test]
    fn test_default_table() {
        let table = DriverNameTable::default();
        assert_eq!(table.get(ProviderKind::SqlServer), Some("sqlclient"));
        assert_eq!(table.get(ProviderKind::Postgres), Some("npgsql"));
        assert_eq!(table.get(ProviderKind::Sqlite), Some("sqlite"));
        assert_eq!(table.get(ProviderKind::SqlServerCe), None);
        assert_eq!(table.entries().count(), ProviderKind::ALL.len() - 1);
    }

    #[test]
    fn test_table_with_and_without() {
        let table = DriverNameTable::default()
            .with(ProviderKind::SqlServerCe, "sqlserverce")
            .without(ProviderKind::Oracle);
        assert_eq!(table.get(ProviderKind::SqlServerCe), Some("sqlserverce"));
        assert_eq!(table.get(ProviderKind::Oracle), None);
    }
}
