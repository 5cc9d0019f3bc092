use crate::Error::{ColumnNotFound, CommandExecutionError};
use crate::error::Result;
use crate::{FromValue, Row, Value};
use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::sync::Arc;

/// Construction of a typed record from a named-column row.
///
/// Implementations look values up by column name (see [`DataRow::get`]); the policy for
/// missing or extra columns belongs to the implementation.
pub trait FromRow: Sized {
    /// # Errors
    /// * If a required column is missing or a value cannot be converted
    fn from_row(row: &DataRow) -> Result<Self>;
}

/// A materialized row; values are aligned with the column names
#[derive(Clone, Debug, PartialEq)]
pub struct DataRow {
    columns: Arc<[String]>,
    values: Row,
}

impl DataRow {
    #[must_use]
    pub fn new(columns: Arc<[String]>, values: Row) -> Self {
        Self { columns, values }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Row {
        self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Index of a column; an exact match wins over an ASCII case-insensitive match
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|column| column.eq_ignore_ascii_case(name))
            })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.column_index(name)
            .and_then(|index| self.values.get(index))
    }

    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a column value converted to `T`
    ///
    /// # Errors
    /// * [`ColumnNotFound`](crate::Error::ColumnNotFound) if the column does not exist
    /// * [`ScalarConversionError`](crate::Error::ScalarConversionError) if the value cannot be
    ///   converted
    pub fn try_get<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self
            .get(name)
            .ok_or_else(|| ColumnNotFound(name.to_string()))?;
        T::from_value(value.clone())
    }

    /// Map this row to a typed record
    ///
    /// # Errors
    /// * If the record cannot be constructed from the row
    pub fn map<T: FromRow>(&self) -> Result<T> {
        T::from_row(self)
    }
}

impl Serialize for DataRow {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.columns.iter().zip(self.values.iter()) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// A fully materialized result set
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataTable {
    name: String,
    columns: Arc<[String]>,
    rows: Vec<DataRow>,
}

impl DataTable {
    #[must_use]
    pub fn new<S: Into<String>>(name: S, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns: Arc::from(columns),
            rows: Vec::new(),
        }
    }

    /// Append a row of values
    ///
    /// # Errors
    /// * If the number of values does not match the number of columns
    pub fn push_row(&mut self, values: Row) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(CommandExecutionError {
                message: format!(
                    "row has {} values but the result has {} columns",
                    values.len(),
                    self.columns.len()
                ),
                code: None,
            });
        }
        self.rows.push(DataRow::new(Arc::clone(&self.columns), values));
        Ok(())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[DataRow] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&DataRow> {
        self.rows.first()
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<DataRow> {
        self.rows
    }

    /// Map every row to a typed record, preserving row order
    ///
    /// # Errors
    /// * If any row cannot be mapped
    pub fn map<T: FromRow>(&self) -> Result<Vec<T>> {
        self.rows.iter().map(DataRow::map).collect()
    }
}

/// An ordered collection of named tables
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataSet {
    tables: IndexMap<String, DataTable>,
}

impl DataSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default name for the table at `index`: `Table`, `Table1`, `Table2`, ...
    #[must_use]
    pub fn default_table_name(index: usize) -> String {
        if index == 0 {
            "Table".to_string()
        } else {
            format!("Table{index}")
        }
    }

    /// Add a table; a duplicate name gets a numeric suffix
    pub fn push(&mut self, mut table: DataTable) {
        if self.tables.contains_key(&table.name) {
            let mut suffix = 1;
            while self.tables.contains_key(&format!("{}{suffix}", table.name)) {
                suffix += 1;
            }
            table.name = format!("{}{suffix}", table.name);
        }
        let _ = self.tables.insert(table.name.clone(), table);
    }

    #[must_use]
    pub fn table(&self, name: &str) -> Option<&DataTable> {
        self.tables.get(name)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&DataTable> {
        self.tables.get_index(index).map(|(_, table)| table)
    }

    pub fn tables(&self) -> impl Iterator<Item = &DataTable> {
        self.tables.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    #[must_use]
    pub fn into_tables(self) -> Vec<DataTable> {
        self.tables.into_values().collect()
    }
}
