use dbexec_driver::{Error, Parameter, Result, Value};
use rusqlite::Statement;
use rusqlite::types::{Value as SqliteValue, ValueRef};
use tracing::debug;

const PARAMETER_PREFIXES: [char; 3] = ['@', ':', '$'];

/// Convert a rusqlite row value at the given column index to a dbexec Value
pub(crate) fn convert_to_value(row: &rusqlite::Row, column_index: usize) -> Result<Value> {
    let value = match row.get_ref(column_index).map_err(map_error)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(value) => Value::I64(value),
        ValueRef::Real(value) => Value::F64(value),
        ValueRef::Text(value) => {
            let value = std::str::from_utf8(value).map_err(|error| {
                Error::execution(format!(
                    "column {column_index} holds text that is not valid utf-8: {error}"
                ))
            })?;
            Value::String(value.to_string())
        }
        ValueRef::Blob(value) => Value::Bytes(value.to_vec()),
    };

    Ok(value)
}

/// Convert a dbexec Value to a value SQLite can bind
pub(crate) fn convert_to_sqlite(value: &Value) -> Result<SqliteValue> {
    let value = match value {
        Value::Null => SqliteValue::Null,
        Value::Bool(value) => SqliteValue::Integer(i64::from(*value)),
        Value::Bytes(value) => SqliteValue::Blob(value.clone()),
        Value::I8(value) => SqliteValue::Integer(i64::from(*value)),
        Value::I16(value) => SqliteValue::Integer(i64::from(*value)),
        Value::I32(value) => SqliteValue::Integer(i64::from(*value)),
        Value::I64(value) => SqliteValue::Integer(*value),
        Value::U8(value) => SqliteValue::Integer(i64::from(*value)),
        Value::U16(value) => SqliteValue::Integer(i64::from(*value)),
        Value::U32(value) => SqliteValue::Integer(i64::from(*value)),
        Value::U64(value) => match i64::try_from(*value) {
            Ok(value) => SqliteValue::Integer(value),
            Err(_) => {
                return Err(Error::execution(format!(
                    "value {value} is out of range for a sqlite integer"
                )));
            }
        },
        Value::F32(value) => SqliteValue::Real(f64::from(*value)),
        Value::F64(value) => SqliteValue::Real(*value),
        Value::String(value) => SqliteValue::Text(value.clone()),
    };
    Ok(value)
}

/// Map a rusqlite error, keeping the SQLite extended result code when there is one
pub(crate) fn map_error(error: rusqlite::Error) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(failure, message) => Error::CommandExecutionError {
            message: message.unwrap_or_else(|| failure.to_string()),
            code: Some(failure.extended_code.to_string()),
        },
        rusqlite::Error::SqlInputError {
            error, msg, offset, ..
        } => Error::CommandExecutionError {
            message: format!("{msg} at offset {offset}"),
            code: Some(error.extended_code.to_string()),
        },
        error => Error::execution(error.to_string()),
    }
}

/// Bind parameters to a prepared statement.
///
/// Named parameters are matched against the statement's `@`, `:` or `$` placeholders; a name
/// without a prefix matches any of them.  Unnamed parameters bind by position.  Parameters the
/// statement does not reference are skipped so one parameter list can serve every statement of
/// a batch.
pub(crate) fn bind_parameters(
    statement: &mut Statement<'_>,
    parameters: &[Parameter],
) -> Result<()> {
    let count = statement.parameter_count();
    for (position, parameter) in parameters.iter().enumerate() {
        let index = if parameter.name.is_empty() {
            Some(position + 1).filter(|index| *index <= count)
        } else {
            parameter_index(statement, &parameter.name)?
        };
        let Some(index) = index else {
            debug!(name = %parameter.name, position, "parameter not referenced by statement");
            continue;
        };
        statement
            .raw_bind_parameter(index, convert_to_sqlite(&parameter.value)?)
            .map_err(map_error)?;
    }
    Ok(())
}

fn parameter_index(statement: &Statement<'_>, name: &str) -> Result<Option<usize>> {
    if name.starts_with(PARAMETER_PREFIXES) {
        return statement.parameter_index(name).map_err(map_error);
    }
    for prefix in PARAMETER_PREFIXES {
        let index = statement
            .parameter_index(&format!("{prefix}{name}"))
            .map_err(map_error)?;
        if index.is_some() {
            return Ok(index);
        }
    }
    Ok(None)
}
