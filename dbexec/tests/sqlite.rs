#![cfg(feature = "driver-rusqlite")]

use dbexec::{
    CommandExecutor, CommandSpec, ConnectionConfig, DataRow, Error, FromRow, ProviderKind,
    Result, Value, default_registry,
};
use dbexec_driver_test_utils::sqlite_url;
use indoc::indoc;
use tempfile::TempDir;
use test_log::test;

struct Fixture {
    executor: CommandExecutor,
    config: ConnectionConfig,
    _directory: TempDir,
}

/// Executor and connection for a file database seeded with a `users` table
fn fixture() -> anyhow::Result<Fixture> {
    let directory = tempfile::tempdir()?;
    let url = sqlite_url(&directory.path().join("users.db"));
    let executor = CommandExecutor::new(default_registry()?);
    let config = ConnectionConfig::new(ProviderKind::Sqlite, url);

    let _ = executor.execute_non_query(
        &config,
        &CommandSpec::text(indoc! {"
            CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT
            );
            INSERT INTO users (id, name, email) VALUES (1, 'John Doe', 'john@example.com');
            INSERT INTO users (id, name, email) VALUES (2, 'Jane Smith', NULL);
            INSERT INTO users (id, name, email) VALUES (7, 'Seven', 'seven@example.com');
        "}),
    )?;

    Ok(Fixture {
        executor,
        config,
        _directory: directory,
    })
}

#[derive(Debug, PartialEq)]
struct User {
    id: i64,
    name: String,
    email: Option<String>,
}

impl FromRow for User {
    fn from_row(row: &DataRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
        })
    }
}

#[test]
fn test_insert_then_count() -> anyhow::Result<()> {
    let Fixture {
        executor,
        config,
        _directory,
    } = fixture()?;
    let count = CommandSpec::text("SELECT COUNT(*) FROM users");
    assert_eq!(executor.execute_scalar::<i64>(&config, &count)?, Some(3));

    let insert = CommandSpec::text("INSERT INTO users (id, name) VALUES (@id, @name)")
        .with_parameter("id", 10)
        .with_parameter("name", "Ten");
    assert_eq!(executor.execute_non_query(&config, &insert)?, 1);
    assert_eq!(executor.execute_scalar::<i64>(&config, &count)?, Some(4));
    Ok(())
}

#[test]
fn test_parameter_binding() -> anyhow::Result<()> {
    let Fixture {
        executor,
        config,
        _directory,
    } = fixture()?;
    let spec = CommandSpec::text("SELECT * FROM users WHERE id = @id").with_parameter("id", 7);

    let table = executor.execute_table(&config, &spec)?;
    assert_eq!(table.len(), 1);
    let row = table.first().expect("row");
    assert_eq!(row.try_get::<i64>("id")?, 7);
    assert_eq!(row.try_get::<String>("name")?, "Seven");
    Ok(())
}

#[test]
fn test_scalar_absence() -> anyhow::Result<()> {
    let Fixture {
        executor,
        config,
        _directory,
    } = fixture()?;
    let spec = CommandSpec::text("SELECT name FROM users WHERE id = @id").with_parameter("id", 99);
    assert_eq!(executor.execute_scalar::<String>(&config, &spec)?, None);

    let spec = CommandSpec::text("SELECT email FROM users WHERE id = 2");
    assert_eq!(executor.execute_scalar::<String>(&config, &spec)?, None);
    assert_eq!(executor.execute_scalar_or_default::<String>(&config, &spec)?, "");
    Ok(())
}

#[test]
fn test_scalar_conversion() -> anyhow::Result<()> {
    let Fixture {
        executor,
        config,
        _directory,
    } = fixture()?;
    let max_id = CommandSpec::text("SELECT MAX(id) FROM users");
    assert_eq!(executor.execute_scalar::<u8>(&config, &max_id)?, Some(7));
    assert_eq!(executor.execute_scalar::<f64>(&config, &max_id)?, Some(7.0));
    assert_eq!(executor.execute_scalar::<String>(&config, &max_id)?, Some("7".to_string()));

    let average = CommandSpec::text("SELECT AVG(id) FROM users WHERE id < 3");
    assert_eq!(executor.execute_scalar::<i32>(&config, &average)?, Some(2));

    let name = CommandSpec::text("SELECT name FROM users WHERE id = 1");
    assert!(matches!(
        executor.execute_scalar::<i64>(&config, &name),
        Err(Error::ScalarConversionError { target: "i64", .. })
    ));
    Ok(())
}

#[test]
fn test_row_absence_and_presence() -> anyhow::Result<()> {
    let Fixture {
        executor,
        config,
        _directory,
    } = fixture()?;
    let missing = CommandSpec::text("SELECT * FROM users WHERE id > 100");
    assert!(executor.execute_row(&config, &missing)?.is_none());

    let ordered = CommandSpec::text("SELECT * FROM users ORDER BY id DESC");
    let row = executor.execute_row(&config, &ordered)?.expect("row");
    assert_eq!(row.get("id"), Some(&Value::I64(7)));
    Ok(())
}

#[test]
fn test_table_materialization() -> anyhow::Result<()> {
    let Fixture {
        executor,
        config,
        _directory,
    } = fixture()?;
    let spec = CommandSpec::text("SELECT email, id FROM users WHERE id <= 2 ORDER BY id");
    let table = executor.execute_table(&config, &spec)?;
    assert_eq!(table.columns(), ["email", "id"]);
    assert_eq!(table.len(), 2);
    assert_eq!(table.rows()[1].values(), [Value::Null, Value::I64(2)]);
    Ok(())
}

#[test]
fn test_mapped_users() -> anyhow::Result<()> {
    let Fixture {
        executor,
        config,
        _directory,
    } = fixture()?;
    let spec = CommandSpec::text("SELECT id, name, email FROM users ORDER BY id");
    let users: Vec<User> = executor.execute_table_as(&config, &spec)?;
    assert_eq!(users.len(), 3);
    assert_eq!(
        users[1],
        User {
            id: 2,
            name: "Jane Smith".to_string(),
            email: None,
        }
    );

    let spec = CommandSpec::text("SELECT id, name, email FROM users WHERE id = :id")
        .with_parameter("id", 1);
    let user: Option<User> = executor.execute_row_as(&config, &spec)?;
    assert_eq!(user.map(|user| user.email), Some(Some("john@example.com".to_string())));
    Ok(())
}

#[test]
fn test_data_set() -> anyhow::Result<()> {
    let Fixture {
        executor,
        config,
        _directory,
    } = fixture()?;
    let spec = CommandSpec::text(indoc! {"
        SELECT id FROM users ORDER BY id;
        UPDATE users SET email = NULL WHERE id = 1;
        SELECT COUNT(*) AS missing FROM users WHERE email IS NULL;
    "});

    let data_set = executor.execute_data_set(&config, &spec)?;
    assert_eq!(data_set.names().collect::<Vec<_>>(), vec!["Table", "Table1"]);
    assert_eq!(data_set.table("Table").map(|table| table.len()), Some(3));
    let missing = data_set
        .table("Table1")
        .and_then(|table| table.first())
        .expect("row")
        .try_get::<i64>("missing")?;
    assert_eq!(missing, 2);
    Ok(())
}

#[test]
fn test_reader() -> anyhow::Result<()> {
    let Fixture {
        executor,
        config,
        _directory,
    } = fixture()?;
    let spec = CommandSpec::text("SELECT id, name FROM users ORDER BY id");

    let mut cursor = executor.execute_reader(&config, &spec)?;
    assert_eq!(cursor.columns(), ["id", "name"]);
    let first = cursor.next_row()?.expect("row");
    assert_eq!(first.try_get::<i64>("id")?, 1);
    assert!(!cursor.is_closed());
    drop(cursor);

    let cursor = executor.execute_reader(&config, &spec)?;
    let ids = cursor
        .map(|row| row.and_then(|row| row.try_get::<i64>("id")))
        .collect::<Result<Vec<_>>>()?;
    assert_eq!(ids, vec![1, 2, 7]);
    Ok(())
}

#[test]
fn test_execution_errors() -> anyhow::Result<()> {
    let Fixture {
        executor,
        config,
        _directory,
    } = fixture()?;

    let syntax = CommandSpec::text("SELEC id FROM users");
    match executor.execute_table(&config, &syntax) {
        Err(Error::CommandExecutionError { message, code }) => {
            assert!(message.contains("syntax error"), "{message}");
            assert!(code.is_some());
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let duplicate = CommandSpec::text("INSERT INTO users (id, name) VALUES (1, 'Duplicate')");
    assert!(matches!(
        executor.execute_non_query(&config, &duplicate),
        Err(Error::CommandExecutionError { .. })
    ));

    let procedure = CommandSpec::stored_procedure("user_report");
    assert!(matches!(
        executor.execute_data_set(&config, &procedure),
        Err(Error::CommandExecutionError { .. })
    ));

    let count = CommandSpec::text("SELECT COUNT(*) FROM users");
    assert_eq!(executor.execute_scalar::<i64>(&config, &count)?, Some(3));
    Ok(())
}

#[test]
fn test_in_memory_database_is_per_connection() -> anyhow::Result<()> {
    let executor = CommandExecutor::new(default_registry()?);
    let config = ConnectionConfig::new(ProviderKind::Sqlite, "sqlite://");

    let create = CommandSpec::text("CREATE TABLE t (id INTEGER)");
    let _ = executor.execute_non_query(&config, &create)?;
    let count = CommandSpec::text("SELECT COUNT(*) FROM t");
    let result = executor.execute_scalar::<i64>(&config, &count);
    assert!(matches!(result, Err(Error::CommandExecutionError { .. })));
    Ok(())
}

#[test]
fn test_unopenable_database_is_an_execution_error() -> anyhow::Result<()> {
    let directory = tempfile::tempdir()?;
    let url = sqlite_url(&directory.path().join("missing").join("users.db"));
    let executor = CommandExecutor::new(default_registry()?);
    let config = ConnectionConfig::new(ProviderKind::Sqlite, url);

    let create = CommandSpec::text("CREATE TABLE users (id INTEGER)");
    match executor.execute_non_query(&config, &create) {
        Err(Error::CommandExecutionError { code, .. }) => assert!(code.is_some()),
        other => panic!("unexpected result: {other:?}"),
    }
    Ok(())
}

#[test]
fn test_invalid_text_is_an_execution_error() -> anyhow::Result<()> {
    let Fixture {
        executor,
        config,
        _directory,
    } = fixture()?;

    let invalid = CommandSpec::text("SELECT CAST(x'ff' AS TEXT) AS t");
    assert!(matches!(
        executor.execute_table(&config, &invalid),
        Err(Error::CommandExecutionError { .. })
    ));
    Ok(())
}
