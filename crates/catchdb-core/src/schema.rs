//! Default schema matching the built-in SQL templates.

use catchdb_error::Result;
use catchdb_types::{CatchKind, Species, Value};

use crate::database::Database;
use crate::sql;

const DEFAULT_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS Parameters (
    ID   INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS Operations (
    name   TEXT PRIMARY KEY,
    prefix TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS Environments (
    ID        INTEGER NOT NULL,
    position  INTEGER NOT NULL,
    timeLag   INTEGER NOT NULL,
    parameter INTEGER NOT NULL,
    value     REAL,
    PRIMARY KEY (parameter, position, timeLag, ID)
);
CREATE TABLE IF NOT EXISTS Longlines (
    ID              INTEGER PRIMARY KEY,
    date            TEXT NOT NULL,
    start_longitude REAL,
    start_latitude  REAL,
    end_longitude   REAL,
    end_latitude    REAL
);
CREATE INDEX IF NOT EXISTS Longlines_date ON Longlines (date);
CREATE TABLE IF NOT EXISTS Seines (
    ID        INTEGER PRIMARY KEY,
    date      TEXT NOT NULL,
    longitude REAL,
    latitude  REAL
);
CREATE INDEX IF NOT EXISTS Seines_date ON Seines (date);
INSERT OR IGNORE INTO Operations (name, prefix) VALUES ('value', '');
";

/// Create the lookup, environment and catch tables if they are missing.
/// The `value` operation is registered with an empty prefix.
pub fn create_default_schema(database: &Database) -> Result<()> {
    let _span = tracing::debug_span!("schema.create").entered();
    database.execute_batch(DEFAULT_SCHEMA)
}

/// Register parameter `name` under code `id`.
pub fn register_parameter(database: &Database, id: i32, name: &str) -> Result<()> {
    database.execute(
        "INSERT INTO Parameters (ID, name) VALUES (?, ?)",
        &[Value::from(id), Value::from(name)],
    )?;
    Ok(())
}

/// Register operation `name` and add its column to `Environments`.
pub fn register_operation(database: &Database, name: &str, prefix: &str) -> Result<()> {
    let column = sql::validate_identifier(name)?;
    database.execute_batch(&format!("ALTER TABLE Environments ADD COLUMN {column} REAL"))?;
    database.execute(
        "INSERT INTO Operations (name, prefix) VALUES (?, ?)",
        &[Value::from(name), Value::from(prefix)],
    )?;
    tracing::debug!(operation = name, prefix, "schema.operation.registered");
    Ok(())
}

/// Add the quantity column of `species` to the catch table of `kind`.
pub fn add_species_column(database: &Database, kind: CatchKind, species: &Species) -> Result<()> {
    let column = sql::validate_identifier(species.code())?;
    database.execute_batch(&format!(
        "ALTER TABLE {} ADD COLUMN {column} REAL",
        kind.table()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use catchdb_error::CatchError;

    #[test]
    fn schema_is_idempotent_and_extensible() {
        let db = Database::open_in_memory(&DatabaseConfig::default()).unwrap();
        create_default_schema(&db).unwrap();
        create_default_schema(&db).unwrap();
        register_parameter(&db, 1, "SST").unwrap();
        register_operation(&db, "sobel3", "sb3").unwrap();
        add_species_column(&db, CatchKind::Seine, &Species::new("SKJ")).unwrap();
        assert_eq!(
            db.column_names("SELECT * FROM Environments").unwrap(),
            vec!["ID", "position", "timeLag", "parameter", "value", "sobel3"]
        );
        assert_eq!(
            db.column_names("SELECT * FROM Seines").unwrap().last().map(String::as_str),
            Some("SKJ")
        );
        let operations = db.query("SELECT name, prefix FROM Operations ORDER BY name", &[]).unwrap();
        assert_eq!(
            operations,
            vec![
                vec![Value::from("sobel3"), Value::from("sb3")],
                vec![Value::from("value"), Value::from("")],
            ]
        );
    }

    #[test]
    fn rejects_unsafe_names() {
        let db = Database::open_in_memory(&DatabaseConfig::default()).unwrap();
        create_default_schema(&db).unwrap();
        assert!(matches!(
            register_operation(&db, "x REAL; DROP TABLE Seines", ""),
            Err(CatchError::InvalidIdentifier { .. })
        ));
    }
}
