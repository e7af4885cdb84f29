//! Shared handle over one SQLite connection.
//!
//! Every clone of a [`Database`] talks to the same connection through one
//! lock, held for the duration of each call. Closing the handle drops the
//! connection; later calls through any clone (including cursors opened
//! earlier) fail with [`CatchError::Closed`].

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::FixedOffset;
use parking_lot::Mutex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, params_from_iter};

use catchdb_error::{CatchError, Result};
use catchdb_types::Value;

use crate::config::DatabaseConfig;

/// Capacity of rusqlite's prepared-statement cache.
const STATEMENT_CACHE_CAPACITY: usize = 64;

#[derive(Debug)]
struct Shared {
    connection: Mutex<Option<Connection>>,
    zone: FixedOffset,
    fetch_size: usize,
    statements: AtomicU64,
}

/// Cloneable handle to the catch database.
#[derive(Debug, Clone)]
pub struct Database {
    shared: Arc<Shared>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>, config: &DatabaseConfig) -> Result<Self> {
        Self::from_connection(Connection::open(path)?, config)
    }

    pub fn open_in_memory(config: &DatabaseConfig) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, config)
    }

    pub fn from_connection(connection: Connection, config: &DatabaseConfig) -> Result<Self> {
        config.validate()?;
        connection.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);
        Ok(Self {
            shared: Arc::new(Shared {
                connection: Mutex::new(Some(connection)),
                zone: config.zone()?,
                fetch_size: config.fetch_size,
                statements: AtomicU64::new(0),
            }),
        })
    }

    /// Timezone in which catch timestamps are stored.
    #[must_use]
    pub fn zone(&self) -> FixedOffset {
        self.shared.zone
    }

    /// Rows fetched per cursor page.
    #[must_use]
    pub fn fetch_size(&self) -> usize {
        self.shared.fetch_size
    }

    /// Number of statements executed through this handle (queries, updates
    /// and batches).
    #[must_use]
    pub fn statements_executed(&self) -> u64 {
        self.shared.statements.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.connection.lock().is_none()
    }

    /// Close the connection. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let taken = self.shared.connection.lock().take();
        if let Some(connection) = taken {
            connection.close().map_err(|(_, error)| error)?;
            tracing::debug!("database.closed");
        }
        Ok(())
    }

    fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.shared.connection.lock();
        let connection = guard
            .as_ref()
            .ok_or(CatchError::Closed { what: "database" })?;
        f(connection)
    }

    fn count_statement(&self) {
        self.shared.statements.fetch_add(1, Ordering::Relaxed);
    }

    /// Column names of `sql`, read from the prepared statement without
    /// executing it.
    pub fn column_names(&self, sql: &str) -> Result<Vec<String>> {
        self.with_connection(|connection| {
            let statement = connection.prepare_cached(sql)?;
            Ok(statement
                .column_names()
                .into_iter()
                .map(str::to_owned)
                .collect())
        })
    }

    /// Run a query and collect every row.
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Vec<Value>>> {
        self.with_connection(|connection| {
            let mut statement = connection.prepare_cached(sql)?;
            let width = statement.column_count();
            self.count_statement();
            let mut rows = statement.query(params_from_iter(params.iter().map(to_sql)))?;
            let mut collected = Vec::new();
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(width);
                for index in 0..width {
                    values.push(from_sql(row.get_ref(index)?)?);
                }
                collected.push(values);
            }
            Ok(collected)
        })
    }

    /// Run an UPDATE, INSERT or DDL statement and return the affected row count.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        self.with_connection(|connection| {
            let mut statement = connection.prepare_cached(sql)?;
            self.count_statement();
            Ok(statement.execute(params_from_iter(params.iter().map(to_sql)))?)
        })
    }

    /// Run several `;`-separated statements without parameters.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.with_connection(|connection| {
            self.count_statement();
            Ok(connection.execute_batch(sql)?)
        })
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Float(f) if f.is_nan() => SqlValue::Null,
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Result<Value> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(_) => {
            return Err(CatchError::TypeMismatch {
                expected: "null, integer, real or text",
                actual: "blob",
            });
        }
    })
}
