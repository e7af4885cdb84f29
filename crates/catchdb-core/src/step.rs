//! Environment steps: one (parameter, position, time lag) request and the
//! operations asked for it.

use catchdb_error::{CatchError, Result};
use catchdb_types::{StepKey, Value};

use crate::cursor::SqlCursor;
use crate::database::Database;
use crate::sql;
use crate::templates::{SqlTemplates, Template};

/// Statement text and bindings for one step, fixed at build time.
#[derive(Debug, Clone, PartialEq)]
pub struct StepQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

impl StepQuery {
    /// Open a cursor over the step's rows, ordered by catch ID.
    pub fn open(&self, database: &Database, name: impl Into<String>) -> Result<SqlCursor> {
        SqlCursor::open(database, name, &self.sql, self.params.clone())
    }
}

/// Operations requested for one [`StepKey`].
///
/// The SELECT is rebuilt only after the operation list changes; the
/// statement text is then also the key of the prepared-statement cache.
#[derive(Debug, Clone)]
pub struct EnvironmentStep {
    key: StepKey,
    operations: Vec<String>,
    cached: Option<StepQuery>,
    closed: bool,
}

impl EnvironmentStep {
    #[must_use]
    pub fn new(key: StepKey) -> Self {
        Self {
            key,
            operations: Vec::new(),
            cached: None,
            closed: false,
        }
    }

    #[must_use]
    pub const fn key(&self) -> &StepKey {
        &self.key
    }

    #[must_use]
    pub fn operations(&self) -> &[String] {
        &self.operations
    }

    /// Number of value columns, the key column excluded.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Request `operation`. Returns `false` when it was already requested.
    pub fn add_column(&mut self, operation: &str) -> Result<bool> {
        self.ensure_open()?;
        sql::validate_identifier(operation)?;
        if self.operations.iter().any(|existing| existing == operation) {
            return Ok(false);
        }
        self.operations.push(operation.to_owned());
        self.invalidate();
        Ok(true)
    }

    /// Drop `operation`. Returns `false` when it was not requested.
    pub fn remove_column(&mut self, operation: &str) -> Result<bool> {
        self.ensure_open()?;
        let Some(index) = self.operations.iter().position(|existing| existing == operation) else {
            return Ok(false);
        };
        self.operations.remove(index);
        self.invalidate();
        Ok(true)
    }

    /// The step's query, rebuilt if the operations changed since last time.
    pub fn query(&mut self, templates: &SqlTemplates) -> Result<&StepQuery> {
        self.ensure_open()?;
        if self.cached.is_none() {
            self.cached = Some(self.build(templates)?);
        }
        self.cached
            .as_ref()
            .ok_or(CatchError::Closed { what: "environment step" })
    }

    /// Open a fresh cursor over this step's rows.
    pub fn open(&mut self, database: &Database, templates: &SqlTemplates) -> Result<SqlCursor> {
        let _span = tracing::debug_span!(
            "step.open",
            parameter = self.key.parameter,
            position = %self.key.position,
            time_lag = self.key.time_lag,
            columns = self.operations.len()
        )
        .entered();
        let name = self.key.to_string();
        self.query(templates)?.open(database, name)
    }

    /// Discard the cached query. Further use fails.
    pub fn close(&mut self) {
        self.cached = None;
        self.closed = true;
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(CatchError::Closed {
                what: "environment step",
            });
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        if self.cached.take().is_some() {
            tracing::debug!(step = %self.key, "step.query.invalidated");
        }
    }

    fn build(&self, templates: &SqlTemplates) -> Result<StepQuery> {
        let mut sql = sql::complete_select(templates.get(Template::Environments), &self.operations)?;
        if !self.key.allow_nulls {
            sql = sql::require_not_null(&sql, &self.operations)?;
        }
        Ok(StepQuery {
            sql,
            params: vec![
                Value::from(self.key.position.code()),
                Value::from(self.key.time_lag),
                Value::from(self.key.parameter),
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, Preferences};
    use crate::cursor::RowSet;
    use catchdb_types::Position;

    fn templates() -> SqlTemplates {
        SqlTemplates::new(&Preferences::new()).unwrap()
    }

    #[test]
    fn query_lists_operations_and_filters_nulls() {
        let mut step = EnvironmentStep::new(StepKey::new(3, Position::END, -2));
        assert!(step.add_column("value").unwrap());
        assert!(step.add_column("sobel3").unwrap());
        assert!(!step.add_column("value").unwrap());
        assert_eq!(step.column_count(), 2);
        let query = step.query(&templates()).unwrap();
        assert_eq!(
            query.sql,
            "SELECT ID, value, sobel3 FROM Environments WHERE position=? AND timeLag=? AND parameter=? \
             AND (value IS NOT NULL) AND (sobel3 IS NOT NULL) ORDER BY ID"
        );
        assert_eq!(
            query.params,
            vec![Value::Integer(100), Value::Integer(-2), Value::Integer(3)]
        );
    }

    #[test]
    fn nulls_allowed_skips_filter() {
        let key = StepKey::new(1, Position::Area, 0).with_nulls(true);
        let mut step = EnvironmentStep::new(key);
        step.add_column("value").unwrap();
        let query = step.query(&templates()).unwrap();
        assert!(!query.sql.contains("IS NOT NULL"));
        assert_eq!(query.params[0], Value::Integer(-1));
    }

    #[test]
    fn mutation_rebuilds_query() {
        let templates = templates();
        let mut step = EnvironmentStep::new(StepKey::new(1, Position::CENTER, 0));
        step.add_column("value").unwrap();
        let first = step.query(&templates).unwrap().sql.clone();
        assert_eq!(step.query(&templates).unwrap().sql, first);
        step.add_column("gradient").unwrap();
        assert_ne!(step.query(&templates).unwrap().sql, first);
        assert!(step.remove_column("gradient").unwrap());
        assert!(!step.remove_column("gradient").unwrap());
        assert_eq!(step.query(&templates).unwrap().sql, first);
        assert!(step.remove_column("value").unwrap());
        assert!(step.is_empty());
    }

    #[test]
    fn rejects_unsafe_operation_names() {
        let mut step = EnvironmentStep::new(StepKey::new(1, Position::CENTER, 0));
        assert!(matches!(
            step.add_column("value) OR (1=1"),
            Err(CatchError::InvalidIdentifier { .. })
        ));
        assert!(step.is_empty());
    }

    #[test]
    fn closed_step_refuses_use() {
        let mut step = EnvironmentStep::new(StepKey::new(1, Position::CENTER, 0));
        step.add_column("value").unwrap();
        step.close();
        assert!(step.is_closed());
        assert!(matches!(step.add_column("x"), Err(CatchError::Closed { .. })));
        assert!(step.query(&templates()).is_err());
    }

    #[test]
    fn open_reads_matching_rows_in_id_order() {
        let db = Database::open_in_memory(&DatabaseConfig::default()).unwrap();
        db.execute_batch(
            "CREATE TABLE Environments (ID INTEGER, position INTEGER, timeLag INTEGER,
                                        parameter INTEGER, value REAL);
             INSERT INTO Environments VALUES (8, 50, 0, 1, 20.5), (2, 50, 0, 1, 19.0),
                                             (5, 50, 0, 1, NULL), (4, 50, 1, 1, 7.0),
                                             (6, 0, 0, 1, 7.0), (3, 50, 0, 2, 7.0);",
        )
        .unwrap();
        let mut step = EnvironmentStep::new(StepKey::new(1, Position::CENTER, 0));
        step.add_column("value").unwrap();
        let mut cursor = step.open(&db, &templates()).unwrap();
        let mut rows = Vec::new();
        while cursor.next().unwrap() {
            rows.push((cursor.key().unwrap(), cursor.get_f64(1).unwrap()));
        }
        assert_eq!(rows, vec![(2, 19.0), (8, 20.5)]);
    }
}
