//! Coupling table: catches side by side with the environment values
//! requested for them.
//!
//! The table moves between three states. It starts configured; asking for
//! a row-set makes it active; closing the row-set (or changing the
//! configuration) makes it configured again; closing the table is final.

use std::collections::BTreeMap;
use std::sync::Arc;

use catchdb_error::{CatchError, Result};
use catchdb_types::{CatchKind, Position, StepKey};

use crate::catalog::Catalog;
use crate::cursor::{MemoryCursor, RowSet, SqlCursor};
use crate::database::Database;
use crate::merge::CouplingRowSet;
use crate::sql;
use crate::step::EnvironmentStep;
use crate::templates::{SqlTemplates, Template};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    Configured,
    Active,
    Closed,
}

#[derive(Debug, Clone)]
struct CatchColumns {
    kind: CatchKind,
    columns: Vec<String>,
}

/// Catalog of environment steps and the row-set built from them.
#[derive(Debug)]
pub struct CouplingTable {
    database: Database,
    templates: Arc<SqlTemplates>,
    catalog: Catalog,
    steps: BTreeMap<StepKey, EnvironmentStep>,
    include_nulls: bool,
    catch: Option<CatchColumns>,
    row_set: Option<Box<dyn RowSet>>,
    closed: bool,
}

impl CouplingTable {
    #[must_use]
    pub fn new(database: Database, templates: Arc<SqlTemplates>) -> Self {
        let catalog = Catalog::new(database.clone(), Arc::clone(&templates));
        Self {
            database,
            templates,
            catalog,
            steps: BTreeMap::new(),
            include_nulls: false,
            catch: None,
            row_set: None,
            closed: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> TableState {
        if self.closed {
            TableState::Closed
        } else if self.row_set.is_some() {
            TableState::Active
        } else {
            TableState::Configured
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Whether steps added from now on keep rows with NULL values.
    pub fn set_null_included(&mut self, include: bool) -> Result<()> {
        self.reconfigure()?;
        self.include_nulls = include;
        Ok(())
    }

    #[must_use]
    pub const fn is_null_included(&self) -> bool {
        self.include_nulls
    }

    /// Drive the table from the catches of `kind`, adding `columns` of the
    /// catch table after the ID.
    pub fn set_catch_columns<S: AsRef<str>>(&mut self, kind: CatchKind, columns: &[S]) -> Result<()> {
        let columns = columns
            .iter()
            .map(|column| sql::validate_identifier(column.as_ref()).map(str::to_owned))
            .collect::<Result<Vec<_>>>()?;
        self.reconfigure()?;
        self.catch = Some(CatchColumns { kind, columns });
        Ok(())
    }

    /// Stop driving the table from a catch table.
    pub fn clear_catch_columns(&mut self) -> Result<()> {
        self.reconfigure()?;
        self.catch = None;
        Ok(())
    }

    /// Request `operation` of the parameter called `parameter`. Returns
    /// `false` if it was already requested.
    pub fn add_parameter(
        &mut self,
        parameter: &str,
        operation: &str,
        position: Position,
        time_lag: i32,
    ) -> Result<bool> {
        self.ensure_open()?;
        let code = self.catalog.resolve_parameter_id(parameter)?;
        self.catalog.resolve_operation_prefix(operation)?;
        sql::validate_identifier(operation)?;
        let key = StepKey::new(code, position, time_lag).with_nulls(self.include_nulls);
        if self.requests(&key, operation) {
            return Ok(false);
        }
        self.reconfigure()?;
        let step = self
            .steps
            .entry(key)
            .or_insert_with(|| EnvironmentStep::new(key));
        if let Err(error) = step.add_column(operation) {
            if step.is_empty() {
                self.steps.remove(&key);
            }
            return Err(error);
        }
        tracing::debug!(step = %key, operation, "coupling.parameter.added");
        Ok(true)
    }

    /// Withdraw `operation` of `parameter`. A step left without operations
    /// is closed and dropped. Returns `false` if nothing matched.
    pub fn remove_parameter(
        &mut self,
        parameter: &str,
        operation: &str,
        position: Position,
        time_lag: i32,
    ) -> Result<bool> {
        self.ensure_open()?;
        let code = self.catalog.resolve_parameter_id(parameter)?;
        let base = StepKey::new(code, position, time_lag);
        let Some(key) = [
            base.with_nulls(self.include_nulls),
            base.with_nulls(!self.include_nulls),
        ]
        .into_iter()
        .find(|key| self.requests(key, operation)) else {
            return Ok(false);
        };
        self.reconfigure()?;
        let Some(step) = self.steps.get_mut(&key) else {
            return Ok(false);
        };
        step.remove_column(operation)?;
        if step.is_empty() {
            step.close();
            self.steps.remove(&key);
            tracing::debug!(step = %key, "coupling.step.dropped");
        }
        Ok(true)
    }

    /// Configured steps and their operations, in key order.
    #[must_use]
    pub fn parameters(&self) -> Vec<(StepKey, Vec<String>)> {
        self.steps
            .iter()
            .map(|(key, step)| (*key, step.operations().to_vec()))
            .collect()
    }

    /// Output labels: `ID`, the catch columns, then one label per step
    /// operation.
    pub fn column_labels(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let mut labels = vec!["ID".to_owned()];
        if let Some(catch) = &self.catch {
            labels.extend(catch.columns.iter().cloned());
        }
        for (key, step) in &self.steps {
            labels.extend(self.catalog.column_labels(key, step.operations())?);
        }
        Ok(labels)
    }

    /// Close any live row-set and build a new one from the current
    /// configuration.
    pub fn row_set(&mut self) -> Result<&mut dyn RowSet> {
        self.ensure_open()?;
        self.close_row_set()?;
        let _span = tracing::debug_span!(
            "coupling.row_set",
            steps = self.steps.len(),
            catch = self.catch.as_ref().map(|catch| catch.kind.table())
        )
        .entered();
        let labels = self.column_labels()?;
        let mut cursors = Vec::with_capacity(self.steps.len() + 1);
        if let Some(catch) = &self.catch {
            let sql = sql::complete_select(
                self.templates.get(Template::CatchIds(catch.kind)),
                &catch.columns,
            )?;
            cursors.push(SqlCursor::open(&self.database, catch.kind.table(), &sql, Vec::new())?);
        }
        for step in self.steps.values_mut() {
            cursors.push(step.open(&self.database, &self.templates)?);
        }
        let row_set: Box<dyn RowSet> = match cursors.len() {
            0 => Box::new(MemoryCursor::empty()),
            1 => match cursors.pop() {
                Some(cursor) => Box::new(cursor.with_labels(labels)?),
                None => Box::new(MemoryCursor::empty()),
            },
            _ => Box::new(CouplingRowSet::try_new(
                cursors
                    .into_iter()
                    .map(|cursor| Box::new(cursor) as Box<dyn RowSet>)
                    .collect(),
                labels,
            )?),
        };
        Ok(&mut **self.row_set.insert(row_set))
    }

    /// Close the live row-set, if any.
    pub fn close_row_set(&mut self) -> Result<()> {
        if let Some(mut row_set) = self.row_set.take() {
            row_set.close()?;
            tracing::debug!("coupling.row_set.closed");
        }
        Ok(())
    }

    /// Close the row-set and every step. The table cannot be used again.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.close_row_set();
        for step in self.steps.values_mut() {
            step.close();
        }
        self.steps.clear();
        self.closed = true;
        result
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(CatchError::Closed {
                what: "coupling table",
            });
        }
        Ok(())
    }

    fn requests(&self, key: &StepKey, operation: &str) -> bool {
        self.steps
            .get(key)
            .is_some_and(|step| step.operations().iter().any(|existing| existing == operation))
    }

    fn reconfigure(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.close_row_set()
    }
}
