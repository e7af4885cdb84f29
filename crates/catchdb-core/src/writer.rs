//! Write-back of single environment values, UPDATE first then INSERT.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use catchdb_error::{CatchError, Result};
use catchdb_types::{CatchRecord, StepKey, Value, time_lag_days};

use crate::database::Database;
use crate::sql;
use crate::templates::{SqlTemplates, Template};

const ENVIRONMENTS: &str = "Environments";

/// What [`EnvironmentWriter::set_value`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// NaN value: nothing was written.
    Skipped,
    /// An existing row was updated.
    Updated,
    /// No row existed for the key; one was inserted.
    Inserted,
}

/// Stores environment values for individual catches.
#[derive(Debug, Clone)]
pub struct EnvironmentWriter {
    database: Database,
    templates: Arc<SqlTemplates>,
}

impl EnvironmentWriter {
    #[must_use]
    pub fn new(database: Database, templates: Arc<SqlTemplates>) -> Self {
        Self {
            database,
            templates,
        }
    }

    /// Store `value` in column `column` for `record` at `key`.
    ///
    /// The position is clamped by the record's geometry. When `measured_at`
    /// is given, the time lag is the floored number of days from the catch
    /// to the measurement instead of the key's own lag. NaN writes nothing.
    pub fn set_value(
        &self,
        record: &CatchRecord,
        key: &StepKey,
        column: &str,
        value: f64,
        measured_at: Option<DateTime<Utc>>,
    ) -> Result<WriteOutcome> {
        if value.is_nan() {
            return Ok(WriteOutcome::Skipped);
        }
        let time_lag = measured_at.map_or(key.time_lag, |measured| {
            time_lag_days(record.captured_at(), measured)
        });
        let target = key.relocated(record.clamp_position(key.position), time_lag);
        let _span = tracing::debug_span!(
            "environment.set_value",
            id = record.id(),
            parameter = target.parameter,
            position = %target.position,
            time_lag = target.time_lag,
            column
        )
        .entered();

        let position = Value::from(target.position.code());
        let lag = Value::from(target.time_lag);
        let parameter = Value::from(target.parameter);
        let id = Value::Integer(record.id());
        let value = Value::Float(value);

        let update = sql::replace_placeholder(self.templates.get(Template::EnvironmentUpdate), column)?;
        let updated = self.database.execute(
            &update,
            &[
                value.clone(),
                id.clone(),
                position.clone(),
                lag.clone(),
                parameter.clone(),
            ],
        )?;
        match updated {
            1 => return Ok(WriteOutcome::Updated),
            0 => {}
            actual => return Err(unexpected_count(actual)),
        }

        let insert = sql::replace_placeholder(self.templates.get(Template::EnvironmentInsert), column)?;
        let inserted = self
            .database
            .execute(&insert, &[id, position, lag, parameter, value])?;
        if inserted == 1 {
            Ok(WriteOutcome::Inserted)
        } else {
            Err(unexpected_count(inserted))
        }
    }
}

fn unexpected_count(actual: usize) -> CatchError {
    tracing::warn!(table = ENVIRONMENTS, expected = 1, actual, "environment.update.count");
    CatchError::UnexpectedUpdateCount {
        table: ENVIRONMENTS.to_owned(),
        expected: 1,
        actual,
    }
}
