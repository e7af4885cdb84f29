//! Parameter and operation lookups, and the column-naming scheme built on
//! them.

use std::sync::Arc;

use catchdb_error::{CatchError, Result};
use catchdb_types::{StepKey, Value, column_label};

use crate::database::Database;
use crate::templates::{SqlTemplates, Template};

/// Which lookup table to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Parameters,
    Operations,
}

impl CatalogKind {
    const fn template(self) -> Template {
        match self {
            Self::Parameters => Template::ParameterList,
            Self::Operations => Template::OperationList,
        }
    }
}

/// Resolves parameter and operation names against the lookup tables.
#[derive(Debug, Clone)]
pub struct Catalog {
    database: Database,
    templates: Arc<SqlTemplates>,
}

impl Catalog {
    #[must_use]
    pub fn new(database: Database, templates: Arc<SqlTemplates>) -> Self {
        Self {
            database,
            templates,
        }
    }

    #[must_use]
    pub fn templates(&self) -> &Arc<SqlTemplates> {
        &self.templates
    }

    /// Code of the parameter called `name`.
    pub fn resolve_parameter_id(&self, name: &str) -> Result<i32> {
        let value = self.lookup(
            "parameter",
            self.templates.parameter_by_name(),
            Value::from(name),
            0,
        )?;
        let id = value.as_i64()?;
        i32::try_from(id).map_err(|_| CatchError::TypeMismatch {
            expected: "32-bit parameter code",
            actual: "out-of-range integer",
        })
    }

    /// Name of the parameter with code `id`.
    pub fn resolve_parameter_name(&self, id: i32) -> Result<String> {
        let value = self.lookup(
            "parameter",
            self.templates.get(Template::Parameters),
            Value::from(id),
            1,
        )?;
        Ok(value.as_str()?.to_owned())
    }

    /// Column prefix of the operation called `name`. A NULL prefix is the
    /// empty prefix.
    pub fn resolve_operation_prefix(&self, name: &str) -> Result<String> {
        let value = self.lookup(
            "operation",
            self.templates.get(Template::Operations),
            Value::from(name),
            1,
        )?;
        if value.is_null() {
            return Ok(String::new());
        }
        Ok(value.as_str()?.to_owned())
    }

    /// Names in the lookup table, without duplicates, in first-seen order.
    pub fn list_available(&self, kind: CatalogKind) -> Result<Vec<String>> {
        let rows = self.database.query(self.templates.get(kind.template()), &[])?;
        let mut names: Vec<String> = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(value) = row.into_iter().next() else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let name = value.as_str()?.to_owned();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Output column label of `operation` for `key`, e.g. `grSST-05`.
    pub fn column_label(&self, key: &StepKey, operation: &str) -> Result<String> {
        let parameter = self.resolve_parameter_name(key.parameter)?;
        let prefix = self.resolve_operation_prefix(operation)?;
        Ok(column_label(&prefix, &parameter, key.time_lag))
    }

    /// Labels of every operation of one step, in order.
    pub fn column_labels<S: AsRef<str>>(&self, key: &StepKey, operations: &[S]) -> Result<Vec<String>> {
        let parameter = self.resolve_parameter_name(key.parameter)?;
        operations
            .iter()
            .map(|operation| {
                let prefix = self.resolve_operation_prefix(operation.as_ref())?;
                Ok(column_label(&prefix, &parameter, key.time_lag))
            })
            .collect()
    }

    /// Run a lookup and require exactly one distinct value in `column`.
    fn lookup(&self, kind: &'static str, sql: &str, key: Value, column: usize) -> Result<Value> {
        let _span = tracing::debug_span!("catalog.lookup", kind, key = %key).entered();
        let rows = self.database.query(sql, std::slice::from_ref(&key))?;
        let mut distinct: Vec<Value> = Vec::new();
        for row in rows {
            let value = row
                .into_iter()
                .nth(column)
                .ok_or(CatchError::NoSuchColumn { index: column })?;
            if !distinct.contains(&value) {
                distinct.push(value);
            }
        }
        match distinct.len() {
            0 => Err(CatchError::not_found(kind, &key)),
            1 => Ok(distinct.remove(0)),
            candidates => Err(CatchError::ambiguous(kind, &key, candidates)),
        }
    }
}
