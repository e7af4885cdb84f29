//! Forward-only, read-only cursors keyed by catch ID.
//!
//! Column 0 of every cursor is the integer key. Rows arrive in strictly
//! ascending key order; the merge row-set depends on it.

use std::collections::VecDeque;
use std::fmt;

use catchdb_error::{CatchError, Result};
use catchdb_types::Value;

use crate::database::Database;
use crate::sql;

/// Read-only, forward-only access to rows keyed by an integer ID.
///
/// Nothing here writes through, seeks or scrolls back.
pub trait RowSet: fmt::Debug + Send {
    /// Advance to the next row. Returns `false` once no row is left.
    fn next(&mut self) -> Result<bool>;

    /// Key of the current row.
    fn key(&self) -> Result<i64>;

    /// Number of columns, the key column included.
    fn column_count(&self) -> usize;

    fn column_name(&self, index: usize) -> Result<&str>;

    /// Value of column `index` in the current row.
    fn value(&mut self, index: usize) -> Result<Value>;

    /// Whether the last value read was NULL.
    fn was_null(&self) -> bool;

    /// Release the cursor. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Column `index` as a real; NULL reads as NaN.
    fn get_f64(&mut self, index: usize) -> Result<f64> {
        self.value(index)?.as_f64()
    }

    fn get_i64(&mut self, index: usize) -> Result<i64> {
        self.value(index)?.as_i64()
    }

    /// All column labels, key first.
    fn column_names(&self) -> Result<Vec<String>> {
        (0..self.column_count())
            .map(|index| self.column_name(index).map(str::to_owned))
            .collect()
    }
}

fn row_key(row: &[Value]) -> Result<i64> {
    row.first()
        .ok_or(CatchError::NoSuchColumn { index: 0 })?
        .as_i64()
}

fn usize_to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Cursor over a SQL query whose first column is the key.
///
/// Rows are fetched a page at a time with keyset pagination, so at most
/// `fetch_size + 1` rows are held in memory. A key repeated within the
/// result fails with [`CatchError::KeyOrder`].
pub struct SqlCursor {
    database: Database,
    name: String,
    page_sql: String,
    params: Vec<Value>,
    labels: Vec<String>,
    fetch_size: usize,
    page: VecDeque<Vec<Value>>,
    current: Option<Vec<Value>>,
    last_key: Option<i64>,
    drained: bool,
    closed: bool,
    was_null: bool,
}

impl fmt::Debug for SqlCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlCursor")
            .field("name", &self.name)
            .field("labels", &self.labels)
            .field("last_key", &self.last_key)
            .field("buffered", &self.page.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl SqlCursor {
    /// Open a cursor over `sql` bound to `params`. Nothing is fetched until
    /// the first call to [`RowSet::next`].
    pub fn open(
        database: &Database,
        name: impl Into<String>,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Self> {
        let labels = database.column_names(sql)?;
        let key_column = labels
            .first()
            .ok_or_else(|| CatchError::configuration(sql, "query selects no key column"))?;
        let page_sql = sql::keyset_page(sql, key_column);
        Ok(Self {
            database: database.clone(),
            name: name.into(),
            page_sql,
            params,
            labels,
            fetch_size: database.fetch_size(),
            page: VecDeque::new(),
            current: None,
            last_key: None,
            drained: false,
            closed: false,
            was_null: false,
        })
    }

    /// Replace the column names reported by this cursor.
    pub fn with_labels(mut self, labels: Vec<String>) -> Result<Self> {
        if labels.len() != self.labels.len() {
            return Err(CatchError::ColumnCountMismatch {
                declared: labels.len(),
                provided: self.labels.len(),
            });
        }
        self.labels = labels;
        Ok(self)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The first page starts at the smallest key; later pages start again
    /// at the last key seen, so that a repeated key is still observed.
    fn fetch_page(&mut self) -> Result<()> {
        let (bound, limit) = match self.last_key {
            None => (i64::MIN, self.fetch_size),
            Some(last) => (last, self.fetch_size + 1),
        };
        let mut params = self.params.clone();
        params.push(Value::Integer(bound));
        params.push(Value::Integer(usize_to_i64(limit)));
        let rows = self.database.query(&self.page_sql, &params)?;
        self.drained = rows.len() < limit;
        let mut rows = VecDeque::from(rows);
        if let (Some(last), Some(first)) = (self.last_key, rows.front()) {
            if row_key(first)? == last {
                rows.pop_front();
            }
        }
        tracing::trace!(cursor = %self.name, rows = rows.len(), "cursor.page");
        self.page = rows;
        Ok(())
    }

    fn current(&self) -> Result<&[Value]> {
        self.current.as_deref().ok_or(CatchError::NoCurrentRow)
    }
}

impl RowSet for SqlCursor {
    fn next(&mut self) -> Result<bool> {
        if self.closed {
            return Err(CatchError::Closed { what: "cursor" });
        }
        if self.page.is_empty() && !self.drained {
            self.fetch_page()?;
        }
        let Some(row) = self.page.pop_front() else {
            self.current = None;
            self.drained = true;
            return Ok(false);
        };
        let key = row_key(&row)?;
        if let Some(previous) = self.last_key {
            if key <= previous {
                return Err(CatchError::KeyOrder {
                    source_name: self.name.clone(),
                    previous,
                    key,
                });
            }
        }
        self.last_key = Some(key);
        self.current = Some(row);
        Ok(true)
    }

    fn key(&self) -> Result<i64> {
        row_key(self.current()?)
    }

    fn column_count(&self) -> usize {
        self.labels.len()
    }

    fn column_name(&self, index: usize) -> Result<&str> {
        self.labels
            .get(index)
            .map(String::as_str)
            .ok_or(CatchError::NoSuchColumn { index })
    }

    fn value(&mut self, index: usize) -> Result<Value> {
        let value = self
            .current()?
            .get(index)
            .cloned()
            .ok_or(CatchError::NoSuchColumn { index })?;
        self.was_null = value.is_null();
        Ok(value)
    }

    fn was_null(&self) -> bool {
        self.was_null
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.page.clear();
            self.current = None;
            tracing::trace!(cursor = %self.name, "cursor.closed");
        }
        Ok(())
    }
}

/// In-memory cursor over pre-seeded `(key, columns)` rows.
///
/// Serves as the empty result of an unconfigured coupling table and as a
/// stand-in for SQL cursors in tests. Rows are returned as given; key
/// order is not checked here.
#[derive(Debug, Default)]
pub struct MemoryCursor {
    labels: Vec<String>,
    rows: Vec<(i64, Vec<Value>)>,
    position: Option<usize>,
    was_null: bool,
    closed: bool,
}

impl MemoryCursor {
    /// `labels` names every column, key first; each row carries the
    /// non-key columns.
    #[must_use]
    pub fn new<I, S>(labels: I, rows: Vec<(i64, Vec<Value>)>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            rows,
            position: None,
            was_null: false,
            closed: false,
        }
    }

    /// Cursor with only a key column and no rows.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(["ID"], Vec::new())
    }

    /// Cursor over bare keys, with a single `ID` column.
    #[must_use]
    pub fn keys(keys: &[i64]) -> Self {
        Self::new(["ID"], keys.iter().map(|&key| (key, Vec::new())).collect())
    }

    fn current(&self) -> Result<&(i64, Vec<Value>)> {
        self.position
            .and_then(|position| self.rows.get(position))
            .ok_or(CatchError::NoCurrentRow)
    }
}

impl RowSet for MemoryCursor {
    fn next(&mut self) -> Result<bool> {
        if self.closed {
            return Err(CatchError::Closed { what: "cursor" });
        }
        let next = self.position.map_or(0, |position| position + 1);
        self.position = Some(next.min(self.rows.len()));
        Ok(next < self.rows.len())
    }

    fn key(&self) -> Result<i64> {
        Ok(self.current()?.0)
    }

    fn column_count(&self) -> usize {
        self.labels.len()
    }

    fn column_name(&self, index: usize) -> Result<&str> {
        self.labels
            .get(index)
            .map(String::as_str)
            .ok_or(CatchError::NoSuchColumn { index })
    }

    fn value(&mut self, index: usize) -> Result<Value> {
        if index >= self.labels.len() {
            return Err(CatchError::NoSuchColumn { index });
        }
        let (key, columns) = self.current()?;
        let value = if index == 0 {
            Value::Integer(*key)
        } else {
            columns.get(index - 1).cloned().unwrap_or(Value::Null)
        };
        self.was_null = value.is_null();
        Ok(value)
    }

    fn was_null(&self) -> bool {
        self.was_null
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
