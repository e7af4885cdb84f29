//! Sort-merge inner join of key-ordered cursors into one wide row-set.
//!
//! Every input cursor yields rows in strictly ascending key order. The
//! merge keeps a consensus key and, on each step, pulls every cursor up to
//! it; a cursor that overshoots raises the consensus and the sweep starts
//! over from the first cursor. A row is emitted only when one full pass
//! leaves every cursor on the consensus key.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use catchdb_error::{CatchError, Result};
use catchdb_types::Value;

use crate::cursor::RowSet;

/// Point-in-time snapshot of merge-join counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeMetricsSnapshot {
    /// Rows emitted by all merge row-sets.
    pub catchdb_merge_rows_total: u64,
    /// Calls to an input cursor's `next` issued by the merge.
    pub catchdb_merge_cursor_steps_total: u64,
    /// Sweeps restarted because a cursor overshot the consensus key.
    pub catchdb_merge_restarts_total: u64,
}

static CATCHDB_MERGE_ROWS_TOTAL: AtomicU64 = AtomicU64::new(0);
static CATCHDB_MERGE_CURSOR_STEPS_TOTAL: AtomicU64 = AtomicU64::new(0);
static CATCHDB_MERGE_RESTARTS_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Snapshot merge counters.
#[must_use]
pub fn merge_metrics_snapshot() -> MergeMetricsSnapshot {
    MergeMetricsSnapshot {
        catchdb_merge_rows_total: CATCHDB_MERGE_ROWS_TOTAL.load(AtomicOrdering::Relaxed),
        catchdb_merge_cursor_steps_total: CATCHDB_MERGE_CURSOR_STEPS_TOTAL
            .load(AtomicOrdering::Relaxed),
        catchdb_merge_restarts_total: CATCHDB_MERGE_RESTARTS_TOTAL.load(AtomicOrdering::Relaxed),
    }
}

/// Reset merge counters.
pub fn reset_merge_metrics() {
    CATCHDB_MERGE_ROWS_TOTAL.store(0, AtomicOrdering::Relaxed);
    CATCHDB_MERGE_CURSOR_STEPS_TOTAL.store(0, AtomicOrdering::Relaxed);
    CATCHDB_MERGE_RESTARTS_TOTAL.store(0, AtomicOrdering::Relaxed);
}

/// Per-row-set merge statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeStats {
    /// Rows emitted by this row-set.
    pub rows: u64,
    /// Calls to an input cursor's `next` issued by this row-set.
    pub cursor_steps: u64,
    /// Sweeps restarted because a cursor overshot the consensus key.
    pub restarts: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeState {
    /// Before the first row or between rows.
    Running,
    /// Some cursor ran out; no further row exists.
    Exhausted,
    Closed,
}

/// Where a logical column is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnSource {
    cursor: usize,
    column: usize,
}

/// Inner join of N key-ordered cursors on their key column.
///
/// Logical column 0 is the key; the remaining columns are the non-key
/// columns of each cursor, in cursor order.
#[derive(Debug)]
pub struct CouplingRowSet {
    cursors: Vec<Box<dyn RowSet>>,
    labels: Vec<String>,
    columns: Vec<ColumnSource>,
    /// Last key seen per cursor, to detect keys that fail to increase.
    last_keys: Vec<Option<i64>>,
    current_id: i64,
    state: MergeState,
    on_row: bool,
    last_read: Option<usize>,
    stats: MergeStats,
}

impl CouplingRowSet {
    /// Build a row-set over `cursors`, reporting `labels` as its column
    /// names (key label first).
    ///
    /// `labels` must name exactly one key column plus every non-key column
    /// of every cursor.
    pub fn try_new(cursors: Vec<Box<dyn RowSet>>, labels: Vec<String>) -> Result<Self> {
        let provided = 1 + cursors
            .iter()
            .map(|cursor| cursor.column_count().saturating_sub(1))
            .sum::<usize>();
        if cursors.is_empty() || labels.len() != provided {
            return Err(CatchError::ColumnCountMismatch {
                declared: labels.len(),
                provided: if cursors.is_empty() { 0 } else { provided },
            });
        }
        let mut columns = Vec::with_capacity(provided);
        columns.push(ColumnSource {
            cursor: 0,
            column: 0,
        });
        for (index, cursor) in cursors.iter().enumerate() {
            for column in 1..cursor.column_count() {
                columns.push(ColumnSource {
                    cursor: index,
                    column,
                });
            }
        }
        let _span = tracing::debug_span!("merge.open", cursors = cursors.len(), columns = provided)
            .entered();
        tracing::debug!("merge.column_map.built");
        Ok(Self {
            last_keys: vec![None; cursors.len()],
            cursors,
            labels,
            columns,
            current_id: i64::MIN,
            state: MergeState::Running,
            on_row: false,
            last_read: None,
            stats: MergeStats::default(),
        })
    }

    /// Statistics of this row-set so far.
    #[must_use]
    pub const fn stats(&self) -> MergeStats {
        self.stats
    }

    /// Number of input cursors.
    #[must_use]
    pub fn width(&self) -> usize {
        self.cursors.len()
    }

    fn step_cursor(&mut self, index: usize) -> Result<Option<i64>> {
        self.stats.cursor_steps += 1;
        let cursor = &mut self.cursors[index];
        if !cursor.next()? {
            return Ok(None);
        }
        let key = cursor.key()?;
        if let Some(previous) = self.last_keys[index] {
            if key <= previous {
                return Err(CatchError::KeyOrder {
                    source_name: format!("cursor {index}"),
                    previous,
                    key,
                });
            }
        }
        self.last_keys[index] = Some(key);
        Ok(Some(key))
    }

    /// Run one sweep. Returns `false` as soon as any cursor runs out.
    fn advance(&mut self) -> Result<bool> {
        // The consensus must strictly increase from one emitted row to the next.
        if self.on_row {
            if self.current_id == i64::MAX {
                return Ok(false);
            }
            self.current_id += 1;
        }
        let mut skip: Option<usize> = None;
        'sweep: loop {
            for index in 0..self.cursors.len() {
                if skip == Some(index) {
                    continue;
                }
                let positioned = self.last_keys[index];
                let mut key = match positioned {
                    Some(key) if key >= self.current_id => key,
                    _ => match self.step_cursor(index)? {
                        Some(key) => key,
                        None => return Ok(false),
                    },
                };
                while key < self.current_id {
                    key = match self.step_cursor(index)? {
                        Some(key) => key,
                        None => return Ok(false),
                    };
                }
                if key > self.current_id {
                    self.current_id = key;
                    skip = Some(index);
                    self.stats.restarts += 1;
                    continue 'sweep;
                }
            }
            return Ok(true);
        }
    }

    fn finish(&mut self) {
        CATCHDB_MERGE_ROWS_TOTAL.fetch_add(self.stats.rows, AtomicOrdering::Relaxed);
        CATCHDB_MERGE_CURSOR_STEPS_TOTAL.fetch_add(self.stats.cursor_steps, AtomicOrdering::Relaxed);
        CATCHDB_MERGE_RESTARTS_TOTAL.fetch_add(self.stats.restarts, AtomicOrdering::Relaxed);
        tracing::info!(
            cursors = self.cursors.len(),
            rows = self.stats.rows,
            cursor_steps = self.stats.cursor_steps,
            restarts = self.stats.restarts,
            "merge.complete"
        );
    }

    fn ensure_row(&self) -> Result<()> {
        match self.state {
            MergeState::Closed => Err(CatchError::Closed { what: "row-set" }),
            _ if !self.on_row => Err(CatchError::NoCurrentRow),
            _ => Ok(()),
        }
    }
}

impl RowSet for CouplingRowSet {
    fn next(&mut self) -> Result<bool> {
        match self.state {
            MergeState::Closed => return Err(CatchError::Closed { what: "row-set" }),
            MergeState::Exhausted => return Ok(false),
            MergeState::Running => {}
        }
        let found = match self.advance() {
            Ok(found) => found,
            Err(error) => {
                self.on_row = false;
                self.state = MergeState::Exhausted;
                self.finish();
                return Err(error);
            }
        };
        self.on_row = found;
        self.last_read = None;
        if found {
            self.stats.rows += 1;
        } else {
            self.state = MergeState::Exhausted;
            self.finish();
        }
        Ok(found)
    }

    fn key(&self) -> Result<i64> {
        self.ensure_row()?;
        Ok(self.current_id)
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
        self.ensure_row()?;
        let source = *self
            .columns
            .get(index)
            .ok_or(CatchError::NoSuchColumn { index })?;
        if index == 0 {
            self.last_read = None;
            return Ok(Value::Integer(self.current_id));
        }
        let value = self.cursors[source.cursor].value(source.column)?;
        self.last_read = Some(source.cursor);
        Ok(value)
    }

    fn was_null(&self) -> bool {
        self.last_read
            .is_some_and(|cursor| self.cursors[cursor].was_null())
    }

    fn close(&mut self) -> Result<()> {
        if self.state == MergeState::Closed {
            return Ok(());
        }
        if self.state == MergeState::Running {
            self.finish();
        }
        self.state = MergeState::Closed;
        self.on_row = false;
        let mut first_error = None;
        for cursor in &mut self.cursors {
            if let Err(error) = cursor.close() {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
