//! Catch records of one gear within a time range and a geographic area.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use catchdb_error::{CatchError, Result};
use catchdb_types::{
    CatchGeometry, CatchKind, CatchRecord, GeoBox, GeoPoint, Species, SpeciesSet, TimeRange,
    Value, format_stored_timestamp, parse_stored_timestamp,
};

use crate::database::Database;
use crate::sql;
use crate::templates::{SqlTemplates, Template};

#[derive(Debug, Clone, Copy)]
struct Coverage {
    area: Option<GeoBox>,
    time: Option<TimeRange>,
}

#[derive(Debug)]
struct QueryState {
    time_range: TimeRange,
    area: GeoBox,
    coverage: Option<Coverage>,
}

/// Query over the catch table of one gear.
///
/// Seines are filtered by area in SQL. Longline sets are segments, so
/// their area filter runs on the fetched rows.
#[derive(Debug)]
pub struct CatchQuery {
    database: Database,
    templates: Arc<SqlTemplates>,
    kind: CatchKind,
    species: SpeciesSet,
    sql: String,
    state: Mutex<QueryState>,
}

impl CatchQuery {
    /// Prepare a query returning the quantities of `species`, whose codes
    /// are the catch-table columns holding them.
    pub fn new<I>(
        database: Database,
        templates: Arc<SqlTemplates>,
        kind: CatchKind,
        species: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = Species>,
    {
        let species: SpeciesSet = species.into_iter().collect();
        let columns: Vec<&str> = species.iter().map(Species::code).collect();
        let sql = sql::complete_select(templates.get(Template::Catches(kind)), &columns)?;
        let provided = database.column_names(&sql)?.len();
        let declared = kind.fixed_columns() + species.len();
        if provided != declared {
            return Err(CatchError::ColumnCountMismatch { declared, provided });
        }
        Ok(Self {
            database,
            templates,
            kind,
            species,
            sql,
            state: Mutex::new(QueryState {
                time_range: TimeRange::unbounded(),
                area: GeoBox::WORLD,
                coverage: None,
            }),
        })
    }

    #[must_use]
    pub const fn kind(&self) -> CatchKind {
        self.kind
    }

    /// Species shared by every record this query returns.
    #[must_use]
    pub fn species(&self) -> &SpeciesSet {
        &self.species
    }

    pub fn set_time_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) {
        let mut state = self.state.lock();
        state.time_range = TimeRange::new(start, end);
        state.coverage = None;
    }

    #[must_use]
    pub fn time_range(&self) -> TimeRange {
        self.state.lock().time_range
    }

    pub fn set_geographic_area(&self, area: GeoBox) {
        let mut state = self.state.lock();
        state.area = area;
        state.coverage = None;
    }

    #[must_use]
    pub fn geographic_area(&self) -> GeoBox {
        self.state.lock().area
    }

    /// Matching catches in ascending capture time.
    pub fn entries(&self) -> Result<Vec<CatchRecord>> {
        let state = self.state.lock();
        self.fetch(&state)
    }

    /// Bounding box of the matching catches, clipped to the requested area.
    /// `None` when nothing matches.
    pub fn covered_area(&self) -> Result<Option<GeoBox>> {
        Ok(self.coverage()?.area)
    }

    /// Time span of the matching catches. `None` when nothing matches.
    pub fn covered_time_range(&self) -> Result<Option<TimeRange>> {
        Ok(self.coverage()?.time)
    }

    /// Overwrite column `column` of `record` with `value` (NaN stores NULL).
    pub fn set_value(&self, record: &CatchRecord, column: &str, value: f64) -> Result<()> {
        if record.kind() != self.kind {
            return Err(CatchError::TypeMismatch {
                expected: self.kind.table(),
                actual: record.kind().table(),
            });
        }
        let table = self.kind.table();
        let _span =
            tracing::debug_span!("catch.set_value", table, id = record.id(), column).entered();
        let sql = sql::replace_placeholder(
            self.templates.get(Template::CatchUpdate(self.kind)),
            column,
        )?;
        let changed = self
            .database
            .execute(&sql, &[Value::real(value), Value::Integer(record.id())])?;
        match changed {
            1 => Ok(()),
            0 => Err(CatchError::RecordVanished {
                table: table.to_owned(),
                id: record.id(),
            }),
            actual => {
                tracing::warn!(table, id = record.id(), actual, "catch.update.count");
                Err(CatchError::UnexpectedUpdateCount {
                    table: table.to_owned(),
                    expected: 1,
                    actual,
                })
            }
        }
    }

    fn coverage(&self) -> Result<Coverage> {
        let mut state = self.state.lock();
        if let Some(coverage) = state.coverage {
            return Ok(coverage);
        }
        let entries = self.fetch(&state)?;
        let area = entries
            .iter()
            .filter_map(CatchRecord::bounds)
            .reduce(GeoBox::union)
            .and_then(|bounds| bounds.intersection(state.area));
        let time = entries
            .iter()
            .map(|record| TimeRange::at(record.captured_at()))
            .reduce(TimeRange::union);
        let coverage = Coverage { area, time };
        state.coverage = Some(coverage);
        Ok(coverage)
    }

    fn fetch(&self, state: &QueryState) -> Result<Vec<CatchRecord>> {
        let table = self.kind.table();
        let span = tracing::debug_span!("catch.entries", table, rows = tracing::field::Empty);
        let _guard = span.enter();
        let zone = self.database.zone();
        let mut params = vec![
            Value::from(format_stored_timestamp(state.time_range.start, zone)),
            Value::from(format_stored_timestamp(state.time_range.end, zone)),
        ];
        if self.kind == CatchKind::Seine {
            params.extend([
                Value::Float(state.area.min_longitude),
                Value::Float(state.area.max_longitude),
                Value::Float(state.area.min_latitude),
                Value::Float(state.area.max_latitude),
            ]);
        }
        let rows = self.database.query(&self.sql, &params)?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let record = self.decode(&row)?;
            // The SQL bounds compare text; stored forms other than the bind
            // format can slip through them.
            if !state.time_range.contains(record.captured_at()) {
                continue;
            }
            if self.kind == CatchKind::Longline
                && !state.area.contains_box(GeoBox::WORLD)
                && !record.intersects(state.area)
            {
                continue;
            }
            entries.push(record);
        }
        entries.sort_by_key(|record| (record.captured_at(), record.id()));
        span.record("rows", entries.len());
        Ok(entries)
    }

    fn decode(&self, row: &[Value]) -> Result<CatchRecord> {
        let column = |index: usize| row.get(index).ok_or(CatchError::NoSuchColumn { index });
        let id = column(0)?.as_i64()?;
        let captured_at = parse_stored_timestamp(column(1)?.as_str()?, self.database.zone())?;
        let point = |index: usize| -> Result<Option<GeoPoint>> {
            let longitude = column(index)?.as_f64()?;
            let latitude = column(index + 1)?.as_f64()?;
            Ok((!longitude.is_nan() && !latitude.is_nan())
                .then(|| GeoPoint::new(longitude, latitude)))
        };
        let geometry = match self.kind {
            CatchKind::Longline => CatchGeometry::Line {
                start: point(2)?,
                end: point(4)?,
            },
            CatchKind::Seine => CatchGeometry::Point(point(2)?.ok_or(CatchError::TypeMismatch {
                expected: "seine position",
                actual: "null",
            })?),
        };
        let fixed = self.kind.fixed_columns();
        let amounts = (0..self.species.len())
            .map(|offset| column(fixed + offset)?.as_f64())
            .collect::<Result<Vec<f64>>>()?;
        Ok(CatchRecord::new(
            id,
            captured_at,
            geometry,
            Arc::clone(&self.species),
            amounts,
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::config::{DatabaseConfig, Preferences};

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).single().unwrap()
    }

    fn database(utc_offset_minutes: i32) -> Database {
        let config = DatabaseConfig {
            utc_offset_minutes,
            ..DatabaseConfig::default()
        };
        let db = Database::open_in_memory(&config).unwrap();
        db.execute_batch(
            "CREATE TABLE Longlines (ID INTEGER PRIMARY KEY, date TEXT,
                 start_longitude REAL, start_latitude REAL, end_longitude REAL, end_latitude REAL,
                 ALB REAL, YFT REAL);
             CREATE TABLE Seines (ID INTEGER PRIMARY KEY, date TEXT, longitude REAL, latitude REAL,
                 SKJ REAL);
             INSERT INTO Longlines VALUES
                 (1, '1998-02-03 10:00:00', 60.0, -20.0, 62.0, -20.0, 5.0, NULL),
                 (2, '1998-02-01 06:00:00', 40.0, -10.0, 41.0, -11.0, 0.0, 2.0),
                 (3, '1998-02-02 00:00:00', NULL, NULL, 70.0, -30.0, 1.0, 1.0),
                 (4, '1999-01-01 00:00:00', 60.0, -20.0, 62.0, -20.0, 9.0, 9.0);
             INSERT INTO Seines VALUES
                 (10, '1998-02-05 12:00:00', 55.0, -5.0, 30.0),
                 (11, '1998-02-04 12:00:00', 45.0, -4.0, 10.0),
                 (12, '1998-02-06 12:00:00', 80.0, 10.0, 1.0);",
        )
        .unwrap();
        db
    }

    fn query(db: &Database, kind: CatchKind, species: &[&str]) -> CatchQuery {
        let templates = Arc::new(SqlTemplates::new(&Preferences::new()).unwrap());
        CatchQuery::new(
            db.clone(),
            templates,
            kind,
            species.iter().map(|code| Species::new(*code)),
        )
        .unwrap()
    }

    #[test]
    fn longlines_sorted_by_time_with_shared_species() {
        let db = database(0);
        let query = query(&db, CatchKind::Longline, &["ALB", "YFT"]);
        query.set_time_range(utc(1998, 1, 1, 0), utc(1998, 12, 31, 0));
        let entries = query.entries().unwrap();
        let ids: Vec<i64> = entries.iter().map(CatchRecord::id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert!(entries[0].shares_species_with(&entries[2]));
        assert!(entries[2].amounts()[1].is_nan());
        assert!(matches!(
            entries[1].geometry(),
            CatchGeometry::Line { start: None, end: Some(_) }
        ));
    }

    #[test]
    fn longline_area_filter_uses_segments() {
        let db = database(0);
        let query = query(&db, CatchKind::Longline, &["ALB"]);
        query.set_time_range(utc(1998, 1, 1, 0), utc(1998, 12, 31, 0));
        // Crosses the middle of set 1, which has no endpoint inside.
        query.set_geographic_area(GeoBox::new(60.5, -21.0, 61.5, -19.0));
        let ids: Vec<i64> = query.entries().unwrap().iter().map(CatchRecord::id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn seine_area_filter_runs_in_sql() {
        let db = database(0);
        let query = query(&db, CatchKind::Seine, &["SKJ"]);
        query.set_geographic_area(GeoBox::new(40.0, -10.0, 60.0, 0.0));
        let entries = query.entries().unwrap();
        let ids: Vec<i64> = entries.iter().map(CatchRecord::id).collect();
        assert_eq!(ids, vec![11, 10]);
        assert_eq!(entries[1].amount(&Species::new("SKJ")), 30.0);
    }

    #[test]
    fn timestamps_are_normalized_to_utc() {
        let db = database(240);
        let query = query(&db, CatchKind::Seine, &[]);
        query.set_time_range(utc(1998, 2, 4, 8), utc(1998, 2, 4, 8));
        let entries = query.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].captured_at(), utc(1998, 2, 4, 8));
    }

    #[test]
    fn iso_timestamps_outside_the_range_are_dropped() {
        let db = database(0);
        db.execute_batch("INSERT INTO Seines VALUES (13, '1998-02-04T12:00:00', 50.0, -5.0, 4.0);")
            .unwrap();
        let query = query(&db, CatchKind::Seine, &["SKJ"]);
        query.set_time_range(utc(1998, 2, 4, 13), utc(1998, 2, 5, 0));
        assert!(query.entries().unwrap().is_empty());
        assert_eq!(query.covered_time_range().unwrap(), None);

        query.set_time_range(utc(1998, 2, 4, 0), utc(1998, 2, 5, 0));
        let ids: Vec<i64> = query.entries().unwrap().iter().map(CatchRecord::id).collect();
        assert_eq!(ids, vec![11, 13]);
    }

    #[test]
    fn coverage_is_cached_until_bounds_change() {
        let db = database(0);
        let query = query(&db, CatchKind::Seine, &["SKJ"]);
        let area = query.covered_area().unwrap().unwrap();
        assert_eq!(area, GeoBox::new(45.0, -5.0, 80.0, 10.0));
        let before = db.statements_executed();
        let time = query.covered_time_range().unwrap().unwrap();
        assert_eq!(db.statements_executed(), before);
        assert_eq!(time, TimeRange::new(utc(1998, 2, 4, 12), utc(1998, 2, 6, 12)));

        query.set_time_range(utc(2001, 1, 1, 0), utc(2001, 2, 1, 0));
        assert_eq!(query.covered_area().unwrap(), None);
        assert_eq!(query.covered_time_range().unwrap(), None);
    }

    #[test]
    fn set_value_updates_one_row() {
        let db = database(0);
        let query = query(&db, CatchKind::Longline, &["ALB"]);
        let record = query.entries().unwrap().remove(0);
        query.set_value(&record, "ALB", 12.5).unwrap();
        let stored = db
            .query("SELECT ALB FROM Longlines WHERE ID=?", &[Value::Integer(record.id())])
            .unwrap();
        assert_eq!(stored[0][0], Value::Float(12.5));

        db.execute("DELETE FROM Longlines WHERE ID=?", &[Value::Integer(record.id())])
            .unwrap();
        let err = query.set_value(&record, "ALB", 1.0).unwrap_err();
        assert!(matches!(err, CatchError::RecordVanished { id, .. } if id == record.id()));
        assert!(matches!(
            query.set_value(&record, "ALB = 0 --", 1.0),
            Err(CatchError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn species_columns_must_exist() {
        let db = database(0);
        let templates = Arc::new(SqlTemplates::new(&Preferences::new()).unwrap());
        let err = CatchQuery::new(db, templates, CatchKind::Seine, [Species::new("BET")])
            .unwrap_err();
        assert!(matches!(err, CatchError::Storage(_)));
    }
}
