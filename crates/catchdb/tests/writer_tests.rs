mod common;

use catchdb::{
    CatchDb, CatchError, CatchKind, CatchRecord, DatabaseConfig, Position, StepKey, Value,
    WriteOutcome,
};
use common::{seeded, utc};

fn catches(db: &CatchDb, kind: CatchKind) -> Vec<CatchRecord> {
    db.catch_query(kind, Vec::new())
        .expect("catch query")
        .entries()
        .expect("catch entries")
}

fn stored(db: &CatchDb, id: i64) -> Vec<Vec<Value>> {
    db.database()
        .query(
            "SELECT position, timeLag, parameter, value FROM Environments
             WHERE ID=? ORDER BY parameter, position, timeLag",
            &[Value::Integer(id)],
        )
        .expect("environment rows")
}

#[test]
fn repeated_writes_keep_a_single_row() {
    let db = seeded(&DatabaseConfig::default());
    let writer = db.environment_writer();
    let record = &catches(&db, CatchKind::Longline)[0];
    let key = StepKey::new(1, Position::START, 2);
    assert_eq!(
        writer
            .set_value(record, &key, "value", 18.5, None)
            .expect("first write"),
        WriteOutcome::Inserted
    );
    assert_eq!(
        writer
            .set_value(record, &key, "gradient", 0.2, None)
            .expect("second column"),
        WriteOutcome::Updated
    );
    assert_eq!(
        writer
            .set_value(record, &key, "value", 19.0, None)
            .expect("overwrite"),
        WriteOutcome::Updated
    );
    assert_eq!(
        stored(&db, 1),
        vec![vec![
            Value::Integer(0),
            Value::Integer(2),
            Value::Integer(1),
            Value::Float(19.0),
        ]]
    );
    let gradient = db
        .database()
        .query("SELECT gradient FROM Environments WHERE ID=1", &[])
        .expect("gradient");
    assert_eq!(gradient, vec![vec![Value::Float(0.2)]]);
}

#[test]
fn nan_issues_no_statement() {
    let db = seeded(&DatabaseConfig::default());
    let writer = db.environment_writer();
    let record = &catches(&db, CatchKind::Seine)[0];
    let before = db.database().statements_executed();
    let outcome = writer
        .set_value(record, &StepKey::new(2, Position::CENTER, 0), "value", f64::NAN, None)
        .expect("NaN write");
    assert_eq!(outcome, WriteOutcome::Skipped);
    assert_eq!(db.database().statements_executed(), before);
    assert!(stored(&db, record.id()).is_empty());
}

#[test]
fn measurement_date_sets_a_floored_lag() {
    let db = seeded(&DatabaseConfig::default());
    let writer = db.environment_writer();
    // Catch 1 was taken on 1998-02-01 at midnight.
    let record = &catches(&db, CatchKind::Longline)[0];
    let key = StepKey::new(1, Position::CENTER, 7);
    writer
        .set_value(record, &key, "value", 1.0, Some(utc(1998, 1, 31, 18)))
        .expect("write measured the evening before");
    writer
        .set_value(record, &key, "value", 2.0, Some(utc(1998, 2, 3, 6)))
        .expect("write measured two days later");
    let lags: Vec<Value> = stored(&db, 1).into_iter().map(|row| row[1].clone()).collect();
    assert_eq!(lags, vec![Value::Integer(-1), Value::Integer(2)]);
}

#[test]
fn positions_are_clamped_by_known_endpoints() {
    let db = seeded(&DatabaseConfig::default());
    let writer = db.environment_writer();
    let longlines = catches(&db, CatchKind::Longline);
    let seines = catches(&db, CatchKind::Seine);
    let key = StepKey::new(1, Position::relative(25), 0);
    for record in longlines.iter().chain(&seines) {
        writer
            .set_value(record, &key, "value", 1.0, None)
            .expect("write");
    }
    let position = |id: i64| stored(&db, id)[0][0].clone();
    // Both endpoints known: the relative position is kept.
    assert_eq!(position(1), Value::Integer(25));
    // Start only: everything lands on the start.
    assert_eq!(position(2), Value::Integer(0));
    // End only: everything lands on the end.
    assert_eq!(position(3), Value::Integer(100));
    // Point catches sit at the center.
    assert_eq!(position(10), Value::Integer(50));
}

#[test]
fn area_position_is_kept_for_longlines_only() {
    let db = seeded(&DatabaseConfig::default());
    let writer = db.environment_writer();
    let key = StepKey::new(2, Position::Area, 0);
    let longline = &catches(&db, CatchKind::Longline)[0];
    let seine = &catches(&db, CatchKind::Seine)[0];
    writer
        .set_value(longline, &key, "value", 0.3, None)
        .expect("longline area write");
    writer
        .set_value(seine, &key, "value", 0.4, None)
        .expect("seine area write");
    assert_eq!(stored(&db, 1)[0][0], Value::Integer(Position::AREA_CODE.into()));
    assert_eq!(stored(&db, 10)[0][0], Value::Integer(50));
}

#[test]
fn unknown_operation_column_is_a_storage_error() {
    let db = seeded(&DatabaseConfig::default());
    let writer = db.environment_writer();
    let record = &catches(&db, CatchKind::Seine)[0];
    let error = writer
        .set_value(record, &StepKey::new(1, Position::CENTER, 0), "laplace", 1.0, None)
        .expect_err("missing column must fail");
    assert!(matches!(error, CatchError::Storage(_)));
    assert!(!error.is_warning());
}
