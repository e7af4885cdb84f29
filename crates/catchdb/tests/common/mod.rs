#![allow(dead_code)]

use catchdb::{CatchDb, CatchKind, DatabaseConfig, Species, schema};
use chrono::{DateTime, TimeZone, Utc};

pub fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Default schema with SST (1) and CHL (2), the `gradient` and `sobel3`
/// operations, ALB/YFT longline columns and an SKJ seine column.
pub fn seeded(config: &DatabaseConfig) -> CatchDb {
    let db = CatchDb::open_in_memory(config).expect("in-memory database should open");
    seed(&db);
    db
}

pub fn seed(db: &CatchDb) {
    db.create_default_schema().expect("schema should be created");
    let database = db.database();
    schema::register_parameter(database, 1, "SST").expect("register SST");
    schema::register_parameter(database, 2, "CHL").expect("register CHL");
    schema::register_operation(database, "gradient", "gr").expect("register gradient");
    schema::register_operation(database, "sobel3", "sb3").expect("register sobel3");
    for code in ["ALB", "YFT"] {
        schema::add_species_column(database, CatchKind::Longline, &Species::new(code))
            .expect("add longline species");
    }
    schema::add_species_column(database, CatchKind::Seine, &Species::new("SKJ"))
        .expect("add seine species");
    database
        .execute_batch(
            "INSERT INTO Longlines VALUES
                 (1, '1998-02-01 00:00:00', 60.0, -20.0, 62.0, -20.0, 5.0, 1.0),
                 (2, '1998-02-02 00:00:00', 61.0, -21.0, NULL, NULL, 0.0, NULL),
                 (3, '1998-02-03 00:00:00', NULL, NULL, 63.0, -22.0, 2.0, 2.0),
                 (4, '1998-02-04 00:00:00', NULL, NULL, NULL, NULL, 1.0, 0.0);
             INSERT INTO Seines VALUES
                 (10, '1998-02-01 12:00:00', 55.0, -5.0, 30.0),
                 (11, '1998-02-02 12:00:00', 45.0, -4.0, 10.0);",
        )
        .expect("seed catches");
}
