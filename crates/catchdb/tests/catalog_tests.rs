mod common;

use catchdb::{CatalogKind, CatchError, DatabaseConfig, Position, StepKey, Template};
use common::seeded;

#[test]
fn default_schema_lookups() {
    let db = seeded(&DatabaseConfig::default());
    let catalog = db.catalog();
    assert_eq!(catalog.resolve_parameter_id("CHL").expect("CHL code"), 2);
    assert_eq!(catalog.resolve_parameter_name(1).expect("SST name"), "SST");
    assert_eq!(catalog.resolve_operation_prefix("value").expect("value prefix"), "");
    assert_eq!(
        catalog.list_available(CatalogKind::Parameters).expect("parameters"),
        vec!["SST", "CHL"]
    );
    let mut operations = catalog
        .list_available(CatalogKind::Operations)
        .expect("operations");
    operations.sort();
    assert_eq!(operations, vec!["gradient", "sobel3", "value"]);
}

#[test]
fn unknown_and_ambiguous_names_are_recoverable() {
    let db = seeded(&DatabaseConfig::default());
    db.database()
        .execute_batch("INSERT INTO Parameters VALUES (7, 'EKP'), (8, 'EKP');")
        .expect("seed duplicates");
    let catalog = db.catalog();

    let error = catalog
        .resolve_parameter_id("PAR")
        .expect_err("PAR is not registered");
    assert!(matches!(error, CatchError::NotFound { kind: "parameter", .. }));
    assert!(error.is_user_recoverable());
    assert!(error.suggestion().is_some());

    let error = catalog
        .resolve_parameter_id("EKP")
        .expect_err("EKP has two codes");
    assert!(matches!(error, CatchError::Ambiguous { candidates: 2, .. }));

    let error = catalog
        .resolve_operation_prefix("laplace")
        .expect_err("laplace is not registered");
    assert!(matches!(error, CatchError::NotFound { kind: "operation", .. }));
}

#[test]
fn labels_combine_prefix_parameter_and_lag() {
    let db = seeded(&DatabaseConfig::default());
    db.database()
        .execute_batch("INSERT INTO Parameters VALUES (3, 'SLA');")
        .expect("register SLA");
    let catalog = db.catalog();
    assert_eq!(
        catalog
            .column_label(&StepKey::new(1, Position::CENTER, -5), "gradient")
            .expect("gradient label"),
        "grSST-05"
    );
    assert_eq!(
        catalog
            .column_label(&StepKey::new(2, Position::END, 0), "value")
            .expect("value label"),
        "CHL+00"
    );
    assert_eq!(
        catalog
            .column_labels(&StepKey::new(3, Position::START, 12), &["sobel3", "value"])
            .expect("SLA labels"),
        vec!["sb3SLA+12", "SLA+12"]
    );
}

#[test]
fn overridden_lookup_reads_another_table() {
    let mut config = DatabaseConfig::default();
    config.preferences.set(
        "Parameters",
        "SELECT code, label FROM ParameterAliases WHERE code=?",
    );
    let db = seeded(&config);
    db.database()
        .execute_batch(
            "CREATE TABLE ParameterAliases (code INTEGER, label TEXT);
             INSERT INTO ParameterAliases VALUES (1, 'sea_surface_temperature');",
        )
        .expect("alias table");
    assert!(db.templates().is_overridden(Template::Parameters));
    assert!(!db.templates().is_overridden(Template::ParameterList));

    let catalog = db.catalog();
    assert_eq!(
        catalog.resolve_parameter_name(1).expect("alias name"),
        "sea_surface_temperature"
    );
    assert_eq!(
        catalog
            .resolve_parameter_id("sea_surface_temperature")
            .expect("alias code"),
        1
    );
    assert!(matches!(
        catalog.resolve_parameter_id("SST"),
        Err(CatchError::NotFound { .. })
    ));
}

#[test]
fn unknown_preference_key_is_rejected() {
    let mut config = DatabaseConfig::default();
    config
        .preferences
        .set("Environments:DELETE", "DELETE FROM Environments");
    let error = catchdb::CatchDb::open_in_memory(&config).expect_err("unknown key");
    assert!(matches!(error, CatchError::Configuration { .. }));
}
