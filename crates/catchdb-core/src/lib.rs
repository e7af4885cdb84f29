//! Data access over a fishery catch database: catch queries, environment
//! steps, the sort-merge coupling row-set and value write-back.

pub mod catalog;
pub mod catch_query;
pub mod config;
pub mod coupling;
pub mod cursor;
pub mod database;
pub mod dump;
pub mod merge;
pub mod schema;
pub mod sql;
pub mod step;
pub mod templates;
pub mod writer;

pub use catalog::{Catalog, CatalogKind};
pub use catch_query::CatchQuery;
pub use config::{DEFAULT_FETCH_SIZE, DatabaseConfig, Preferences};
pub use coupling::{CouplingTable, TableState};
pub use cursor::{MemoryCursor, RowSet, SqlCursor};
pub use database::Database;
pub use dump::write_table;
pub use merge::{
    CouplingRowSet, MergeMetricsSnapshot, MergeStats, merge_metrics_snapshot, reset_merge_metrics,
};
pub use step::{EnvironmentStep, StepQuery};
pub use templates::{SqlTemplates, Template};
pub use writer::{EnvironmentWriter, WriteOutcome};
