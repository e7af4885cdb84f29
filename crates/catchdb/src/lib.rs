//! Public API facade for catchdb.
//!
//! [`CatchDb`] bundles a storage handle with its resolved SQL templates and
//! hands out the components that work on them: the parameter catalog,
//! catch queries, coupling tables and the environment writer.

use std::path::Path;
use std::sync::Arc;

pub use catchdb_core::{
    Catalog, CatalogKind, CatchQuery, CouplingRowSet, CouplingTable, Database, DatabaseConfig,
    EnvironmentStep, EnvironmentWriter, MemoryCursor, MergeMetricsSnapshot, MergeStats,
    Preferences, RowSet, SqlCursor, SqlTemplates, StepQuery, TableState, Template, WriteOutcome,
    merge_metrics_snapshot, reset_merge_metrics, schema, write_table,
};
pub use catchdb_error::{CatchError, Result};
pub use catchdb_types::{
    CatchGeometry, CatchKind, CatchRecord, GeoBox, GeoPoint, Position, Species, SpeciesSet,
    StepKey, TimeRange, Value, column_label, time_lag_days,
};

/// An open catch database with its templates.
#[derive(Debug, Clone)]
pub struct CatchDb {
    database: Database,
    templates: Arc<SqlTemplates>,
}

impl CatchDb {
    pub fn open(path: impl AsRef<Path>, config: &DatabaseConfig) -> Result<Self> {
        Self::with_database(Database::open(path, config)?, config)
    }

    pub fn open_in_memory(config: &DatabaseConfig) -> Result<Self> {
        Self::with_database(Database::open_in_memory(config)?, config)
    }

    /// Wrap an existing handle. Templates are resolved from
    /// `config.preferences` and fail here if malformed.
    pub fn with_database(database: Database, config: &DatabaseConfig) -> Result<Self> {
        let templates = Arc::new(SqlTemplates::new(&config.preferences)?);
        tracing::debug!(
            zone = %database.zone(),
            fetch_size = database.fetch_size(),
            "catchdb.opened"
        );
        Ok(Self {
            database,
            templates,
        })
    }

    #[must_use]
    pub fn database(&self) -> &Database {
        &self.database
    }

    #[must_use]
    pub fn templates(&self) -> &Arc<SqlTemplates> {
        &self.templates
    }

    /// Create the default tables if missing.
    pub fn create_default_schema(&self) -> Result<()> {
        schema::create_default_schema(&self.database)
    }

    #[must_use]
    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.database.clone(), Arc::clone(&self.templates))
    }

    /// Query catches of `kind` reporting the quantities of `species`.
    pub fn catch_query<I>(&self, kind: CatchKind, species: I) -> Result<CatchQuery>
    where
        I: IntoIterator<Item = Species>,
    {
        CatchQuery::new(
            self.database.clone(),
            Arc::clone(&self.templates),
            kind,
            species,
        )
    }

    #[must_use]
    pub fn coupling_table(&self) -> CouplingTable {
        CouplingTable::new(self.database.clone(), Arc::clone(&self.templates))
    }

    #[must_use]
    pub fn environment_writer(&self) -> EnvironmentWriter {
        EnvironmentWriter::new(self.database.clone(), Arc::clone(&self.templates))
    }

    /// Close the connection; every component created from this handle
    /// fails from now on.
    pub fn close(&self) -> Result<()> {
        self.database.close()
    }
}
