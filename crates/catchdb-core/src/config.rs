//! Deployment configuration: storage timezone, cursor page size and SQL
//! template overrides.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use catchdb_error::{CatchError, Result};

/// Default number of rows fetched per cursor page.
pub const DEFAULT_FETCH_SIZE: usize = 256;

/// Key-value store of SQL template overrides.
///
/// Keys are table names (`Environments`, `Longlines`, ...) optionally
/// followed by a statement suffix (`:UPDATE`, `:INSERT`, `:LIST`, `:ID`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preferences(BTreeMap<String, String>);

impl Preferences {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the template stored under `key`.
    pub fn set(&mut self, key: impl Into<String>, sql: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), sql.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

/// Settings for one database deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Offset from UTC, in minutes, of the timestamps stored in the catch
    /// tables.
    pub utc_offset_minutes: i32,
    /// Rows fetched per page by forward-only cursors.
    pub fetch_size: usize,
    /// SQL template overrides.
    pub preferences: Preferences,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            fetch_size: DEFAULT_FETCH_SIZE,
            preferences: Preferences::new(),
        }
    }
}

impl DatabaseConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Timezone of stored timestamps.
    pub fn zone(&self) -> Result<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                CatchError::configuration(
                    "utc_offset_minutes",
                    format!("offset {} is out of range", self.utc_offset_minutes),
                )
            })
    }

    pub fn validate(&self) -> Result<()> {
        self.zone()?;
        if self.fetch_size == 0 {
            return Err(CatchError::configuration(
                "fetch_size",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
