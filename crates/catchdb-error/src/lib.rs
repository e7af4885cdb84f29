use thiserror::Error;

/// Primary error type for catchdb operations.
///
/// Variants are grouped the way callers handle them: storage failures are
/// propagated unchanged, lookup and write anomalies carry the offending key,
/// configuration problems are raised before any cursor exists.
#[derive(Error, Debug)]
pub enum CatchError {
    // === Storage Errors ===
    /// Failure reported by the SQL engine.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// File I/O error (dump output, preference files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The storage handle, cursor or table was already closed.
    #[error("{what} is closed")]
    Closed { what: &'static str },

    // === Lookup Errors ===
    /// A by-name or by-id resolution matched no row.
    #[error("no {kind} found for '{key}'")]
    NotFound { kind: &'static str, key: String },

    /// A by-name or by-id resolution matched several distinct values.
    #[error("ambiguous {kind} '{key}': {candidates} distinct records")]
    Ambiguous {
        kind: &'static str,
        key: String,
        candidates: usize,
    },

    // === Write Errors ===
    /// UPDATE or INSERT touched a row count other than the expected one.
    #[error("unexpected update count on {table}: expected {expected}, got {actual}")]
    UnexpectedUpdateCount {
        table: String,
        expected: usize,
        actual: usize,
    },

    /// A single-row UPDATE by primary key affected nothing.
    #[error("record {id} vanished from {table} between read and write")]
    RecordVanished { table: String, id: i64 },

    // === Configuration Errors ===
    /// Malformed SQL template.
    #[error("invalid template '{template}': {detail}")]
    Configuration { template: String, detail: String },

    /// A column or table name that cannot be spliced into SQL.
    #[error("invalid identifier: '{name}'")]
    InvalidIdentifier { name: String },

    /// Declared logical columns disagree with the cursors feeding a row-set.
    #[error("row-set declares {declared} columns but its cursors provide {provided}")]
    ColumnCountMismatch { declared: usize, provided: usize },

    /// Preference document could not be parsed.
    #[error("preferences: {0}")]
    Json(#[from] serde_json::Error),

    // === Cursor Errors ===
    /// A cursor produced a key that is not strictly greater than its previous one.
    #[error("{source_name} is not strictly ascending: key {key} after {previous}")]
    KeyOrder {
        source_name: String,
        previous: i64,
        key: i64,
    },

    /// Column index outside the cursor's column range.
    #[error("no such column: index {index}")]
    NoSuchColumn { index: usize },

    /// The cursor is not positioned on a row.
    #[error("cursor is not positioned on a row")]
    NoCurrentRow,

    /// Type mismatch in column access.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// A stored timestamp could not be parsed.
    #[error("invalid timestamp: '{text}'")]
    InvalidTimestamp { text: String },
}

impl CatchError {
    /// Whether this error is a warning: the operation ran but its outcome
    /// breaks an assumption the caller must know about.
    pub const fn is_warning(&self) -> bool {
        matches!(self, Self::UnexpectedUpdateCount { .. })
    }

    /// Whether the user can likely fix this without code changes.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Ambiguous { .. }
                | Self::Configuration { .. }
                | Self::InvalidIdentifier { .. }
                | Self::Json(_)
        )
    }

    /// Human-friendly suggestion for fixing this error.
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => Some("Check the spelling against the available names"),
            Self::Ambiguous { .. } => Some("Remove the conflicting rows from the lookup table"),
            Self::Configuration { .. } => Some("Fix or remove the overriding SQL template"),
            Self::InvalidIdentifier { .. } => {
                Some("Column names may only contain letters, digits and underscores")
            }
            Self::RecordVanished { .. } => Some("Reload the catches; the record was deleted"),
            Self::Closed { .. } => Some("Open a new connection"),
            _ => None,
        }
    }

    /// Create a configuration error.
    pub fn configuration(template: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Configuration {
            template: template.into(),
            detail: detail.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    /// Create an ambiguous-lookup error.
    pub fn ambiguous(kind: &'static str, key: impl ToString, candidates: usize) -> Self {
        Self::Ambiguous {
            kind,
            key: key.to_string(),
            candidates,
        }
    }
}

/// Result type alias using `CatchError`.
pub type Result<T> = std::result::Result<T, CatchError>;
