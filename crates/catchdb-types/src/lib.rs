//! Plain data types shared by the catchdb crates: column values, WGS84
//! geometry, catch records, sampling positions and environment step keys.

pub mod catch;
pub mod geometry;
pub mod position;
pub mod step;
pub mod time;
pub mod value;

pub use catch::{CatchGeometry, CatchKind, CatchRecord, Species, SpeciesSet};
pub use geometry::{GeoBox, GeoPoint, bounding_box};
pub use position::Position;
pub use step::{StepKey, column_label};
pub use time::{TimeRange, format_stored_timestamp, parse_stored_timestamp, time_lag_days};
pub use value::Value;
