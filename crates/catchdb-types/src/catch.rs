//! Catch records for the two fishing gears: longline sets (line geometry)
//! and purse-seine sets (point geometry).

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::geometry::{GeoBox, GeoPoint, bounding_box};
use crate::position::Position;

/// Fishing gear, which decides the catch table and the geometry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CatchKind {
    Longline,
    Seine,
}

impl CatchKind {
    /// Default table name, also the template key for this gear.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Longline => "Longlines",
            Self::Seine => "Seines",
        }
    }

    /// Number of fixed columns preceding the species columns in a catch query.
    #[must_use]
    pub const fn fixed_columns(self) -> usize {
        match self {
            Self::Longline => 6,
            Self::Seine => 4,
        }
    }
}

impl fmt::Display for CatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Longline => "longline",
            Self::Seine => "seine",
        })
    }
}

/// Species code, as used for the catch-table column holding its quantity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Species(String);

impl Species {
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable species list shared by every record one query produces.
pub type SpeciesSet = Arc<[Species]>;

/// Where a catch happened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CatchGeometry {
    /// Longline set: either endpoint may be unknown.
    Line {
        start: Option<GeoPoint>,
        end: Option<GeoPoint>,
    },
    /// Purse-seine set: a single position.
    Point(GeoPoint),
}

/// One fishing event with its per-species quantities.
///
/// `amounts[i]` is the quantity of `species[i]`. NaN means "not measured",
/// zero means "measured, nothing caught".
#[derive(Debug, Clone)]
pub struct CatchRecord {
    id: i64,
    captured_at: DateTime<Utc>,
    geometry: CatchGeometry,
    species: SpeciesSet,
    amounts: Box<[f64]>,
}

impl CatchRecord {
    /// Build a record. `amounts` is truncated or padded with NaN to the
    /// length of `species`.
    #[must_use]
    pub fn new(
        id: i64,
        captured_at: DateTime<Utc>,
        geometry: CatchGeometry,
        species: SpeciesSet,
        amounts: Vec<f64>,
    ) -> Self {
        let mut amounts = amounts;
        amounts.resize(species.len(), f64::NAN);
        Self {
            id,
            captured_at,
            geometry,
            species,
            amounts: amounts.into_boxed_slice(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> i64 {
        self.id
    }

    #[must_use]
    pub const fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    #[must_use]
    pub const fn geometry(&self) -> &CatchGeometry {
        &self.geometry
    }

    #[must_use]
    pub const fn kind(&self) -> CatchKind {
        match self.geometry {
            CatchGeometry::Line { .. } => CatchKind::Longline,
            CatchGeometry::Point(_) => CatchKind::Seine,
        }
    }

    #[must_use]
    pub fn species(&self) -> &SpeciesSet {
        &self.species
    }

    #[must_use]
    pub fn amounts(&self) -> &[f64] {
        &self.amounts
    }

    /// Quantity caught for `species`, NaN when the species is not part of
    /// this record's set or was not measured.
    #[must_use]
    pub fn amount(&self, species: &Species) -> f64 {
        self.species
            .iter()
            .position(|candidate| candidate == species)
            .map_or(f64::NAN, |index| self.amounts[index])
    }

    /// Sum of all measured quantities.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.amounts.iter().filter(|amount| !amount.is_nan()).sum()
    }

    /// Whether both records come from the same query (share one species set).
    #[must_use]
    pub fn shares_species_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.species, &other.species)
    }

    /// Vertices of the known geometry: zero, one or two points.
    #[must_use]
    pub fn shape(&self) -> Vec<GeoPoint> {
        match self.geometry {
            CatchGeometry::Line { start, end } => start.into_iter().chain(end).collect(),
            CatchGeometry::Point(point) => vec![point],
        }
    }

    /// Representative location: the segment midpoint, the single known
    /// endpoint, or the seine position.
    #[must_use]
    pub fn center(&self) -> Option<GeoPoint> {
        match self.geometry {
            CatchGeometry::Line {
                start: Some(start),
                end: Some(end),
            } => Some(start.midpoint(end)),
            CatchGeometry::Line { start, end } => start.or(end),
            CatchGeometry::Point(point) => Some(point),
        }
    }

    #[must_use]
    pub fn bounds(&self) -> Option<GeoBox> {
        bounding_box(&self.shape())
    }

    /// Whether the catch geometry touches `area`.
    #[must_use]
    pub fn intersects(&self, area: GeoBox) -> bool {
        match self.geometry {
            CatchGeometry::Line {
                start: Some(start),
                end: Some(end),
            } => area.intersects_segment(start, end),
            CatchGeometry::Line { start, end } => {
                start.or(end).is_some_and(|point| area.contains_point(point))
            }
            CatchGeometry::Point(point) => area.contains_point(point),
        }
    }

    /// Position at which environment values can actually be sampled for
    /// this catch when `requested` is asked for.
    ///
    /// Longlines keep the request when both endpoints are known and clamp
    /// to the single known endpoint otherwise; with no endpoint they fall
    /// back to the center. [`Position::Area`] passes through unchanged for
    /// longlines. Seines have no extent, so every request maps to the center.
    #[must_use]
    pub const fn clamp_position(&self, requested: Position) -> Position {
        match self.geometry {
            CatchGeometry::Line { .. } if matches!(requested, Position::Area) => requested,
            CatchGeometry::Line { start, end } => match (start.is_some(), end.is_some()) {
                (true, true) => requested,
                (true, false) => Position::START,
                (false, true) => Position::END,
                (false, false) => Position::CENTER,
            },
            CatchGeometry::Point(_) => Position::CENTER,
        }
    }
}
