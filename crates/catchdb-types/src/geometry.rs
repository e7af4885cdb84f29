//! WGS84 points and bounding boxes, plus the segment tests used to filter
//! longline sets against a geographic area.

/// A position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    #[must_use]
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Midpoint of the segment `self`-`other`.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self::new(
            (self.longitude + other.longitude) * 0.5,
            (self.latitude + other.latitude) * 0.5,
        )
    }
}

/// An axis-aligned bounding box in decimal degrees (inclusive bounds).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GeoBox {
    pub min_longitude: f64,
    pub min_latitude: f64,
    pub max_longitude: f64,
    pub max_latitude: f64,
}

impl GeoBox {
    /// The whole globe.
    pub const WORLD: Self = Self {
        min_longitude: -180.0,
        min_latitude: -90.0,
        max_longitude: 180.0,
        max_latitude: 90.0,
    };

    #[must_use]
    pub const fn new(
        min_longitude: f64,
        min_latitude: f64,
        max_longitude: f64,
        max_latitude: f64,
    ) -> Self {
        Self {
            min_longitude,
            min_latitude,
            max_longitude,
            max_latitude,
        }
    }

    /// Degenerate box around a single point.
    #[must_use]
    pub const fn around(point: GeoPoint) -> Self {
        Self::new(
            point.longitude,
            point.latitude,
            point.longitude,
            point.latitude,
        )
    }

    #[must_use]
    pub const fn contains_point(self, point: GeoPoint) -> bool {
        point.longitude >= self.min_longitude
            && point.longitude <= self.max_longitude
            && point.latitude >= self.min_latitude
            && point.latitude <= self.max_latitude
    }

    #[must_use]
    pub const fn contains_box(self, other: Self) -> bool {
        other.min_longitude >= self.min_longitude
            && other.max_longitude <= self.max_longitude
            && other.min_latitude >= self.min_latitude
            && other.max_latitude <= self.max_latitude
    }

    /// Smallest box containing both boxes.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self::new(
            self.min_longitude.min(other.min_longitude),
            self.min_latitude.min(other.min_latitude),
            self.max_longitude.max(other.max_longitude),
            self.max_latitude.max(other.max_latitude),
        )
    }

    /// Overlap of both boxes, or `None` when they are disjoint.
    #[must_use]
    pub fn intersection(self, other: Self) -> Option<Self> {
        let clipped = Self::new(
            self.min_longitude.max(other.min_longitude),
            self.min_latitude.max(other.min_latitude),
            self.max_longitude.min(other.max_longitude),
            self.max_latitude.min(other.max_latitude),
        );
        (clipped.min_longitude <= clipped.max_longitude
            && clipped.min_latitude <= clipped.max_latitude)
            .then_some(clipped)
    }

    /// Whether the segment `start`-`end` touches this box.
    #[must_use]
    pub fn intersects_segment(self, start: GeoPoint, end: GeoPoint) -> bool {
        if self.contains_point(start) || self.contains_point(end) {
            return true;
        }
        let corners = [
            GeoPoint::new(self.min_longitude, self.min_latitude),
            GeoPoint::new(self.max_longitude, self.min_latitude),
            GeoPoint::new(self.max_longitude, self.max_latitude),
            GeoPoint::new(self.min_longitude, self.max_latitude),
        ];
        (0..corners.len()).any(|index| {
            segments_intersect(start, end, corners[index], corners[(index + 1) % 4])
        })
    }
}

/// Bounding box of a set of vertices.
#[must_use]
pub fn bounding_box(vertices: &[GeoPoint]) -> Option<GeoBox> {
    let first = *vertices.first()?;
    Some(
        vertices
            .iter()
            .skip(1)
            .fold(GeoBox::around(first), |bounds, &vertex| {
                bounds.union(GeoBox::around(vertex))
            }),
    )
}

fn segments_intersect(a_start: GeoPoint, a_end: GeoPoint, b_start: GeoPoint, b_end: GeoPoint) -> bool {
    let o1 = orientation(a_start, a_end, b_start);
    let o2 = orientation(a_start, a_end, b_end);
    let o3 = orientation(b_start, b_end, a_start);
    let o4 = orientation(b_start, b_end, a_end);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == 0 && point_on_segment(a_start, a_end, b_start))
        || (o2 == 0 && point_on_segment(a_start, a_end, b_end))
        || (o3 == 0 && point_on_segment(b_start, b_end, a_start))
        || (o4 == 0 && point_on_segment(b_start, b_end, a_end))
}

fn orientation(start: GeoPoint, end: GeoPoint, point: GeoPoint) -> i8 {
    let cross = (end.latitude - start.latitude).mul_add(
        point.longitude - end.longitude,
        -((end.longitude - start.longitude) * (point.latitude - end.latitude)),
    );
    if cross > f64::EPSILON {
        1
    } else if cross < -f64::EPSILON {
        -1
    } else {
        0
    }
}

fn point_on_segment(start: GeoPoint, end: GeoPoint, point: GeoPoint) -> bool {
    if orientation(start, end, point) != 0 {
        return false;
    }

    point.longitude >= start.longitude.min(end.longitude)
        && point.longitude <= start.longitude.max(end.longitude)
        && point.latitude >= start.latitude.min(end.latitude)
        && point.latitude <= start.latitude.max(end.latitude)
}
