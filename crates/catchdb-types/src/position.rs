use std::fmt;

/// Where along a catch's geometry an environmental value was sampled.
///
/// Relative positions run from 0 (start of the set) through 50 (center) to
/// 100 (end). [`Position::Area`] stands for a value aggregated over the
/// whole fishing area rather than sampled at a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Position {
    Relative(u8),
    Area,
}

impl Position {
    pub const START: Self = Self::Relative(0);
    pub const CENTER: Self = Self::Relative(50);
    pub const END: Self = Self::Relative(100);

    /// Integer stored in the `position` column for [`Position::Area`].
    pub const AREA_CODE: i32 = -1;

    /// Relative position, clamped into `[0, 100]`.
    #[must_use]
    pub fn relative(percent: i32) -> Self {
        // Clamped into range first, so the narrowing cannot fail.
        Self::Relative(u8::try_from(percent.clamp(0, 100)).unwrap_or(100))
    }

    /// Code stored in the environment table.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Relative(percent) => i32::from(percent),
            Self::Area => Self::AREA_CODE,
        }
    }

    /// Inverse of [`Position::code`]. Codes outside `[0, 100]` other than
    /// the area sentinel are rejected.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        if code == Self::AREA_CODE {
            return Some(Self::Area);
        }
        u8::try_from(code)
            .ok()
            .filter(|percent| *percent <= 100)
            .map(Self::Relative)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relative(percent) => write!(f, "{percent}%"),
            Self::Area => f.write_str("AREA"),
        }
    }
}
