use std::fmt;

use crate::position::Position;

/// Identity of one environment request: which parameter, sampled where,
/// how many days away from the catch, and whether rows with NULL values
/// are kept.
///
/// Two keys differing only in `allow_nulls` are distinct: they produce
/// different SQL. The operations requested for a key are not part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepKey {
    pub parameter: i32,
    pub position: Position,
    pub time_lag: i32,
    pub allow_nulls: bool,
}

impl StepKey {
    #[must_use]
    pub const fn new(parameter: i32, position: Position, time_lag: i32) -> Self {
        Self {
            parameter,
            position,
            time_lag,
            allow_nulls: false,
        }
    }

    #[must_use]
    pub const fn with_nulls(self, allow_nulls: bool) -> Self {
        Self {
            allow_nulls,
            ..self
        }
    }

    /// Same coordinates at another position and time lag, as used when a
    /// write is redirected by a catch's clamp policy or a measured date.
    #[must_use]
    pub const fn relocated(self, position: Position, time_lag: i32) -> Self {
        Self {
            position,
            time_lag,
            ..self
        }
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parameter {} at {} lag {:+}d",
            self.parameter, self.position, self.time_lag
        )?;
        if self.allow_nulls {
            f.write_str(" (nulls)")?;
        }
        Ok(())
    }
}

/// Column label for `operation` applied to `parameter` at `time_lag`:
/// `prefix ++ parameter ++ sign ++ two-digit |lag|`.
///
/// The sign is `-` for negative lags and `+` otherwise, so
/// `("gr", "SST", -5)` gives `grSST-05`.
#[must_use]
pub fn column_label(prefix: &str, parameter: &str, time_lag: i32) -> String {
    let sign = if time_lag < 0 { '-' } else { '+' };
    format!("{prefix}{parameter}{sign}{:02}", time_lag.unsigned_abs())
}
