//! The UTC instant an observation batch is anchored to.

use crate::input::error::InputError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::str::FromStr;

/// A reference time, ordered chronologically.
///
/// Stored archives index time as elapsed seconds since the Unix epoch, see
/// [`ReferenceTime::epoch_seconds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReferenceTime(DateTime<Utc>);

impl ReferenceTime {
    /// Parses an ISO-8601 / RFC 3339 timestamp. A timezone designator is required.
    pub fn parse(value: &str) -> Result<Self, InputError> {
        DateTime::parse_from_rfc3339(value.trim())
            .map(|dt| ReferenceTime(dt.with_timezone(&Utc)))
            .map_err(|source| InputError::InvalidReferenceTime {
                value: value.to_string(),
                source,
            })
    }

    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        ReferenceTime(datetime)
    }

    /// Inverse of [`ReferenceTime::epoch_seconds`]. Returns `None` for non-finite
    /// or out-of-range values.
    pub fn from_epoch_seconds(seconds: f64) -> Option<Self> {
        if !seconds.is_finite() {
            return None;
        }
        let whole = seconds.floor();
        let nanos = (((seconds - whole) * 1e9).round() as u32).min(999_999_999);
        DateTime::from_timestamp(whole as i64, nanos).map(ReferenceTime)
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Seconds since 1970-01-01T00:00:00Z, the numeric key of the archive time index.
    pub fn epoch_seconds(&self) -> f64 {
        self.0.timestamp() as f64 + f64::from(self.0.timestamp_subsec_nanos()) * 1e-9
    }
}

impl fmt::Display for ReferenceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl FromStr for ReferenceTime {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReferenceTime::parse(s)
    }
}

impl From<DateTime<Utc>> for ReferenceTime {
    fn from(value: DateTime<Utc>) -> Self {
        ReferenceTime(value)
    }
}
