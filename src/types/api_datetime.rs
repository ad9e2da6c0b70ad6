//! Date handling for request parameters.
//!
//! The data service expects timestamps as `YYYY-MM-DDHH:MM:SS:mmm`: no separator between
//! date and time, and a colon in front of the milliseconds. Callers can pass any of the
//! friendlier forms accepted by [`DateInput`], which all normalize to the same [`ApiDateTime`].

use crate::types::error::ValidationError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use std::fmt;
use std::str::FromStr;

/// chrono format string for the wire representation.
pub const API_DATETIME_FORMAT: &str = "%Y-%m-%d%H:%M:%S:%3f";

/// A timestamp at millisecond precision, rendered in the data service's wire format.
///
/// # Examples
///
/// ```
/// use dbhydro::ApiDateTime;
///
/// let dt: ApiDateTime = "2025-12-04 10:30".parse().unwrap();
/// assert_eq!(dt.to_string(), "2025-12-0410:30:00:000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiDateTime(NaiveDateTime);

impl ApiDateTime {
    /// Wraps a naive datetime, dropping anything below millisecond precision.
    pub fn new(datetime: NaiveDateTime) -> Self {
        let nanos = datetime.nanosecond() / 1_000_000 * 1_000_000;
        Self(datetime.with_nanosecond(nanos).unwrap_or(datetime))
    }

    pub fn naive(&self) -> NaiveDateTime {
        self.0
    }

    /// Parses any of the supported string forms.
    ///
    /// Accepted, with surrounding whitespace ignored:
    /// * `YYYY-MM-DD`
    /// * `YYYY-MM-DD HH[:MM[:SS[:mmm]]]`
    /// * `YYYY-MM-DDTHH[:MM[:SS[:mmm]]]`, also with ISO `.fff` fractional seconds
    /// * `YYYY-MM-DDHH[:MM[:SS[:mmm]]]` (the wire format and its truncations)
    ///
    /// Missing time components default to zero.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        parse_datetime(input)
            .map(Self::new)
            .ok_or_else(|| ValidationError::InvalidDate {
                value: input.to_string(),
            })
    }
}

impl fmt::Display for ApiDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(API_DATETIME_FORMAT))
    }
}

impl FromStr for ApiDateTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<NaiveDateTime> for ApiDateTime {
    fn from(value: NaiveDateTime) -> Self {
        Self::new(value)
    }
}

/// Anything a caller may pass where the API expects a date.
///
/// Zoned datetimes are taken at their wall-clock time in their own zone; the service
/// interprets timestamps in its local time and has no notion of offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateInput {
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl DateInput {
    pub fn normalize(&self) -> Result<ApiDateTime, ValidationError> {
        match self {
            DateInput::Text(text) => ApiDateTime::parse(text),
            DateInput::Date(date) => Ok(ApiDateTime::new(date.and_time(NaiveTime::MIN))),
            DateInput::DateTime(datetime) => Ok(ApiDateTime::new(*datetime)),
        }
    }
}

impl From<&str> for DateInput {
    fn from(value: &str) -> Self {
        DateInput::Text(value.to_string())
    }
}

impl From<String> for DateInput {
    fn from(value: String) -> Self {
        DateInput::Text(value)
    }
}

impl From<&String> for DateInput {
    fn from(value: &String) -> Self {
        DateInput::Text(value.clone())
    }
}

impl From<NaiveDate> for DateInput {
    fn from(value: NaiveDate) -> Self {
        DateInput::Date(value)
    }
}

impl From<NaiveDateTime> for DateInput {
    fn from(value: NaiveDateTime) -> Self {
        DateInput::DateTime(value)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for DateInput {
    fn from(value: DateTime<Tz>) -> Self {
        DateInput::DateTime(value.naive_local())
    }
}

impl From<ApiDateTime> for DateInput {
    fn from(value: ApiDateTime) -> Self {
        DateInput::DateTime(value.naive())
    }
}

/// Normalizes both ends of a range and checks that `start <= end`.
pub fn normalize_range(
    start: &DateInput,
    end: &DateInput,
) -> Result<(ApiDateTime, ApiDateTime), ValidationError> {
    let start = start.normalize()?;
    let end = end.normalize()?;
    if start > end {
        return Err(ValidationError::DateRangeReversed {
            start: start.to_string(),
            end: end.to_string(),
        });
    }
    Ok((start, end))
}

fn parse_datetime(input: &str) -> Option<NaiveDateTime> {
    let trimmed = input.trim();
    // Everything below indexes by byte.
    if !trimmed.is_ascii() || trimmed.len() < 10 {
        return None;
    }
    let (date_part, rest) = trimmed.split_at(10);
    let date = parse_date_part(date_part)?;

    let (time_part, had_separator) = match rest.strip_prefix(|c| c == 'T' || c == ' ') {
        Some(stripped) => (stripped, true),
        None => (rest, false),
    };
    if time_part.is_empty() {
        return if had_separator {
            None
        } else {
            Some(date.and_time(NaiveTime::MIN))
        };
    }
    parse_time_part(time_part).map(|time| date.and_time(time))
}

fn parse_date_part(s: &str) -> Option<NaiveDate> {
    let bytes = s.as_bytes();
    if bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let year = fixed_digits(&s[0..4])?;
    let month = fixed_digits(&s[5..7])?;
    let day = fixed_digits(&s[8..10])?;
    NaiveDate::from_ymd_opt(year as i32, month, day)
}

fn parse_time_part(s: &str) -> Option<NaiveTime> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() > 4 {
        return None;
    }

    let hour = fixed_digits(parts[0]).filter(|_| parts[0].len() == 2)?;
    let minute = match parts.get(1) {
        Some(p) if p.len() == 2 => fixed_digits(p)?,
        Some(_) => return None,
        None => 0,
    };

    let (second, mut millis) = match parts.get(2) {
        None => (0, 0),
        // ISO fractional seconds, only valid without a trailing `:mmm`.
        Some(p) if p.contains('.') && parts.len() == 3 => {
            let (whole, fraction) = p.split_once('.')?;
            if whole.len() != 2 || fraction.is_empty() || fraction.len() > 9 {
                return None;
            }
            let padded = format!("{:0<3}", &fraction[..fraction.len().min(3)]);
            fixed_digits(fraction)?;
            (fixed_digits(whole)?, fixed_digits(&padded)?)
        }
        Some(p) if p.len() == 2 => (fixed_digits(p)?, 0),
        Some(_) => return None,
    };

    if let Some(p) = parts.get(3) {
        if p.len() != 3 {
            return None;
        }
        millis = fixed_digits(p)?;
    }

    NaiveTime::from_hms_milli_opt(hour, minute, second, millis)
}

/// Parses a run of ASCII digits; signs and whitespace are rejected.
fn fixed_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
