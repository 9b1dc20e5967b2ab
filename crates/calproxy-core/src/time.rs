//! Start times for calendar events.
//!
//! Calendar providers describe an event start either as a full timestamp
//! with an offset or as a bare calendar date for all-day entries. The two
//! forms are mutually exclusive, so [`EventStart`] keeps exactly one of
//! them.

use chrono::{DateTime, FixedOffset, NaiveDate};
use thiserror::Error;

/// Display format for timed events: day, abbreviated month, 24-hour time.
pub const TIMED_FORMAT: &str = "%d.%b.%H:%M";

/// Display format for all-day events: day and abbreviated month only.
pub const ALL_DAY_FORMAT: &str = "%d.%b";

/// Wire format of a bare calendar date.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A date or timestamp that could not be parsed.
#[derive(Debug, Error)]
#[error("failed to parse date {input:?}: {source}")]
pub struct DateParseError {
    input: String,
    #[source]
    source: chrono::ParseError,
}

impl DateParseError {
    /// Returns the text that failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// The start of a calendar event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStart {
    /// A specific point in time, kept in the offset the provider sent.
    Timed(DateTime<FixedOffset>),
    /// An all-day event date.
    AllDay(NaiveDate),
}

impl EventStart {
    /// Parses an RFC 3339 timestamp such as `2024-03-05T09:00:00Z`.
    pub fn parse_timed(input: &str) -> Result<Self, DateParseError> {
        DateTime::parse_from_rfc3339(input)
            .map(Self::Timed)
            .map_err(|source| DateParseError {
                input: input.to_string(),
                source,
            })
    }

    /// Parses a bare `YYYY-MM-DD` date.
    pub fn parse_all_day(input: &str) -> Result<Self, DateParseError> {
        NaiveDate::parse_from_str(input, DATE_FORMAT)
            .map(Self::AllDay)
            .map_err(|source| DateParseError {
                input: input.to_string(),
                source,
            })
    }

    /// Returns `true` for all-day starts.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Renders the start for display.
    ///
    /// Timed starts render as `05.Mar.09:00` in their own offset. All-day
    /// starts drop the year and render as `25.Dec`.
    pub fn display(&self) -> String {
        match self {
            Self::Timed(dt) => dt.format(TIMED_FORMAT).to_string(),
            Self::AllDay(date) => date.format(ALL_DAY_FORMAT).to_string(),
        }
    }
}
