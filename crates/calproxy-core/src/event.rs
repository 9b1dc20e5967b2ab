//! Calendar event types.
//!
//! [`RawEvent`] is what the provider hands back for an upcoming event;
//! [`DisplayEvent`] is the one-way, display-ready form returned to callers.

use serde::{Deserialize, Serialize};

use crate::time::{DateParseError, EventStart};

/// The start of an event as sent by the provider.
///
/// Exactly one of the two fields is expected to be populated. Use
/// [`RawEventStart::parse`] to turn it into an [`EventStart`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEventStart {
    /// RFC 3339 timestamp for timed events.
    #[serde(default)]
    pub date_time: Option<String>,
    /// `YYYY-MM-DD` date for all-day events.
    #[serde(default)]
    pub date: Option<String>,
}

impl RawEventStart {
    /// Creates a timed start.
    pub fn timed(date_time: impl Into<String>) -> Self {
        Self {
            date_time: Some(date_time.into()),
            date: None,
        }
    }

    /// Creates an all-day start.
    pub fn all_day(date: impl Into<String>) -> Self {
        Self {
            date_time: None,
            date: Some(date.into()),
        }
    }

    /// Parses the start.
    ///
    /// A non-empty timestamp wins. Otherwise the bare date is parsed, and a
    /// missing date is a parse error like any other malformed input.
    pub fn parse(&self) -> Result<EventStart, DateParseError> {
        match self.date_time.as_deref() {
            Some(dt) if !dt.is_empty() => EventStart::parse_timed(dt),
            _ => EventStart::parse_all_day(self.date.as_deref().unwrap_or_default()),
        }
    }
}

/// An upcoming event as listed by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Event title.
    #[serde(default)]
    pub summary: String,
    /// Event start.
    #[serde(default)]
    pub start: RawEventStart,
}

impl RawEvent {
    /// Creates a raw event.
    pub fn new(summary: impl Into<String>, start: RawEventStart) -> Self {
        Self {
            summary: summary.into(),
            start,
        }
    }
}

/// A formatted event, serialized as `{"dateTime": ..., "summary": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayEvent {
    /// Formatted start, `05.Mar.09:00` or `25.Dec`.
    #[serde(rename = "dateTime")]
    pub date_time: String,
    /// Event title.
    pub summary: String,
}

/// Formats a single event for display.
pub fn format_event(event: &RawEvent) -> Result<DisplayEvent, DateParseError> {
    let start = event.start.parse()?;
    Ok(DisplayEvent {
        date_time: start.display(),
        summary: event.summary.clone(),
    })
}

/// Formats every event, failing on the first unparseable start.
pub fn format_events<'a, I>(events: I) -> Result<Vec<DisplayEvent>, DateParseError>
where
    I: IntoIterator<Item = &'a RawEvent>,
{
    events.into_iter().map(format_event).collect()
}
