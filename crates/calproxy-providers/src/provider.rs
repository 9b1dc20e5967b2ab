//! Calendar API seams.
//!
//! [`CalendarConnector`] turns an authenticated [`Transport`] into a
//! [`CalendarApi`]; the API exposes the two read-only calls the proxy
//! needs. Both are object-safe so the request pipeline can hold them as
//! trait objects and tests can swap in fakes.

use std::future::Future;
use std::pin::Pin;

use calproxy_core::RawEvent;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProviderResult;
use crate::google::Transport;

/// A boxed future for async trait methods.
///
/// Keeps the traits object-safe for `Arc<dyn ...>` use.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A calendar from the calendar list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListEntry {
    /// The provider-assigned calendar ID.
    pub id: String,
    /// The calendar's display name.
    #[serde(default)]
    pub summary: String,
    /// Whether this is the user's primary calendar.
    #[serde(default)]
    pub primary: bool,
}

impl CalendarListEntry {
    /// Creates an entry.
    pub fn new(id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
            primary: false,
        }
    }
}

/// One page of the calendar list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListPage {
    /// Calendars on this page, in provider order.
    #[serde(default)]
    pub items: Vec<CalendarListEntry>,
    /// Continuation token; absent or empty on the last page.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl CalendarListPage {
    /// Returns the continuation token if another page follows.
    pub fn next_page(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Filters for listing events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    /// Lower bound (inclusive) for event start.
    pub time_min: DateTime<Utc>,
    /// Maximum number of events to return.
    pub max_results: u32,
    /// Expand recurring events into single instances.
    pub single_events: bool,
    /// Include deleted events.
    pub show_deleted: bool,
    /// Order by start time ascending.
    pub order_by_start_time: bool,
}

impl EventQuery {
    /// Upcoming single instances from `now`, ordered by start, without
    /// deleted entries.
    pub fn upcoming(now: DateTime<Utc>, max_results: u32) -> Self {
        Self {
            time_min: now,
            max_results,
            single_events: true,
            show_deleted: false,
            order_by_start_time: true,
        }
    }

    /// Renders the filters as Calendar API query parameters.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("showDeleted", self.show_deleted.to_string()),
            ("singleEvents", self.single_events.to_string()),
            (
                "timeMin",
                self.time_min.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("maxResults", self.max_results.to_string()),
        ];
        if self.order_by_start_time {
            pairs.push(("orderBy", "startTime".to_string()));
        }
        pairs
    }
}

/// Read-only calendar operations.
pub trait CalendarApi: Send + Sync {
    /// Fetches one page of the user's calendar list.
    fn list_calendars_page<'a>(
        &'a self,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<CalendarListPage>>;

    /// Lists events of one calendar in a single request.
    fn list_events<'a>(
        &'a self,
        calendar_id: &'a str,
        query: &'a EventQuery,
    ) -> BoxFuture<'a, ProviderResult<Vec<RawEvent>>>;
}

/// Builds a [`CalendarApi`] that authenticates with the given transport.
pub trait CalendarConnector: Send + Sync {
    /// Creates an API client for one invocation.
    fn connect(&self, transport: Transport) -> ProviderResult<Box<dyn CalendarApi>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn upcoming_query_pairs() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap();
        let pairs = EventQuery::upcoming(now, 3).to_query_pairs();

        assert!(pairs.contains(&("timeMin", "2024-03-05T08:00:00Z".to_string())));
        assert!(pairs.contains(&("maxResults", "3".to_string())));
        assert!(pairs.contains(&("singleEvents", "true".to_string())));
        assert!(pairs.contains(&("showDeleted", "false".to_string())));
        assert!(pairs.contains(&("orderBy", "startTime".to_string())));
    }

    #[test]
    fn last_page_detection() {
        let mut page = CalendarListPage::default();
        assert_eq!(page.next_page(), None);

        page.next_page_token = Some(String::new());
        assert_eq!(page.next_page(), None);

        page.next_page_token = Some("abc".to_string());
        assert_eq!(page.next_page(), Some("abc"));
    }

    #[test]
    fn parse_calendar_list_page() {
        let json = r#"{
            "kind": "calendar#calendarList",
            "nextPageToken": "page-2",
            "items": [
                { "id": "primary@example.com", "summary": "Me", "primary": true },
                { "id": "abc@group.calendar.google.com", "summary": "Family" }
            ]
        }"#;

        let page: CalendarListPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.items[0].primary);
        assert_eq!(page.items[1].summary, "Family");
        assert_eq!(page.next_page(), Some("page-2"));
    }
}
