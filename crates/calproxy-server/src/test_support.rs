//! Fakes of the provider seams shared by the server tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use calproxy_core::{RawEvent, RawEventStart};
use calproxy_providers::google::{OAuthClientConfig, StoredToken, TokenRefresher, Transport};
use calproxy_providers::{
    BoxFuture, CalendarApi, CalendarConnector, CalendarListEntry, CalendarListPage, EventQuery,
    MemorySecretStore, ProviderError, ProviderResult,
};
use parking_lot::Mutex;

pub const TOKEN_PARAM: &str = "/calendar/google-token";
pub const CREDENTIALS_PARAM: &str = "/calendar/google-credentials";
pub const AUTH_PARAM: &str = "/gateway/authorization";

pub const CREDENTIALS_JSON: &str = r#"{
    "installed": {
        "client_id": "proxy.apps.googleusercontent.com",
        "client_secret": "client-secret",
        "auth_uri": "https://accounts.google.com/o/oauth2/auth",
        "token_uri": "https://oauth2.googleapis.com/token"
    }
}"#;

/// A secret store holding a valid token and credentials.
pub fn seeded_secrets() -> MemorySecretStore {
    let token = StoredToken::new("access-0", "refresh-0")
        .to_json()
        .unwrap();
    MemorySecretStore::new()
        .with_secret(TOKEN_PARAM, token)
        .with_secret(CREDENTIALS_PARAM, CREDENTIALS_JSON)
}

/// Returns the stored token with a new access token.
#[derive(Default)]
pub struct FakeRefresher {
    calls: AtomicUsize,
    fail: bool,
}

impl FakeRefresher {
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TokenRefresher for FakeRefresher {
    fn refresh<'a>(
        &'a self,
        _config: &'a OAuthClientConfig,
        token: &'a StoredToken,
    ) -> BoxFuture<'a, ProviderResult<StoredToken>> {
        Box::pin(async move {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(ProviderError::authentication(
                    "token refresh failed (400 Bad Request): invalid_grant",
                ));
            }
            let mut fresh = token.clone();
            fresh.access_token = format!("access-{}", n);
            Ok(fresh)
        })
    }
}

#[derive(Default)]
struct CalendarState {
    pages: Vec<Vec<CalendarListEntry>>,
    events: Vec<RawEvent>,
    connects: AtomicUsize,
    page_calls: AtomicUsize,
    event_calls: AtomicUsize,
    transports: Mutex<Vec<String>>,
    queries: Mutex<Vec<(String, EventQuery)>>,
}

/// An in-memory calendar account; also its own connector.
///
/// Returns every configured event regardless of `max_results`, so callers
/// can check their own capping.
#[derive(Clone, Default)]
pub struct FakeCalendar {
    state: Arc<CalendarState>,
}

impl FakeCalendar {
    /// Two pages of calendars: "Work", then "Family" on the last page.
    pub fn with_events(events: Vec<RawEvent>) -> Self {
        Self {
            state: Arc::new(CalendarState {
                pages: vec![
                    vec![CalendarListEntry::new("work@example.com", "Work")],
                    vec![CalendarListEntry::new(
                        "family123@group.calendar.google.com",
                        "Family",
                    )],
                ],
                events,
                ..Default::default()
            }),
        }
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.state.page_calls.load(Ordering::SeqCst) + self.state.event_calls.load(Ordering::SeqCst)
    }

    pub fn transports(&self) -> Vec<String> {
        self.state.transports.lock().clone()
    }

    pub fn queries(&self) -> Vec<(String, EventQuery)> {
        self.state.queries.lock().clone()
    }
}

impl CalendarConnector for FakeCalendar {
    fn connect(&self, transport: Transport) -> ProviderResult<Box<dyn CalendarApi>> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        self.state.transports.lock().push(transport.authorization());
        Ok(Box::new(self.clone()))
    }
}

impl CalendarApi for FakeCalendar {
    fn list_calendars_page<'a>(
        &'a self,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<CalendarListPage>> {
        Box::pin(async move {
            self.state.page_calls.fetch_add(1, Ordering::SeqCst);
            let index: usize = match page_token {
                None => 0,
                Some(token) => token
                    .parse()
                    .map_err(|_| ProviderError::bad_request("invalid page token"))?,
            };
            let items = self.state.pages.get(index).cloned().unwrap_or_default();
            let next_page_token =
                (index + 1 < self.state.pages.len()).then(|| (index + 1).to_string());
            Ok(CalendarListPage {
                items,
                next_page_token,
            })
        })
    }

    fn list_events<'a>(
        &'a self,
        calendar_id: &'a str,
        query: &'a EventQuery,
    ) -> BoxFuture<'a, ProviderResult<Vec<RawEvent>>> {
        Box::pin(async move {
            self.state.event_calls.fetch_add(1, Ordering::SeqCst);
            self.state
                .queries
                .lock()
                .push((calendar_id.to_string(), query.clone()));
            Ok(self.state.events.clone())
        })
    }
}

/// `count` timed events on consecutive days of March 2024.
pub fn timed_events(count: usize) -> Vec<RawEvent> {
    (1..=count)
        .map(|day| {
            RawEvent::new(
                format!("Meeting {}", day),
                RawEventStart::timed(format!("2024-03-{:02}T09:00:00Z", day)),
            )
        })
        .collect()
}
