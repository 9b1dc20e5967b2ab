//! Google Calendar API v3 client.

use std::time::Duration;

use calproxy_core::{RawEvent, RawEventStart};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, CalendarApi, CalendarConnector, CalendarListPage, EventQuery};

use super::tokens::Transport;

/// Base URL for Google Calendar API v3.
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

const PROVIDER: &str = "google";

/// Calendar client bound to one authenticated transport.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    base_url: String,
    transport: Transport,
}

impl GoogleCalendarClient {
    /// Creates a client sharing `http_client`.
    pub fn new(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        transport: Transport,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transport,
        }
    }

    /// Fetches one page of the calendar list.
    pub async fn calendar_list_page(
        &self,
        page_token: Option<&str>,
    ) -> ProviderResult<CalendarListPage> {
        let mut url = self.endpoint(&["users", "me", "calendarList"])?;
        if let Some(token) = page_token {
            url.query_pairs_mut().append_pair("pageToken", token);
        }

        let page: CalendarListPage = self.get_json(url).await?;
        debug!(
            "calendar list page with {} entries, more: {}",
            page.items.len(),
            page.next_page().is_some()
        );
        Ok(page)
    }

    /// Lists events of a calendar in one request.
    pub async fn events(
        &self,
        calendar_id: &str,
        query: &EventQuery,
    ) -> ProviderResult<Vec<RawEvent>> {
        let mut url = self.endpoint(&["calendars", calendar_id, "events"])?;
        url.query_pairs_mut()
            .extend_pairs(query.to_query_pairs().iter().map(|(k, v)| (*k, v.as_str())));

        let list: EventListResponse = self.get_json(url).await?;
        let events: Vec<RawEvent> = list.items.into_iter().map(RawEvent::from).collect();
        debug!("fetched {} events from calendar {}", events.len(), calendar_id);
        Ok(events)
    }

    /// Builds `{base}/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> ProviderResult<Url> {
        let encoded: Vec<String> = segments
            .iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        let raw = format!("{}/{}", self.base_url, encoded.join("/"));
        Url::parse(&raw).map_err(|e| {
            ProviderError::configuration(format!("invalid calendar API URL '{}': {}", raw, e))
                .with_provider(PROVIDER)
        })
    }

    async fn get_json<T>(&self, url: Url) -> ProviderResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .http_client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, self.transport.authorization())
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    "request timeout".to_string()
                } else if e.is_connect() {
                    format!("connection failed: {}", e)
                } else {
                    format!("request failed: {}", e)
                };
                ProviderError::network(message).with_provider(PROVIDER)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body).with_provider(PROVIDER));
        }

        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read response: {}", e)).with_provider(PROVIDER)
        })?;

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse response: {}", e))
                .with_provider(PROVIDER)
        })
    }
}

fn status_error(status: reqwest::StatusCode, body: String) -> ProviderError {
    use reqwest::StatusCode;

    match status {
        StatusCode::BAD_REQUEST => {
            ProviderError::bad_request(format!("request rejected: {}", body))
        }
        StatusCode::UNAUTHORIZED => ProviderError::authentication("access token expired or invalid"),
        StatusCode::FORBIDDEN => ProviderError::authorization("access denied to calendar"),
        StatusCode::NOT_FOUND => ProviderError::not_found(format!("calendar not found: {}", body)),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited("rate limit exceeded"),
        _ => ProviderError::server(format!("API error ({}): {}", status, body)),
    }
}

impl CalendarApi for GoogleCalendarClient {
    fn list_calendars_page<'a>(
        &'a self,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<CalendarListPage>> {
        Box::pin(self.calendar_list_page(page_token))
    }

    fn list_events<'a>(
        &'a self,
        calendar_id: &'a str,
        query: &'a EventQuery,
    ) -> BoxFuture<'a, ProviderResult<Vec<RawEvent>>> {
        Box::pin(self.events(calendar_id, query))
    }
}

/// Creates [`GoogleCalendarClient`]s sharing one HTTP connection pool.
#[derive(Debug, Clone)]
pub struct GoogleConnector {
    http_client: reqwest::Client,
    base_url: String,
}

impl GoogleConnector {
    /// Creates a connector against the public API.
    pub fn new(timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;
        Ok(Self {
            http_client,
            base_url: CALENDAR_API_BASE.to_string(),
        })
    }

    /// Builder: point at a different API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Returns the API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl CalendarConnector for GoogleConnector {
    fn connect(&self, transport: Transport) -> ProviderResult<Box<dyn CalendarApi>> {
        Ok(Box::new(GoogleCalendarClient::new(
            self.http_client.clone(),
            self.base_url.clone(),
            transport,
        )))
    }
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
}

/// The fields of an API event the proxy reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    start: Option<ApiEventTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    date_time: Option<String>,
}

impl From<ApiEvent> for RawEvent {
    fn from(event: ApiEvent) -> Self {
        let start = event
            .start
            .map(|t| RawEventStart {
                date_time: t.date_time,
                date: t.date,
            })
            .unwrap_or_default();
        RawEvent::new(event.summary.unwrap_or_default(), start)
    }
}
