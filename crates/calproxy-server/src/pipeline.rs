//! The per-request pipeline.
//!
//! ```text
//! validate input ─► load credentials ─► parse OAuth config ─► refresh token
//!      ─► resolve calendar ─► list events ─► format ─► serialize
//! ```
//!
//! Stages run strictly in order and the first failure aborts the request
//! with an empty body. Nothing is retried.

use std::sync::Arc;

use calproxy_core::format_events;
use calproxy_providers::google::{OAuthClientConfig, TokenManager, TokenRefresher};
use calproxy_providers::{CalendarConnector, EventQuery, SecretStore, resolve_calendar_id};
use chrono::Utc;
use tracing::{Instrument, debug, error, info, info_span};

use crate::config::ProxyConfig;
use crate::error::PipelineError;
use crate::gateway::{CALENDAR_NAME_PARAM, GatewayRequest, GatewayResponse, NUM_EVENTS_PARAM};

/// Validated request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationParams {
    /// Display name of the calendar to read.
    pub calendar_name: String,
    /// Maximum number of events to return.
    pub count: u32,
}

impl InvocationParams {
    /// Extracts the calendar name and event count from a request.
    ///
    /// An absent or empty `num-events` means `default_count`. Otherwise it
    /// must be a positive base-10 integer; a leading `+` is accepted.
    pub fn from_request(
        request: &GatewayRequest,
        default_count: u32,
    ) -> Result<Self, PipelineError> {
        let calendar_name = match request.path_parameter(CALENDAR_NAME_PARAM) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(PipelineError::input("calendar name is empty or not provided")),
        };

        let count = match request.query_parameter(NUM_EVENTS_PARAM) {
            None | Some("") => default_count,
            Some(raw) => parse_count(raw)?,
        };

        Ok(Self {
            calendar_name,
            count,
        })
    }
}

fn parse_count(raw: &str) -> Result<u32, PipelineError> {
    let value: i64 = raw.parse().map_err(|e| {
        PipelineError::input_with_source(
            format!("failed to parse number of calendar events {:?}", raw),
            e,
        )
    })?;
    if value <= 0 {
        return Err(PipelineError::input(format!(
            "number of calendar events must be positive, got {}",
            value
        )));
    }
    u32::try_from(value).map_err(|e| {
        PipelineError::input_with_source(
            format!("number of calendar events is too large: {}", value),
            e,
        )
    })
}

/// Runs invocations against the injected secret store, token refresher
/// and calendar connector.
pub struct RequestPipeline {
    secrets: Arc<dyn SecretStore>,
    tokens: TokenManager,
    connector: Arc<dyn CalendarConnector>,
    credentials_param: String,
    default_num_events: u32,
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("tokens", &self.tokens)
            .field("credentials_param", &self.credentials_param)
            .field("default_num_events", &self.default_num_events)
            .finish_non_exhaustive()
    }
}

impl RequestPipeline {
    /// Wires a pipeline from its seams.
    pub fn new(
        config: &ProxyConfig,
        secrets: Arc<dyn SecretStore>,
        refresher: Arc<dyn TokenRefresher>,
        connector: Arc<dyn CalendarConnector>,
    ) -> Self {
        Self {
            tokens: TokenManager::new(secrets.clone(), refresher, config.oauth_token_param.clone()),
            secrets,
            connector,
            credentials_param: config.credentials_param.clone(),
            default_num_events: config.default_num_events,
        }
    }

    /// Handles one invocation and maps failures to empty error responses.
    pub async fn handle(&self, request: &GatewayRequest) -> GatewayResponse {
        let span = info_span!(
            "invocation",
            calendar = request.path_parameter(CALENDAR_NAME_PARAM).unwrap_or("")
        );

        async {
            match self.run(request).await {
                Ok(body) => GatewayResponse::json(body),
                Err(e) => {
                    error!(stage = e.stage(), "{}", e.report());
                    GatewayResponse::empty(e.status_code())
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Runs every stage and returns the JSON body.
    pub async fn run(&self, request: &GatewayRequest) -> Result<String, PipelineError> {
        let params = InvocationParams::from_request(request, self.default_num_events)?;
        debug!("requested {} events", params.count);

        let credentials = self.secrets.get(&self.credentials_param).await.map_err(|e| {
            PipelineError::credential(
                format!(
                    "failed to read secret {} from the secret store",
                    self.credentials_param
                ),
                e,
            )
        })?;
        let oauth_config = OAuthClientConfig::from_json(&credentials).map_err(|e| {
            PipelineError::credential("failed to parse client secret file to OAuth config", e)
        })?;

        let transport = self
            .tokens
            .obtain_authenticated_transport(&oauth_config)
            .await
            .map_err(|e| PipelineError::credential("failed to get client", e))?;
        let api = self
            .connector
            .connect(transport)
            .map_err(|e| PipelineError::provider("failed to retrieve Calendar client", e))?;

        let calendar_id = resolve_calendar_id(api.as_ref(), &params.calendar_name)
            .await
            .map_err(|e| PipelineError::provider("failed to get calendar ID", e))?;

        let query = EventQuery::upcoming(Utc::now(), params.count);
        let mut events = api.list_events(&calendar_id, &query).await.map_err(|e| {
            PipelineError::provider(
                format!("failed to retrieve events from the calendar {}", calendar_id),
                e,
            )
        })?;
        events.truncate(params.count as usize);

        let display_events = format_events(&events)
            .map_err(|e| PipelineError::format("failed to parse date", e))?;
        let body = serde_json::to_string(&display_events)
            .map_err(|e| PipelineError::serialization("failed to marshal events to JSON", e))?;

        info!("returning {} events", display_events.len());
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calproxy_core::{DisplayEvent, RawEvent, RawEventStart};
    use calproxy_providers::MemorySecretStore;

    use crate::test_support::{
        CREDENTIALS_PARAM, FakeCalendar, FakeRefresher, TOKEN_PARAM, seeded_secrets, timed_events,
    };

    struct Harness {
        secrets: Arc<MemorySecretStore>,
        refresher: Arc<FakeRefresher>,
        calendar: FakeCalendar,
        pipeline: RequestPipeline,
    }

    fn harness_with(
        secrets: MemorySecretStore,
        refresher: FakeRefresher,
        events: Vec<RawEvent>,
    ) -> Harness {
        let config = ProxyConfig::new(TOKEN_PARAM, CREDENTIALS_PARAM);
        let secrets = Arc::new(secrets);
        let refresher = Arc::new(refresher);
        let calendar = FakeCalendar::with_events(events);
        let pipeline = RequestPipeline::new(
            &config,
            secrets.clone(),
            refresher.clone(),
            Arc::new(calendar.clone()),
        );
        Harness {
            secrets,
            refresher,
            calendar,
            pipeline,
        }
    }

    fn harness(events: Vec<RawEvent>) -> Harness {
        harness_with(seeded_secrets(), FakeRefresher::default(), events)
    }

    fn request(calendar: &str) -> GatewayRequest {
        GatewayRequest::new().with_path_parameter(CALENDAR_NAME_PARAM, calendar)
    }

    fn request_with_count(calendar: &str, count: &str) -> GatewayRequest {
        request(calendar).with_query_parameter(NUM_EVENTS_PARAM, count)
    }

    fn parse_body(response: &GatewayResponse) -> Vec<DisplayEvent> {
        serde_json::from_str(&response.body).unwrap()
    }

    #[tokio::test]
    async fn success_returns_formatted_json() {
        let h = harness(vec![
            RawEvent::new("Standup", RawEventStart::timed("2024-03-05T09:00:00Z")),
            RawEvent::new("Christmas", RawEventStart::all_day("2024-12-25")),
        ]);

        let response = h.pipeline.handle(&request("Family")).await;

        assert_eq!(response.status, 200);
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(
            response.body,
            r#"[{"dateTime":"05.Mar.09:00","summary":"Standup"},{"dateTime":"25.Dec","summary":"Christmas"}]"#
        );

        let queries = h.calendar.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].0, "family123@group.calendar.google.com");
        assert!(queries[0].1.single_events);
        assert!(!queries[0].1.show_deleted);
        assert!(queries[0].1.order_by_start_time);
        assert_eq!(h.calendar.transports(), vec!["Bearer access-1".to_string()]);
    }

    #[tokio::test]
    async fn token_is_persisted_exactly_once() {
        let h = harness(timed_events(1));

        let response = h.pipeline.handle(&request("Family")).await;

        assert_eq!(response.status, 200);
        assert_eq!(h.refresher.calls(), 1);
        assert_eq!(h.secrets.writes(), 1);
        assert!(h.secrets.peek(TOKEN_PARAM).unwrap().contains("access-1"));
    }

    #[tokio::test]
    async fn num_events_caps_the_result() {
        let h = harness(timed_events(6));

        let response = h.pipeline.handle(&request_with_count("Family", "3")).await;

        assert_eq!(response.status, 200);
        let events = parse_body(&response);
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].date_time, "03.Mar.09:00");
        assert_eq!(h.calendar.queries()[0].1.max_results, 3);
    }

    #[tokio::test]
    async fn num_events_defaults_to_five() {
        for req in [request("Family"), request_with_count("Family", "")] {
            let h = harness(timed_events(7));

            let response = h.pipeline.handle(&req).await;

            assert_eq!(parse_body(&response).len(), 5);
            assert_eq!(h.calendar.queries()[0].1.max_results, 5);
        }
    }

    #[tokio::test]
    async fn configured_default_is_used() {
        let config = ProxyConfig::new(TOKEN_PARAM, CREDENTIALS_PARAM).with_default_num_events(2);
        let calendar = FakeCalendar::with_events(timed_events(4));
        let pipeline = RequestPipeline::new(
            &config,
            Arc::new(seeded_secrets()),
            Arc::new(FakeRefresher::default()),
            Arc::new(calendar.clone()),
        );

        let response = pipeline.handle(&request("Family")).await;
        assert_eq!(parse_body(&response).len(), 2);
    }

    #[tokio::test]
    async fn large_counts_pass_through() {
        let h = harness(timed_events(2));

        let response = h.pipeline.handle(&request_with_count("Family", "+2500")).await;

        assert_eq!(response.status, 200);
        assert_eq!(parse_body(&response).len(), 2);
        assert_eq!(h.calendar.queries()[0].1.max_results, 2500);
    }

    #[tokio::test]
    async fn invalid_num_events_is_bad_request_without_downstream_calls() {
        for raw in ["abc", "3.5", " 3", "0", "-2", "99999999999"] {
            let h = harness(timed_events(3));

            let response = h.pipeline.handle(&request_with_count("Family", raw)).await;

            assert_eq!(response.status, 400, "num-events={raw:?}");
            assert!(response.body.is_empty());
            assert_eq!(h.secrets.reads(), 0);
            assert_eq!(h.refresher.calls(), 0);
            assert_eq!(h.calendar.connects(), 0);
            assert_eq!(h.calendar.calls(), 0);
        }
    }

    #[tokio::test]
    async fn missing_calendar_name_is_bad_request() {
        let h = harness(timed_events(1));

        assert_eq!(h.pipeline.handle(&GatewayRequest::new()).await.status, 400);
        assert_eq!(h.pipeline.handle(&request("")).await.status, 400);
        assert_eq!(h.secrets.reads(), 0);
    }

    #[tokio::test]
    async fn missing_credentials_secret_fails_before_calendar() {
        let secrets = MemorySecretStore::new().with_secret(
            TOKEN_PARAM,
            calproxy_providers::google::StoredToken::new("a", "r")
                .to_json()
                .unwrap(),
        );
        let h = harness_with(secrets, FakeRefresher::default(), timed_events(1));

        let response = h.pipeline.handle(&request("Family")).await;

        assert_eq!(response.status, 500);
        assert!(response.body.is_empty());
        assert_eq!(h.refresher.calls(), 0);
        assert_eq!(h.calendar.connects(), 0);
        assert_eq!(h.calendar.calls(), 0);
    }

    #[tokio::test]
    async fn missing_token_secret_fails_before_calendar() {
        let secrets = MemorySecretStore::new()
            .with_secret(CREDENTIALS_PARAM, crate::test_support::CREDENTIALS_JSON);
        let h = harness_with(secrets, FakeRefresher::default(), timed_events(1));

        let response = h.pipeline.handle(&request("Family")).await;

        assert_eq!(response.status, 500);
        assert_eq!(h.calendar.calls(), 0);
        assert_eq!(h.secrets.writes(), 0);
    }

    #[tokio::test]
    async fn denied_secret_is_server_error() {
        let secrets = seeded_secrets();
        secrets.deny(CREDENTIALS_PARAM);
        let h = harness_with(secrets, FakeRefresher::default(), timed_events(1));

        assert_eq!(h.pipeline.handle(&request("Family")).await.status, 500);
        assert_eq!(h.calendar.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_credentials_is_server_error() {
        let secrets = seeded_secrets().with_secret(CREDENTIALS_PARAM, "{}");
        let h = harness_with(secrets, FakeRefresher::default(), timed_events(1));

        let err = h.pipeline.run(&request("Family")).await.unwrap_err();
        assert!(matches!(err, PipelineError::CredentialFailure { .. }));
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn refresh_failure_is_server_error() {
        let h = harness_with(seeded_secrets(), FakeRefresher::failing(), timed_events(1));

        let err = h.pipeline.run(&request("Family")).await.unwrap_err();
        assert!(matches!(err, PipelineError::CredentialFailure { .. }));
        assert!(err.report().contains("invalid_grant"));
        assert_eq!(h.secrets.writes(), 0);
        assert_eq!(h.calendar.connects(), 0);
    }

    #[tokio::test]
    async fn unknown_calendar_is_server_error() {
        let h = harness(timed_events(1));

        let err = h.pipeline.run(&request("Holidays")).await.unwrap_err();

        assert!(matches!(err, PipelineError::ProviderFailure { .. }));
        assert!(err.report().contains("Holidays"));
        assert_eq!(h.calendar.queries().len(), 0);
    }

    #[tokio::test]
    async fn bad_date_fails_whole_request() {
        let h = harness(vec![
            RawEvent::new("ok", RawEventStart::timed("2024-03-05T09:00:00Z")),
            RawEvent::new("broken", RawEventStart::timed("yesterday")),
        ]);

        let response = h.pipeline.handle(&request("Family")).await;
        assert_eq!(response.status, 500);
        assert!(response.body.is_empty());

        let err = h.pipeline.run(&request("Family")).await.unwrap_err();
        assert!(matches!(err, PipelineError::FormatFailure { .. }));
    }

    #[tokio::test]
    async fn no_events_is_empty_array() {
        let h = harness(Vec::new());

        let response = h.pipeline.handle(&request("Family")).await;

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "[]");
    }

    #[test]
    fn params_from_request() {
        let params =
            InvocationParams::from_request(&request_with_count("Work", "+7"), 5).unwrap();
        assert_eq!(
            params,
            InvocationParams {
                calendar_name: "Work".to_string(),
                count: 7,
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_invocations_share_a_file_store() {
        use calproxy_providers::FileSecretStore;
        use calproxy_providers::google::StoredToken;

        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(dir.path());
        let token = StoredToken::new("access-0", "refresh-0").to_json().unwrap();
        store.put(TOKEN_PARAM, &token).await.unwrap();
        store.put(CREDENTIALS_PARAM, crate::test_support::CREDENTIALS_JSON).await.unwrap();

        let config = ProxyConfig::new(TOKEN_PARAM, CREDENTIALS_PARAM);
        let store = Arc::new(store);
        let refresher = Arc::new(FakeRefresher::default());
        let pipeline = Arc::new(RequestPipeline::new(
            &config,
            store.clone(),
            refresher.clone(),
            Arc::new(FakeCalendar::with_events(timed_events(3))),
        ));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move { pipeline.handle(&request("Family")).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().status, 200);
        }

        assert_eq!(refresher.calls(), 16);
        let stored = StoredToken::from_json(&store.get(TOKEN_PARAM).await.unwrap()).unwrap();
        assert!(stored.access_token.starts_with("access-"));
        assert_eq!(stored.refresh_token(), Some("refresh-0"));
    }
}
