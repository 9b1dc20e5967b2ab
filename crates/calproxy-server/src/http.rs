//! HTTP front end.
//!
//! Routes:
//!
//! - `ANY /calendars/{calendar-name}/events` and `ANY /{calendar-name}` run
//!   the request pipeline, behind the authorizer when one is configured
//! - `GET /health` answers `ok` without authorization

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use calproxy_providers::google::{GoogleConnector, OAuthClient};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::authorizer::Authorizer;
use crate::config::ProxyConfig;
use crate::error::ServerResult;
use crate::gateway::{CALENDAR_NAME_PARAM, GatewayRequest, GatewayResponse};
use crate::pipeline::RequestPipeline;
use crate::signals::shutdown_signal;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    pipeline: Arc<RequestPipeline>,
    authorizer: Option<Arc<Authorizer>>,
}

impl AppState {
    /// Creates state from already wired components.
    pub fn new(pipeline: Arc<RequestPipeline>, authorizer: Option<Arc<Authorizer>>) -> Self {
        Self {
            pipeline,
            authorizer,
        }
    }

    /// Wires the production secret store, OAuth client and Google connector.
    pub fn from_config(config: &ProxyConfig) -> ServerResult<Self> {
        let secrets = config.secret_store();
        let refresher = Arc::new(OAuthClient::new(config.timeout)?);
        let connector = Arc::new(
            GoogleConnector::new(config.timeout)?
                .with_base_url(config.calendar_api_base.clone()),
        );

        let pipeline = RequestPipeline::new(config, secrets.clone(), refresher, connector);
        let authorizer = config
            .authorization_param
            .as_ref()
            .map(|param| Arc::new(Authorizer::new(secrets, param.clone())));
        if authorizer.is_none() {
            warn!("no authorization parameter configured, requests are not authenticated");
        }

        Ok(Self::new(Arc::new(pipeline), authorizer))
    }
}

/// Builds the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/calendars/:calendar_name/events", any(calendar_events))
        .route("/:calendar_name", any(calendar_events))
        .route_layer(middleware::from_fn_with_state(state.clone(), authorize))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the configured address and serves until SIGINT or SIGTERM.
pub async fn serve(config: ProxyConfig) -> ServerResult<()> {
    let state = AppState::from_config(&config)?;
    let listener = TcpListener::bind(config.listen).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn calendar_events(
    State(state): State<AppState>,
    Path(calendar_name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let request = GatewayRequest {
        path_parameters: HashMap::from([(CALENDAR_NAME_PARAM.to_string(), calendar_name)]),
        query_parameters: query,
        headers: header_map(&headers),
    };

    into_response(state.pipeline.handle(&request).await)
}

async fn authorize(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(authorizer) = state.authorizer.as_ref() else {
        return next.run(request).await;
    };

    let gateway = GatewayRequest {
        headers: header_map(request.headers()),
        ..GatewayRequest::default()
    };

    match authorizer.authorize(&gateway).await {
        Ok(decision) if decision.is_authorized() => next.run(request).await,
        Ok(_) => StatusCode::UNAUTHORIZED.into_response(),
        Err(e) => {
            error!("authorization check failed: {}", e);
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

fn into_response(response: GatewayResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut headers = HeaderMap::new();
    for (name, value) in &response.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!("dropping invalid response header {}", name),
        }
    }

    (status, headers, response.body).into_response()
}
