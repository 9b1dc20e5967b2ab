//! HTTP gateway in front of a Google calendar.
//!
//! This crate provides the `calproxy` server that:
//! - Parses process configuration from flags and environment
//! - Optionally gates requests on a shared secret ([`Authorizer`])
//! - Runs each request through the [`RequestPipeline`]: credentials,
//!   token refresh, calendar resolution, event listing and formatting
//! - Serves the pipeline over HTTP with graceful shutdown
//!
//! # Example
//!
//! ```rust,no_run
//! use calproxy_server::{ProxyConfig, serve};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ProxyConfig::new("google/token", "google/credentials")
//!         .with_authorization_param("gateway/authorization");
//!     serve(config).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
mod authorizer;
mod config;
mod error;
mod gateway;
mod http;
mod pipeline;
mod signals;

#[cfg(test)]
mod test_support;

pub use authorizer::{
    AUTHORIZATION_HEADER, AuthorizationDecision, Authorizer, FORWARDED_FOR_HEADER,
};
pub use config::{
    DEFAULT_NUM_EVENTS, DEFAULT_TIMEOUT, ProxyConfig, SecretBackend, default_secret_dir,
};
pub use error::{PipelineError, ServerError, ServerResult};
pub use gateway::{CALENDAR_NAME_PARAM, GatewayRequest, GatewayResponse, NUM_EVENTS_PARAM};
pub use http::{AppState, router, serve};
pub use pipeline::{InvocationParams, RequestPipeline};
pub use signals::shutdown_signal;
