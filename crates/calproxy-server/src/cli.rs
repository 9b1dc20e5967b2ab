//! Command-line interface definition.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use calproxy_core::TracingOutputFormat;
use clap::Parser;

use crate::config::{DEFAULT_NUM_EVENTS, ProxyConfig, SecretBackend, default_secret_dir};
use crate::error::ServerResult;

/// calproxy - upcoming calendar events over HTTP
#[derive(Debug, Parser)]
#[command(name = "calproxy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "CALPROXY_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Secret name holding the serialized OAuth token
    #[arg(long, env = "GOOGLE_API_OAUTH_TOKEN")]
    pub oauth_token_param: String,

    /// Secret name holding the OAuth client credentials JSON
    #[arg(long, env = "GOOGLE_API_CREDENTIALS")]
    pub credentials_param: String,

    /// Secret name holding the expected `authorization` header value
    #[arg(long, env = "AUTHORIZATION_TOKEN")]
    pub authorization_param: Option<String>,

    /// Number of events returned when `num-events` is omitted
    #[arg(long, env = "CALPROXY_DEFAULT_NUM_EVENTS", default_value_t = DEFAULT_NUM_EVENTS)]
    pub default_num_events: u32,

    /// Secret backend
    #[arg(long, env = "CALPROXY_SECRET_BACKEND", value_enum, default_value_t = SecretBackend::File)]
    pub secret_backend: SecretBackend,

    /// Root directory of the file secret backend
    #[arg(long, env = "CALPROXY_SECRET_DIR")]
    pub secret_dir: Option<PathBuf>,

    /// Upstream HTTP timeout in seconds
    #[arg(long, env = "CALPROXY_TIMEOUT_SECS", default_value = "30")]
    pub timeout_secs: u64,

    /// Calendar API base URL
    #[arg(long, env = "CALPROXY_CALENDAR_API_BASE")]
    pub calendar_api_base: Option<String>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Log output format: pretty, compact or json
    #[arg(long, env = "CALPROXY_LOG_FORMAT", default_value = "json")]
    pub log_format: TracingOutputFormat,
}

impl Cli {
    /// Builds and validates the process configuration.
    pub fn into_config(self) -> ServerResult<ProxyConfig> {
        let mut config = ProxyConfig::new(self.oauth_token_param, self.credentials_param)
            .with_listen(self.listen)
            .with_default_num_events(self.default_num_events)
            .with_secret_backend(self.secret_backend)
            .with_secret_dir(self.secret_dir.unwrap_or_else(default_secret_dir))
            .with_timeout(Duration::from_secs(self.timeout_secs));

        if let Some(name) = self.authorization_param {
            config = config.with_authorization_param(name);
        }
        if let Some(base) = self.calendar_api_base {
            config = config.with_calendar_api_base(base);
        }

        config.validate()?;
        Ok(config)
    }
}
