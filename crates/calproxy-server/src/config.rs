//! Proxy configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use calproxy_providers::google::CALENDAR_API_BASE;
use calproxy_providers::{FileSecretStore, PassSecretStore, SecretStore};

use crate::error::{ServerError, ServerResult};

/// Default number of events returned when `num-events` is omitted.
pub const DEFAULT_NUM_EVENTS: u32 = 5;

/// Default upstream HTTP timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where secrets are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SecretBackend {
    /// One file per secret under a directory.
    #[default]
    File,
    /// The `pass` password manager.
    Pass,
}

/// Validated, immutable process configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address the HTTP server binds to.
    pub listen: SocketAddr,

    /// Secret name of the serialized OAuth token.
    pub oauth_token_param: String,

    /// Secret name of the OAuth client credentials JSON.
    pub credentials_param: String,

    /// Secret name of the expected `authorization` header value.
    ///
    /// The authorizer gate is disabled when unset.
    pub authorization_param: Option<String>,

    /// Event count used when a request omits `num-events`.
    pub default_num_events: u32,

    /// Secret backend.
    pub secret_backend: SecretBackend,

    /// Root directory of the file backend.
    pub secret_dir: PathBuf,

    /// Timeout applied to token and calendar requests.
    pub timeout: Duration,

    /// Calendar API base URL.
    pub calendar_api_base: String,
}

impl ProxyConfig {
    /// Creates a configuration with defaults for everything but the two
    /// required secret names.
    pub fn new(oauth_token_param: impl Into<String>, credentials_param: impl Into<String>) -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            oauth_token_param: oauth_token_param.into(),
            credentials_param: credentials_param.into(),
            authorization_param: None,
            default_num_events: DEFAULT_NUM_EVENTS,
            secret_backend: SecretBackend::File,
            secret_dir: default_secret_dir(),
            timeout: DEFAULT_TIMEOUT,
            calendar_api_base: CALENDAR_API_BASE.to_string(),
        }
    }

    /// Builder: set the listen address.
    pub fn with_listen(mut self, listen: SocketAddr) -> Self {
        self.listen = listen;
        self
    }

    /// Builder: enable the authorizer gate.
    pub fn with_authorization_param(mut self, name: impl Into<String>) -> Self {
        self.authorization_param = Some(name.into());
        self
    }

    /// Builder: set the default event count.
    pub fn with_default_num_events(mut self, count: u32) -> Self {
        self.default_num_events = count;
        self
    }

    /// Builder: set the secret backend.
    pub fn with_secret_backend(mut self, backend: SecretBackend) -> Self {
        self.secret_backend = backend;
        self
    }

    /// Builder: set the file backend directory.
    pub fn with_secret_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.secret_dir = dir.into();
        self
    }

    /// Builder: set the upstream timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder: set the calendar API base URL.
    pub fn with_calendar_api_base(mut self, base: impl Into<String>) -> Self {
        self.calendar_api_base = base.into();
        self
    }

    /// Rejects configurations the proxy cannot start with.
    pub fn validate(&self) -> ServerResult<()> {
        if self.oauth_token_param.trim().is_empty() {
            return Err(ServerError::config("OAuth token parameter name is empty"));
        }
        if self.credentials_param.trim().is_empty() {
            return Err(ServerError::config("credentials parameter name is empty"));
        }
        if matches!(&self.authorization_param, Some(name) if name.trim().is_empty()) {
            return Err(ServerError::config("authorization parameter name is empty"));
        }
        if self.default_num_events == 0 {
            return Err(ServerError::config("default number of events must be positive"));
        }
        if self.timeout.is_zero() {
            return Err(ServerError::config("timeout must be positive"));
        }
        if self.calendar_api_base.trim().is_empty() {
            return Err(ServerError::config("calendar API base URL is empty"));
        }
        Ok(())
    }

    /// Opens the configured secret backend.
    pub fn secret_store(&self) -> Arc<dyn SecretStore> {
        match self.secret_backend {
            SecretBackend::File => Arc::new(FileSecretStore::new(&self.secret_dir)),
            SecretBackend::Pass => Arc::new(PassSecretStore::new()),
        }
    }
}

/// Returns the default file backend directory.
///
/// Uses `$XDG_DATA_HOME/calproxy/secrets` (usually
/// `~/.local/share/calproxy/secrets`), falling back to a relative
/// `calproxy/secrets` when no data directory is known.
pub fn default_secret_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("calproxy")
        .join("secrets")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ProxyConfig::new("/calendar/token", "/calendar/credentials");
        assert_eq!(config.listen.to_string(), "127.0.0.1:8080");
        assert_eq!(config.default_num_events, 5);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.secret_backend, SecretBackend::File);
        assert!(config.authorization_param.is_none());
        assert!(config.secret_dir.ends_with("calproxy/secrets"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_methods() {
        let config = ProxyConfig::new("t", "c")
            .with_listen("0.0.0.0:9000".parse().unwrap())
            .with_authorization_param("auth")
            .with_default_num_events(10)
            .with_secret_backend(SecretBackend::Pass)
            .with_secret_dir("/srv/secrets")
            .with_timeout(Duration::from_secs(5))
            .with_calendar_api_base("http://127.0.0.1:1234");

        assert_eq!(config.listen.port(), 9000);
        assert_eq!(config.authorization_param.as_deref(), Some("auth"));
        assert_eq!(config.default_num_events, 10);
        assert_eq!(config.secret_backend, SecretBackend::Pass);
        assert_eq!(config.secret_dir, PathBuf::from("/srv/secrets"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.calendar_api_base, "http://127.0.0.1:1234");
    }

    #[test]
    fn validation_rejects_empty_names() {
        assert!(ProxyConfig::new("", "c").validate().is_err());
        assert!(ProxyConfig::new("t", "  ").validate().is_err());
        assert!(
            ProxyConfig::new("t", "c")
                .with_authorization_param("")
                .validate()
                .is_err()
        );
    }

    #[test]
    fn validation_rejects_zero_values() {
        assert!(
            ProxyConfig::new("t", "c")
                .with_default_num_events(0)
                .validate()
                .is_err()
        );
        assert!(
            ProxyConfig::new("t", "c")
                .with_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }
}
