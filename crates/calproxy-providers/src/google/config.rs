//! OAuth client configuration parsed from the stored credentials blob.

use serde::Deserialize;
use url::Url;

use crate::error::{ProviderError, ProviderResult};

/// Google's OAuth authorization endpoint.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
/// Google's OAuth token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Read-only calendar access.
pub const CALENDAR_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// OAuth client settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthClientConfig {
    /// The OAuth 2.0 client ID.
    pub client_id: String,
    /// The OAuth 2.0 client secret.
    pub client_secret: String,
    /// Where users are sent to grant consent.
    pub auth_endpoint: Url,
    /// Where refresh grants are posted.
    pub token_endpoint: Url,
    /// Requested scopes.
    pub scopes: Vec<String>,
}

/// Shape of the Google Cloud Console credentials JSON.
///
/// A `web` or `installed` section (`web` wins when both exist), or the
/// same keys at the root.
#[derive(Debug, Deserialize)]
struct CredentialsBlob {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
    #[serde(flatten)]
    flat: FlatSection,
}

#[derive(Debug, Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    auth_uri: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FlatSection {
    client_id: Option<String>,
    client_secret: Option<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

impl OAuthClientConfig {
    /// Creates a config against Google's default endpoints.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_endpoint: default_url(GOOGLE_AUTH_URL),
            token_endpoint: default_url(GOOGLE_TOKEN_URL),
            scopes: vec![CALENDAR_READONLY_SCOPE.to_string()],
        }
    }

    /// Builder: override the token endpoint.
    pub fn with_token_endpoint(mut self, endpoint: Url) -> Self {
        self.token_endpoint = endpoint;
        self
    }

    /// Parses a credentials blob.
    ///
    /// Accepts `{"installed": {...}}`, `{"web": {...}}`, or the flat form
    /// with `client_id`/`client_secret` at the root.
    pub fn from_json(json: &str) -> ProviderResult<Self> {
        let blob: CredentialsBlob = serde_json::from_str(json).map_err(|e| {
            ProviderError::configuration(format!("failed to parse credentials JSON: {}", e))
        })?;

        let section = match blob.web.or(blob.installed) {
            Some(s) => s,
            None => match (blob.flat.client_id, blob.flat.client_secret) {
                (Some(client_id), Some(client_secret)) => ClientSection {
                    client_id,
                    client_secret,
                    auth_uri: blob.flat.auth_uri,
                    token_uri: blob.flat.token_uri,
                },
                _ => {
                    return Err(ProviderError::configuration(
                        "credentials must contain an 'installed'/'web' section or 'client_id'/'client_secret' at the root",
                    ));
                }
            },
        };

        let mut config = Self::new(section.client_id, section.client_secret);
        if let Some(uri) = section.auth_uri {
            config.auth_endpoint = parse_endpoint("auth_uri", &uri)?;
        }
        if let Some(uri) = section.token_uri {
            config.token_endpoint = parse_endpoint("token_uri", &uri)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks that the client identity is present.
    pub fn validate(&self) -> ProviderResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(ProviderError::configuration("client_id is required"));
        }
        if self.client_secret.trim().is_empty() {
            return Err(ProviderError::configuration("client_secret is required"));
        }
        Ok(())
    }
}

fn parse_endpoint(field: &str, value: &str) -> ProviderResult<Url> {
    Url::parse(value).map_err(|e| {
        ProviderError::configuration(format!("invalid {} '{}': {}", field, value, e))
    })
}

fn default_url(value: &str) -> Url {
    // Constants above are valid absolute URLs.
    Url::parse(value).unwrap_or_else(|_| unreachable!("invalid built-in URL {}", value))
}
