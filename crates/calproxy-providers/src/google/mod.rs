//! Google Calendar access for the proxy.
//!
//! - [`OAuthClientConfig`] is parsed from the Google Cloud Console
//!   credentials JSON kept in the secret store
//! - [`TokenManager`] loads the stored token, refreshes it through a
//!   [`TokenRefresher`] (normally [`OAuthClient`]) and writes it back
//! - [`GoogleConnector`] turns the resulting [`Transport`] into a
//!   [`GoogleCalendarClient`]
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use calproxy_providers::google::{GoogleConnector, OAuthClient, OAuthClientConfig, TokenManager};
//! use calproxy_providers::{CalendarConnector, FileSecretStore, resolve_calendar_id};
//!
//! let secrets = Arc::new(FileSecretStore::new("/var/lib/calproxy"));
//! let config = OAuthClientConfig::from_json(&secrets.get("google/credentials").await?)?;
//! let tokens = TokenManager::new(
//!     secrets,
//!     Arc::new(OAuthClient::new(Duration::from_secs(30))?),
//!     "google/token",
//! );
//!
//! let transport = tokens.obtain_authenticated_transport(&config).await?;
//! let api = GoogleConnector::new(Duration::from_secs(30))?.connect(transport)?;
//! let calendar_id = resolve_calendar_id(api.as_ref(), "Family").await?;
//! ```

mod client;
mod config;
mod oauth;
mod tokens;

pub use client::{CALENDAR_API_BASE, GoogleCalendarClient, GoogleConnector};
pub use config::{
    CALENDAR_READONLY_SCOPE, GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL, OAuthClientConfig,
};
pub use oauth::{OAuthClient, TokenRefresher};
pub use tokens::{DEFAULT_TOKEN_TYPE, StoredToken, TokenError, TokenManager, Transport};
