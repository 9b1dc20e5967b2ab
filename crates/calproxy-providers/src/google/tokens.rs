//! OAuth token persistence and the per-invocation refresh cycle.
//!
//! The canonical token lives in the secret store. Each invocation loads it,
//! refreshes it against the token endpoint whether or not it looks expired,
//! writes the result back exactly once and hands out a [`Transport`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::ProviderError;
use crate::secret::{SecretError, SecretStore};

use super::config::OAuthClientConfig;
use super::oauth::TokenRefresher;

/// Token type used when none is stored.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// The persisted OAuth token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    /// The access token for API requests.
    pub access_token: String,
    /// Usually `Bearer`; empty when the stored blob omits it.
    #[serde(default)]
    pub token_type: String,
    /// Required to obtain new access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When the access token expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expiry", &self.expiry)
            .finish()
    }
}

impl StoredToken {
    /// Creates a token with a refresh token and no expiry.
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: DEFAULT_TOKEN_TYPE.to_string(),
            refresh_token: Some(refresh_token.into()),
            expiry: None,
        }
    }

    /// Parses the stored JSON blob.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes to the stored JSON blob.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Returns the refresh token if one is set and non-empty.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Returns the token type, falling back to `Bearer`.
    pub fn token_type(&self) -> &str {
        if self.token_type.is_empty() {
            DEFAULT_TOKEN_TYPE
        } else {
            &self.token_type
        }
    }

    /// Builds the successor of this token from a token endpoint response.
    ///
    /// Fields the endpoint omits are carried over; `expires_in` becomes an
    /// absolute expiry relative to `now`.
    pub fn refreshed(
        &self,
        access_token: String,
        token_type: Option<String>,
        refresh_token: Option<String>,
        expires_in: Option<i64>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token,
            token_type: token_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| self.token_type().to_string()),
            refresh_token: refresh_token
                .filter(|t| !t.is_empty())
                .or_else(|| self.refresh_token.clone()),
            expiry: expires_in.map(|secs| now + Duration::seconds(secs)),
        }
    }

    /// The authenticated transport for this token.
    pub fn transport(&self) -> Transport {
        Transport::new(self.token_type(), self.access_token.clone())
    }
}

/// An authenticated bearer credential for calendar API calls.
#[derive(Clone, PartialEq, Eq)]
pub struct Transport {
    token_type: String,
    access_token: String,
}

impl Transport {
    /// Creates a transport.
    pub fn new(token_type: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            token_type: token_type.into(),
            access_token: access_token.into(),
        }
    }

    /// A `Bearer` transport.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self::new(DEFAULT_TOKEN_TYPE, access_token)
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    /// The raw access token.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("token_type", &self.token_type)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Failures of the load, refresh and persist cycle.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token secret could not be read.
    #[error("unable to read token secret {name}")]
    Load {
        name: String,
        #[source]
        source: SecretError,
    },

    /// The token secret is not valid token JSON.
    #[error("unable to parse stored token")]
    Parse(#[source] serde_json::Error),

    /// The token endpoint refused or could not be reached.
    #[error("unable to refresh token")]
    Refresh(#[source] ProviderError),

    /// The refreshed token could not be serialized.
    #[error("unable to encode refreshed token")]
    Encode(#[source] serde_json::Error),

    /// The refreshed token could not be written back.
    #[error("unable to save refreshed token to {name}")]
    Persist {
        name: String,
        #[source]
        source: SecretError,
    },
}

/// Turns the stored token into a fresh [`Transport`].
pub struct TokenManager {
    secrets: Arc<dyn SecretStore>,
    refresher: Arc<dyn TokenRefresher>,
    token_param: String,
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("token_param", &self.token_param)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Creates a manager for the token stored under `token_param`.
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        refresher: Arc<dyn TokenRefresher>,
        token_param: impl Into<String>,
    ) -> Self {
        Self {
            secrets,
            refresher,
            token_param: token_param.into(),
        }
    }

    /// Name of the token secret.
    pub fn token_param(&self) -> &str {
        &self.token_param
    }

    /// Loads, refreshes and persists the token, then returns its transport.
    ///
    /// The refresh happens on every call and the result is written back
    /// exactly once, even when the endpoint returns an unchanged token.
    pub async fn obtain_authenticated_transport(
        &self,
        config: &OAuthClientConfig,
    ) -> Result<Transport, TokenError> {
        let blob = self
            .secrets
            .get(&self.token_param)
            .await
            .map_err(|source| TokenError::Load {
                name: self.token_param.clone(),
                source,
            })?;
        let stored = StoredToken::from_json(&blob).map_err(TokenError::Parse)?;

        if stored.refresh_token().is_none() {
            return Err(TokenError::Refresh(ProviderError::configuration(
                "stored token has no refresh_token",
            )));
        }

        let refreshed = self
            .refresher
            .refresh(config, &stored)
            .await
            .map_err(TokenError::Refresh)?;
        debug!("token refreshed, expiry {:?}", refreshed.expiry);

        let encoded = refreshed.to_json().map_err(TokenError::Encode)?;
        self.secrets
            .put(&self.token_param, &encoded)
            .await
            .map_err(|source| TokenError::Persist {
                name: self.token_param.clone(),
                source,
            })?;
        info!("saved refreshed token to {}", self.token_param);

        Ok(refreshed.transport())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeZone;

    use crate::error::{ProviderErrorCode, ProviderResult};
    use crate::provider::BoxFuture;
    use crate::secret::MemorySecretStore;

    const TOKEN_PARAM: &str = "/calendar/token";

    /// Returns a canned token or error and counts calls.
    struct FakeRefresher {
        response: Option<StoredToken>,
        calls: AtomicUsize,
    }

    impl FakeRefresher {
        fn returning(token: StoredToken) -> Self {
            Self {
                response: Some(token),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                response: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TokenRefresher for FakeRefresher {
        fn refresh<'a>(
            &'a self,
            _config: &'a OAuthClientConfig,
            _token: &'a StoredToken,
        ) -> BoxFuture<'a, ProviderResult<StoredToken>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.response
                    .clone()
                    .ok_or_else(|| ProviderError::authentication("token refresh failed (400)"))
            })
        }
    }

    fn stored_json() -> String {
        StoredToken::new("old-access", "refresh-1").to_json().unwrap()
    }

    fn config() -> OAuthClientConfig {
        OAuthClientConfig::new("client", "secret")
    }

    #[tokio::test]
    async fn unchanged_token_is_still_persisted_once() {
        let token = StoredToken::new("old-access", "refresh-1");
        let secrets = Arc::new(MemorySecretStore::new().with_secret(TOKEN_PARAM, stored_json()));
        let refresher = Arc::new(FakeRefresher::returning(token.clone()));
        let manager = TokenManager::new(secrets.clone(), refresher.clone(), TOKEN_PARAM);

        let transport = manager.obtain_authenticated_transport(&config()).await.unwrap();

        assert_eq!(transport.authorization(), "Bearer old-access");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(secrets.reads(), 1);
        assert_eq!(secrets.writes(), 1);
        let saved = StoredToken::from_json(&secrets.peek(TOKEN_PARAM).unwrap()).unwrap();
        assert_eq!(saved, token);
    }

    #[tokio::test]
    async fn refreshed_token_replaces_stored_one() {
        let mut fresh = StoredToken::new("new-access", "refresh-1");
        fresh.expiry = Some(Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap());
        let secrets = Arc::new(MemorySecretStore::new().with_secret(TOKEN_PARAM, stored_json()));
        let manager = TokenManager::new(
            secrets.clone(),
            Arc::new(FakeRefresher::returning(fresh.clone())),
            TOKEN_PARAM,
        );

        let transport = manager.obtain_authenticated_transport(&config()).await.unwrap();

        assert_eq!(transport.access_token(), "new-access");
        let saved = StoredToken::from_json(&secrets.peek(TOKEN_PARAM).unwrap()).unwrap();
        assert_eq!(saved, fresh);
    }

    #[tokio::test]
    async fn missing_secret_is_load_error() {
        let secrets = Arc::new(MemorySecretStore::new());
        let refresher = Arc::new(FakeRefresher::failing());
        let manager = TokenManager::new(secrets.clone(), refresher.clone(), TOKEN_PARAM);

        let err = manager.obtain_authenticated_transport(&config()).await.unwrap_err();
        assert!(matches!(err, TokenError::Load { .. }));
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(secrets.writes(), 0);
    }

    #[tokio::test]
    async fn malformed_blob_is_parse_error() {
        let secrets = Arc::new(MemorySecretStore::new().with_secret(TOKEN_PARAM, "{not json"));
        let manager = TokenManager::new(secrets, Arc::new(FakeRefresher::failing()), TOKEN_PARAM);

        let err = manager.obtain_authenticated_transport(&config()).await.unwrap_err();
        assert!(matches!(err, TokenError::Parse(_)));
    }

    #[tokio::test]
    async fn missing_refresh_token_is_configuration_error() {
        let secrets = Arc::new(
            MemorySecretStore::new().with_secret(TOKEN_PARAM, r#"{"access_token":"a"}"#),
        );
        let refresher = Arc::new(FakeRefresher::failing());
        let manager = TokenManager::new(secrets, refresher.clone(), TOKEN_PARAM);

        let err = manager.obtain_authenticated_transport(&config()).await.unwrap_err();
        match err {
            TokenError::Refresh(e) => assert_eq!(e.code(), ProviderErrorCode::Misconfigured),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refresh_failure_skips_persist() {
        let secrets = Arc::new(MemorySecretStore::new().with_secret(TOKEN_PARAM, stored_json()));
        let manager = TokenManager::new(
            secrets.clone(),
            Arc::new(FakeRefresher::failing()),
            TOKEN_PARAM,
        );

        let err = manager.obtain_authenticated_transport(&config()).await.unwrap_err();
        assert!(matches!(err, TokenError::Refresh(_)));
        assert_eq!(secrets.writes(), 0);
    }

    #[tokio::test]
    async fn persist_failure_is_reported() {
        let secrets = Arc::new(MemorySecretStore::new().with_secret(TOKEN_PARAM, stored_json()));
        let manager = TokenManager::new(
            Arc::new(ReadOnly(secrets)),
            Arc::new(FakeRefresher::returning(StoredToken::new("a", "r"))),
            TOKEN_PARAM,
        );

        let err = manager.obtain_authenticated_transport(&config()).await.unwrap_err();
        assert!(matches!(err, TokenError::Persist { .. }));
    }

    /// Delegates reads and rejects writes.
    struct ReadOnly(Arc<MemorySecretStore>);

    impl SecretStore for ReadOnly {
        fn get<'a>(&'a self, name: &'a str) -> BoxFuture<'a, crate::secret::SecretResult<String>> {
            self.0.get(name)
        }

        fn put<'a>(
            &'a self,
            name: &'a str,
            _value: &'a str,
        ) -> BoxFuture<'a, crate::secret::SecretResult<()>> {
            Box::pin(async move { Err(SecretError::access_denied(name, "read-only")) })
        }
    }

    #[test]
    fn parse_go_style_token() {
        let json = r#"{
            "access_token": "ya29.a0",
            "token_type": "Bearer",
            "refresh_token": "1//0g",
            "expiry": "2024-03-05T10:00:00.123456+01:00"
        }"#;

        let token = StoredToken::from_json(json).unwrap();
        assert_eq!(token.refresh_token(), Some("1//0g"));
        assert_eq!(
            token.expiry.unwrap().timestamp(),
            Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap().timestamp()
        );
    }

    #[test]
    fn refreshed_carries_over_missing_fields() {
        let mut old = StoredToken::new("old", "refresh-1");
        old.token_type = String::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap();

        let new = old.refreshed("new".to_string(), None, None, Some(3600), now);

        assert_eq!(new.access_token, "new");
        assert_eq!(new.token_type, "Bearer");
        assert_eq!(new.refresh_token(), Some("refresh-1"));
        assert_eq!(new.expiry, Some(now + Duration::hours(1)));
    }

    #[test]
    fn refreshed_takes_rotated_refresh_token() {
        let old = StoredToken::new("old", "refresh-1");
        let new = old.refreshed(
            "new".to_string(),
            Some("bearer".to_string()),
            Some("refresh-2".to_string()),
            None,
            Utc::now(),
        );
        assert_eq!(new.refresh_token(), Some("refresh-2"));
        assert_eq!(new.transport().authorization(), "bearer new");
        assert_eq!(new.expiry, None);
    }

    #[test]
    fn debug_output_is_redacted() {
        let token = StoredToken::new("secret-access", "secret-refresh");
        let rendered = format!("{:?} {:?}", token, token.transport());
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
    }
}
