//! OAuth 2.0 refresh grant against the token endpoint.

use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::BoxFuture;

use super::config::OAuthClientConfig;
use super::tokens::StoredToken;

/// Exchanges a stored token for a fresh one.
pub trait TokenRefresher: Send + Sync {
    /// Runs the `refresh_token` grant and returns the successor token.
    fn refresh<'a>(
        &'a self,
        config: &'a OAuthClientConfig,
        token: &'a StoredToken,
    ) -> BoxFuture<'a, ProviderResult<StoredToken>>;
}

/// HTTP implementation of [`TokenRefresher`].
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http_client: reqwest::Client,
}

impl OAuthClient {
    /// Creates a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;
        Ok(Self { http_client })
    }

    /// Posts the refresh grant and merges the response into `token`.
    pub async fn refresh_token(
        &self,
        config: &OAuthClientConfig,
        token: &StoredToken,
    ) -> ProviderResult<StoredToken> {
        let refresh_token = token
            .refresh_token()
            .ok_or_else(|| ProviderError::configuration("stored token has no refresh_token"))?;

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ];

        debug!("refreshing access token at {}", config.token_endpoint);
        let response = self
            .http_client
            .post(config.token_endpoint.clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| ProviderError::network(format!("token refresh request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(ProviderError::authentication(format!(
                "token refresh failed ({}): {}",
                status, body
            )));
        }

        let token_response: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid token response: {}", e))
        })?;

        info!("successfully refreshed access token");
        Ok(token.refreshed(
            token_response.access_token,
            token_response.token_type,
            token_response.refresh_token,
            token_response.expires_in,
            Utc::now(),
        ))
    }
}

impl TokenRefresher for OAuthClient {
    fn refresh<'a>(
        &'a self,
        config: &'a OAuthClientConfig,
        token: &'a StoredToken,
    ) -> BoxFuture<'a, ProviderResult<StoredToken>> {
        Box::pin(self.refresh_token(config, token))
    }
}

/// Response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
}
