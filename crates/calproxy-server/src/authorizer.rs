//! Shared-secret authorization gate.
//!
//! Compares the request's `authorization` header with a value held in the
//! secret store. The expected value is read on every call so rotating the
//! secret takes effect without a restart.

use std::sync::Arc;

use calproxy_providers::{SecretError, SecretStore};
use tracing::{info, warn};

use crate::gateway::GatewayRequest;

/// Header carrying the caller's token.
pub const AUTHORIZATION_HEADER: &str = "authorization";
/// Header carrying the caller's address as seen by the front proxy.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationDecision {
    /// The header matched.
    Authorized,
    /// The header was missing or did not match.
    Denied,
}

impl AuthorizationDecision {
    /// Returns true when the request may proceed.
    pub fn is_authorized(self) -> bool {
        self == Self::Authorized
    }
}

/// Checks requests against the stored token.
pub struct Authorizer {
    secrets: Arc<dyn SecretStore>,
    param: String,
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer")
            .field("param", &self.param)
            .finish_non_exhaustive()
    }
}

impl Authorizer {
    /// Creates an authorizer reading the expected value from `param`.
    pub fn new(secrets: Arc<dyn SecretStore>, param: impl Into<String>) -> Self {
        Self {
            secrets,
            param: param.into(),
        }
    }

    /// Decides whether the request may proceed.
    ///
    /// A missing header is denied even if the stored value is empty. A
    /// secret store failure is returned as an error; callers deny on it.
    pub async fn authorize(
        &self,
        request: &GatewayRequest,
    ) -> Result<AuthorizationDecision, SecretError> {
        let source = request.header(FORWARDED_FOR_HEADER).unwrap_or("unknown");

        let expected = match self.secrets.get(&self.param).await {
            Ok(value) => value,
            Err(e) => {
                warn!("failed to read authorization secret {}: {}", self.param, e);
                return Err(e);
            }
        };

        match request.header(AUTHORIZATION_HEADER) {
            Some(provided) if provided == expected => {
                info!("successful authorization for {}", source);
                Ok(AuthorizationDecision::Authorized)
            }
            _ => {
                info!("authorization failed for {}", source);
                Ok(AuthorizationDecision::Denied)
            }
        }
    }
}
