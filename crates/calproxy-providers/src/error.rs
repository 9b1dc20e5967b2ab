//! Errors from the token endpoint, the calendar API and name resolution.
//!
//! Secret store failures keep their own [`crate::SecretError`] type.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// What went wrong, independent of the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorCode {
    /// The token endpoint or API rejected our credentials (401).
    Unauthenticated,
    /// Credentials are fine but the resource is off limits (403).
    Forbidden,
    /// The remote end could not be reached, or I/O failed midway.
    Unreachable,
    /// 429.
    Throttled,
    /// Any other non-success status.
    Upstream,
    /// A body that does not decode into what we asked for.
    MalformedResponse,
    /// Nothing matched, e.g. a calendar name absent from every page.
    NotFound,
    /// The provider refused a request we built (400).
    Rejected,
    /// Local setup is unusable: bad credentials JSON, missing refresh token.
    Misconfigured,
}

impl ProviderErrorCode {
    /// Starts an error of this category.
    pub fn with_message(self, message: impl Into<String>) -> ProviderError {
        ProviderError {
            code: self,
            message: message.into(),
            provider: None,
            source: None,
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::Unreachable => "unreachable",
            Self::Throttled => "throttled",
            Self::Upstream => "upstream",
            Self::MalformedResponse => "malformed_response",
            Self::NotFound => "not_found",
            Self::Rejected => "rejected",
            Self::Misconfigured => "misconfigured",
        };
        f.write_str(label)
    }
}

/// A categorized failure with an optional upstream cause.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// Which backend failed, e.g. "google".
    provider: Option<String>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        code.with_message(message)
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        ProviderErrorCode::Unauthenticated.with_message(msg)
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        ProviderErrorCode::Forbidden.with_message(msg)
    }

    pub fn network(msg: impl Into<String>) -> Self {
        ProviderErrorCode::Unreachable.with_message(msg)
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        ProviderErrorCode::Throttled.with_message(msg)
    }

    pub fn server(msg: impl Into<String>) -> Self {
        ProviderErrorCode::Upstream.with_message(msg)
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        ProviderErrorCode::MalformedResponse.with_message(msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ProviderErrorCode::NotFound.with_message(msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        ProviderErrorCode::Rejected.with_message(msg)
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        ProviderErrorCode::Misconfigured.with_message(msg)
    }

    /// Tags the failing backend.
    pub fn with_provider(self, name: impl Into<String>) -> Self {
        Self {
            provider: Some(name.into()),
            ..self
        }
    }

    /// Attaches the underlying cause.
    pub fn with_source(self, cause: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            source: Some(Box::new(cause)),
            ..self
        }
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    /// The human-readable part, without category or provider.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Backend tag set by [`ProviderError::with_provider`].
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// True when a lookup came back empty.
    pub fn is_not_found(&self) -> bool {
        self.code == ProviderErrorCode::NotFound
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "{provider} ({}): ", self.code)?;
        } else {
            write!(f, "{}: ", self.code)?;
        }
        f.write_str(&self.message)
    }
}

/// Result alias for provider operations.
pub type ProviderResult<T, E = ProviderError> = Result<T, E>;
