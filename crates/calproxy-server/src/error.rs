//! Server error types.

use std::error::Error as StdError;
use std::io;

use calproxy_core::{DateParseError, TracingError};
use calproxy_providers::ProviderError;
use thiserror::Error;

/// Result type for server startup and lifecycle operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that stop the server from starting or running.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error (bind, accept, etc.).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Logging could not be initialized.
    #[error("Tracing error: {0}")]
    Tracing(#[from] TracingError),

    /// An upstream client could not be built.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A failed request, tagged with the stage that failed.
///
/// Only [`PipelineError::InputValidation`] is the caller's fault; every
/// other variant is reported as an empty 500.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or malformed request parameters.
    #[error("{message}")]
    InputValidation {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Secrets, OAuth configuration or the token cycle failed.
    #[error("{message}")]
    CredentialFailure {
        message: String,
        #[source]
        source: BoxError,
    },

    /// Calendar resolution or event listing failed.
    #[error("{message}")]
    ProviderFailure {
        message: String,
        #[source]
        source: ProviderError,
    },

    /// An event start could not be parsed.
    #[error("{message}")]
    FormatFailure {
        message: String,
        #[source]
        source: DateParseError,
    },

    /// The response body could not be encoded.
    #[error("{message}")]
    SerializationFailure {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PipelineError {
    /// Creates an input validation error without an underlying cause.
    pub fn input(message: impl Into<String>) -> Self {
        Self::InputValidation {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an input validation error wrapping a parse failure.
    pub fn input_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::InputValidation {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a credential failure.
    pub fn credential<E>(message: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::CredentialFailure {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Creates a provider failure.
    pub fn provider(message: impl Into<String>, source: ProviderError) -> Self {
        Self::ProviderFailure {
            message: message.into(),
            source,
        }
    }

    /// Creates a format failure.
    pub fn format(message: impl Into<String>, source: DateParseError) -> Self {
        Self::FormatFailure {
            message: message.into(),
            source,
        }
    }

    /// Creates a serialization failure.
    pub fn serialization(message: impl Into<String>, source: serde_json::Error) -> Self {
        Self::SerializationFailure {
            message: message.into(),
            source,
        }
    }

    /// HTTP status reported to the caller.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InputValidation { .. } => 400,
            _ => 500,
        }
    }

    /// Short name of the failed stage, for logs.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InputValidation { .. } => "validate_input",
            Self::CredentialFailure { .. } => "credentials",
            Self::ProviderFailure { .. } => "calendar",
            Self::FormatFailure { .. } => "format",
            Self::SerializationFailure { .. } => "serialize",
        }
    }

    /// Renders the message followed by every source in the chain.
    pub fn report(&self) -> String {
        let mut out = self.to_string();
        let mut source = self.source();
        while let Some(err) = source {
            out.push_str(": ");
            out.push_str(&err.to_string());
            source = err.source();
        }
        out
    }
}
