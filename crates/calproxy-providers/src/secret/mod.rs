//! Named secret storage.
//!
//! The proxy keeps three values in a secret store: the serialized OAuth
//! token, the OAuth client credentials, and the authorizer's expected
//! bearer token. Values are opaque text; encryption at rest is the
//! backend's business. No backend retries.
//!
//! - [`MemorySecretStore`] - in-process map, for tests and local runs
//! - [`FileSecretStore`] - one `0600` file per secret under a root directory
//! - [`PassSecretStore`] - the GPG-backed `pass` password manager

mod file;
mod memory;
mod pass;

use std::io;

use thiserror::Error;

use crate::provider::BoxFuture;

pub use file::FileSecretStore;
pub use memory::MemorySecretStore;
pub use pass::PassSecretStore;

/// Errors returned by a [`SecretStore`].
#[derive(Debug, Error)]
pub enum SecretError {
    /// No secret is stored under this name.
    #[error("secret {name} not found")]
    NotFound { name: String },

    /// The backend refused access to the secret.
    #[error("access denied to secret {name}: {message}")]
    AccessDenied { name: String, message: String },

    /// The backend could not be reached or failed mid-operation.
    #[error("I/O failure on secret {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl SecretError {
    /// Creates a not found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Creates an access denied error.
    pub fn access_denied(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AccessDenied {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a transient I/O error.
    pub fn io(name: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            name: name.into(),
            source,
        }
    }

    /// Returns the secret name this error refers to.
    pub fn name(&self) -> &str {
        match self {
            Self::NotFound { name } | Self::AccessDenied { name, .. } | Self::Io { name, .. } => {
                name
            }
        }
    }
}

/// Result type for secret store operations.
pub type SecretResult<T> = Result<T, SecretError>;

/// Drops one trailing newline, the way `echo` and `pass insert` leave it.
pub(crate) fn strip_trailing_newline(mut value: String) -> String {
    if value.ends_with('\n') {
        value.pop();
    }
    value
}

/// A key-value store for named secrets.
pub trait SecretStore: Send + Sync {
    /// Reads the value stored under `name`.
    fn get<'a>(&'a self, name: &'a str) -> BoxFuture<'a, SecretResult<String>>;

    /// Stores `value` under `name`, overwriting any previous value.
    fn put<'a>(&'a self, name: &'a str, value: &'a str) -> BoxFuture<'a, SecretResult<()>>;
}
