//! Secret store backed by the `pass` password manager.
//!
//! - `get` runs `pass show <name>` and returns stdout minus one trailing newline
//! - `put` runs `pass insert --multiline --force <name>` with the value on stdin
//!
//! Entries are GPG-encrypted by `pass` itself.

use std::io;
use std::process::{Output, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{SecretError, SecretResult, SecretStore, strip_trailing_newline};
use crate::provider::BoxFuture;

/// What `pass` prints on stderr for an unknown entry.
const NOT_IN_STORE: &str = "is not in the password store";

/// A [`SecretStore`] that shells out to `pass`.
#[derive(Debug, Clone)]
pub struct PassSecretStore {
    program: String,
}

impl Default for PassSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PassSecretStore {
    /// Uses the `pass` binary found on `PATH`.
    pub fn new() -> Self {
        Self {
            program: "pass".to_string(),
        }
    }

    /// Uses a different executable with the same command-line interface.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    async fn show(&self, name: &str) -> SecretResult<String> {
        let output = Command::new(&self.program)
            .arg("show")
            .arg(name)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error(&self.program, name, e))?;

        check_status(name, &output)?;
        debug!("read secret {} from pass", name);

        let value = String::from_utf8(output.stdout).map_err(|e| {
            SecretError::io(name, io::Error::new(io::ErrorKind::InvalidData, e))
        })?;
        Ok(strip_trailing_newline(value))
    }

    async fn insert(&self, name: &str, value: &str) -> SecretResult<()> {
        let mut child = Command::new(&self.program)
            .args(["insert", "--multiline", "--force", name])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&self.program, name, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(value.as_bytes())
                .await
                .map_err(|e| SecretError::io(name, e))?;
            // Dropping stdin closes the pipe so `pass` sees end of input.
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SecretError::io(name, e))?;
        check_status(name, &output)?;

        debug!("saved secret {} to pass", name);
        Ok(())
    }
}

impl SecretStore for PassSecretStore {
    fn get<'a>(&'a self, name: &'a str) -> BoxFuture<'a, SecretResult<String>> {
        Box::pin(self.show(name))
    }

    fn put<'a>(&'a self, name: &'a str, value: &'a str) -> BoxFuture<'a, SecretResult<()>> {
        Box::pin(self.insert(name, value))
    }
}

fn spawn_error(program: &str, name: &str, err: io::Error) -> SecretError {
    SecretError::io(
        name,
        io::Error::new(err.kind(), format!("failed to run `{}`: {}", program, err)),
    )
}

fn check_status(name: &str, output: &Output) -> SecretResult<()> {
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains(NOT_IN_STORE) {
        return Err(SecretError::not_found(name));
    }
    Err(SecretError::access_denied(
        name,
        format!("pass exited with {}: {}", output.status, stderr.trim()),
    ))
}
