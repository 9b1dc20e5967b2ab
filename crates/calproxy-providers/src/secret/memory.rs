//! In-memory secret store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{SecretError, SecretResult, SecretStore};
use crate::provider::BoxFuture;

/// A secret store backed by a map.
///
/// Counts reads and writes so callers can assert on access patterns, and
/// can be told to deny access to individual names.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    values: Mutex<HashMap<String, String>>,
    denied: Mutex<HashSet<String>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemorySecretStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: seed a value without counting it as a write.
    pub fn with_secret(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.lock().insert(name.into(), value.into());
        self
    }

    /// Makes every subsequent access to `name` fail with access denied.
    pub fn deny(&self, name: impl Into<String>) {
        self.denied.lock().insert(name.into());
    }

    /// Returns the current value without counting a read.
    pub fn peek(&self, name: &str) -> Option<String> {
        self.values.lock().get(name).cloned()
    }

    /// Number of `get` calls so far, successful or not.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `put` calls so far, successful or not.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_access(&self, name: &str) -> SecretResult<()> {
        if self.denied.lock().contains(name) {
            return Err(SecretError::access_denied(name, "denied by store policy"));
        }
        Ok(())
    }
}

impl SecretStore for MemorySecretStore {
    fn get<'a>(&'a self, name: &'a str) -> BoxFuture<'a, SecretResult<String>> {
        Box::pin(async move {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.check_access(name)?;
            self.values
                .lock()
                .get(name)
                .cloned()
                .ok_or_else(|| SecretError::not_found(name))
        })
    }

    fn put<'a>(&'a self, name: &'a str, value: &'a str) -> BoxFuture<'a, SecretResult<()>> {
        Box::pin(async move {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.check_access(name)?;
            self.values.lock().insert(name.to_string(), value.to_string());
            Ok(())
        })
    }
}
