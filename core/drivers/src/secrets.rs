//! Secret and config lookup capability.
//!
//! The store behind a [`SecretResolver`] lives outside this crate (a cluster
//! secret API, a vault, a mounted volume). Drivers only ever see values that
//! went through this trait.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use stevedore_common::{Error, Result};

/// Lookup of secret and config values by `(name, key)`.
///
/// Implementations must be safe for concurrent use; the factory issues
/// lookups from several in-flight resolutions at once. Any retry or backoff
/// policy belongs to the implementation.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    /// Resolve the value stored under `key` in secret `name`.
    ///
    /// # Errors
    /// - `SecretNotFound` if the secret or key does not exist
    /// - `Transport` if the store could not be queried
    /// - `Cancelled` if `cancel` fired while waiting
    async fn get_secret(&self, cancel: &CancellationToken, name: &str, key: &str)
        -> Result<String>;

    /// Resolve a non-secret config value stored under `key` in config `name`.
    async fn get_config_value(
        &self,
        cancel: &CancellationToken,
        name: &str,
        key: &str,
    ) -> Result<String>;
}

/// Fixed in-memory secret store.
///
/// Useful for tests and for embedding callers that already hold their
/// credentials.
#[derive(Default)]
pub struct StaticSecretResolver {
    secrets: HashMap<(String, String), String>,
    config: HashMap<(String, String), String>,
}

impl StaticSecretResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret value.
    pub fn with_secret(
        mut self,
        name: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.secrets.insert((name.into(), key.into()), value.into());
        self
    }

    /// Add a config value.
    pub fn with_config_value(
        mut self,
        name: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.config.insert((name.into(), key.into()), value.into());
        self
    }

    fn lookup(
        map: &HashMap<(String, String), String>,
        cancel: &CancellationToken,
        name: &str,
        key: &str,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        map.get(&(name.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| Error::SecretNotFound {
                name: name.to_string(),
                key: key.to_string(),
            })
    }
}

#[async_trait]
impl SecretResolver for StaticSecretResolver {
    async fn get_secret(
        &self,
        cancel: &CancellationToken,
        name: &str,
        key: &str,
    ) -> Result<String> {
        Self::lookup(&self.secrets, cancel, name, key)
    }

    async fn get_config_value(
        &self,
        cancel: &CancellationToken,
        name: &str,
        key: &str,
    ) -> Result<String> {
        Self::lookup(&self.config, cancel, name, key)
    }
}
