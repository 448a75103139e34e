//! In-memory provider for testing and ephemeral secrets.

use super::Provider;
use crate::{Result, SecretGateError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// Configuration for the in-memory provider.
///
/// The provider holds everything in process memory, so there is nothing to
/// configure beyond the scheme itself.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfig {}

impl TryFrom<&Url> for MemoryConfig {
    type Error = SecretGateError;

    fn try_from(url: &Url) -> std::result::Result<Self, Self::Error> {
        if url.scheme() != "memory" {
            return Err(SecretGateError::ProviderOperationFailed(format!(
                "Invalid scheme '{}' for memory provider",
                url.scheme()
            )));
        }

        Ok(Self::default())
    }
}

/// An in-memory provider backed by a shared map.
///
/// Secrets live only for the lifetime of the process. Clones share the same
/// underlying map, so a provider seeded in a test setup and the instance
/// handed to the resolution layer observe the same data.
///
/// The map is guarded by a non-async `RwLock`, which keeps the synchronous
/// fetch path runtime-free.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    data: Arc<RwLock<HashMap<String, String>>>,
}

crate::register_provider! {
    struct: MemoryProvider,
    config: MemoryConfig,
    name: "memory",
    description: "In-process map for tests and ephemeral secrets",
    schemes: ["memory"],
    examples: ["memory://"],
}

impl MemoryProvider {
    pub fn new(_config: MemoryConfig) -> Self {
        Self::default()
    }

    /// Creates a provider pre-populated with the given entries.
    ///
    /// # Example
    ///
    /// ```ignore
    /// # use secretgate::provider::memory::MemoryProvider;
    /// let provider = MemoryProvider::with_secrets([("API_KEY", "secret123")]);
    /// ```
    pub fn with_secrets<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let data = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }
}

#[async_trait]
impl Provider for MemoryProvider {
    fn name(&self) -> &'static str {
        Self::PROVIDER_NAME
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>> {
        self.fetch_sync(key)
    }

    /// Always `true`: the map lock is never held across an await point.
    fn supports_sync(&self) -> bool {
        true
    }

    fn fetch_sync(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.read().get(key).cloned())
    }

    async fn push(&self, key: &str, value: &str) -> Result<()> {
        self.data.write().insert(key.to_string(), value.to_string());

        tracing::debug!(
            secret.key = key,
            secret.operation = "push",
            "Secret stored in memory"
        );

        Ok(())
    }
}
