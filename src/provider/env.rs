use super::Provider;
use crate::{Result, SecretGateError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

/// Configuration for the environment variables provider.
///
/// This struct represents the configuration for the read-only environment
/// variables provider. It contains no fields as the provider reads directly
/// from the process environment without additional configuration.
///
/// # Example
///
/// ```ignore
/// # use secretgate::provider::env::EnvConfig;
/// let config = EnvConfig::default();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvConfig {}

impl TryFrom<&Url> for EnvConfig {
    type Error = SecretGateError;

    /// Creates an `EnvConfig` from a URL.
    ///
    /// This method validates that the URL has the correct scheme ("env")
    /// and returns an `EnvConfig` instance. The environment provider
    /// doesn't require any additional configuration from the URL.
    ///
    /// # Example
    ///
    /// ```ignore
    /// # use url::Url;
    /// # use secretgate::provider::env::EnvConfig;
    /// let url = Url::parse("env://").unwrap();
    /// let config: EnvConfig = (&url).try_into().unwrap();
    /// ```
    fn try_from(url: &Url) -> std::result::Result<Self, Self::Error> {
        if url.scheme() != "env" {
            return Err(SecretGateError::ProviderOperationFailed(format!(
                "Invalid scheme '{}' for env provider",
                url.scheme()
            )));
        }

        Ok(Self::default())
    }
}

/// A read-only provider that reads secrets from environment variables.
///
/// The `EnvProvider` reads secrets directly from the process environment
/// variables. This provider is **read-only** and cannot persist values
/// across process boundaries. Attempts to push values will return an error.
///
/// # Read-only Nature
///
/// This provider is intentionally read-only because:
/// - Environment variables set at runtime only affect the current process
/// - Changes don't persist after the process exits
/// - Child processes inherit a copy of the parent's environment
///
/// To set environment variables, use your shell, process manager, or
/// container orchestration system.
///
/// # Synchronous capability
///
/// Reading the process environment never blocks, so this provider
/// advertises [`supports_sync`](Provider::supports_sync) and can serve
/// the synchronous resolution path.
pub struct EnvProvider {
    #[allow(dead_code)]
    config: EnvConfig,
}

crate::register_provider! {
    struct: EnvProvider,
    config: EnvConfig,
    name: "env",
    description: "Read-only environment variables",
    schemes: ["env"],
    examples: ["env://"],
}

impl EnvProvider {
    /// Creates a new `EnvProvider` with the given configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the provider (currently unused)
    ///
    /// # Example
    ///
    /// ```ignore
    /// # use secretgate::provider::env::{EnvProvider, EnvConfig};
    /// let config = EnvConfig::default();
    /// let provider = EnvProvider::new(config);
    /// ```
    pub fn new(config: EnvConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Provider for EnvProvider {
    fn name(&self) -> &'static str {
        Self::PROVIDER_NAME
    }

    /// Retrieves a secret value from environment variables.
    ///
    /// This method reads the value directly from the process environment
    /// using the provided key.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(String))` - If the environment variable exists
    /// * `Ok(None)` - If the environment variable doesn't exist
    /// * `Err` - Never returns an error in practice
    async fn fetch(&self, key: &str) -> Result<Option<String>> {
        self.fetch_sync(key)
    }

    /// Always `true`: the process environment can be read from any context.
    fn supports_sync(&self) -> bool {
        true
    }

    fn fetch_sync(&self, key: &str) -> Result<Option<String>> {
        Ok(env::var(key).ok())
    }

    /// Attempts to push a secret value (always fails).
    ///
    /// This method always returns an error because the environment provider
    /// is read-only. Environment variables set at runtime don't persist
    /// across process boundaries and would create confusing behavior.
    ///
    /// # Returns
    ///
    /// Always returns `Err(SecretGateError::PushNotSupported)`.
    async fn push(&self, _key: &str, _value: &str) -> Result<()> {
        // Environment variables set at runtime don't persist across processes
        Err(SecretGateError::PushNotSupported(
            Self::PROVIDER_NAME.to_string(),
        ))
    }

    /// Indicates whether this provider supports pushing values.
    ///
    /// Always returns `false` for the environment provider since it's
    /// a read-only provider. This allows the CLI and other consumers
    /// to check capabilities before attempting operations.
    fn allows_push(&self) -> bool {
        false
    }
}
