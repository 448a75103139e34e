use super::Provider;
use crate::{Result, SecretGateError};
use async_trait::async_trait;
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tokio::task::spawn_blocking;
use url::Url;

/// Configuration for the keyring provider.
///
/// The only option is the service namespace under which entries are
/// stored, taken from the URI host. It defaults to `secretgate`, which
/// keeps entries from different projects on the same machine separated
/// by explicit choice rather than by accident.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyringConfig {
    /// Service namespace for keychain entries.
    pub service: Option<String>,
}

impl TryFrom<&Url> for KeyringConfig {
    type Error = SecretGateError;

    /// Creates a `KeyringConfig` from a URL.
    ///
    /// Parses URLs in the following formats:
    /// - `keyring://` - Default service namespace
    /// - `keyring://myservice` - Custom service namespace
    fn try_from(url: &Url) -> std::result::Result<Self, Self::Error> {
        if url.scheme() != "keyring" {
            return Err(SecretGateError::ProviderOperationFailed(format!(
                "Invalid scheme '{}' for keyring provider",
                url.scheme()
            )));
        }

        let mut config = Self::default();
        if let Some(host) = url.host_str() {
            config.service = Some(host.to_string());
        }

        Ok(config)
    }
}

/// Provider for storing secrets in the system keychain.
///
/// The `KeyringProvider` uses the operating system's native secure
/// credential storage mechanism:
/// - macOS: Keychain
/// - Windows: Credential Manager
/// - Linux: Secret Service API (via libsecret)
///
/// Secrets are stored with a hierarchical key structure:
/// `{service}/{key}`, with the current system username as the account
/// identifier.
///
/// # Asynchronous only
///
/// Keychain access goes through OS IPC and may raise an unlock prompt, so
/// every call is routed through `spawn_blocking`. The provider does not
/// advertise the synchronous fetch capability; cache misses on the
/// synchronous path stay misses instead of blocking on a prompt.
pub struct KeyringProvider {
    config: KeyringConfig,
    account: OnceCell<String>,
}

crate::register_provider! {
    struct: KeyringProvider,
    config: KeyringConfig,
    name: "keyring",
    description: "Operating system keychain",
    schemes: ["keyring"],
    examples: ["keyring://", "keyring://myservice"],
}

const DEFAULT_SERVICE: &str = "secretgate";

impl KeyringProvider {
    /// Creates a new `KeyringProvider` with the given configuration.
    pub fn new(config: KeyringConfig) -> Self {
        Self {
            config,
            account: OnceCell::new(),
        }
    }

    fn service(&self) -> &str {
        self.config.service.as_deref().unwrap_or(DEFAULT_SERVICE)
    }

    /// Resolves the account identifier once and caches it for the lifetime
    /// of the provider.
    async fn account(&self) -> &str {
        self.account
            .get_or_init(|| async { whoami::username() })
            .await
    }

    /// Builds the keychain entry for a key, namespaced under the service.
    fn entry_for(service: &str, account: &str, key: &str) -> std::result::Result<Entry, keyring::Error> {
        Entry::new(&format!("{}/{}", service, key), account)
    }
}

#[async_trait]
impl Provider for KeyringProvider {
    fn name(&self) -> &'static str {
        Self::PROVIDER_NAME
    }

    /// Retrieves a secret from the system keychain.
    ///
    /// The secret is looked up as `{service}/{key}` under the current
    /// system username.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(String))` - The secret value if found
    /// * `Ok(None)` - If the entry doesn't exist
    /// * `Err` - If there was an error accessing the keychain
    async fn fetch(&self, key: &str) -> Result<Option<String>> {
        let service = self.service().to_string();
        let account = self.account().await.to_string();
        let key = key.to_string();

        spawn_blocking(move || {
            let entry = Self::entry_for(&service, &account, &key)?;
            match entry.get_password() {
                Ok(password) => Ok(Some(password)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(|e| {
            SecretGateError::ProviderOperationFailed(format!("keychain task failed: {e}"))
        })?
    }

    /// Stores a secret in the system keychain.
    ///
    /// If an entry already exists with the same key, it is overwritten.
    async fn push(&self, key: &str, value: &str) -> Result<()> {
        let service = self.service().to_string();
        let account = self.account().await.to_string();
        let key = key.to_string();
        let value = value.to_string();

        spawn_blocking(move || {
            let entry = Self::entry_for(&service, &account, &key)?;
            entry.set_password(&value)?;
            Ok(())
        })
        .await
        .map_err(|e| {
            SecretGateError::ProviderOperationFailed(format!("keychain task failed: {e}"))
        })?
    }

    /// Probes the keychain so a misconfigured backend surfaces at setup
    /// time rather than on the first resolution.
    ///
    /// A probe entry is looked up; `NoEntry` counts as success because it
    /// proves the keychain answered.
    async fn setup(&self) -> Result<bool> {
        let service = self.service().to_string();
        let account = self.account().await.to_string();

        spawn_blocking(move || {
            let entry = Self::entry_for(&service, &account, "__secretgate_probe__")?;
            match entry.get_password() {
                Ok(_) | Err(keyring::Error::NoEntry) => Ok(true),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(|e| {
            SecretGateError::ProviderOperationFailed(format!("keychain task failed: {e}"))
        })?
    }
}
