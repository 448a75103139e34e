//! Core secret resolution and caching

use crate::config::Settings;
use crate::envfile;
use crate::error::{Result, SecretGateError};
use crate::normalize;
use crate::provider::{PROVIDER_CONCURRENCY, Provider, PushReport};
use crate::value::SecretString;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::convert::TryFrom;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Semaphore;

/// Keys carrying this prefix are plain configuration. They are served from
/// the merged file state only and are never sent to a provider, so missing
/// public keys resolve to the empty string instead of triggering a fetch.
pub const PUBLIC_PREFIX: &str = "PUBLIC_";

/// Merged file state, partitioned by [`PUBLIC_PREFIX`].
#[derive(Default)]
struct CacheState {
    private: HashMap<String, String>,
    public: HashMap<String, String>,
}

struct Inner {
    settings: Settings,
    provider: RwLock<Arc<dyn Provider>>,
    cache: RwLock<CacheState>,
    init: OnceCell<()>,
    preloaded: AtomicBool,
}

/// The main entry point for the secretgate library
///
/// `Secrets` merges the file sources lazily on first touch, caches resolved
/// values for the lifetime of the instance, and consults the active
/// provider for keys the files do not carry. Cloning is cheap and every
/// clone shares the same cache and provider.
///
/// # Example
///
/// ```no_run
/// use secretgate::Secrets;
///
/// # async fn demo() -> secretgate::Result<()> {
/// let secrets = Secrets::from_env()?;
/// let token = secrets.get("API_TOKEN").required().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Secrets {
    inner: Arc<Inner>,
}

impl Secrets {
    /// Creates a `Secrets` instance from the given settings.
    ///
    /// The provider is built from the settings' provider URI.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider URI names an unknown backend or
    /// fails to parse. File sources are not touched here; they load on
    /// first access.
    pub fn new(settings: Settings) -> Result<Self> {
        let provider = Box::<dyn Provider>::try_from(settings.provider.as_str())?;
        Ok(Self::with_provider(settings, provider))
    }

    /// Creates a `Secrets` instance configured from `SECRETGATE_*`
    /// environment variables and the global defaults file.
    pub fn from_env() -> Result<Self> {
        Self::new(Settings::from_env())
    }

    /// Creates a `Secrets` instance around an already-built provider.
    ///
    /// The settings' provider URI is ignored in favor of the given
    /// instance. This is the injection point for tests.
    pub fn with_provider(settings: Settings, provider: Box<dyn Provider>) -> Self {
        Secrets {
            inner: Arc::new(Inner {
                settings,
                provider: RwLock::new(Arc::from(provider)),
                cache: RwLock::new(CacheState::default()),
                init: OnceCell::new(),
                preloaded: AtomicBool::new(false),
            }),
        }
    }

    /// The settings this instance was built from.
    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Display name of the active provider.
    pub fn provider_name(&self) -> &'static str {
        self.inner.provider.read().name()
    }

    /// Replaces the active provider.
    ///
    /// Values already cached stay as they are; only keys resolved after the
    /// swap go through the new provider.
    pub fn set_provider(&self, provider: Box<dyn Provider>) {
        let name = provider.name();
        *self.inner.provider.write() = Arc::from(provider);
        tracing::debug!(provider = name, "active provider replaced");
    }

    /// Loads and partitions the file sources exactly once.
    ///
    /// A failed load (I/O, missing encryption key, bad passphrase) leaves
    /// the gate unset, so the next touch retries instead of pinning the
    /// instance to a dead state.
    fn ensure_loaded(&self) -> Result<()> {
        self.inner
            .init
            .get_or_try_init(|| {
                let merged = envfile::load_sources(&self.inner.settings)?;
                let mut cache = self.inner.cache.write();
                for (key, value) in merged {
                    if key.starts_with(PUBLIC_PREFIX) {
                        cache.public.insert(key, value);
                    } else {
                        cache.private.insert(key, value);
                    }
                }
                tracing::debug!(
                    private = cache.private.len(),
                    public = cache.public.len(),
                    "secret sources loaded"
                );
                Ok(())
            })
            .map(|_| ())
    }

    /// Reads a private key from the cache without consulting the provider.
    ///
    /// Triggers the lazy file load, then answers from the private map only.
    /// `Ok(None)` means the key is not cached; it says nothing about the
    /// provider.
    pub fn get_sync_if_cached(&self, key: &str) -> Result<Option<String>> {
        self.ensure_loaded()?;
        Ok(self.inner.cache.read().private.get(key).cloned())
    }

    /// Reads a public key from the merged file state.
    pub fn get_public_sync(&self, key: &str) -> Result<Option<String>> {
        self.ensure_loaded()?;
        Ok(self.inner.cache.read().public.get(key).cloned())
    }

    /// Resolves a key, fetching from the provider on a private cache miss.
    ///
    /// Public keys are answered from the merged file state and never reach
    /// the provider. For the rest, the fetch key is rewritten to the
    /// provider's format first (with a warning when that changes it).
    /// Fetched values are written back under the canonical key; when two
    /// tasks race on the same key the first write wins and both observe
    /// the same value. A transport failure is logged and reported as
    /// `Ok(None)`, so a flaky provider degrades to "absent" rather than
    /// poisoning resolution.
    ///
    /// # Errors
    ///
    /// Returns an error only when the file sources fail to load.
    pub async fn load(&self, key: &str) -> Result<Option<String>> {
        self.ensure_loaded()?;

        if key.starts_with(PUBLIC_PREFIX) {
            return Ok(self.inner.cache.read().public.get(key).cloned());
        }

        {
            let cache = self.inner.cache.read();
            if let Some(value) = cache.private.get(key) {
                return Ok(Some(value.clone()));
            }
        }

        let provider = Arc::clone(&*self.inner.provider.read());
        let lookup = normalized_key(provider.name(), key);

        match provider.fetch(&lookup).await {
            Ok(Some(value)) => Ok(Some(self.store_fetched(key, value))),
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::warn!(
                    secret.key = key,
                    provider = provider.name(),
                    error = %e,
                    "provider fetch failed, treating the secret as absent"
                );
                Ok(None)
            }
        }
    }

    /// Synchronous variant of [`load`](Self::load).
    ///
    /// Public and cached keys are answered the same way. Past the cache,
    /// only providers that declare sync support are consulted; for the
    /// rest a miss is simply `Ok(None)`. This path never blocks on the
    /// async provider machinery.
    pub fn load_sync(&self, key: &str) -> Result<Option<String>> {
        self.ensure_loaded()?;

        if key.starts_with(PUBLIC_PREFIX) {
            return Ok(self.inner.cache.read().public.get(key).cloned());
        }

        {
            let cache = self.inner.cache.read();
            if let Some(value) = cache.private.get(key) {
                return Ok(Some(value.clone()));
            }
        }

        let provider = Arc::clone(&*self.inner.provider.read());
        if !provider.supports_sync() {
            return Ok(None);
        }

        let lookup = normalized_key(provider.name(), key);
        match provider.fetch_sync(&lookup) {
            Ok(Some(value)) => Ok(Some(self.store_fetched(key, value))),
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::warn!(
                    secret.key = key,
                    provider = provider.name(),
                    error = %e,
                    "provider fetch failed, treating the secret as absent"
                );
                Ok(None)
            }
        }
    }

    /// Write-back for a fetched value. First writer wins; the caller gets
    /// whatever ended up in the cache.
    fn store_fetched(&self, key: &str, value: String) -> String {
        let mut cache = self.inner.cache.write();
        cache.private.entry(key.to_string()).or_insert(value).clone()
    }

    /// Resolves the given keys up front so later accesses can be
    /// synchronous.
    ///
    /// Keys are deduplicated; public keys and keys already cached are
    /// skipped. The remainder is fetched with bounded parallelism. Fetch
    /// failures are logged, not returned: after this call the preload flag
    /// is set and missing keys resolve to the empty string.
    ///
    /// # Errors
    ///
    /// Returns an error only when the file sources fail to load.
    pub async fn preload<I, S>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_loaded()?;

        let mut wanted: HashSet<String> = HashSet::new();
        for key in keys {
            let key = key.into();
            if !key.starts_with(PUBLIC_PREFIX) {
                wanted.insert(key);
            }
        }

        let missing: Vec<String> = {
            let cache = self.inner.cache.read();
            wanted
                .into_iter()
                .filter(|key| !cache.private.contains_key(key))
                .collect()
        };

        if !missing.is_empty() {
            let semaphore = Arc::new(Semaphore::new(PROVIDER_CONCURRENCY));
            let fetches = missing.iter().map(|key| {
                let semaphore = Arc::clone(&semaphore);
                async move {
                    let _permit = match semaphore.acquire().await {
                        Ok(permit) => permit,
                        Err(_) => return,
                    };
                    if let Err(e) = self.load(key).await {
                        tracing::warn!(secret.key = %key, error = %e, "preload fetch failed");
                    }
                }
            });
            futures::future::join_all(fetches).await;
        }

        self.inner.preloaded.store(true, Ordering::SeqCst);
        tracing::debug!(count = missing.len(), "preload complete");
        Ok(())
    }

    /// Whether a [`preload`](Self::preload) call has completed.
    pub fn is_preloaded(&self) -> bool {
        self.inner.preloaded.load(Ordering::SeqCst)
    }

    /// Pushes every private entry to the active provider.
    ///
    /// Public entries never leave the process. Keys are rewritten to the
    /// provider's format (with a warning per changed key) and written with
    /// bounded parallelism; per-key failures are collected in the report
    /// rather than aborting the batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the file sources fail to load or the active
    /// provider is read-only.
    pub async fn push(&self) -> Result<PushReport> {
        self.ensure_loaded()?;

        let provider = Arc::clone(&*self.inner.provider.read());
        if !provider.allows_push() {
            return Err(SecretGateError::PushNotSupported(
                provider.name().to_string(),
            ));
        }

        let entries: Vec<(String, String)> = {
            let cache = self.inner.cache.read();
            cache
                .private
                .iter()
                .map(|(key, value)| (normalized_key(provider.name(), key), value.clone()))
                .collect()
        };

        tracing::info!(
            provider = provider.name(),
            count = entries.len(),
            secret.operation = "push",
            "pushing private entries to the provider"
        );

        let report = provider.push_many(&entries).await;
        for (key, reason) in &report.failures {
            tracing::warn!(secret.key = %key, reason = %reason, "push failed for one secret");
        }
        Ok(report)
    }

    /// Accesses a secret as a chainable wrapper. Never fails.
    ///
    /// The wrapper's channels are populated by the first matching rule:
    ///
    /// - file sources failed to load: both channels carry the
    ///   initialization error
    /// - public key: both channels carry the file value, or `""` when
    ///   absent
    /// - cached private key: both channels carry the cached value
    /// - preload completed and the key is still absent: both channels
    ///   carry `""`
    /// - otherwise: nothing is synchronously available; awaiting the
    ///   wrapper resolves through [`load`](Self::load), with absent
    ///   mapping to `""`
    pub fn get(&self, key: &str) -> SecretString {
        if let Err(e) = self.ensure_loaded() {
            return SecretString::broken(key, &e.to_string());
        }

        if key.starts_with(PUBLIC_PREFIX) {
            let value = self
                .inner
                .cache
                .read()
                .public
                .get(key)
                .cloned()
                .unwrap_or_default();
            return SecretString::ready(key, value);
        }

        {
            let cache = self.inner.cache.read();
            if let Some(value) = cache.private.get(key) {
                return SecretString::ready(key, value.clone());
            }
        }

        if self.is_preloaded() {
            return SecretString::ready(key, String::new());
        }

        let this = self.clone();
        let owned = key.to_string();
        SecretString::pending(key, async move {
            Ok(this.load(&owned).await?.unwrap_or_default())
        })
    }
}

/// Rewrites a key for the named provider, warning when the provider-side
/// name differs from the canonical one.
fn normalized_key(provider: &str, key: &str) -> String {
    let lookup = normalize::normalize(provider, key);
    if lookup != key {
        tracing::warn!(
            secret.key = key,
            secret.lookup = %lookup,
            provider = provider,
            "key was rewritten to fit the provider's format"
        );
    }
    lookup
}
