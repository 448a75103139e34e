//! # Provider System
//!
//! The provider module implements a trait-based plugin architecture for resolving
//! secrets from different back ends. Providers handle the actual transport, from
//! process environment variables to the operating system keychain.
//!
//! ## Architecture
//!
//! The provider system is built around the [`Provider`] trait, which defines a common
//! interface for all back ends. Each provider implementation handles:
//!
//! - Asynchronous fetch and push as the primary interface
//! - An optional synchronous fetch capability, for back ends that can answer
//!   without blocking on I/O or interactive prompts
//! - Optional write support (some providers are read-only)
//!
//! ## Available Providers
//!
//! - [`env::EnvProvider`]: process environment variables (read-only, default)
//! - [`memory::MemoryProvider`]: in-process map, for tests and ephemeral secrets
//! - [`keyring::KeyringProvider`]: operating system keychain
//!
//! ## URI-Based Configuration
//!
//! Providers support URI-based configuration for flexibility:
//!
//! ```text
//! env://
//! memory://
//! keyring://
//! keyring://myservice
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use secretgate::provider::Provider;
//! use std::convert::TryFrom;
//!
//! // Create a provider from a URI string
//! let provider = Box::<dyn Provider>::try_from("memory://")?;
//!
//! // Store a secret
//! provider.push("API_KEY", "secret123").await?;
//!
//! // Retrieve a secret
//! if let Some(value) = provider.fetch("API_KEY").await? {
//!     println!("API_KEY: {}", value);
//! }
//! ```

use crate::{Result, SecretGateError};
use async_trait::async_trait;
use futures::future::join_all;
use std::convert::TryFrom;
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;

pub mod env;
pub mod keyring;
pub mod memory;
#[macro_use]
pub mod macros;


/// Maximum number of provider calls in flight during a fan-out
/// ([`Provider::push_many`] and `Secrets::preload`).
pub const PROVIDER_CONCURRENCY: usize = 5;

/// Information about a secret provider.
///
/// Contains metadata used for displaying available providers to users,
/// including the provider's name, description, and example URIs.
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    /// The canonical name of the provider (e.g., "keyring", "env").
    pub name: &'static str,
    /// A human-readable description of what the provider does.
    pub description: &'static str,
    /// Example URIs showing how to configure this provider.
    pub examples: &'static [&'static str],
}

impl ProviderInfo {
    /// Formats the provider information for display, including examples if available.
    ///
    /// # Returns
    ///
    /// A formatted string in one of two formats:
    /// - Without examples: "name: description"
    /// - With examples: "name: description (e.g., example1, example2)"
    ///
    /// # Example
    ///
    /// ```ignore
    /// let info = ProviderInfo {
    ///     name: "keyring",
    ///     description: "Operating system keychain",
    ///     examples: &["keyring://", "keyring://myservice"],
    /// };
    /// assert_eq!(
    ///     info.display_with_examples(),
    ///     "keyring: Operating system keychain (e.g., keyring://, keyring://myservice)"
    /// );
    /// ```
    pub fn display_with_examples(&self) -> String {
        if self.examples.is_empty() {
            format!("{}: {}", self.name, self.description)
        } else {
            format!(
                "{}: {} (e.g., {})",
                self.name,
                self.description,
                self.examples.join(", ")
            )
        }
    }
}

/// Macro support types
pub use macros::{PROVIDER_REGISTRY, ProviderRegistration};

/// Outcome of a bulk push through [`Provider::push_many`].
///
/// Failures are collected per entry so one rejected key never hides what
/// happened to the rest of the batch.
#[derive(Debug, Default)]
pub struct PushReport {
    /// Number of entries stored successfully.
    pub pushed: usize,
    /// Keys that could not be stored, with the reason for each.
    pub failures: Vec<(String, String)>,
}

impl PushReport {
    /// Returns `true` when every entry in the batch was stored.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Returns a list of all available providers with their metadata.
///
/// This includes the provider name, description, and example URIs for each
/// registered provider.
///
/// # Returns
///
/// A vector of `ProviderInfo` structs containing metadata for each provider.
pub fn providers() -> Vec<ProviderInfo> {
    PROVIDER_REGISTRY
        .iter()
        .map(|reg| reg.info.clone())
        .collect()
}

/// Trait defining the interface for secret providers.
///
/// All back ends must implement this trait to participate in resolution.
/// The trait is async-first: `fetch` and `push` may perform network or IPC
/// round trips, and implementations must never block the calling task.
///
/// # Thread Safety
///
/// Providers must be `Send + Sync` as a single instance is shared across
/// tasks behind an `Arc`.
///
/// # Synchronous capability
///
/// Back ends that can answer without any blocking work (environment
/// variables, in-process maps) advertise it by overriding
/// [`supports_sync`](Provider::supports_sync) and
/// [`fetch_sync`](Provider::fetch_sync) as a pair. Callers must consult
/// `supports_sync` before calling `fetch_sync`; the resolution layer never
/// drives an async-only provider from a synchronous context.
///
/// # Implementation Guidelines
///
/// - Providers should handle their own error cases and return appropriate `Result` types
/// - `Ok(None)` means the key does not exist; `Err` is reserved for transport
///   or authentication failures
/// - Providers may choose to be read-only by overriding [`allows_push`](Provider::allows_push)
/// - Provider names should be lowercase and descriptive; the name selects the
///   key format used by [`crate::normalize`]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns the name of this provider.
    ///
    /// This should match the name registered with the provider macro.
    fn name(&self) -> &'static str;

    /// Retrieves a secret value from the provider.
    ///
    /// # Arguments
    ///
    /// * `key` - The secret key to retrieve, already normalized for this provider
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))` if the secret exists
    /// - `Ok(None)` if the secret doesn't exist
    /// - `Err` if there was an error reaching the provider
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// match provider.fetch("DATABASE_URL").await? {
    ///     Some(url) => println!("Database URL: {}", url),
    ///     None => println!("DATABASE_URL not found"),
    /// }
    /// ```
    async fn fetch(&self, key: &str) -> Result<Option<String>>;

    /// Returns whether [`fetch_sync`](Provider::fetch_sync) is usable.
    ///
    /// Defaults to `false`. Providers that can answer without blocking on
    /// I/O, prompts, or a runtime should override this to return `true`.
    fn supports_sync(&self) -> bool {
        false
    }

    /// Synchronous counterpart of [`fetch`](Provider::fetch).
    ///
    /// Only meaningful when [`supports_sync`](Provider::supports_sync)
    /// returns `true`; the default implementation reports every key as
    /// absent.
    fn fetch_sync(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    /// Stores a secret value in the provider.
    ///
    /// # Arguments
    ///
    /// * `key` - The secret key to store, already normalized for this provider
    /// * `value` - The secret value to store
    ///
    /// # Errors
    ///
    /// This method should return an error if the transport fails or if
    /// [`allows_push`](Provider::allows_push) returns `false`.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// provider.push("API_KEY", "secret123").await?;
    /// ```
    async fn push(&self, key: &str, value: &str) -> Result<()>;

    /// Returns whether this provider accepts pushed secrets.
    ///
    /// By default, providers are assumed to support writing. Read-only
    /// providers (like environment variables) should override this to
    /// return `false`.
    fn allows_push(&self) -> bool {
        true
    }

    /// Stores a batch of secrets, at most [`PROVIDER_CONCURRENCY`] at a time.
    ///
    /// Failures are isolated per entry: one rejected key never aborts the
    /// rest of the batch. The returned [`PushReport`] counts the successes
    /// and names each failure.
    async fn push_many(&self, entries: &[(String, String)]) -> PushReport {
        let semaphore = Arc::new(Semaphore::new(PROVIDER_CONCURRENCY));
        let attempts = entries.iter().map(|(key, value)| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => return Err((key.clone(), format!("semaphore closed: {e}"))),
                };
                self.push(key, value)
                    .await
                    .map_err(|e| (key.clone(), e.to_string()))
            }
        });

        let mut report = PushReport::default();
        for outcome in join_all(attempts).await {
            match outcome {
                Ok(()) => report.pushed += 1,
                Err(failure) => report.failures.push(failure),
            }
        }
        report
    }

    /// Runs any interactive first-time setup this provider needs.
    ///
    /// Returns `Ok(true)` when setup work was performed and `Ok(false)` when
    /// there was nothing to do, which is also what the default does.
    async fn setup(&self) -> Result<bool> {
        Ok(false)
    }
}

impl TryFrom<String> for Box<dyn Provider> {
    type Error = SecretGateError;

    /// Creates a provider instance from a URI string.
    ///
    /// See the `TryFrom<&str>` implementation for the accepted formats.
    fn try_from(s: String) -> Result<Self> {
        Self::try_from(&s as &str)
    }
}

impl TryFrom<&str> for Box<dyn Provider> {
    type Error = SecretGateError;

    /// Creates a provider instance from a URI string.
    ///
    /// This function handles various URI formats and normalizes them before
    /// parsing. It supports both full URIs and shorthand notations.
    ///
    /// # URI Formats
    ///
    /// - **Full URI**: `scheme://authority/path` (e.g., `keyring://myservice`)
    /// - **Bare provider names**: automatically converted to `provider://`
    ///
    /// # Examples
    ///
    /// ```ignore
    /// use std::convert::TryFrom;
    ///
    /// // Simple provider name
    /// let provider = Box::<dyn Provider>::try_from("keyring")?;
    ///
    /// // Full URI with configuration
    /// let provider = Box::<dyn Provider>::try_from("keyring://myservice")?;
    /// ```
    fn try_from(s: &str) -> Result<Self> {
        // Parse the scheme from the input string
        let (scheme, rest) = if let Some(pos) = s.find(':') {
            let scheme = &s[..pos];
            let rest = &s[pos + 1..];
            (scheme, rest)
        } else {
            // Just a provider name, no URI components
            (s, "")
        };

        // Check if the scheme is registered
        let is_valid_scheme = PROVIDER_REGISTRY
            .iter()
            .any(|reg| reg.schemes.contains(&scheme));

        if !is_valid_scheme {
            // Check if it's a known provider name to give a better error
            if PROVIDER_REGISTRY.iter().any(|reg| reg.info.name == scheme) {
                return Err(SecretGateError::ProviderOperationFailed(format!(
                    "Provider '{}' exists but URI parsing failed",
                    scheme
                )));
            } else {
                return Err(SecretGateError::ProviderNotFound(scheme.to_string()));
            }
        }

        // Build a proper URL with the correct scheme
        let url_string = match rest {
            // Just scheme name (e.g., "keyring")
            "" | ":" => format!("{}://", scheme),
            // Standard URI format already has // (e.g., "keyring://myservice")
            s if s.starts_with("//") => format!("{}:{}", scheme, s),
            // Path only format (e.g., "memory:/some/path")
            s if s.starts_with('/') => format!("{}://{}", scheme, s),
            // Everything else - assume it's a host or path component
            s => format!("{}://{}", scheme, s),
        };

        let proper_url = Url::parse(&url_string).map_err(|e| {
            SecretGateError::ProviderOperationFailed(format!(
                "Invalid provider specification '{}': {}",
                s, e
            ))
        })?;

        Self::try_from(&proper_url)
    }
}

impl TryFrom<&Url> for Box<dyn Provider> {
    type Error = SecretGateError;

    fn try_from(url: &Url) -> Result<Self> {
        let scheme = url.scheme();

        // Find the provider registration for this scheme
        let registration = PROVIDER_REGISTRY
            .iter()
            .find(|reg| reg.schemes.contains(&scheme))
            .ok_or_else(|| SecretGateError::ProviderNotFound(scheme.to_string()))?;

        // Use the factory function to create the provider
        (registration.factory)(url)
    }
}
