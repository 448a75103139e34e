//! SecretGate - lazy secret resolution for applications
//!
//! This library merges layered file sources with pluggable secret-storage
//! backends behind one access surface. Values resolve lazily, cache for the
//! lifetime of the instance, and come wrapped in chainable validators that
//! behave identically whether the expression is awaited or read
//! synchronously.
//!
//! # Features
//!
//! - **Layered file sources**: base, environment-specific, public and
//!   encrypted variants of a `KEY=value` file, merged with the process
//!   environment and `${NAME}` expansion
//! - **Multiple providers**: environment variables, in-memory map, system
//!   keychain, selected by URI
//! - **Dual access**: every secret is awaitable and, once cached or
//!   preloaded, synchronously readable
//! - **Chainable validation**: `required`, `regex`, length and numeric
//!   ranges, strict booleans, typed JSON, plus a custom-rule hook
//! - **Push**: mirror the private file state into the active provider
//!
//! # Example
//!
//! ```ignore
//! use secretgate::Secrets;
//!
//! #[tokio::main]
//! async fn main() -> secretgate::Result<()> {
//!     let secrets = Secrets::from_env()?;
//!
//!     let database_url = secrets.get("DATABASE_URL").required().await?;
//!     let port = secrets.get("PORT").number().between(1.0, 65535.0).await?;
//!
//!     // Synchronous reads work once the keys are preloaded
//!     secrets.preload(["API_TOKEN"]).await?;
//!     let token = secrets.get("API_TOKEN").required().value()?;
//!
//!     Ok(())
//! }
//! ```

// Internal modules
mod cipher;
mod config;
mod envfile;
mod error;
mod store;
mod value;

pub mod normalize;
pub mod provider;

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;

// Public API exports
pub use config::{GlobalConfig, GlobalDefaults, Settings};
pub use error::{Result, SecretGateError};
pub use provider::{Provider, ProviderInfo, PushReport};
pub use store::{PUBLIC_PREFIX, Secrets};
pub use value::{SecretBool, SecretJson, SecretNumber, SecretString};

#[cfg(test)]
mod tests;
