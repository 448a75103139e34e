//! Error types for secretgate operations

use thiserror::Error;

/// The main error type for secretgate operations
///
/// This enum represents all possible errors that can occur when working with
/// the secretgate library.
#[derive(Error, Debug)]
pub enum SecretGateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
    #[error("Dotenv error: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(
        "Provider backend '{0}' not found. Run 'secretgate setup' to list the available providers"
    )]
    ProviderNotFound(String),
    #[error("Provider operation failed: {0}")]
    ProviderOperationFailed(String),
    #[error("Provider '{0}' is read-only and does not accept pushed secrets")]
    PushNotSupported(String),
    #[error("Validation of secret '{key}' failed ({rule}): {message}")]
    Validation {
        key: String,
        rule: &'static str,
        message: String,
    },
    #[error(
        "Secret '{key}' has no synchronously available value.\n\nTo fix this, either:\n  1. Await the expression instead of reading it with value()\n  2. Call Secrets::preload with the keys you need before any synchronous access"
    )]
    SyncAccessWithoutPreload { key: String },
    #[error("Failed to decrypt secrets file '{path}': {reason}")]
    Decryption { path: String, reason: String },
    #[error(
        "Secrets file '{path}' is encrypted but no encryption key is configured.\n\nSet SECRETGATE_ENCRYPTION_KEY to the passphrase the file was encrypted with"
    )]
    EncryptionKeyMissing { path: String },
    #[error("Secret sources failed to initialize: {0}")]
    Initialization(String),
}

/// A type alias for `Result<T, SecretGateError>`
///
/// This provides a convenient shorthand for functions that return
/// a result with a `SecretGateError` as the error type.
pub type Result<T> = std::result::Result<T, SecretGateError>;

impl From<url::ParseError> for SecretGateError {
    fn from(err: url::ParseError) -> Self {
        SecretGateError::ProviderOperationFailed(format!("invalid provider URI: {err}"))
    }
}

impl SecretGateError {
    /// Builds the error raised when a chained validation rule rejects a value.
    pub(crate) fn validation(key: &str, rule: &'static str, message: impl Into<String>) -> Self {
        SecretGateError::Validation {
            key: key.to_string(),
            rule,
            message: message.into(),
        }
    }

    pub(crate) fn sync_access(key: &str) -> Self {
        SecretGateError::SyncAccessWithoutPreload {
            key: key.to_string(),
        }
    }
}
