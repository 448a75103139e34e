//! Loader configuration for secretgate
//!
//! The library itself is configured entirely through `SECRETGATE_*`
//! environment variables plus an optional global defaults file. [`Settings`]
//! captures a snapshot of that configuration; tests build their own
//! instances with the `with_*` methods instead of touching the process
//! environment.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::io;
use std::path::PathBuf;

/// Environment variable selecting the deployment environment name, which
/// activates the `<base>.<env>` file variants.
pub const ENV_ENVIRONMENT: &str = "SECRETGATE_ENV";
/// Environment variable overriding the base secrets file path.
pub const ENV_PATH: &str = "SECRETGATE_PATH";
/// Environment variable selecting the provider URI (e.g. `keyring://`).
pub const ENV_PROVIDER: &str = "SECRETGATE_PROVIDER";
/// Environment variable enabling debug logging in the CLI.
pub const ENV_DEBUG: &str = "SECRETGATE_DEBUG";
/// Environment variable letting file values override process variables.
pub const ENV_OVERRIDE: &str = "SECRETGATE_OVERRIDE";
/// Environment variable toggling `${NAME}` expansion (default on).
pub const ENV_EXPAND: &str = "SECRETGATE_EXPAND";
/// Environment variable toggling the process-environment merge (default on).
pub const ENV_SYSTEM_ENV: &str = "SECRETGATE_SYSTEM_ENV";
/// Environment variable holding the passphrase for `.enc` files.
pub const ENV_ENCRYPTION_KEY: &str = "SECRETGATE_ENCRYPTION_KEY";

/// A snapshot of the loader configuration.
///
/// Field defaults match an unconfigured process: secrets come from
/// `.secrets` next to the working directory merged with the process
/// environment, expansion is on, and the provider is `env://`.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Deployment environment name (`.secrets.<env>` activation).
    pub environment: Option<String>,
    /// Base secrets file path.
    pub path: PathBuf,
    /// Active provider URI.
    pub provider: String,
    /// Debug logging toggle, honored by the CLI subscriber.
    pub debug: bool,
    /// When set, file values take precedence over process variables.
    pub override_env: bool,
    /// `${NAME}` expansion toggle.
    pub expand: bool,
    /// Whether the process environment is merged into the sources.
    pub system_env: bool,
    /// Passphrase for encrypted file variants.
    pub encryption_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            environment: None,
            path: PathBuf::from(".secrets"),
            provider: "env://".to_string(),
            debug: false,
            override_env: false,
            expand: true,
            system_env: true,
            encryption_key: None,
        }
    }
}

impl Settings {
    /// Reads the configuration from `SECRETGATE_*` environment variables.
    ///
    /// The provider is resolved in order: `SECRETGATE_PROVIDER`, the global
    /// defaults file, then `env://`. An unreadable global defaults file is
    /// logged and skipped rather than failing resolution.
    pub fn from_env() -> Self {
        let mut settings = Settings::default();
        if let Ok(value) = env::var(ENV_ENVIRONMENT) {
            if !value.is_empty() {
                settings.environment = Some(value);
            }
        }
        if let Ok(value) = env::var(ENV_PATH) {
            if !value.is_empty() {
                settings.path = PathBuf::from(value);
            }
        }
        if let Some(flag) = env_flag(ENV_DEBUG) {
            settings.debug = flag;
        }
        if let Some(flag) = env_flag(ENV_OVERRIDE) {
            settings.override_env = flag;
        }
        if let Some(flag) = env_flag(ENV_EXPAND) {
            settings.expand = flag;
        }
        if let Some(flag) = env_flag(ENV_SYSTEM_ENV) {
            settings.system_env = flag;
        }
        if let Ok(value) = env::var(ENV_ENCRYPTION_KEY) {
            if !value.is_empty() {
                settings.encryption_key = Some(value);
            }
        }

        settings.provider = match env::var(ENV_PROVIDER) {
            Ok(value) if !value.is_empty() => value,
            _ => match GlobalConfig::load() {
                Ok(Some(global)) => {
                    if settings.environment.is_none() {
                        settings.environment = global.defaults.environment.clone();
                    }
                    global
                        .defaults
                        .provider
                        .unwrap_or_else(|| settings.provider.clone())
                }
                Ok(None) => settings.provider.clone(),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring unreadable global config");
                    settings.provider.clone()
                }
            },
        };

        settings
    }

    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    #[must_use]
    pub fn with_override_env(mut self, override_env: bool) -> Self {
        self.override_env = override_env;
        self
    }

    #[must_use]
    pub fn with_expand(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }

    #[must_use]
    pub fn with_system_env(mut self, system_env: bool) -> Self {
        self.system_env = system_env;
        self
    }

    #[must_use]
    pub fn with_encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = Some(key.into());
        self
    }
}

/// Parses a boolean toggle from the environment.
///
/// Returns `None` when the variable is unset or carries an unrecognized
/// value, so callers keep their defaults.
fn env_flag(name: &str) -> Option<bool> {
    let value = env::var(name).ok()?;
    parse_flag(&value)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Global user configuration for secretgate.
///
/// This configuration is stored in the user's config directory and provides
/// defaults that apply across all projects.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GlobalConfig {
    /// Default settings
    #[serde(default)]
    pub defaults: GlobalDefaults,
}

/// Default settings in the global configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GlobalDefaults {
    /// Default provider URI to use when not specified
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Default environment name to use when not specified
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

impl GlobalConfig {
    /// Gets the path to the global configuration file.
    ///
    /// The configuration file is stored in the system's config directory,
    /// typically `~/.config/secretgate/config.toml` on Unix systems.
    pub fn path() -> Result<PathBuf> {
        use directories::ProjectDirs;
        let dirs = ProjectDirs::from("", "", "secretgate").ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "Could not find config directory")
        })?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Loads the global user configuration.
    ///
    /// Returns `Ok(None)` if the configuration file doesn't exist.
    pub fn load() -> Result<Option<Self>> {
        let config_path = Self::path()?;
        if !config_path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&config_path)?;
        Ok(Some(toml::from_str(&content)?))
    }

    /// Saves the global configuration to disk.
    ///
    /// Creates the parent directory if necessary.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::path()?;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }
}
