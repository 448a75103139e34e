use crate::provider::{Provider, providers};
use crate::{GlobalConfig, GlobalDefaults, Secrets, Settings};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use colored::Colorize;
use std::convert::TryFrom;
use std::fs;
use std::path::{Path, PathBuf};

/// Main CLI structure for the secretgate application.
///
/// This is the entry point for the command-line interface, parsing user
/// commands and delegating to the library for resolution, pushing and
/// migration.
#[derive(Parser)]
#[command(name = "secretgate")]
#[command(about = "Lazy secrets resolution with pluggable providers", long_about = None)]
#[command(version)]
struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available commands for the secretgate CLI.
#[derive(Subcommand)]
enum Commands {
    /// Resolve a secret and print its value
    Get {
        /// Name of the secret
        name: String,
        /// Provider URI to use (e.g. keyring://, env://)
        #[arg(short, long, env = "SECRETGATE_PROVIDER")]
        provider: Option<String>,
    },
    /// Push the private file state into the provider
    Push {
        /// Provider URI to use
        #[arg(short, long, env = "SECRETGATE_PROVIDER")]
        provider: Option<String>,
    },
    /// Convert a dotenv file into the secrets file layout
    Migrate {
        /// Path of the dotenv file to read
        #[arg(short, long, default_value = ".env")]
        from: PathBuf,
        /// Write the encrypted variant instead of a plain file
        #[arg(long)]
        encrypt: bool,
    },
    /// Choose the default provider and run its setup hook
    Setup,
}

/// Main entry point for the secretgate CLI application.
///
/// Parses command-line arguments, installs the log subscriber and executes
/// the appropriate command.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env();
    init_tracing(settings.debug);

    match cli.command {
        // Resolve one secret through the files and the provider
        Commands::Get { name, provider } => {
            let settings = apply_provider(settings, provider);
            let secrets =
                Secrets::new(settings).wrap_err("Failed to initialize the secret store")?;

            if let Some(value) = secrets
                .get_public_sync(&name)
                .wrap_err("Failed to load the secret sources")?
            {
                println!("{}", value);
                return Ok(());
            }

            match secrets
                .load(&name)
                .await
                .wrap_err("Failed to resolve the secret")?
            {
                Some(value) => {
                    println!("{}", value);
                    Ok(())
                }
                None => Err(eyre!(
                    "Secret '{}' was not found in the files or the '{}' provider",
                    name,
                    secrets.provider_name()
                )),
            }
        }
        // Mirror the private file state into the provider
        Commands::Push { provider } => {
            let settings = apply_provider(settings, provider);
            let secrets =
                Secrets::new(settings).wrap_err("Failed to initialize the secret store")?;

            let report = secrets.push().await.wrap_err("Failed to push secrets")?;
            for (key, reason) in &report.failures {
                println!("{} {} - {}", "✗".red(), key, reason);
            }
            println!(
                "{} Pushed {} secrets to {}",
                "✓".green(),
                report.pushed,
                secrets.provider_name()
            );

            if !report.is_complete() {
                return Err(eyre!("{} secrets failed to push", report.failures.len()));
            }
            Ok(())
        }
        Commands::Migrate { from, encrypt } => migrate(&settings, &from, encrypt),
        Commands::Setup => setup(&settings).await,
    }
}

/// Converts a dotenv file into the secrets file layout, optionally writing
/// the encrypted variant.
fn migrate(settings: &Settings, from: &Path, encrypt: bool) -> Result<()> {
    let entries = dotenvy::from_path_iter(from)
        .wrap_err_with(|| format!("Failed to read {}", from.display()))?;

    let mut content = String::new();
    let mut count = 0usize;
    for item in entries {
        let (key, value) = item.wrap_err("Failed to parse dotenv entry")?;
        if value.chars().any(|c| c.is_whitespace() || c == '#') {
            content.push_str(&format!("{}=\"{}\"\n", key, value));
        } else {
            content.push_str(&format!("{}={}\n", key, value));
        }
        count += 1;
    }

    let target = if encrypt {
        let passphrase = match settings.encryption_key.clone() {
            Some(key) => key,
            None => inquire::Password::new("Encryption passphrase:").prompt()?,
        };
        let target = encrypted_sibling(&settings.path);
        fs::write(&target, crate::cipher::encrypt(&content, &passphrase))
            .wrap_err_with(|| format!("Failed to write {}", target.display()))?;
        target
    } else {
        fs::write(&settings.path, &content)
            .wrap_err_with(|| format!("Failed to write {}", settings.path.display()))?;
        settings.path.clone()
    };
    restrict_permissions(&target)?;

    println!(
        "{} Wrote {} secrets to {}",
        "✓".green(),
        count,
        target.display()
    );
    println!(
        "\n{} Remove {} once the migration is verified",
        "!".yellow(),
        from.display()
    );
    Ok(())
}

/// Interactive provider selection, saved as the global default.
async fn setup(settings: &Settings) -> Result<()> {
    use inquire::Select;

    // Get provider choices from the centralized registry
    let provider_choices: Vec<String> = providers()
        .into_iter()
        .map(|info| info.display_with_examples())
        .collect();

    let selected_choice =
        Select::new("Select your preferred provider backend:", provider_choices).prompt()?;

    // Extract provider name from the selected choice
    let provider_name = selected_choice.split(':').next().unwrap_or("keyring");

    let provider = Box::<dyn Provider>::try_from(provider_name)?;
    if provider
        .setup()
        .await
        .wrap_err_with(|| format!("Setup of provider '{}' failed", provider.name()))?
    {
        println!("{} Provider '{}' is ready", "✓".green(), provider.name());
    }

    let config = GlobalConfig {
        defaults: GlobalDefaults {
            provider: Some(format!("{}://", provider_name)),
            environment: settings.environment.clone(),
        },
    };
    config
        .save()
        .wrap_err("Failed to save the global configuration")?;
    println!(
        "\n{} Configuration saved to {}",
        "✓".green(),
        GlobalConfig::path()?.display()
    );
    Ok(())
}

fn apply_provider(settings: Settings, provider: Option<String>) -> Settings {
    match provider {
        Some(uri) => settings.with_provider(uri),
        None => settings,
    }
}

fn encrypted_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".enc");
    PathBuf::from(name)
}

/// Secret files are owner read/write only on Unix systems.
#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = fs::metadata(path)?;
    let mut permissions = metadata.permissions();
    permissions.set_mode(0o600);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

fn init_tracing(debug: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
