//! Operator CLI for AquaTree revision chains.

use anyhow::{Context, Result};
use aqua_chain::AquaChainService;
use aqua_core::config::{AppConfig, PrivateKeyConfig, SigningConfig};
use aqua_core::{GenesisContent, PubkeyHash};
use aqua_signer::RevisionSigner;
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "aquachain")]
#[command(about = "Manage AquaTree revision chains")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(long, global = true, env = "AQUA_CONFIG", default_value = "aquachain.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a genesis revision for a file or form
    Genesis {
        /// Owner address
        owner: String,
        /// File to anchor
        path: PathBuf,
        /// File name to record (defaults to the path's file name)
        #[arg(long)]
        name: Option<String>,
        /// Treat the file as a JSON object of form fields
        #[arg(long, default_value_t = false)]
        form: bool,
    },
    /// Copy a chain into another owner's namespace
    Transfer {
        /// Chain tip, bare or owner-qualified
        tip: String,
        /// Source owner
        #[arg(long)]
        from: String,
        /// Target owner
        #[arg(long)]
        to: String,
    },
    /// Delete a revision and everything descending from it
    Delete {
        /// Revision hash, bare or owner-qualified
        hash: String,
        /// Owner used to qualify a bare hash
        #[arg(long)]
        owner: Option<String>,
        /// Drop heads instead of moving them back to the previous revision
        #[arg(long, default_value_t = false)]
        from_latest: bool,
        /// Report whether the deletion would be allowed without deleting
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Print a chain's revision hashes in order
    Order {
        /// Owner-qualified hash to start from
        hash: String,
        /// Walk forward from a genesis instead of back from a tip
        #[arg(long, default_value_t = false)]
        from_genesis: bool,
    },
    /// Check whether a requester may delete a revision
    CanDelete {
        /// Revision hash, bare or owner-qualified
        hash: String,
        /// Requesting owner
        requester: String,
    },
    /// Print a stored chain as an AquaTree
    Show {
        /// Owner-qualified chain tip
        tip: String,
    },
    /// List an owner's chain heads
    Heads {
        /// Owner address
        owner: String,
    },
    /// Verify a stored chain
    Verify {
        /// Owner-qualified chain tip
        tip: String,
    },
    /// Sign a chain with the configured key
    Sign {
        /// Owner address
        owner: String,
        /// Chain tip, bare or owner-qualified
        tip: String,
    },
    /// Link one chain to another
    Link {
        /// Owner address
        owner: String,
        /// Chain tip to extend
        tip: String,
        /// Tip of the chain to link
        linked: String,
    },
    /// Key management commands
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Generate a new signing key
    Generate {
        /// Key name (e.g., "aquachain-server-1")
        name: String,
        /// Output file for the secret key
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the address for a secret key
    Public {
        /// Read the secret key from a file
        #[arg(long)]
        file: Option<PathBuf>,
        /// Secret key value
        #[arg(long)]
        value: Option<String>,
        /// Read the secret key from AQUA_SIGNING_KEY
        #[arg(long, default_value_t = false)]
        env: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,aqua_chain=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Cli { config, command } = Cli::parse();

    if let Commands::Key { command } = command {
        return handle_key_command(command).await;
    }

    let config = load_config(&config)?;
    let signer = match &config.signing {
        Some(signing) => Some(load_signer(signing).await?),
        None => {
            tracing::debug!("No signing key configured");
            None
        }
    };
    let service = AquaChainService::from_config(&config, signer)
        .await
        .context("failed to initialize chain service")?;

    run(&service, command).await
}

async fn run(service: &AquaChainService, command: Commands) -> Result<()> {
    match command {
        Commands::Genesis {
            owner,
            path,
            name,
            form,
        } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let content = if form {
                let fields: serde_json::Map<String, serde_json::Value> =
                    serde_json::from_slice(&bytes).context("form must be a JSON object")?;
                GenesisContent::Form(fields)
            } else {
                GenesisContent::File(bytes)
            };
            let file_name = match name {
                Some(name) => name,
                None => default_file_name(&path)?,
            };
            let (tree, file) = service
                .create_genesis_tree(&owner, content, &file_name)
                .await?;
            print_json(&json!({ "aquaTree": tree, "fileObject": file }))
        }
        Commands::Transfer { tip, from, to } => {
            let source_tip = PubkeyHash::qualify(&tip, &from).to_string();
            let chain = service.fetch_chain(&source_tip).await?;
            let result = service.transfer_chain(&chain, &to, &from).await;
            print_json(&result)?;
            if !result.success {
                anyhow::bail!("transfer failed: {}", result.message);
            }
            Ok(())
        }
        Commands::Delete {
            hash,
            owner,
            from_latest,
            dry_run,
        } => {
            if dry_run {
                let requester = match owner {
                    Some(owner) => owner,
                    None => PubkeyHash::parse(&hash)
                        .context("--dry-run needs --owner or an owner-qualified hash")?
                        .owner()
                        .to_string(),
                };
                let allowed = service.can_delete(&hash, &requester).await;
                return print_json(&json!({ "hash": hash, "allowed": allowed }));
            }
            let result = service
                .delete_chain(&hash, owner.as_deref(), from_latest)
                .await;
            print_json(&result)?;
            if !result.success {
                anyhow::bail!("deletion failed: {}", result.message);
            }
            Ok(())
        }
        Commands::Order { hash, from_genesis } => {
            let ordered = if from_genesis {
                service.order_chain_from_genesis(&hash).await?
            } else {
                service.order_chain_from_latest(&hash).await?
            };
            print_json(&ordered)
        }
        Commands::CanDelete { hash, requester } => {
            let allowed = service.can_delete(&hash, &requester).await;
            print_json(&json!({ "hash": hash, "requester": requester, "allowed": allowed }))
        }
        Commands::Show { tip } => print_json(&service.fetch_chain(&tip).await?),
        Commands::Heads { owner } => {
            let heads: Vec<_> = service
                .list_latest(&owner)
                .await?
                .into_iter()
                .map(|head| {
                    json!({
                        "hash": head.hash,
                        "user": head.user,
                        "isWorkflow": head.is_workflow,
                        "templateId": head.template_id,
                    })
                })
                .collect();
            print_json(&heads)
        }
        Commands::Verify { tip } => {
            let logs = service.verify_chain(&tip).await?;
            print_json(&logs)
        }
        Commands::Sign { owner, tip } => print_json(&service.sign_chain(&owner, &tip).await?),
        Commands::Link {
            owner,
            tip,
            linked,
        } => print_json(&service.link_chain(&owner, &tip, &linked).await?),
        Commands::Key { command } => handle_key_command(command).await,
    }
}

async fn handle_key_command(command: KeyCommands) -> Result<()> {
    match command {
        KeyCommands::Generate { name, output } => {
            let signer = RevisionSigner::generate(&name);
            let secret_key = signer.secret_key_string();

            if let Some(path) = output {
                tokio::fs::write(&path, &secret_key)
                    .await
                    .with_context(|| format!("failed to write key to {}", path.display()))?;
                println!("Secret key written to: {}", path.display());
            } else {
                println!("Secret key:");
                println!("{secret_key}");
            }

            println!("\nAddress:");
            println!("{}", signer.address());
        }
        KeyCommands::Public { file, value, env } => {
            let secret_key = if let Some(path) = file {
                tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read key file: {}", path.display()))?
            } else if let Some(key) = value {
                key
            } else if env {
                std::env::var("AQUA_SIGNING_KEY")
                    .context("AQUA_SIGNING_KEY environment variable not set")?
            } else {
                anyhow::bail!("one of --file, --value, or --env is required");
            };

            let signer = RevisionSigner::from_secret_key_string(secret_key.trim())
                .context("failed to parse secret key")?;
            println!("{}", signer.address());
        }
    }
    Ok(())
}

/// Config file (optional) overlaid with `AQUA_` environment variables.
fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if path.exists() {
        tracing::debug!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("AQUA_").split("__").ignore(&["config", "signing_key"]))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(|msg| anyhow::anyhow!("invalid configuration: {msg}"))?;
    Ok(config)
}

async fn load_signer(config: &SigningConfig) -> Result<RevisionSigner> {
    match &config.private_key {
        PrivateKeyConfig::File { path } => {
            let key_data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read key file: {}", path.display()))?;
            let signer = RevisionSigner::from_secret_key_string(key_data.trim())
                .context("failed to parse signing key")?;
            tracing::info!("Loaded signing key: {}", signer.key_name());
            Ok(signer)
        }
        PrivateKeyConfig::Env { var } => {
            let key_data = std::env::var(var)
                .with_context(|| format!("signing key env var not set: {var}"))?;
            let signer = RevisionSigner::from_secret_key_string(key_data.trim())
                .context("failed to parse signing key")?;
            tracing::info!("Loaded signing key from env: {}", signer.key_name());
            Ok(signer)
        }
        PrivateKeyConfig::Generate => {
            tracing::warn!("Generating ephemeral signing key (not suitable for production)");
            let signer = RevisionSigner::generate(&config.key_name);
            tracing::info!("Generated signing key: {}", signer.key_name());
            Ok(signer)
        }
        PrivateKeyConfig::Value { key } => {
            tracing::warn!("Using inline signing key (not recommended for production)");
            let signer = RevisionSigner::from_secret_key_string(key.trim())
                .context("failed to parse signing key")?;
            tracing::info!("Loaded signing key: {}", signer.key_name());
            Ok(signer)
        }
    }
}

fn default_file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .with_context(|| format!("cannot derive a file name from {}", path.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
