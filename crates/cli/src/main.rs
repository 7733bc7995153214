//! Command-line client for the pinfile registry.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pinfile_core::{Timestamp, TimestampPolicy};
use pinfile_registry::{FileRegistry, RegistryError};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG_PATH: &str = "pinfile.toml";

#[derive(Parser, Debug)]
#[command(name = "pinfile")]
#[command(about = "Store files in IPFS and track them by name")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "PINFILE_CONFIG")]
    config: Option<PathBuf>,

    /// Keyspace name (overrides config)
    #[arg(long)]
    keyspace: Option<String>,

    /// Keyspace suffix (overrides config)
    #[arg(long)]
    keyspace_suffix: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the keyspace and its table if missing
    Init,
    /// Drop the keyspace and every file record in it
    DropKeyspace {
        /// Confirm the drop
        #[arg(long)]
        yes: bool,
    },
    /// Upload a local file
    Upload {
        /// Local file to upload
        path: PathBuf,
        /// Registered name (default: the file's name)
        #[arg(short, long)]
        name: Option<String>,
        /// Timestamp in seconds since the epoch (default: now)
        #[arg(short, long)]
        timestamp: Option<f64>,
    },
    /// Download a file to a local path
    Download {
        name: String,
        dest: PathBuf,
    },
    /// Register another name for an existing file's content
    Link {
        src: String,
        dst: String,
        /// Timestamp for the new name in seconds since the epoch
        #[arg(short, long, conflicts_with = "copy_timestamp")]
        timestamp: Option<f64>,
        /// Reuse the source file's timestamp
        #[arg(long)]
        copy_timestamp: bool,
    },
    /// Delete a file and unpin its content
    Delete { name: String },
    /// Check whether a file is registered
    Exists { name: String },
    /// Print a file's timestamp
    Timestamp { name: String },
    /// Set a file's timestamp to now
    Touch { name: String },
    /// Print the content id registered for a file
    Cid { name: String },
    /// Check connectivity to the metadata store and content backend
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let explicit = cli.config.is_some();
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut config = config::load_config(Some(&path), explicit)?;
    if let Some(name) = cli.keyspace.clone() {
        config.keyspace.name = name;
    }
    if let Some(suffix) = cli.keyspace_suffix.clone() {
        config.keyspace.suffix = suffix;
    }

    let registry = pinfile_registry::from_config(&config)
        .await
        .context("failed to initialize registry")?;

    let output = execute(&registry, cli.command).await?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

/// Run one command against the registry and return what to print.
async fn execute(registry: &FileRegistry, command: Command) -> Result<String> {
    match command {
        Command::Init => {
            registry.init_keyspace().await?;
            Ok(format!("keyspace {} ready", registry.keyspace()))
        }
        Command::DropKeyspace { yes } => {
            if !yes {
                anyhow::bail!(
                    "refusing to drop keyspace {} without --yes",
                    registry.keyspace()
                );
            }
            registry.drop_keyspace().await?;
            Ok(format!("keyspace {} dropped", registry.keyspace()))
        }
        Command::Upload {
            path,
            name,
            timestamp,
        } => {
            let name = match name {
                Some(name) => name,
                None => path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .with_context(|| format!("cannot derive a name from {}", path.display()))?,
            };
            let outcome = registry.upload(&path, &name, timestamp).await?;
            if outcome.applied {
                Ok(format!("{name} {}", outcome.content_id))
            } else {
                anyhow::bail!("{name} already exists; uploaded content left unreferenced");
            }
        }
        Command::Download { name, dest } => {
            let content_id = registry.download(&name, &dest).await?;
            Ok(format!("{name} {content_id} -> {}", dest.display()))
        }
        Command::Link {
            src,
            dst,
            timestamp,
            copy_timestamp,
        } => {
            let policy = if copy_timestamp {
                TimestampPolicy::CopySource
            } else if let Some(secs) = timestamp {
                TimestampPolicy::Explicit(Timestamp::new(secs)?)
            } else {
                TimestampPolicy::Now
            };
            let outcome = registry.link(&src, &dst, policy).await?;
            if outcome.applied {
                Ok(format!("{dst} {}", outcome.content_id))
            } else {
                anyhow::bail!("{dst} already exists");
            }
        }
        Command::Delete { name } => {
            let outcome = registry.delete(&name).await?;
            if !outcome.applied {
                return Ok(format!("{name} was already deleted"));
            }
            if outcome.unpinned {
                Ok(format!("{name} deleted, {} unpinned", outcome.content_id))
            } else {
                Ok(format!(
                    "{name} deleted, {} could not be unpinned",
                    outcome.content_id
                ))
            }
        }
        Command::Exists { name } => Ok(registry.exists(&name).await?.to_string()),
        Command::Timestamp { name } => match registry.get_timestamp(&name).await? {
            Some(timestamp) => Ok(timestamp.to_string()),
            None => Err(not_found(&name)),
        },
        Command::Touch { name } => {
            if registry.update_timestamp(&name).await? {
                Ok(String::new())
            } else {
                Err(not_found(&name))
            }
        }
        Command::Cid { name } => match registry.content_id(&name).await? {
            Some(content_id) => Ok(content_id.to_string()),
            None => Err(not_found(&name)),
        },
        Command::Health => {
            registry.health_check().await?;
            Ok("ok".to_string())
        }
    }
}

fn not_found(name: &str) -> anyhow::Error {
    RegistryError::FileNotFound {
        filename: name.to_string(),
    }
    .into()
}
