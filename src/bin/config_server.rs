//! Config server binary

use clap::{Parser, Subcommand};
use shardmeta::common::{Config, StorageBackend};
use shardmeta::ConfigServer;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "shardmeta-config")]
#[command(about = "shardmeta config server: chunk metadata authority and DDL coordinators")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start config server
    Serve {
        /// Node ID
        #[arg(long)]
        id: Option<String>,

        /// Bind address for HTTP
        #[arg(long)]
        bind: Option<String>,

        /// Metadata database directory
        #[arg(long)]
        db: Option<PathBuf>,

        /// Keep metadata in memory only
        #[arg(long)]
        memory: bool,

        /// Shard ids (comma-separated)
        #[arg(long, value_delimiter = ',')]
        shards: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config from file and environment, then override with CLI arguments
    let mut config = Config::load_from(cli.config.as_deref())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve {
            id,
            bind,
            db,
            memory,
            shards,
        } => {
            if let Some(id) = id {
                config.node_id = id;
            }
            if let Some(bind) = bind {
                config.bind_addr = bind.parse()?;
            }
            if let Some(db) = db {
                config.storage.path = db;
            }
            if memory {
                config.storage.backend = StorageBackend::Memory;
            }
            if !shards.is_empty() {
                config.shards = shards;
            }
            config.validate()?;

            ConfigServer::new(config).serve().await?;
        }
    }

    Ok(())
}
