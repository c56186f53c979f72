//! CLI for config server operations

use clap::{Parser, Subcommand};
use serde_json::Value;
use shardmeta::ops::ConfigClient;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "shardmeta")]
#[command(about = "shardmeta config server CLI")]
#[command(version)]
struct Cli {
    /// Config server URL
    #[arg(long, default_value = "http://localhost:27019")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show server health
    Health,

    /// Shard a collection
    Shard {
        /// Namespace (db.collection)
        ns: String,

        /// Shard key as JSON, e.g. '{"user": 1}'
        #[arg(long)]
        key: String,

        #[arg(long)]
        unique: bool,

        /// Primary shard (first configured shard if omitted)
        #[arg(long)]
        primary: Option<String>,
    },

    /// Refine a collection's shard key
    Refine {
        ns: String,

        /// New shard key as JSON; must extend the current key
        #[arg(long)]
        key: String,

        /// Expected collection UUID
        #[arg(long)]
        uuid: Option<uuid::Uuid>,

        /// Cancel the operation after this long (e.g. "30s")
        #[arg(long)]
        max_time: Option<String>,
    },

    /// Register an index usable as a shard key
    Index {
        ns: String,

        #[arg(long)]
        key: String,
    },

    /// Split the chunk containing a key
    Split {
        ns: String,

        /// Split point as JSON
        #[arg(long)]
        middle: String,
    },

    /// List running DDL coordinators
    CurrentOp {
        /// Include waiting and failed coordinators
        #[arg(long)]
        idle: bool,
    },

    /// Abort a running coordinator
    Abort {
        ns: String,

        /// refineCollectionShardKey | createCollection
        kind: String,

        #[arg(long, default_value = "aborted from CLI")]
        reason: String,
    },

    /// Show collection metadata and chunks
    Info { ns: String },
}

fn parse_json(arg: &str) -> anyhow::Result<Value> {
    serde_json::from_str(arg).map_err(|e| anyhow::anyhow!("invalid JSON '{}': {}", arg, e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let client = ConfigClient::new(&cli.server)?;

    let reply = match cli.command {
        Commands::Health => client.health().await?,
        Commands::Shard {
            ns,
            key,
            unique,
            primary,
        } => {
            client
                .shard_collection(&ns, &parse_json(&key)?, unique, primary.as_deref())
                .await?
        }
        Commands::Refine {
            ns,
            key,
            uuid,
            max_time,
        } => {
            let max_time: Option<Duration> = max_time
                .as_deref()
                .map(shardmeta::common::parse_duration)
                .transpose()?;
            client
                .refine_collection_shard_key(&ns, &parse_json(&key)?, uuid, max_time)
                .await?
        }
        Commands::Index { ns, key } => client.create_index(&ns, &parse_json(&key)?).await?,
        Commands::Split { ns, middle } => client.split_chunk(&ns, &parse_json(&middle)?).await?,
        Commands::CurrentOp { idle } => client.current_op(idle).await?,
        Commands::Abort { ns, kind, reason } => client.abort(&ns, &kind, &reason).await?,
        Commands::Info { ns } => client.collection(&ns).await?,
    };

    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}
