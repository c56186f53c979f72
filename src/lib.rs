//! # shardmeta
//!
//! Metadata control plane for a sharded document store:
//! - Chunk ownership with epoch-scoped `(major, minor)` versions
//! - The chunk migration commit protocol, accepted as a compare-and-swap
//!   over the collection version
//! - Recoverable DDL coordinators (shard a collection, refine its shard key)
//!   that persist their progress and resume after a restart
//! - RocksDB-backed metadata store, HTTP command and admin API
//!
//! ```text
//! ┌──────────────┐  commitChunkMigration   ┌──────────────────────────────┐
//! │ Donor shard  │ ──────────────────────▶ │ Config server                │
//! └──────────────┘                         │  - ConfigCatalog (authority) │
//! ┌──────────────┐  shardCollection /      │  - DdlCoordinatorService     │
//! │ Client / CLI │  refineShardKey         │  - RocksDB metadata store    │
//! └──────────────┘ ──────────────────────▶ └──────────────┬───────────────┘
//!                                                         │ flushRoutingTable
//!                                          ┌──────────────▼───────────────┐
//!                                          │ Shard routing caches         │
//!                                          └──────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start a config server
//! ```bash
//! shardmeta-config serve \
//!   --id config-1 \
//!   --bind 0.0.0.0:27019 \
//!   --db ./config-data \
//!   --shards shard0,shard1
//! ```
//!
//! ### Use the CLI
//! ```bash
//! shardmeta shard app.users --key '{"tenant": 1}'
//! shardmeta index app.users --key '{"tenant": 1, "user": 1}'
//! shardmeta refine app.users --key '{"tenant": 1, "user": 1}'
//! shardmeta current-op --idle
//! ```

#![allow(clippy::result_large_err)]

pub mod catalog;
pub mod chunk;
pub mod common;
pub mod coordinator;
pub mod ops;

// Re-export commonly used types
pub use common::{Config, Error, Result};
pub use coordinator::ConfigServer;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
