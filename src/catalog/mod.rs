//! Config authority catalog: metadata store, collections, chunks, shard caches

pub mod config_catalog;
pub mod shard_cache;
pub mod store;

pub use config_catalog::{CommitChunkMigrationResponse, ConfigCatalog, NewCollection};
pub use shard_cache::{ShardCacheRegistry, ShardClient};
pub use store::{
    open_store, DocumentStore, DocumentStoreExt, MemoryStore, RocksStore, WriteOp, CF_CHUNKS,
    CF_COLLECTIONS, CF_COORDINATORS, CF_SHARD_COLLECTIONS,
};
