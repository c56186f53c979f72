//! Chunk ownership model and the migration commit protocol
//!
//! - [`ChunkRange`] / [`KeyPattern`]: key-space intervals and shard keys
//! - [`ChunkVersion`]: epoch + timestamp + `(major, minor)` versioning
//! - [`CommitChunkMigrationRequest`]: the wire command that hands a range to another shard

pub mod commit;
pub mod range;
pub mod shard;
pub mod types;
pub mod version;

pub use commit::CommitChunkMigrationRequest;
pub use range::{ChunkRange, KeyPattern};
pub use shard::{NamespaceString, ShardId};
pub use types::{ChunkType, CollectionType, MigratedChunk, ShardCollectionType};
pub use version::{ChunkVersion, Epoch, LogicalClock, Timestamp, VersionOrdering};
