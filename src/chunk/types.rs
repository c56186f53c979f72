//! Persisted metadata records held by the config authority

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ChunkRange, ChunkVersion, Epoch, KeyPattern, NamespaceString, ShardId, Timestamp};

/// One chunk: a key range owned by exactly one shard at a given version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkType {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub ns: NamespaceString,
    pub range: ChunkRange,
    pub shard: ShardId,
    pub lastmod: ChunkVersion,
}

impl ChunkType {
    pub fn new(ns: NamespaceString, range: ChunkRange, shard: ShardId, lastmod: ChunkVersion) -> Self {
        Self {
            id: Uuid::new_v4(),
            ns,
            range,
            shard,
            lastmod,
        }
    }
}

/// Range plus version, the chunk shape carried by the migration commit command.
#[derive(Debug, Clone, PartialEq)]
pub struct MigratedChunk {
    pub range: ChunkRange,
    pub version: ChunkVersion,
}

impl MigratedChunk {
    pub fn new(range: ChunkRange, version: ChunkVersion) -> Self {
        Self { range, version }
    }
}

/// Authoritative description of a sharded collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionType {
    #[serde(rename = "_id")]
    pub ns: NamespaceString,
    pub uuid: Uuid,
    pub epoch: Epoch,
    pub timestamp: Timestamp,
    pub key: KeyPattern,
    #[serde(default)]
    pub unique: bool,
    /// Indexes available on the collection, used to validate shard keys
    #[serde(default)]
    pub indexes: Vec<KeyPattern>,
    #[serde(default = "default_allow_migrations")]
    pub allow_migrations: bool,
}

fn default_allow_migrations() -> bool {
    true
}

impl CollectionType {
    /// Is there an index whose leading fields are exactly `key`?
    pub fn has_supporting_index(&self, key: &KeyPattern) -> bool {
        self.indexes.iter().any(|index| key.is_prefix_of(index))
    }
}

/// Shard-local cached view of a collection's routing metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardCollectionType {
    #[serde(rename = "_id")]
    pub ns: NamespaceString,
    pub uuid: Uuid,
    pub epoch: Epoch,
    pub timestamp: Timestamp,
    pub key_pattern: KeyPattern,
    pub unique: bool,
    #[serde(default = "default_allow_migrations")]
    pub allow_migrations: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refreshed_collection_version: Option<ChunkVersion>,
}

impl ShardCollectionType {
    pub fn from_collection(coll: &CollectionType, version: ChunkVersion) -> Self {
        Self {
            ns: coll.ns.clone(),
            uuid: coll.uuid,
            epoch: coll.epoch,
            timestamp: coll.timestamp,
            key_pattern: coll.key.clone(),
            unique: coll.unique,
            allow_migrations: coll.allow_migrations,
            last_refreshed_collection_version: Some(version),
        }
    }
}
