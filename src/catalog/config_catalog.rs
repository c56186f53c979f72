//! Config authority: the authoritative record of collections and chunk ownership
//!
//! All chunk-mutating operations take the chunk operation lock, so a commit,
//! split or refine always observes and replaces a consistent collection version.
//! Each mutation is written as one atomic batch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::catalog::store::{DocumentStore, DocumentStoreExt, WriteOp, CF_CHUNKS, CF_COLLECTIONS};
use crate::chunk::{
    ChunkRange, ChunkType, ChunkVersion, CollectionType, CommitChunkMigrationRequest, Epoch,
    KeyPattern, LogicalClock, NamespaceString, ShardId, VersionOrdering,
};
use crate::common::document::{compare_documents, Document};
use crate::common::{Error, Result};

/// Parameters for registering a new sharded collection
#[derive(Debug, Clone)]
pub struct NewCollection {
    pub ns: NamespaceString,
    pub uuid: Uuid,
    pub key: KeyPattern,
    pub unique: bool,
    pub primary_shard: ShardId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitChunkMigrationResponse {
    pub collection_version: ChunkVersion,
    pub migrated_chunk_version: ChunkVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_chunk_version: Option<ChunkVersion>,
}

pub struct ConfigCatalog {
    store: Arc<dyn DocumentStore>,
    clock: Arc<LogicalClock>,
    chunk_op_lock: Mutex<()>,
}

impl ConfigCatalog {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<LogicalClock>) -> Self {
        Self {
            store,
            clock,
            chunk_op_lock: Mutex::new(()),
        }
    }

    // === Reads ===

    pub fn collection(&self, ns: &NamespaceString) -> Result<Option<CollectionType>> {
        self.store.get_as(CF_COLLECTIONS, ns.as_str())
    }

    /// The collection record, or `NamespaceNotSharded`
    pub fn sharded_collection(&self, ns: &NamespaceString) -> Result<CollectionType> {
        self.collection(ns)?
            .ok_or_else(|| Error::NamespaceNotSharded(ns.to_string()))
    }

    /// Chunks of `ns` ordered by range
    pub fn chunks(&self, ns: &NamespaceString) -> Result<Vec<ChunkType>> {
        let mut chunks: Vec<ChunkType> = self
            .store
            .list_as::<ChunkType>(CF_CHUNKS)?
            .into_iter()
            .filter(|c| &c.ns == ns)
            .collect();
        chunks.sort_by(|a, b| compare_documents(a.range.min(), b.range.min()));
        Ok(chunks)
    }

    /// Highest chunk version of the collection
    pub fn collection_version(&self, ns: &NamespaceString) -> Result<ChunkVersion> {
        let coll = self.sharded_collection(ns)?;
        Ok(Self::max_version(&coll, self.chunks(ns)?.iter()))
    }

    /// Highest chunk version among the chunks `shard` owns, `(0, 0)` if none
    pub fn shard_version(&self, ns: &NamespaceString, shard: &ShardId) -> Result<ChunkVersion> {
        let coll = self.sharded_collection(ns)?;
        let chunks = self.chunks(ns)?;
        Ok(Self::max_version(
            &coll,
            chunks.iter().filter(|c| &c.shard == shard),
        ))
    }

    pub fn shards_owning(&self, ns: &NamespaceString) -> Result<BTreeSet<ShardId>> {
        Ok(self.chunks(ns)?.into_iter().map(|c| c.shard).collect())
    }

    fn max_version<'a>(
        coll: &CollectionType,
        chunks: impl Iterator<Item = &'a ChunkType>,
    ) -> ChunkVersion {
        chunks
            .map(|c| c.lastmod)
            .max_by_key(|v| (v.major, v.minor))
            .unwrap_or_else(|| ChunkVersion::new(0, 0, coll.epoch, coll.timestamp))
    }

    // === Mutations ===

    /// Register `ns` as sharded with a single chunk on the primary shard.
    /// Re-registering with the same UUID returns the existing record.
    pub async fn create_collection(&self, new: NewCollection) -> Result<CollectionType> {
        let _lock = self.chunk_op_lock.lock().await;

        if let Some(existing) = self.collection(&new.ns)? {
            if existing.uuid == new.uuid {
                return Ok(existing);
            }
            return Err(Error::AlreadyInitialized(format!(
                "{} is already sharded with key {}",
                new.ns, existing.key
            )));
        }

        let coll = CollectionType {
            ns: new.ns.clone(),
            uuid: new.uuid,
            epoch: Epoch::generate(),
            timestamp: self.clock.tick(),
            key: new.key.clone(),
            unique: new.unique,
            indexes: vec![new.key.clone()],
            allow_migrations: true,
        };
        let range = ChunkRange::new(new.key.global_min(), new.key.global_max())?;
        let chunk = ChunkType::new(
            new.ns.clone(),
            range,
            new.primary_shard.clone(),
            ChunkVersion::new(1, 0, coll.epoch, coll.timestamp),
        );

        self.store.apply(vec![
            WriteOp::put(CF_COLLECTIONS, coll.ns.as_str(), &coll)?,
            WriteOp::put(CF_CHUNKS, chunk.id.to_string(), &chunk)?,
        ])?;

        tracing::info!(
            "Sharded {} with key {} (epoch {}, primary {})",
            coll.ns,
            coll.key,
            coll.epoch,
            new.primary_shard
        );
        Ok(coll)
    }

    pub async fn add_index(&self, ns: &NamespaceString, index: KeyPattern) -> Result<CollectionType> {
        let _lock = self.chunk_op_lock.lock().await;
        let mut coll = self.sharded_collection(ns)?;
        if !coll.indexes.contains(&index) {
            coll.indexes.push(index);
            self.store.put_as(CF_COLLECTIONS, ns.as_str(), &coll)?;
        }
        Ok(coll)
    }

    pub async fn set_allow_migrations(&self, ns: &NamespaceString, allow: bool) -> Result<()> {
        let _lock = self.chunk_op_lock.lock().await;
        let mut coll = self.sharded_collection(ns)?;
        coll.allow_migrations = allow;
        self.store.put_as(CF_COLLECTIONS, ns.as_str(), &coll)
    }

    /// Split the chunk containing `split_point` in two. Both halves get new
    /// minor versions above the current collection version.
    pub async fn split_chunk(&self, ns: &NamespaceString, split_point: Document) -> Result<ChunkVersion> {
        let _lock = self.chunk_op_lock.lock().await;
        let coll = self.sharded_collection(ns)?;
        let chunks = self.chunks(ns)?;
        let mut version = Self::max_version(&coll, chunks.iter());

        let target = chunks
            .iter()
            .find(|c| c.range.contains_key(&split_point))
            .ok_or_else(|| {
                Error::InvalidOptions(format!("no chunk of {} contains the split point", ns))
            })?;
        if compare_documents(target.range.min(), &split_point).is_eq() {
            return Err(Error::InvalidOptions(
                "split point is already a chunk boundary".into(),
            ));
        }

        let mut left = target.clone();
        left.range = ChunkRange::new(target.range.min().clone(), split_point.clone())?;
        version.inc_minor();
        left.lastmod = version;

        let mut right = ChunkType::new(
            ns.clone(),
            ChunkRange::new(split_point, target.range.max().clone())?,
            target.shard.clone(),
            version,
        );
        version.inc_minor();
        right.lastmod = version;

        self.store.apply(vec![
            WriteOp::put(CF_CHUNKS, left.id.to_string(), &left)?,
            WriteOp::put(CF_CHUNKS, right.id.to_string(), &right)?,
        ])?;

        tracing::debug!("Split {} chunk {} at version {}", ns, target.range, version);
        Ok(version)
    }

    /// Move ownership of the migrated chunk from the donor to the recipient.
    ///
    /// The commit is accepted only if the donor's view of the collection
    /// version is current. A re-sent commit that already took effect is
    /// answered with the current versions.
    pub async fn commit_chunk_migration(
        &self,
        request: &CommitChunkMigrationRequest,
    ) -> Result<CommitChunkMigrationResponse> {
        let _lock = self.chunk_op_lock.lock().await;
        let ns = &request.nss;
        let coll = self.sharded_collection(ns)?;
        let received = request.from_shard_collection_version;

        if coll.epoch != received.epoch || coll.timestamp != received.timestamp {
            return Err(Error::StaleEpoch {
                ns: ns.to_string(),
                expected: coll.epoch.to_string(),
                actual: received.epoch.to_string(),
            });
        }
        if !request.is_same_epoch() {
            return Err(Error::StaleEpoch {
                ns: ns.to_string(),
                expected: coll.epoch.to_string(),
                actual: request.migrated_chunk.version.epoch.to_string(),
            });
        }
        if request.from_shard == request.to_shard {
            return Err(Error::InvalidOptions(
                "donor and recipient shard must differ".into(),
            ));
        }
        if !coll.allow_migrations {
            return Err(Error::ConflictingOperationInProgress(format!(
                "migrations are currently disallowed for {}",
                ns
            )));
        }

        let mut chunks = self.chunks(ns)?;
        let current = Self::max_version(&coll, chunks.iter());
        let range = &request.migrated_chunk.range;

        if let Some(done) = chunks
            .iter()
            .find(|c| &c.range == range && c.shard == request.to_shard)
        {
            if done.lastmod.compare(&received) == VersionOrdering::Greater {
                tracing::info!(
                    "Commit of {} {} to {} already applied",
                    ns,
                    range,
                    request.to_shard
                );
                return Ok(CommitChunkMigrationResponse {
                    collection_version: current,
                    migrated_chunk_version: done.lastmod,
                    control_chunk_version: None,
                });
            }
        }

        if received.compare(&current) != VersionOrdering::Equal {
            return Err(Error::StaleConfig {
                ns: ns.to_string(),
                received: received.to_string(),
                wanted: current.to_string(),
            });
        }

        let idx = chunks
            .iter()
            .position(|c| &c.range == range)
            .ok_or_else(|| {
                Error::IncompatibleShardingMetadata(format!("no chunk {} in {}", range, ns))
            })?;
        if chunks[idx].shard != request.from_shard {
            return Err(Error::IncompatibleShardingMetadata(format!(
                "chunk {} is owned by {}, not {}",
                range, chunks[idx].shard, request.from_shard
            )));
        }
        if chunks[idx].lastmod != request.migrated_chunk.version {
            return Err(Error::StaleConfig {
                ns: ns.to_string(),
                received: request.migrated_chunk.version.to_string(),
                wanted: chunks[idx].lastmod.to_string(),
            });
        }

        let mut new_version = current;
        new_version.inc_major();

        let mut writes = Vec::with_capacity(2);
        let migrated = &mut chunks[idx];
        migrated.shard = request.to_shard.clone();
        migrated.lastmod = new_version;
        let migrated_id = migrated.id;
        writes.push(WriteOp::put(CF_CHUNKS, migrated_id.to_string(), &*migrated)?);

        let mut control_version = None;
        if let Some(control) = chunks
            .iter_mut()
            .find(|c| c.shard == request.from_shard && c.id != migrated_id)
        {
            let mut v = new_version;
            v.inc_minor();
            control.lastmod = v;
            control_version = Some(v);
            writes.push(WriteOp::put(CF_CHUNKS, control.id.to_string(), &*control)?);
        }

        self.store.apply(writes)?;
        if let Some(ts) = request.valid_after {
            if !self.clock.advance(ts) {
                tracing::warn!("Ignoring validAfter {} from {}: too far ahead", ts, request.from_shard);
            }
        }

        tracing::info!(
            "Committed migration of {} {} from {} to {} at version {}",
            ns,
            range,
            request.from_shard,
            request.to_shard,
            new_version
        );

        Ok(CommitChunkMigrationResponse {
            collection_version: control_version.unwrap_or(new_version),
            migrated_chunk_version: new_version,
            control_chunk_version: control_version,
        })
    }

    /// Replace the shard key with `new_key` under a new epoch.
    ///
    /// Chunk bounds are padded to the new key and every chunk is reversioned
    /// into the new epoch, keeping its `(major, minor)`. Calling again after
    /// the key was already replaced is a no-op.
    pub async fn refine_shard_key(
        &self,
        ns: &NamespaceString,
        new_key: &KeyPattern,
        expected_epoch: Epoch,
    ) -> Result<CollectionType> {
        let _lock = self.chunk_op_lock.lock().await;
        let mut coll = self.sharded_collection(ns)?;

        if &coll.key == new_key {
            return Ok(coll);
        }
        if coll.epoch != expected_epoch {
            return Err(Error::StaleEpoch {
                ns: ns.to_string(),
                expected: expected_epoch.to_string(),
                actual: coll.epoch.to_string(),
            });
        }

        coll.epoch = Epoch::generate();
        coll.timestamp = self.clock.tick();
        coll.key = new_key.clone();

        let mut writes = vec![WriteOp::put(CF_COLLECTIONS, ns.as_str(), &coll)?];
        for mut chunk in self.chunks(ns)? {
            chunk.range = chunk.range.extend_to(new_key);
            chunk.lastmod = ChunkVersion::new(
                chunk.lastmod.major,
                chunk.lastmod.minor,
                coll.epoch,
                coll.timestamp,
            );
            writes.push(WriteOp::put(CF_CHUNKS, chunk.id.to_string(), &chunk)?);
        }
        self.store.apply(writes)?;

        tracing::info!(
            "Refined shard key of {} to {} (epoch {} -> {})",
            ns,
            new_key,
            expected_epoch,
            coll.epoch
        );
        Ok(coll)
    }
}
