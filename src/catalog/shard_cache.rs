//! Shard-side routing caches
//!
//! Each shard keeps a cached copy of the collection metadata it routes with.
//! After a metadata change the config authority asks every affected shard to
//! drop its copy and reload from the authority.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::catalog::config_catalog::ConfigCatalog;
use crate::catalog::store::{DocumentStore, DocumentStoreExt, CF_SHARD_COLLECTIONS};
use crate::chunk::{NamespaceString, ShardCollectionType, ShardId};
use crate::common::{Error, Result};

/// Commands the config authority sends to shards
#[async_trait]
pub trait ShardClient: Send + Sync {
    fn shard_ids(&self) -> Vec<ShardId>;

    /// Force `shard` to reload its routing metadata for `ns`
    async fn flush_routing_table(&self, shard: &ShardId, ns: &NamespaceString) -> Result<()>;
}

/// In-process shard caches, persisted next to the authoritative catalog
pub struct ShardCacheRegistry {
    shards: BTreeSet<ShardId>,
    catalog: Arc<ConfigCatalog>,
    store: Arc<dyn DocumentStore>,
    flushes: AtomicU64,
}

impl ShardCacheRegistry {
    pub fn new(
        shards: impl IntoIterator<Item = ShardId>,
        catalog: Arc<ConfigCatalog>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            shards: shards.into_iter().collect(),
            catalog,
            store,
            flushes: AtomicU64::new(0),
        }
    }

    fn cache_key(shard: &ShardId, ns: &NamespaceString) -> String {
        format!("{}|{}", shard, ns)
    }

    /// What `shard` currently has cached for `ns`
    pub fn cached(&self, shard: &ShardId, ns: &NamespaceString) -> Result<Option<ShardCollectionType>> {
        self.store
            .get_as(CF_SHARD_COLLECTIONS, &Self::cache_key(shard, ns))
    }

    /// Number of flushes served since startup
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ShardClient for ShardCacheRegistry {
    fn shard_ids(&self) -> Vec<ShardId> {
        self.shards.iter().cloned().collect()
    }

    async fn flush_routing_table(&self, shard: &ShardId, ns: &NamespaceString) -> Result<()> {
        if !self.shards.contains(shard) {
            return Err(Error::ShardNotFound(shard.to_string()));
        }

        let key = Self::cache_key(shard, ns);
        match self.catalog.collection(ns)? {
            Some(coll) => {
                let version = self.catalog.shard_version(ns, shard)?;
                let entry = ShardCollectionType::from_collection(&coll, version);
                self.store.put_as(CF_SHARD_COLLECTIONS, &key, &entry)?;
                tracing::debug!("Shard {} refreshed {} at {}", shard, ns, version);
            }
            None => {
                self.store.delete(CF_SHARD_COLLECTIONS, &key)?;
                tracing::debug!("Shard {} dropped cached metadata for {}", shard, ns);
            }
        }

        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
