//! Metadata document store
//!
//! Documents live in named collections keyed by a string id. Besides plain
//! reads and writes the store offers a conditional insert, which is how a
//! coordinator acquires exclusive ownership of its target, and atomic batches,
//! which the config authority uses to rewrite several chunks at once.
//!
//! Two backends:
//! - [`MemoryStore`]: mutex-guarded maps, for tests and ephemeral nodes
//! - [`RocksStore`]: one RocksDB column family per collection, JSON values

use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::common::{Config, Result, StorageBackend};

pub const CF_COLLECTIONS: &str = "config.collections";
pub const CF_CHUNKS: &str = "config.chunks";
pub const CF_COORDINATORS: &str = "config.system.sharding_ddl_coordinators";
pub const CF_SHARD_COLLECTIONS: &str = "config.cache.collections";

const ALL_COLLECTIONS: &[&str] = &[
    CF_COLLECTIONS,
    CF_CHUNKS,
    CF_COORDINATORS,
    CF_SHARD_COLLECTIONS,
];

/// A single write inside an atomic batch
#[derive(Debug, Clone)]
pub enum WriteOp {
    Put {
        collection: &'static str,
        id: String,
        doc: serde_json::Value,
    },
    Delete {
        collection: &'static str,
        id: String,
    },
}

impl WriteOp {
    pub fn put<T: Serialize>(collection: &'static str, id: impl Into<String>, doc: &T) -> Result<Self> {
        Ok(WriteOp::Put {
            collection,
            id: id.into(),
            doc: serde_json::to_value(doc)?,
        })
    }

    pub fn delete(collection: &'static str, id: impl Into<String>) -> Self {
        WriteOp::Delete {
            collection,
            id: id.into(),
        }
    }
}

/// Transactional key-value store for metadata documents
pub trait DocumentStore: Send + Sync {
    /// Insert only if no document with `id` exists. Returns whether it was inserted.
    fn insert_if_absent(&self, collection: &str, id: &str, doc: &serde_json::Value) -> Result<bool>;

    fn get(&self, collection: &str, id: &str) -> Result<Option<serde_json::Value>>;

    fn put(&self, collection: &str, id: &str, doc: &serde_json::Value) -> Result<()>;

    fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// All documents of a collection, ordered by id
    fn list(&self, collection: &str) -> Result<Vec<serde_json::Value>>;

    /// Apply every write or none of them
    fn apply(&self, ops: Vec<WriteOp>) -> Result<()>;
}

/// Typed helpers over any [`DocumentStore`]
pub trait DocumentStoreExt: DocumentStore {
    fn get_as<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>> {
        match self.get(collection, id)? {
            Some(value) => Ok(Some(decode(value)?)),
            None => Ok(None),
        }
    }

    fn put_as<T: Serialize>(&self, collection: &str, id: &str, doc: &T) -> Result<()> {
        self.put(collection, id, &serde_json::to_value(doc)?)
    }

    fn list_as<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        self.list(collection)?.into_iter().map(decode).collect()
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}

fn decode<T: DeserializeOwned>(value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| crate::Error::MetadataCorrupted(e.to_string()))
}

/// Open the backend selected by configuration
pub fn open_store(config: &Config) -> Result<Arc<dyn DocumentStore>> {
    match config.storage.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::Rocksdb => Ok(Arc::new(RocksStore::open(&config.storage.path)?)),
    }
}

// === In-memory backend ===

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, BTreeMap<String, serde_json::Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, BTreeMap<String, serde_json::Value>>> {
        self.collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DocumentStore for MemoryStore {
    fn insert_if_absent(&self, collection: &str, id: &str, doc: &serde_json::Value) -> Result<bool> {
        let mut guard = self.lock();
        let coll = guard.entry(collection.to_string()).or_default();
        if coll.contains_key(id) {
            return Ok(false);
        }
        coll.insert(id.to_string(), doc.clone());
        Ok(true)
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.lock().get(collection).and_then(|c| c.get(id)).cloned())
    }

    fn put(&self, collection: &str, id: &str, doc: &serde_json::Value) -> Result<()> {
        self.lock()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc.clone());
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<()> {
        if let Some(coll) = self.lock().get_mut(collection) {
            coll.remove(id);
        }
        Ok(())
    }

    fn list(&self, collection: &str) -> Result<Vec<serde_json::Value>> {
        Ok(self
            .lock()
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }

    fn apply(&self, ops: Vec<WriteOp>) -> Result<()> {
        let mut guard = self.lock();
        for op in ops {
            match op {
                WriteOp::Put { collection, id, doc } => {
                    guard.entry(collection.to_string()).or_default().insert(id, doc);
                }
                WriteOp::Delete { collection, id } => {
                    if let Some(coll) = guard.get_mut(collection) {
                        coll.remove(&id);
                    }
                }
            }
        }
        Ok(())
    }
}

// === RocksDB backend ===

pub struct RocksStore {
    db: DB,
    /// Serializes check-then-write sequences; RocksDB holds the directory lock
    /// so this process is the only writer.
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create the store
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = ALL_COLLECTIONS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn cf(&self, collection: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(collection)
            .ok_or_else(|| crate::Error::Internal(format!("unknown metadata collection {}", collection)))
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn decode_raw(bytes: &[u8]) -> Result<serde_json::Value> {
        serde_json::from_slice(bytes).map_err(|e| crate::Error::MetadataCorrupted(e.to_string()))
    }

    /// Flush to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl DocumentStore for RocksStore {
    fn insert_if_absent(&self, collection: &str, id: &str, doc: &serde_json::Value) -> Result<bool> {
        let cf = self.cf(collection)?;
        let _guard = self.guard();
        if self.db.get_pinned_cf(cf, id.as_bytes())?.is_some() {
            return Ok(false);
        }
        self.db.put_cf(cf, id.as_bytes(), serde_json::to_vec(doc)?)?;
        Ok(true)
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<serde_json::Value>> {
        let cf = self.cf(collection)?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode_raw(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&self, collection: &str, id: &str, doc: &serde_json::Value) -> Result<()> {
        let cf = self.cf(collection)?;
        let _guard = self.guard();
        self.db.put_cf(cf, id.as_bytes(), serde_json::to_vec(doc)?)?;
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let cf = self.cf(collection)?;
        let _guard = self.guard();
        self.db.delete_cf(cf, id.as_bytes())?;
        Ok(())
    }

    fn list(&self, collection: &str) -> Result<Vec<serde_json::Value>> {
        let cf = self.cf(collection)?;
        let mut docs = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            docs.push(Self::decode_raw(&value)?);
        }
        Ok(docs)
    }

    fn apply(&self, ops: Vec<WriteOp>) -> Result<()> {
        let mut batch = WriteBatch::default();
        for op in &ops {
            match op {
                WriteOp::Put { collection, id, doc } => {
                    batch.put_cf(self.cf(collection)?, id.as_bytes(), serde_json::to_vec(doc)?);
                }
                WriteOp::Delete { collection, id } => {
                    batch.delete_cf(self.cf(collection)?, id.as_bytes());
                }
            }
        }
        let _guard = self.guard();
        self.db.write(batch)?;
        Ok(())
    }
}
