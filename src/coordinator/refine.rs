//! refineCollectionShardKey coordinator
//!
//! Extends a collection's shard key with suffix fields, e.g. `{x: 1}` to
//! `{x: 1, y: 1}`. The new epoch is durable in the catalog before any shard
//! is told to refresh, so a shard can never load the new key under the old
//! epoch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::catalog::{ConfigCatalog, ShardClient};
use crate::chunk::{Epoch, KeyPattern, NamespaceString};
use crate::common::{Error, Result};
use crate::coordinator::document::{CoordinatorId, CoordinatorKind, CoordinatorPhase, StateDocument};
use crate::coordinator::engine::{CoordinatorPolicy, PolicyDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RefinePhase {
    Unset,
    CheckPreconditions,
    CommitMetadata,
    FlushRoutingTables,
}

impl CoordinatorPhase for RefinePhase {
    const NOT_STARTED: Self = RefinePhase::Unset;

    fn next(self) -> Option<Self> {
        match self {
            RefinePhase::Unset => Some(RefinePhase::CheckPreconditions),
            RefinePhase::CheckPreconditions => Some(RefinePhase::CommitMetadata),
            RefinePhase::CommitMetadata => Some(RefinePhase::FlushRoutingTables),
            RefinePhase::FlushRoutingTables => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            RefinePhase::Unset => "unset",
            RefinePhase::CheckPreconditions => "checkPreconditions",
            RefinePhase::CommitMetadata => "commitMetadata",
            RefinePhase::FlushRoutingTables => "flushRoutingTables",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineParams {
    pub new_shard_key: KeyPattern,
    /// Expected collection UUID supplied by the caller
    #[serde(rename = "collectionUUID", default, skip_serializing_if = "Option::is_none")]
    pub collection_uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_shard_key: Option<KeyPattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_epoch: Option<Epoch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
}

/// Client-facing refine request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineCollectionShardKeyRequest {
    pub ns: NamespaceString,
    pub key: KeyPattern,
    #[serde(rename = "collectionUUID", default)]
    pub collection_uuid: Option<Uuid>,
}

impl RefineCollectionShardKeyRequest {
    pub fn id(&self) -> CoordinatorId {
        CoordinatorId::new(self.ns.clone(), CoordinatorKind::RefineCollectionShardKey)
    }

    pub fn initial_document(&self) -> StateDocument<RefinePhase, RefineParams> {
        StateDocument::new(
            self.id(),
            RefineParams {
                new_shard_key: self.key.clone(),
                collection_uuid: self.collection_uuid,
                old_shard_key: None,
                old_epoch: None,
                uuid: None,
            },
        )
    }
}

pub struct RefineShardKeyCoordinator {
    catalog: Arc<ConfigCatalog>,
    shards: Arc<dyn ShardClient>,
}

impl RefineShardKeyCoordinator {
    pub fn new(catalog: Arc<ConfigCatalog>, shards: Arc<dyn ShardClient>) -> Self {
        Self { catalog, shards }
    }

    fn check_preconditions(&self, ns: &NamespaceString, params: &mut RefineParams) -> Result<()> {
        let coll = self.catalog.sharded_collection(ns)?;

        if let Some(expected) = params.collection_uuid {
            if expected != coll.uuid {
                return Err(Error::CollectionUuidMismatch {
                    ns: ns.to_string(),
                    expected: expected.to_string(),
                    actual: coll.uuid.to_string(),
                });
            }
        }

        let new_key = &params.new_shard_key;
        if !coll.key.is_prefix_of(new_key) {
            return Err(Error::InvalidOptions(format!(
                "new shard key {} does not extend the current shard key {}",
                new_key, coll.key
            )));
        }
        if !coll.has_supporting_index(new_key) {
            return Err(Error::InvalidOptions(format!(
                "refining the shard key of {} requires an index on {}",
                ns, new_key
            )));
        }

        params.old_shard_key = Some(coll.key);
        params.old_epoch = Some(coll.epoch);
        params.uuid = Some(coll.uuid);
        Ok(())
    }

    async fn flush_routing_tables(&self, ns: &NamespaceString) -> Result<()> {
        let shards = self.catalog.shards_owning(ns)?;
        let flushes = shards
            .iter()
            .map(|shard| self.shards.flush_routing_table(shard, ns));
        for result in futures_util::future::join_all(flushes).await {
            result?;
        }
        tracing::debug!("Flushed routing tables of {} on {} shards", ns, shards.len());
        Ok(())
    }
}

#[async_trait]
impl CoordinatorPolicy for RefineShardKeyCoordinator {
    type Phase = RefinePhase;
    type Params = RefineParams;

    const KIND: CoordinatorKind = CoordinatorKind::RefineCollectionShardKey;

    fn check_if_options_conflict(&self, current: &RefineParams, requested: &RefineParams) -> Result<()> {
        if current.new_shard_key == requested.new_shard_key
            && current.collection_uuid == requested.collection_uuid
        {
            return Ok(());
        }
        Err(Error::ConflictingOperationInProgress(format!(
            "another refineCollectionShardKey to {} is already running",
            current.new_shard_key
        )))
    }

    async fn run_phase(&self, phase: RefinePhase, doc: &mut PolicyDocument<Self>) -> Result<()> {
        let ns = doc.id.ns.clone();
        match phase {
            RefinePhase::Unset => Ok(()),
            RefinePhase::CheckPreconditions => self.check_preconditions(&ns, &mut doc.params),
            RefinePhase::CommitMetadata => {
                let old_epoch = doc.params.old_epoch.ok_or_else(|| {
                    Error::Internal("refine state document has no old epoch".into())
                })?;
                self.catalog
                    .refine_shard_key(&ns, &doc.params.new_shard_key, old_epoch)
                    .await?;
                Ok(())
            }
            RefinePhase::FlushRoutingTables => self.flush_routing_tables(&ns).await,
        }
    }

    fn retains_document_on_failure(&self, phase: RefinePhase) -> bool {
        phase >= RefinePhase::CommitMetadata
    }
}
