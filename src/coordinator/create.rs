//! shardCollection coordinator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::catalog::{ConfigCatalog, NewCollection, ShardClient};
use crate::chunk::{KeyPattern, NamespaceString, ShardId};
use crate::common::{Error, Result};
use crate::coordinator::document::{CoordinatorId, CoordinatorKind, CoordinatorPhase, StateDocument};
use crate::coordinator::engine::{CoordinatorPolicy, PolicyDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CreatePhase {
    Unset,
    CheckArguments,
    Commit,
    FlushRoutingTables,
}

impl CoordinatorPhase for CreatePhase {
    const NOT_STARTED: Self = CreatePhase::Unset;

    fn next(self) -> Option<Self> {
        match self {
            CreatePhase::Unset => Some(CreatePhase::CheckArguments),
            CreatePhase::CheckArguments => Some(CreatePhase::Commit),
            CreatePhase::Commit => Some(CreatePhase::FlushRoutingTables),
            CreatePhase::FlushRoutingTables => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            CreatePhase::Unset => "unset",
            CreatePhase::CheckArguments => "checkArguments",
            CreatePhase::Commit => "commit",
            CreatePhase::FlushRoutingTables => "flushRoutingTables",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateParams {
    pub shard_key: KeyPattern,
    #[serde(default)]
    pub unique: bool,
    pub primary_shard: ShardId,
    /// Set once arguments are checked; reused if the commit runs again
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_uuid: Option<Uuid>,
    /// The collection was already sharded identically; nothing to do
    #[serde(default)]
    pub already_sharded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardCollectionRequest {
    pub ns: NamespaceString,
    pub key: KeyPattern,
    #[serde(default)]
    pub unique: bool,
    pub primary_shard: ShardId,
}

impl ShardCollectionRequest {
    pub fn id(&self) -> CoordinatorId {
        CoordinatorId::new(self.ns.clone(), CoordinatorKind::CreateCollection)
    }

    pub fn initial_document(&self) -> StateDocument<CreatePhase, CreateParams> {
        StateDocument::new(
            self.id(),
            CreateParams {
                shard_key: self.key.clone(),
                unique: self.unique,
                primary_shard: self.primary_shard.clone(),
                collection_uuid: None,
                already_sharded: false,
            },
        )
    }
}

pub struct CreateCollectionCoordinator {
    catalog: Arc<ConfigCatalog>,
    shards: Arc<dyn ShardClient>,
}

impl CreateCollectionCoordinator {
    pub fn new(catalog: Arc<ConfigCatalog>, shards: Arc<dyn ShardClient>) -> Self {
        Self { catalog, shards }
    }

    fn check_arguments(&self, ns: &NamespaceString, params: &mut CreateParams) -> Result<()> {
        if !self.shards.shard_ids().contains(&params.primary_shard) {
            return Err(Error::ShardNotFound(params.primary_shard.to_string()));
        }

        if let Some(existing) = self.catalog.collection(ns)? {
            if existing.key == params.shard_key && existing.unique == params.unique {
                params.already_sharded = true;
                params.collection_uuid = Some(existing.uuid);
                return Ok(());
            }
            return Err(Error::AlreadyInitialized(format!(
                "{} is already sharded with key {}",
                ns, existing.key
            )));
        }

        params.collection_uuid.get_or_insert_with(Uuid::new_v4);
        Ok(())
    }
}

#[async_trait]
impl CoordinatorPolicy for CreateCollectionCoordinator {
    type Phase = CreatePhase;
    type Params = CreateParams;

    const KIND: CoordinatorKind = CoordinatorKind::CreateCollection;

    fn check_if_options_conflict(&self, current: &CreateParams, requested: &CreateParams) -> Result<()> {
        if current.shard_key == requested.shard_key
            && current.unique == requested.unique
            && current.primary_shard == requested.primary_shard
        {
            return Ok(());
        }
        Err(Error::ConflictingOperationInProgress(format!(
            "another shardCollection with key {} is already running",
            current.shard_key
        )))
    }

    async fn run_phase(&self, phase: CreatePhase, doc: &mut PolicyDocument<Self>) -> Result<()> {
        let ns = doc.id.ns.clone();
        let params = &mut doc.params;
        match phase {
            CreatePhase::Unset => Ok(()),
            CreatePhase::CheckArguments => self.check_arguments(&ns, params),
            CreatePhase::Commit if params.already_sharded => Ok(()),
            CreatePhase::Commit => {
                let uuid = params.collection_uuid.ok_or_else(|| {
                    Error::Internal("create state document has no collection uuid".into())
                })?;
                self.catalog
                    .create_collection(NewCollection {
                        ns,
                        uuid,
                        key: params.shard_key.clone(),
                        unique: params.unique,
                        primary_shard: params.primary_shard.clone(),
                    })
                    .await?;
                Ok(())
            }
            CreatePhase::FlushRoutingTables => {
                self.shards
                    .flush_routing_table(&params.primary_shard, &ns)
                    .await
            }
        }
    }

    fn retains_document_on_failure(&self, phase: CreatePhase) -> bool {
        phase >= CreatePhase::Commit
    }
}
