//! DDL coordinator service
//!
//! Owns every coordinator running in this process. Ownership of a
//! `(namespace, kind)` pair is acquired by conditionally inserting its state
//! document into the metadata store; the in-memory registry only lets
//! repeated requests join an instance that is already running here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::catalog::{ConfigCatalog, DocumentStore, ShardClient, CF_COORDINATORS};
use crate::common::{Error, Result};
use crate::coordinator::create::{CreateCollectionCoordinator, ShardCollectionRequest};
use crate::coordinator::document::{
    peek_kind, peek_status, CoordinatorId, CoordinatorKind, CoordinatorStatus, StateDocument,
};
use crate::coordinator::engine::{
    CoordinatorHandle, CoordinatorInstance, CurrentOpMode, CurrentOpReport, EngineSettings,
    RecoverableCoordinator,
};
use crate::coordinator::refine::{RefineCollectionShardKeyRequest, RefineShardKeyCoordinator};

/// A DDL operation a client can ask for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum DdlRequest {
    RefineCollectionShardKey(RefineCollectionShardKeyRequest),
    ShardCollection(ShardCollectionRequest),
}

impl DdlRequest {
    pub fn id(&self) -> CoordinatorId {
        match self {
            DdlRequest::RefineCollectionShardKey(req) => req.id(),
            DdlRequest::ShardCollection(req) => req.id(),
        }
    }

    fn initial_document(&self) -> Result<serde_json::Value> {
        match self {
            DdlRequest::RefineCollectionShardKey(req) => req.initial_document().to_value(),
            DdlRequest::ShardCollection(req) => req.initial_document().to_value(),
        }
    }
}

type Registry = HashMap<CoordinatorId, Arc<dyn CoordinatorInstance>>;

pub struct DdlCoordinatorService {
    store: Arc<dyn DocumentStore>,
    catalog: Arc<ConfigCatalog>,
    shards: Arc<dyn ShardClient>,
    settings: EngineSettings,
    default_timeout: Option<Duration>,
    instances: Mutex<Registry>,
    shutdown: CancellationToken,
}

impl DdlCoordinatorService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        catalog: Arc<ConfigCatalog>,
        shards: Arc<dyn ShardClient>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            catalog,
            shards,
            settings,
            default_timeout: None,
            instances: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.instances.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Build the coordinator for a raw state document, selected by its kind
    fn instantiate(&self, raw: serde_json::Value) -> Result<Arc<dyn CoordinatorInstance>> {
        let shutdown = self.shutdown.child_token();
        let instance: Arc<dyn CoordinatorInstance> = match peek_kind(&raw)? {
            CoordinatorKind::RefineCollectionShardKey => RecoverableCoordinator::new(
                RefineShardKeyCoordinator::new(self.catalog.clone(), self.shards.clone()),
                StateDocument::from_value(raw)?,
                self.store.clone(),
                self.settings,
                shutdown,
            ),
            CoordinatorKind::CreateCollection => RecoverableCoordinator::new(
                CreateCollectionCoordinator::new(self.catalog.clone(), self.shards.clone()),
                StateDocument::from_value(raw)?,
                self.store.clone(),
                self.settings,
                shutdown,
            ),
        };
        Ok(instance)
    }

    /// Any document of another kind on the same namespace blocks this one
    fn check_other_kinds(&self, id: &CoordinatorId) -> Result<()> {
        for raw in self.store.list(CF_COORDINATORS)? {
            let Some(other) = raw
                .get("_id")
                .cloned()
                .and_then(|v| serde_json::from_value::<CoordinatorId>(v).ok())
            else {
                continue;
            };
            if other.ns == id.ns && other.kind != id.kind {
                return Err(Error::ConflictingOperationInProgress(format!(
                    "{} is in progress on {}",
                    other.kind, id.ns
                )));
            }
        }
        Ok(())
    }

    /// Start `request`, or join the coordinator already running it.
    ///
    /// A request with different parameters than the running coordinator for
    /// the same namespace fails with `ConflictingOperationInProgress` and the
    /// existing state document is left as it is. A matching request on a
    /// retained failed document resumes it from its last completed phase.
    pub fn start(&self, request: DdlRequest) -> Result<CoordinatorHandle> {
        if self.shutdown.is_cancelled() {
            return Err(Error::Interrupted("coordinator service is shutting down".into()));
        }

        let id = request.id();
        let requested = request.initial_document()?;
        let mut registry = self.registry();

        if let Some(existing) = registry.get(&id) {
            if !existing.is_finished() {
                existing.check_if_options_conflict(&requested)?;
                tracing::debug!("Joining running coordinator {}", id);
                return Ok(existing.handle());
            }
        }

        self.check_other_kinds(&id)?;

        let instance = if self.store.insert_if_absent(CF_COORDINATORS, &id.key(), &requested)? {
            tracing::info!("Starting coordinator {}", id);
            self.instantiate(requested)?
        } else {
            let existing = self.store.get(CF_COORDINATORS, &id.key())?.ok_or_else(|| {
                Error::ConflictingOperationInProgress(format!("{} is being released", id))
            })?;
            let instance = self.instantiate(existing)?;
            instance.check_if_options_conflict(&requested)?;
            tracing::info!("Taking over persisted coordinator {}", id);
            instance
        };

        instance.clone().start();
        let handle = instance.handle();
        registry.insert(id, instance);
        Ok(handle)
    }

    /// Start or join `request` and wait for its outcome. When the timeout
    /// elapses the coordinator is asked to stop at its next phase boundary.
    pub async fn run(&self, request: DdlRequest, timeout: Option<Duration>) -> Result<()> {
        let id = request.id();
        let handle = self.start(request)?;
        let Some(limit) = timeout.or(self.default_timeout) else {
            return handle.wait().await;
        };

        match tokio::time::timeout(limit, handle.clone().wait()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("{} exceeded its time limit of {:?}", id, limit);
                let instance = self.registry().get(&id).cloned();
                if let Some(instance) = instance {
                    instance.abort("operation exceeded time limit");
                }
                handle.wait().await
            }
        }
    }

    /// Reload persisted coordinators after a restart. Active ones continue
    /// from their stored phase; failed ones are registered idle until a
    /// matching request retries them.
    pub fn resume(&self) -> Result<Vec<CoordinatorHandle>> {
        let mut registry = self.registry();
        let mut handles = Vec::new();

        for raw in self.store.list(CF_COORDINATORS)? {
            let status = peek_status(&raw);
            let instance = match self.instantiate(raw) {
                Ok(instance) => instance,
                Err(e) => {
                    tracing::error!("Skipping unreadable coordinator document: {}", e);
                    continue;
                }
            };
            let id = instance.id().clone();
            if registry.get(&id).is_some_and(|i| !i.is_finished()) {
                continue;
            }

            if status == CoordinatorStatus::Active {
                tracing::info!("Resuming coordinator {}", id);
                instance.clone().start();
                handles.push(instance.handle());
            } else {
                tracing::warn!("Coordinator {} is in failed state; not resuming", id);
            }
            registry.insert(id, instance);
        }

        Ok(handles)
    }

    pub fn abort(&self, id: &CoordinatorId, reason: &str) -> Result<()> {
        let instance = self.registry().get(id).cloned();
        match instance {
            Some(instance) => {
                instance.abort(reason);
                Ok(())
            }
            None => Err(Error::NoSuchCoordinator(id.to_string())),
        }
    }

    pub fn current_ops(&self, mode: CurrentOpMode) -> Vec<CurrentOpReport> {
        let mut registry = self.registry();
        registry.retain(|_, instance| {
            !instance.is_finished() || instance.report_for_current_op(CurrentOpMode::IncludeIdle).is_some()
        });
        registry
            .values()
            .filter_map(|instance| instance.report_for_current_op(mode))
            .collect()
    }

    /// Stop every coordinator at its next phase boundary without touching
    /// state documents, and wait for their tasks to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let tasks: Vec<_> = self
            .registry()
            .drain()
            .filter_map(|(_, instance)| instance.take_task())
            .collect();

        tracing::info!("Waiting for {} coordinators to stop", tasks.len());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!("Coordinator task ended abnormally: {}", e);
            }
        }
    }
}
