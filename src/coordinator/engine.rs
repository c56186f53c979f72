//! Recoverable coordinator engine
//!
//! A coordinator drives one DDL operation through a fixed sequence of phases.
//! After each phase's effect succeeds, the advanced phase is persisted in the
//! state document before the next phase begins. A restarted process reloads
//! the document and continues after the last persisted phase, so a phase
//! whose effect ran but whose advance was not persisted runs again. Every
//! phase effect must therefore be idempotent.
//!
//! Cancellation and shutdown are only observed between phases.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::catalog::store::{DocumentStore, CF_COORDINATORS};
use crate::common::{retry_with_backoff, CoordinatorConfig, Error, Result};
use crate::coordinator::document::{
    AbortReason, CoordinatorId, CoordinatorKind, CoordinatorPhase, CoordinatorStatus,
    StateDocument,
};

pub type PolicyDocument<C> =
    StateDocument<<C as CoordinatorPolicy>::Phase, <C as CoordinatorPolicy>::Params>;

/// Per-kind behavior plugged into the engine
#[async_trait]
pub trait CoordinatorPolicy: Send + Sync + 'static {
    type Phase: CoordinatorPhase;
    type Params: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static;

    const KIND: CoordinatorKind;

    /// Succeed only if `requested` asks for the same operation as `current`;
    /// otherwise fail with `ConflictingOperationInProgress`.
    fn check_if_options_conflict(&self, current: &Self::Params, requested: &Self::Params) -> Result<()>;

    /// Apply the effect of `phase`. Facts learned along the way may be
    /// recorded in `doc.params`; they are persisted with the phase advance.
    async fn run_phase(&self, phase: Self::Phase, doc: &mut PolicyDocument<Self>) -> Result<()>;

    /// Keep the document as `failed` when `phase` fails, instead of deleting it
    fn retains_document_on_failure(&self, phase: Self::Phase) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub max_phase_attempts: usize,
    pub retry_initial_delay: Duration,
}

impl From<&CoordinatorConfig> for EngineSettings {
    fn from(config: &CoordinatorConfig) -> Self {
        Self {
            max_phase_attempts: config.max_phase_attempts,
            retry_initial_delay: config.retry_initial_delay(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&CoordinatorConfig::default())
    }
}

// === Introspection ===

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentOpMode {
    /// Only coordinators that are executing
    ExcludeIdle,
    /// Also coordinators that are waiting to start or failed
    IncludeIdle,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentOpReport {
    pub desc: &'static str,
    #[serde(rename = "type")]
    pub op_type: &'static str,
    pub ns: String,
    pub kind: CoordinatorKind,
    pub phase: &'static str,
    pub active: bool,
    pub elapsed_millis: u64,
    pub command: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

#[derive(Debug, Clone)]
enum RunState {
    Pending,
    Running,
    Failed(String),
    Completed,
    Interrupted,
}

#[derive(Debug, Clone)]
struct Progress<P> {
    phase: &'static str,
    params: P,
    state: RunState,
}

// === Handles ===

type Outcome = Option<Result<()>>;

/// Awaits the terminal outcome of a coordinator. Every handle to the same
/// coordinator observes the same outcome.
#[derive(Clone)]
pub struct CoordinatorHandle {
    id: CoordinatorId,
    outcome: watch::Receiver<Outcome>,
}

impl CoordinatorHandle {
    pub fn id(&self) -> &CoordinatorId {
        &self.id
    }

    pub async fn wait(mut self) -> Result<()> {
        let outcome = self
            .outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Error::Interrupted(format!("{} was dropped", self.id)))?;
        match &*outcome {
            Some(result) => result.clone(),
            None => Err(Error::Internal("coordinator finished without outcome".into())),
        }
    }

    /// The outcome, if the coordinator has finished
    pub fn outcome(&self) -> Option<Result<()>> {
        self.outcome.borrow().clone()
    }
}

/// Type-erased coordinator, as kept in the service registry
pub trait CoordinatorInstance: Send + Sync {
    fn id(&self) -> &CoordinatorId;

    /// Compare a requested state document against this coordinator's parameters
    fn check_if_options_conflict(&self, requested: &serde_json::Value) -> Result<()>;

    /// Begin executing phases in a new task. Has no effect after the first call.
    fn start(self: Arc<Self>);

    fn handle(&self) -> CoordinatorHandle;

    fn report_for_current_op(&self, mode: CurrentOpMode) -> Option<CurrentOpReport>;

    /// Request cooperative cancellation
    fn abort(&self, reason: &str);

    /// Completed, failed, or stopped by shutdown
    fn is_finished(&self) -> bool;

    fn take_task(&self) -> Option<JoinHandle<()>>;
}

// === Engine ===

enum Stop<P> {
    Interrupted,
    Cancelled,
    Failed { phase: P, error: Error },
}

pub struct RecoverableCoordinator<C: CoordinatorPolicy> {
    id: CoordinatorId,
    policy: C,
    store: Arc<dyn DocumentStore>,
    settings: EngineSettings,
    pending: Mutex<Option<PolicyDocument<C>>>,
    progress: watch::Sender<Progress<C::Params>>,
    outcome: watch::Sender<Outcome>,
    cancel: CancellationToken,
    cancel_reason: Mutex<Option<String>>,
    shutdown: CancellationToken,
    created_at: DateTime<Utc>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<C: CoordinatorPolicy> RecoverableCoordinator<C> {
    pub fn new(
        policy: C,
        doc: PolicyDocument<C>,
        store: Arc<dyn DocumentStore>,
        settings: EngineSettings,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let state = if doc.is_failed() {
            let reason = doc.abort_reason.as_ref().map(|r| r.errmsg.clone());
            RunState::Failed(reason.unwrap_or_else(|| "failed".to_string()))
        } else {
            RunState::Pending
        };
        let (progress, _) = watch::channel(Progress {
            phase: doc.phase.as_str(),
            params: doc.params.clone(),
            state,
        });
        let (outcome, _) = watch::channel(None);
        let created_at = doc.created_at;

        Arc::new(Self {
            id: doc.id.clone(),
            policy,
            store,
            settings,
            pending: Mutex::new(Some(doc)),
            progress,
            outcome,
            cancel: CancellationToken::new(),
            cancel_reason: Mutex::new(None),
            shutdown,
            created_at,
            task: Mutex::new(None),
        })
    }

    async fn run(self: Arc<Self>, mut doc: PolicyDocument<C>) {
        self.progress.send_modify(|p| p.state = RunState::Running);

        let result = match self.drive(&mut doc).await {
            Ok(()) => self.complete().await,
            Err(stop) => self.stop(&mut doc, stop).await,
        };

        let state = match &result {
            Ok(()) => RunState::Completed,
            Err(Error::Interrupted(_)) => RunState::Interrupted,
            Err(e) => RunState::Failed(e.to_string()),
        };
        self.progress.send_modify(|p| p.state = state);
        self.outcome.send_replace(Some(result));
    }

    async fn drive(&self, doc: &mut PolicyDocument<C>) -> std::result::Result<(), Stop<C::Phase>> {
        if doc.is_failed() {
            tracing::info!(
                "Retrying failed coordinator {} after phase {}",
                self.id,
                doc.phase.as_str()
            );
            doc.status = CoordinatorStatus::Active;
            doc.abort_reason = None;
            self.persist(doc).await.map_err(|error| Stop::Failed {
                phase: doc.phase,
                error,
            })?;
        }

        while let Some(next) = doc.phase.next() {
            if self.shutdown.is_cancelled() {
                return Err(Stop::Interrupted);
            }
            if self.cancel.is_cancelled() {
                return Err(Stop::Cancelled);
            }

            self.progress.send_modify(|p| p.phase = next.as_str());
            tracing::info!("{} entering phase {}", self.id, next.as_str());

            *doc = self
                .execute(next, doc)
                .await
                .map_err(|error| Stop::Failed { phase: next, error })?;
        }
        Ok(())
    }

    /// Run one phase effect with retries, then persist the phase advance
    async fn execute(&self, phase: C::Phase, doc: &PolicyDocument<C>) -> Result<PolicyDocument<C>> {
        let policy = &self.policy;
        let id = &self.id;
        let mut updated = retry_with_backoff(
            |attempt| {
                let mut candidate = doc.clone();
                async move {
                    if attempt > 1 {
                        tracing::debug!("{} phase {} attempt {}", id, phase.as_str(), attempt);
                    }
                    policy.run_phase(phase, &mut candidate).await?;
                    Ok(candidate)
                }
            },
            self.settings.max_phase_attempts,
            self.settings.retry_initial_delay,
        )
        .await?;

        updated.phase = phase;
        self.persist(&updated).await?;
        self.progress.send_modify(|p| p.params = updated.params.clone());
        Ok(updated)
    }

    async fn persist(&self, doc: &PolicyDocument<C>) -> Result<()> {
        let raw = doc.to_value()?;
        let key = self.id.key();
        let (store, key, raw) = (&self.store, key.as_str(), &raw);
        retry_with_backoff(
            |_| async move { store.put(CF_COORDINATORS, key, raw) },
            self.settings.max_phase_attempts,
            self.settings.retry_initial_delay,
        )
        .await
    }

    async fn remove_document(&self) -> Result<()> {
        let key = self.id.key();
        let (store, key) = (&self.store, key.as_str());
        retry_with_backoff(
            |_| async move { store.delete(CF_COORDINATORS, key) },
            self.settings.max_phase_attempts,
            self.settings.retry_initial_delay,
        )
        .await
    }

    async fn complete(&self) -> Result<()> {
        self.remove_document().await?;
        tracing::info!("{} completed", self.id);
        Ok(())
    }

    async fn mark_failed(&self, doc: &mut PolicyDocument<C>, error: &Error) -> Result<()> {
        doc.status = CoordinatorStatus::Failed;
        doc.abort_reason = Some(AbortReason::from(error));
        self.persist(doc).await
    }

    async fn stop(&self, doc: &mut PolicyDocument<C>, stop: Stop<C::Phase>) -> Result<()> {
        match stop {
            Stop::Interrupted => {
                tracing::info!(
                    "{} interrupted by shutdown after phase {}",
                    self.id,
                    doc.phase.as_str()
                );
                Err(Error::Interrupted(format!(
                    "{} stopped by shutdown after phase {}",
                    self.id,
                    doc.phase.as_str()
                )))
            }
            Stop::Cancelled => {
                let reason = self
                    .cancel_reason
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .clone()
                    .unwrap_or_else(|| "cancelled".to_string());
                let error = Error::Cancelled(reason);
                tracing::warn!("{} {} after phase {}", self.id, error, doc.phase.as_str());
                self.mark_failed(doc, &error).await?;
                Err(error)
            }
            Stop::Failed { phase, error } => {
                if self.policy.retains_document_on_failure(phase) {
                    tracing::error!(
                        "{} failed in phase {}: {}; state document retained",
                        self.id,
                        phase.as_str(),
                        error
                    );
                    self.mark_failed(doc, &error).await?;
                    Err(Error::CoordinatorFailed {
                        id: self.id.key(),
                        reason: error.to_string(),
                    })
                } else {
                    tracing::warn!("{} rejected in phase {}: {}", self.id, phase.as_str(), error);
                    self.remove_document().await?;
                    Err(error)
                }
            }
        }
    }
}

impl<C: CoordinatorPolicy> CoordinatorInstance for RecoverableCoordinator<C> {
    fn id(&self) -> &CoordinatorId {
        &self.id
    }

    fn check_if_options_conflict(&self, requested: &serde_json::Value) -> Result<()> {
        let requested = PolicyDocument::<C>::from_value(requested.clone())?;
        let current = self.progress.borrow().params.clone();
        self.policy
            .check_if_options_conflict(&current, &requested.params)
    }

    fn start(self: Arc<Self>) {
        let Some(doc) = self
            .pending
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        else {
            return;
        };
        let task = tokio::spawn(self.clone().run(doc));
        *self.task.lock().unwrap_or_else(|p| p.into_inner()) = Some(task);
    }

    fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            id: self.id.clone(),
            outcome: self.outcome.subscribe(),
        }
    }

    fn report_for_current_op(&self, mode: CurrentOpMode) -> Option<CurrentOpReport> {
        let progress = self.progress.borrow();
        let (active, failure) = match &progress.state {
            RunState::Running => (true, None),
            RunState::Pending if mode == CurrentOpMode::IncludeIdle => (false, None),
            RunState::Failed(reason) if mode == CurrentOpMode::IncludeIdle => {
                (false, Some(reason.clone()))
            }
            _ => return None,
        };

        Some(CurrentOpReport {
            desc: C::KIND.description(),
            op_type: "op",
            ns: self.id.ns.to_string(),
            kind: C::KIND,
            phase: progress.phase,
            active,
            elapsed_millis: (Utc::now() - self.created_at).num_milliseconds().max(0) as u64,
            command: serde_json::to_value(&progress.params).unwrap_or_default(),
            failure,
        })
    }

    fn abort(&self, reason: &str) {
        self.cancel_reason
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get_or_insert_with(|| reason.to_string());
        self.cancel.cancel();
        tracing::info!("Abort requested for {}: {}", self.id, reason);
    }

    fn is_finished(&self) -> bool {
        matches!(
            self.progress.borrow().state,
            RunState::Completed | RunState::Failed(_) | RunState::Interrupted
        )
    }

    fn take_task(&self) -> Option<JoinHandle<()>> {
        self.task.lock().unwrap_or_else(|p| p.into_inner()).take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::store::{DocumentStoreExt, MemoryStore};
    use crate::chunk::NamespaceString;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    enum Step {
        Unset,
        Validate,
        Apply,
        Publish,
    }

    impl CoordinatorPhase for Step {
        const NOT_STARTED: Self = Step::Unset;

        fn next(self) -> Option<Self> {
            match self {
                Step::Unset => Some(Step::Validate),
                Step::Validate => Some(Step::Apply),
                Step::Apply => Some(Step::Publish),
                Step::Publish => None,
            }
        }

        fn as_str(self) -> &'static str {
            match self {
                Step::Unset => "unset",
                Step::Validate => "validate",
                Step::Apply => "apply",
                Step::Publish => "publish",
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Params {
        target: u32,
        #[serde(default)]
        applied: bool,
    }

    #[derive(Default)]
    struct Recorder {
        runs: Mutex<Vec<Step>>,
        fail_validate: bool,
        transient_failures: AtomicUsize,
        fail_apply: bool,
        gate: Option<Arc<Notify>>,
    }

    struct TestPolicy(Arc<Recorder>);

    #[async_trait]
    impl CoordinatorPolicy for TestPolicy {
        type Phase = Step;
        type Params = Params;

        const KIND: CoordinatorKind = CoordinatorKind::CreateCollection;

        fn check_if_options_conflict(&self, current: &Params, requested: &Params) -> Result<()> {
            if current.target == requested.target {
                Ok(())
            } else {
                Err(Error::ConflictingOperationInProgress("different target".into()))
            }
        }

        async fn run_phase(&self, phase: Step, doc: &mut PolicyDocument<Self>) -> Result<()> {
            if phase == Step::Apply {
                if let Some(gate) = &self.0.gate {
                    gate.notified().await;
                }
            }
            self.0.runs.lock().unwrap().push(phase);
            match phase {
                Step::Validate if self.0.fail_validate => {
                    Err(Error::InvalidOptions("bad target".into()))
                }
                Step::Apply => {
                    if self.0.transient_failures.load(Ordering::SeqCst) > 0 {
                        self.0.transient_failures.fetch_sub(1, Ordering::SeqCst);
                        return Err(Error::Io("store unavailable".into()));
                    }
                    if self.0.fail_apply {
                        return Err(Error::IncompatibleShardingMetadata("boom".into()));
                    }
                    doc.params.applied = true;
                    Ok(())
                }
                _ => Ok(()),
            }
        }

        fn retains_document_on_failure(&self, phase: Step) -> bool {
            phase >= Step::Apply
        }
    }

    fn settings() -> EngineSettings {
        EngineSettings {
            max_phase_attempts: 3,
            retry_initial_delay: Duration::from_millis(1),
        }
    }

    fn new_doc() -> PolicyDocument<TestPolicy> {
        StateDocument::new(
            CoordinatorId::new(NamespaceString::parse("db.c").unwrap(), CoordinatorKind::CreateCollection),
            Params { target: 7, applied: false },
        )
    }

    fn launch(
        recorder: Arc<Recorder>,
        doc: PolicyDocument<TestPolicy>,
        store: Arc<dyn DocumentStore>,
    ) -> Arc<RecoverableCoordinator<TestPolicy>> {
        store.put_as(CF_COORDINATORS, &doc.id.key(), &doc).unwrap();
        let coordinator = RecoverableCoordinator::new(
            TestPolicy(recorder),
            doc,
            store,
            settings(),
            CancellationToken::new(),
        );
        coordinator.clone().start();
        coordinator
    }

    #[tokio::test]
    async fn test_runs_all_phases_and_deletes_document() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let recorder = Arc::new(Recorder::default());
        let doc = new_doc();
        let key = doc.id.key();
        let coordinator = launch(recorder.clone(), doc, store.clone());

        coordinator.handle().wait().await.unwrap();
        assert_eq!(
            *recorder.runs.lock().unwrap(),
            vec![Step::Validate, Step::Apply, Step::Publish]
        );
        assert!(store.get(CF_COORDINATORS, &key).unwrap().is_none());
        assert!(coordinator.report_for_current_op(CurrentOpMode::IncludeIdle).is_none());
    }

    #[tokio::test]
    async fn test_resume_skips_completed_phases() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let recorder = Arc::new(Recorder::default());
        let mut doc = new_doc();
        doc.phase = Step::Apply;
        let coordinator = launch(recorder.clone(), doc, store);

        coordinator.handle().wait().await.unwrap();
        assert_eq!(*recorder.runs.lock().unwrap(), vec![Step::Publish]);
    }

    #[tokio::test]
    async fn test_validation_failure_deletes_document() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let recorder = Arc::new(Recorder {
            fail_validate: true,
            ..Default::default()
        });
        let doc = new_doc();
        let key = doc.id.key();
        let coordinator = launch(recorder, doc, store.clone());

        let err = coordinator.handle().wait().await.unwrap_err();
        assert!(matches!(err, Error::InvalidOptions(_)));
        assert!(store.get(CF_COORDINATORS, &key).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_late_failure_retains_document() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let recorder = Arc::new(Recorder {
            fail_apply: true,
            ..Default::default()
        });
        let doc = new_doc();
        let key = doc.id.key();
        let coordinator = launch(recorder, doc, store.clone());

        let err = coordinator.handle().wait().await.unwrap_err();
        assert!(matches!(err, Error::CoordinatorFailed { .. }));

        let retained: PolicyDocument<TestPolicy> = store.get_as(CF_COORDINATORS, &key).unwrap().unwrap();
        assert!(retained.is_failed());
        assert_eq!(retained.phase, Step::Validate);
        assert_eq!(
            retained.abort_reason.map(|r| r.code),
            Some("IncompatibleShardingMetadata".to_string())
        );

        let report = coordinator.report_for_current_op(CurrentOpMode::IncludeIdle).unwrap();
        assert!(!report.active);
        assert!(coordinator.report_for_current_op(CurrentOpMode::ExcludeIdle).is_none());
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let recorder = Arc::new(Recorder {
            transient_failures: AtomicUsize::new(2),
            ..Default::default()
        });
        let coordinator = launch(recorder.clone(), new_doc(), store);

        coordinator.handle().wait().await.unwrap();
        let applies = recorder
            .runs
            .lock()
            .unwrap()
            .iter()
            .filter(|s| **s == Step::Apply)
            .count();
        assert_eq!(applies, 3);
    }

    #[tokio::test]
    async fn test_cancellation_between_phases() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let gate = Arc::new(Notify::new());
        let recorder = Arc::new(Recorder {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let doc = new_doc();
        let key = doc.id.key();
        let coordinator = launch(recorder.clone(), doc, store.clone());

        // Blocked inside Apply; the running phase finishes, Publish never starts
        tokio::time::sleep(Duration::from_millis(20)).await;
        let report = coordinator.report_for_current_op(CurrentOpMode::ExcludeIdle).unwrap();
        assert_eq!(report.phase, "apply");
        coordinator.abort("user requested");
        gate.notify_one();

        let err = coordinator.handle().wait().await.unwrap_err();
        assert!(matches!(err, Error::Cancelled(ref r) if r == "user requested"));
        assert_eq!(*recorder.runs.lock().unwrap(), vec![Step::Validate, Step::Apply]);

        let retained: PolicyDocument<TestPolicy> = store.get_as(CF_COORDINATORS, &key).unwrap().unwrap();
        assert!(retained.is_failed());
        assert_eq!(retained.phase, Step::Apply);
        assert!(retained.params.applied);
    }

    #[tokio::test]
    async fn test_elapsed_counts_from_document_creation() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let mut doc = new_doc();
        doc.phase = Step::Validate;
        doc.created_at = Utc::now() - chrono::Duration::seconds(90);

        // Reloaded after a restart, not yet running
        let coordinator = RecoverableCoordinator::new(
            TestPolicy(Arc::new(Recorder::default())),
            doc,
            store,
            settings(),
            CancellationToken::new(),
        );
        let report = coordinator.report_for_current_op(CurrentOpMode::IncludeIdle).unwrap();
        assert_eq!(report.phase, "validate");
        assert!(report.elapsed_millis >= 90_000);
    }

    #[tokio::test]
    async fn test_conflict_check_uses_params() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let coordinator = RecoverableCoordinator::new(
            TestPolicy(Arc::new(Recorder::default())),
            new_doc(),
            store,
            settings(),
            CancellationToken::new(),
        );
        let same = new_doc().to_value().unwrap();
        assert!(coordinator.check_if_options_conflict(&same).is_ok());

        let mut other = new_doc();
        other.params.target = 8;
        let err = coordinator
            .check_if_options_conflict(&other.to_value().unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::ConflictingOperationInProgress(_)));

        let report = coordinator.report_for_current_op(CurrentOpMode::IncludeIdle).unwrap();
        assert!(!report.active);
        assert!(coordinator.report_for_current_op(CurrentOpMode::ExcludeIdle).is_none());
    }
}
