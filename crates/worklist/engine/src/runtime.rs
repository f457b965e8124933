//! The process engine
//!
//! [`ProcessEngine`] ties the pieces together: definitions come from the
//! [`DefinitionRegistry`], live instances sit in an [`InstanceStore`],
//! and the [`TaskIndex`] routes task-addressed calls back to the owning
//! instance. All mutation of one instance serializes on a per-instance
//! async lock, so two callers racing for the same task see a winner and
//! a loser, never a torn record.
//!
//! An instance that reaches Completed or Aborted is archived as a
//! [`CompletedProcess`] and reaped from the live store; `status` and
//! `variables` keep answering from the archive, while `find_by_id`
//! reports only live instances. Errored instances stay live for
//! inspection and can still be aborted to clean them up.

use crate::config::EngineConfig;
use crate::events::AuditTrail;
use crate::flow::{Flow, FlowStep};
use crate::lifecycle::{self, TaskTransition, TransitionOutcome};
use crate::memory::{InMemoryInstanceStore, InMemoryTaskIndex};
use crate::query;
use crate::registry::DefinitionRegistry;
use crate::store::{InstanceStore, TaskIndex};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use worklist_types::{
    CompletedProcess, EngineError, EngineResult, InstanceState, NodeId, ProcessDefinitionId,
    ProcessInstance, ProcessInstanceId, SecurityPolicy, TaskInstance, TaskInstanceId,
};

pub struct ProcessEngine {
    config: EngineConfig,
    definitions: DefinitionRegistry,
    instances: Arc<dyn InstanceStore>,
    tasks: Arc<dyn TaskIndex>,
    /// Per-instance mutation locks
    locks: DashMap<ProcessInstanceId, Arc<Mutex<()>>>,
    /// Terminal instances, reaped from the live store
    archive: DashMap<ProcessInstanceId, CompletedProcess>,
    audit: AuditTrail,
}

impl ProcessEngine {
    /// An engine backed by in-memory stores.
    pub fn new() -> Self {
        Self::with_stores(
            Arc::new(InMemoryInstanceStore::new()),
            Arc::new(InMemoryTaskIndex::new()),
        )
    }

    pub fn with_stores(instances: Arc<dyn InstanceStore>, tasks: Arc<dyn TaskIndex>) -> Self {
        Self {
            config: EngineConfig::default(),
            definitions: DefinitionRegistry::new(),
            instances,
            tasks,
            locks: DashMap::new(),
            archive: DashMap::new(),
            audit: AuditTrail::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    // ── Definitions ──────────────────────────────────────────────────

    pub fn register_definition(&self, flow: Arc<dyn Flow>) -> EngineResult<ProcessDefinitionId> {
        self.definitions.register(flow)
    }

    pub fn definitions(&self) -> &DefinitionRegistry {
        &self.definitions
    }

    // ── Instance lifecycle ───────────────────────────────────────────

    /// Creates an instance of a registered definition. The instance is
    /// Active but runs nothing until [`start`](Self::start) is called.
    pub async fn create_instance(
        &self,
        definition_id: &ProcessDefinitionId,
        variables: HashMap<String, Value>,
    ) -> EngineResult<ProcessInstanceId> {
        if !self.definitions.contains(definition_id) {
            return Err(EngineError::DefinitionNotFound(definition_id.clone()));
        }

        let instance = ProcessInstance::new(definition_id.clone(), variables);
        let id = instance.id.clone();
        self.instances.put(instance).await?;
        self.audit.record_created(&id);

        info!(instance_id = %id, definition_id = %definition_id, "process instance created");
        Ok(id)
    }

    /// Runs the flow up to its first suspension point. Starting twice
    /// is an error.
    ///
    /// A flow fault here is surfaced to the caller and the instance is
    /// preserved in the Error state.
    pub async fn start(&self, id: &ProcessInstanceId) -> EngineResult<()> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut instance = self.fetch_live(id).await?;
        if instance.has_started() {
            return Err(EngineError::AlreadyStarted(id.clone()));
        }
        let flow = self.definitions.get(&instance.definition_id)?;

        instance.mark_started();
        self.audit.record_started(id);
        info!(instance_id = %id, definition = flow.name(), "process instance started");

        match self.advance_flow(&mut instance, flow.as_ref(), None) {
            Ok(created) => {
                if let Some(task) = &created {
                    self.tasks.put(task.id.clone(), id.clone()).await?;
                }
                self.commit(instance).await
            }
            Err(err) => {
                self.commit(instance).await?;
                Err(err)
            }
        }
    }

    /// The current state, answered from the live store or the archive.
    pub async fn status(&self, id: &ProcessInstanceId) -> EngineResult<InstanceState> {
        if let Some(instance) = self.instances.get(id).await? {
            return Ok(instance.state);
        }
        self.archive
            .get(id)
            .map(|record| record.final_state)
            .ok_or_else(|| EngineError::InstanceNotFound(id.clone()))
    }

    /// The process variables, answered from the live store or the
    /// archive.
    pub async fn variables(&self, id: &ProcessInstanceId) -> EngineResult<HashMap<String, Value>> {
        if let Some(instance) = self.instances.get(id).await? {
            return Ok(instance.variables);
        }
        self.archive
            .get(id)
            .map(|record| record.variables.clone())
            .ok_or_else(|| EngineError::InstanceNotFound(id.clone()))
    }

    /// Looks up a live instance. Terminal instances have been reaped,
    /// so this reports `None` for them; use [`status`](Self::status) or
    /// [`completed_process`](Self::completed_process) instead.
    pub async fn find_by_id(&self, id: &ProcessInstanceId) -> EngineResult<Option<ProcessInstance>> {
        self.instances.get(id).await
    }

    /// The archived record of a finished instance, if it finished.
    pub fn completed_process(&self, id: &ProcessInstanceId) -> Option<CompletedProcess> {
        self.archive.get(id).map(|record| record.clone())
    }

    /// Aborts an instance and every live task in it. Works on Active
    /// and Error instances; finished ones are already reaped and
    /// report [`EngineError::InstanceNotFound`].
    pub async fn abort_instance(&self, id: &ProcessInstanceId) -> EngineResult<()> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut instance = self.fetch_live(id).await?;
        for task in instance.tasks.iter_mut() {
            if !task.is_terminal() {
                task.abort();
            }
        }
        instance.abort();
        self.audit.record_aborted(id);
        info!(instance_id = %id, "process instance aborted");

        self.commit(instance).await
    }

    // ── Work items ───────────────────────────────────────────────────

    /// The live tasks of an instance the caller may see. Read-only;
    /// asking twice changes nothing.
    pub async fn work_items(
        &self,
        id: &ProcessInstanceId,
        policy: &SecurityPolicy,
    ) -> EngineResult<Vec<TaskInstance>> {
        let instance = self.fetch_live(id).await?;
        query::visible_tasks(&instance, policy)
    }

    /// Every visible live task across all instances, ordered by task
    /// creation time.
    pub async fn find_by_identity(
        &self,
        policy: &SecurityPolicy,
    ) -> EngineResult<Vec<TaskInstance>> {
        let mut tasks = Vec::new();
        for instance in self.instances.list().await? {
            tasks.extend(query::visible_tasks(&instance, policy)?);
        }
        tasks.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.0.cmp(&b.id.0))
        });
        Ok(tasks)
    }

    /// Completes a task of the given instance: the payload folds into
    /// the task outputs, the outputs merge into the process variables
    /// through the node's output mapping, and the flow resumes, all
    /// before this call returns.
    ///
    /// A fault while resuming does not fail the call; the completion
    /// and merge are kept, the instance moves to Error, and
    /// [`status`](Self::status) reports it.
    pub async fn complete_work_item(
        &self,
        id: &ProcessInstanceId,
        task_id: &TaskInstanceId,
        outputs: HashMap<String, Value>,
        policy: &SecurityPolicy,
    ) -> EngineResult<()> {
        let owning = self.instance_for_task(task_id).await?;
        if &owning != id {
            return Err(EngineError::TaskNotFound(task_id.clone()));
        }
        self.apply_task_transition(task_id, TaskTransition::Complete { outputs }, policy)
            .await
    }

    // ── Task entry points ────────────────────────────────────────────

    /// Reserves a Ready task for the caller.
    pub async fn claim(
        &self,
        task_id: &TaskInstanceId,
        policy: &SecurityPolicy,
    ) -> EngineResult<()> {
        self.apply_task_transition(task_id, TaskTransition::Claim, policy)
            .await
    }

    /// Moves a task the caller holds from Reserved to InProgress.
    pub async fn start_task(
        &self,
        task_id: &TaskInstanceId,
        policy: &SecurityPolicy,
    ) -> EngineResult<()> {
        self.apply_task_transition(task_id, TaskTransition::Start, policy)
            .await
    }

    /// Hands a reserved task back to its potential owners.
    pub async fn release(
        &self,
        task_id: &TaskInstanceId,
        policy: &SecurityPolicy,
    ) -> EngineResult<()> {
        self.apply_task_transition(task_id, TaskTransition::Release, policy)
            .await
    }

    /// Records an output on a task the caller holds, without
    /// completing it.
    pub async fn set_output(
        &self,
        task_id: &TaskInstanceId,
        key: impl Into<String>,
        value: Value,
        policy: &SecurityPolicy,
    ) -> EngineResult<()> {
        let instance_id = self.instance_for_task(task_id).await?;
        let lock = self.lock_for(&instance_id);
        let _guard = lock.lock().await;

        let mut instance = self.fetch_active(&instance_id).await?;
        let task = instance
            .task_mut(task_id)
            .ok_or_else(|| EngineError::TaskNotFound(task_id.clone()))?;
        lifecycle::set_output(task, key, value, policy)?;
        self.instances.put(instance).await
    }

    /// Completes a task addressed by id alone.
    pub async fn complete_task(
        &self,
        task_id: &TaskInstanceId,
        outputs: HashMap<String, Value>,
        policy: &SecurityPolicy,
    ) -> EngineResult<()> {
        self.apply_task_transition(task_id, TaskTransition::Complete { outputs }, policy)
            .await
    }

    /// Aborts a single task. The owning instance can never advance
    /// past an aborted task, so it aborts with it.
    pub async fn abort_task(
        &self,
        task_id: &TaskInstanceId,
        policy: &SecurityPolicy,
    ) -> EngineResult<()> {
        self.apply_task_transition(task_id, TaskTransition::Abort, policy)
            .await
    }

    /// The uniform string-named entry point: `claim`, `start`,
    /// `complete`, `abort` or `release`.
    pub async fn transition(
        &self,
        task_id: &TaskInstanceId,
        name: &str,
        payload: HashMap<String, Value>,
        policy: &SecurityPolicy,
    ) -> EngineResult<()> {
        let transition = TaskTransition::from_name(name, payload)?;
        self.apply_task_transition(task_id, transition, policy).await
    }

    /// A visibility-checked read of a single task.
    pub async fn get_task(
        &self,
        task_id: &TaskInstanceId,
        policy: &SecurityPolicy,
    ) -> EngineResult<TaskInstance> {
        let instance_id = self.instance_for_task(task_id).await?;
        let instance = self.fetch_live(&instance_id).await?;
        let task = instance
            .task(task_id)
            .ok_or_else(|| EngineError::TaskNotFound(task_id.clone()))?;
        if !crate::authorization::evaluate(task, policy)? {
            return Err(EngineError::NotAuthorized(format!(
                "user '{}' is not a potential owner of task '{}'",
                policy.principal(),
                task_id
            )));
        }
        Ok(task.clone())
    }

    // ── Audit ────────────────────────────────────────────────────────

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    // ── Internals ────────────────────────────────────────────────────

    fn lock_for(&self, id: &ProcessInstanceId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn fetch_live(&self, id: &ProcessInstanceId) -> EngineResult<ProcessInstance> {
        self.instances
            .get(id)
            .await?
            .ok_or_else(|| EngineError::InstanceNotFound(id.clone()))
    }

    async fn fetch_active(&self, id: &ProcessInstanceId) -> EngineResult<ProcessInstance> {
        let instance = self.fetch_live(id).await?;
        if !instance.is_active() {
            return Err(EngineError::InvalidTransition(format!(
                "process instance '{}' is not active",
                id
            )));
        }
        Ok(instance)
    }

    async fn instance_for_task(
        &self,
        task_id: &TaskInstanceId,
    ) -> EngineResult<ProcessInstanceId> {
        self.tasks
            .get(task_id)
            .await?
            .ok_or_else(|| EngineError::TaskNotFound(task_id.clone()))
    }

    /// Applies one guarded transition under the instance lock and acts
    /// on the outcome: completion merges outputs and resumes the flow,
    /// an aborted task takes its instance down with it.
    async fn apply_task_transition(
        &self,
        task_id: &TaskInstanceId,
        transition: TaskTransition,
        policy: &SecurityPolicy,
    ) -> EngineResult<()> {
        let instance_id = self.instance_for_task(task_id).await?;
        let lock = self.lock_for(&instance_id);
        let _guard = lock.lock().await;

        let mut instance = self.fetch_active(&instance_id).await?;
        let flow = self.definitions.get(&instance.definition_id)?;
        let transition_name = transition.name();

        let task = instance
            .task_mut(task_id)
            .ok_or_else(|| EngineError::TaskNotFound(task_id.clone()))?;
        let outcome = lifecycle::apply(task, transition, policy)?;
        let t_id = task.id.clone();
        let node_id = task.node_id.clone();
        let actor = task.actual_owner.clone();
        let merged_outputs: Vec<(String, Value)> = if outcome == TransitionOutcome::Completed {
            task.outputs
                .iter()
                .map(|(key, value)| (task.variable_for(key).to_string(), value.clone()))
                .collect()
        } else {
            Vec::new()
        };

        debug!(
            instance_id = %instance_id,
            task_id = %t_id,
            transition = transition_name,
            "task transition applied"
        );

        let mut created = None;
        match outcome {
            TransitionOutcome::Updated => {
                self.audit
                    .record_task_transition(&instance_id, &t_id, transition_name, actor.as_deref());
            }
            TransitionOutcome::Completed => {
                for (name, value) in merged_outputs {
                    instance.set_variable(name, value);
                }
                self.audit
                    .record_task_completed(&instance_id, &t_id, actor.as_deref());
                self.audit.record_merge(&instance_id, &t_id);
                info!(instance_id = %instance_id, task_id = %t_id, "work item completed");

                // a resumption fault is reported through status, not
                // through this call; the completion itself is kept
                if let Ok(next) = self.advance_flow(&mut instance, flow.as_ref(), Some(&node_id)) {
                    created = next;
                }
            }
            TransitionOutcome::Aborted => {
                self.audit
                    .record_task_aborted(&instance_id, &t_id, actor.as_deref());
                for task in instance.tasks.iter_mut() {
                    if !task.is_terminal() {
                        task.abort();
                    }
                }
                instance.abort();
                self.audit.record_aborted(&instance_id);
                info!(instance_id = %instance_id, task_id = %t_id, "task aborted, instance aborted with it");
            }
        }

        if let Some(task) = &created {
            self.tasks.put(task.id.clone(), instance_id.clone()).await?;
        }
        self.commit(instance).await
    }

    /// Advances the flow to its next suspension point, retrying faults
    /// up to the configured limit. On exhaustion the instance moves to
    /// Error and the last fault is returned.
    fn advance_flow(
        &self,
        instance: &mut ProcessInstance,
        flow: &dyn Flow,
        from: Option<&NodeId>,
    ) -> EngineResult<Option<TaskInstance>> {
        let mut attempts = 0;
        let step = loop {
            match flow.advance(&mut instance.variables, from) {
                Ok(step) => break step,
                Err(err) => {
                    attempts += 1;
                    if attempts > self.config.resume_retry_limit {
                        error!(
                            instance_id = %instance.id,
                            error = %err,
                            "flow fault persisted through retries, marking instance as errored"
                        );
                        self.audit.record_failed(&instance.id, err.to_string());
                        instance.fail(err.to_string());
                        return Err(err);
                    }
                    warn!(
                        instance_id = %instance.id,
                        attempt = attempts,
                        error = %err,
                        "flow fault, retrying"
                    );
                }
            }
        };

        match step {
            FlowStep::UserTask { node_id, node } => {
                let mut task = TaskInstance::from_node(
                    instance.id.clone(),
                    node_id.clone(),
                    &node,
                    &instance.variables,
                );
                task.ready();
                self.audit
                    .record_task_created(&instance.id, &task.id, &node_id);
                debug!(
                    instance_id = %instance.id,
                    task_id = %task.id,
                    node_id = %node_id,
                    "suspended on user task"
                );
                instance.current_node = Some(node_id);
                instance.add_task(task.clone());
                Ok(Some(task))
            }
            FlowStep::Complete => {
                instance.complete();
                self.audit.record_completed(&instance.id);
                info!(instance_id = %instance.id, "process instance completed");
                Ok(None)
            }
        }
    }

    /// Writes an instance back. Completed and Aborted instances are
    /// archived and reaped instead; Error instances stay live.
    async fn commit(&self, instance: ProcessInstance) -> EngineResult<()> {
        if matches!(
            instance.state,
            InstanceState::Completed | InstanceState::Aborted
        ) {
            let id = instance.id.clone();
            let record = CompletedProcess::from_instance(&instance);
            self.tasks.remove_instance(&id).await?;
            self.instances.remove(&id).await?;
            self.archive.insert(id.clone(), record);
            self.locks.remove(&id);
            debug!(instance_id = %id, "instance archived and reaped");
            Ok(())
        } else {
            self.instances.put(instance).await
        }
    }
}

impl Default for ProcessEngine {
    fn default() -> Self {
        Self::new()
    }
}
