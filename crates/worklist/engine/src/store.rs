//! Storage traits for live process state
//!
//! The engine owns no storage of its own. It goes through two injected
//! traits: [`InstanceStore`] holds full instance records (tasks ride
//! inside the record, so one `put` commits an instance and its tasks
//! together), and [`TaskIndex`] maps task ids back to the instance that
//! owns them for the task-addressed entry points.

use async_trait::async_trait;
use worklist_types::{EngineResult, ProcessInstance, ProcessInstanceId, TaskInstanceId};

/// Persistence for live process instances. Archived instances leave
/// this store entirely.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Insert or replace an instance record
    async fn put(&self, instance: ProcessInstance) -> EngineResult<()>;

    async fn get(&self, id: &ProcessInstanceId) -> EngineResult<Option<ProcessInstance>>;

    async fn remove(&self, id: &ProcessInstanceId) -> EngineResult<Option<ProcessInstance>>;

    /// All live instances, oldest first
    async fn list(&self) -> EngineResult<Vec<ProcessInstance>>;
}

/// Reverse index from task id to owning instance id.
#[async_trait]
pub trait TaskIndex: Send + Sync {
    async fn put(
        &self,
        task_id: TaskInstanceId,
        instance_id: ProcessInstanceId,
    ) -> EngineResult<()>;

    async fn get(&self, task_id: &TaskInstanceId) -> EngineResult<Option<ProcessInstanceId>>;

    async fn remove(&self, task_id: &TaskInstanceId) -> EngineResult<()>;

    /// Drop every entry pointing at the given instance
    async fn remove_instance(&self, instance_id: &ProcessInstanceId) -> EngineResult<()>;
}
