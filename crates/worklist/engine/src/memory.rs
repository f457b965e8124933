//! In-memory storage backends
//!
//! Default implementations of [`InstanceStore`] and [`TaskIndex`] on
//! top of `DashMap`. Suitable for embedded use and tests; a durable
//! deployment swaps these out behind the same traits.

use crate::store::{InstanceStore, TaskIndex};
use async_trait::async_trait;
use dashmap::DashMap;
use worklist_types::{EngineResult, ProcessInstance, ProcessInstanceId, TaskInstanceId};

// ── Instance store ───────────────────────────────────────────────────

pub struct InMemoryInstanceStore {
    instances: DashMap<ProcessInstanceId, ProcessInstance>,
}

impl InMemoryInstanceStore {
    pub fn new() -> Self {
        Self {
            instances: DashMap::new(),
        }
    }
}

impl Default for InMemoryInstanceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InstanceStore for InMemoryInstanceStore {
    async fn put(&self, instance: ProcessInstance) -> EngineResult<()> {
        self.instances.insert(instance.id.clone(), instance);
        Ok(())
    }

    async fn get(&self, id: &ProcessInstanceId) -> EngineResult<Option<ProcessInstance>> {
        Ok(self.instances.get(id).map(|entry| entry.clone()))
    }

    async fn remove(&self, id: &ProcessInstanceId) -> EngineResult<Option<ProcessInstance>> {
        Ok(self.instances.remove(id).map(|(_, instance)| instance))
    }

    async fn list(&self) -> EngineResult<Vec<ProcessInstance>> {
        let mut instances: Vec<ProcessInstance> = self
            .instances
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        instances.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.0.cmp(&b.id.0))
        });
        Ok(instances)
    }
}

// ── Task index ───────────────────────────────────────────────────────

pub struct InMemoryTaskIndex {
    tasks: DashMap<TaskInstanceId, ProcessInstanceId>,
}

impl InMemoryTaskIndex {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }
}

impl Default for InMemoryTaskIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskIndex for InMemoryTaskIndex {
    async fn put(
        &self,
        task_id: TaskInstanceId,
        instance_id: ProcessInstanceId,
    ) -> EngineResult<()> {
        self.tasks.insert(task_id, instance_id);
        Ok(())
    }

    async fn get(&self, task_id: &TaskInstanceId) -> EngineResult<Option<ProcessInstanceId>> {
        Ok(self.tasks.get(task_id).map(|entry| entry.clone()))
    }

    async fn remove(&self, task_id: &TaskInstanceId) -> EngineResult<()> {
        self.tasks.remove(task_id);
        Ok(())
    }

    async fn remove_instance(&self, instance_id: &ProcessInstanceId) -> EngineResult<()> {
        self.tasks.retain(|_, owner| owner != instance_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use worklist_types::ProcessDefinitionId;

    fn make_instance() -> ProcessInstance {
        ProcessInstance::new(ProcessDefinitionId::new("def-1"), HashMap::new())
    }

    #[tokio::test]
    async fn test_put_get_remove_roundtrip() {
        let store = InMemoryInstanceStore::new();
        let instance = make_instance();
        let id = instance.id.clone();

        store.put(instance).await.unwrap();
        assert!(store.get(&id).await.unwrap().is_some());

        let removed = store.remove(&id).await.unwrap();
        assert_eq!(removed.unwrap().id, id);
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_returns_oldest_first() {
        let store = InMemoryInstanceStore::new();
        let first = make_instance();
        let second = make_instance();
        let first_id = first.id.clone();

        store.put(second).await.unwrap();
        store.put(first.clone()).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        // identical timestamps fall back to id order, so just check the
        // earliest creation time is not after the later one
        assert!(listed[0].created_at <= listed[1].created_at);
        assert!(listed.iter().any(|i| i.id == first_id));
    }

    #[tokio::test]
    async fn test_task_index_maps_back_to_instance() {
        let index = InMemoryTaskIndex::new();
        let instance_id = ProcessInstanceId::new("inst-1");
        let task_id = TaskInstanceId::new("task-1");

        index
            .put(task_id.clone(), instance_id.clone())
            .await
            .unwrap();
        assert_eq!(index.get(&task_id).await.unwrap().unwrap(), instance_id);

        index.remove(&task_id).await.unwrap();
        assert!(index.get(&task_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_instance_drops_all_entries() {
        let index = InMemoryTaskIndex::new();
        let instance_id = ProcessInstanceId::new("inst-1");
        let other_id = ProcessInstanceId::new("inst-2");

        index
            .put(TaskInstanceId::new("task-1"), instance_id.clone())
            .await
            .unwrap();
        index
            .put(TaskInstanceId::new("task-2"), instance_id.clone())
            .await
            .unwrap();
        index
            .put(TaskInstanceId::new("task-3"), other_id.clone())
            .await
            .unwrap();

        index.remove_instance(&instance_id).await.unwrap();
        assert!(index
            .get(&TaskInstanceId::new("task-1"))
            .await
            .unwrap()
            .is_none());
        assert!(index
            .get(&TaskInstanceId::new("task-3"))
            .await
            .unwrap()
            .is_some());
    }
}
