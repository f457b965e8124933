//! Audit trail for instance and task history
//!
//! Every state change the engine applies leaves a record keyed by the
//! owning instance. Records survive instance archival, so the history
//! of a finished process stays queryable.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use worklist_types::{NodeId, ProcessInstanceId, TaskInstanceId};

/// What happened
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AuditEvent {
    InstanceCreated,
    InstanceStarted,
    InstanceCompleted,
    InstanceAborted,
    InstanceFailed { reason: String },
    TaskCreated { task_id: TaskInstanceId, node_id: NodeId },
    TaskTransitioned { task_id: TaskInstanceId, transition: String },
    TaskCompleted { task_id: TaskInstanceId },
    TaskAborted { task_id: TaskInstanceId },
    VariablesMerged { task_id: TaskInstanceId },
}

/// A single audit entry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event: AuditEvent,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    /// The user who drove the change, when one did
    pub actor: Option<String>,
}

impl AuditRecord {
    pub fn new(event: AuditEvent, description: impl Into<String>) -> Self {
        Self {
            event,
            description: description.into(),
            timestamp: Utc::now(),
            actor: None,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

/// Per-instance audit history
pub struct AuditTrail {
    events: DashMap<ProcessInstanceId, Vec<AuditRecord>>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self {
            events: DashMap::new(),
        }
    }

    pub fn record(&self, instance_id: &ProcessInstanceId, record: AuditRecord) {
        self.events
            .entry(instance_id.clone())
            .or_default()
            .push(record);
    }

    pub fn record_created(&self, instance_id: &ProcessInstanceId) {
        self.record(
            instance_id,
            AuditRecord::new(AuditEvent::InstanceCreated, "process instance created"),
        );
    }

    pub fn record_started(&self, instance_id: &ProcessInstanceId) {
        self.record(
            instance_id,
            AuditRecord::new(AuditEvent::InstanceStarted, "process instance started"),
        );
    }

    pub fn record_completed(&self, instance_id: &ProcessInstanceId) {
        self.record(
            instance_id,
            AuditRecord::new(AuditEvent::InstanceCompleted, "process instance completed"),
        );
    }

    pub fn record_aborted(&self, instance_id: &ProcessInstanceId) {
        self.record(
            instance_id,
            AuditRecord::new(AuditEvent::InstanceAborted, "process instance aborted"),
        );
    }

    pub fn record_failed(&self, instance_id: &ProcessInstanceId, reason: impl Into<String>) {
        let reason = reason.into();
        let description = format!("process instance faulted: {}", reason);
        self.record(
            instance_id,
            AuditRecord::new(AuditEvent::InstanceFailed { reason }, description),
        );
    }

    pub fn record_task_created(
        &self,
        instance_id: &ProcessInstanceId,
        task_id: &TaskInstanceId,
        node_id: &NodeId,
    ) {
        self.record(
            instance_id,
            AuditRecord::new(
                AuditEvent::TaskCreated {
                    task_id: task_id.clone(),
                    node_id: node_id.clone(),
                },
                format!("task created at node '{}'", node_id),
            ),
        );
    }

    pub fn record_task_transition(
        &self,
        instance_id: &ProcessInstanceId,
        task_id: &TaskInstanceId,
        transition: &str,
        actor: Option<&str>,
    ) {
        let mut record = AuditRecord::new(
            AuditEvent::TaskTransitioned {
                task_id: task_id.clone(),
                transition: transition.to_string(),
            },
            format!("task transitioned via '{}'", transition),
        );
        if let Some(actor) = actor {
            record = record.with_actor(actor);
        }
        self.record(instance_id, record);
    }

    pub fn record_task_completed(
        &self,
        instance_id: &ProcessInstanceId,
        task_id: &TaskInstanceId,
        actor: Option<&str>,
    ) {
        let mut record = AuditRecord::new(
            AuditEvent::TaskCompleted {
                task_id: task_id.clone(),
            },
            "task completed",
        );
        if let Some(actor) = actor {
            record = record.with_actor(actor);
        }
        self.record(instance_id, record);
    }

    pub fn record_task_aborted(
        &self,
        instance_id: &ProcessInstanceId,
        task_id: &TaskInstanceId,
        actor: Option<&str>,
    ) {
        let mut record = AuditRecord::new(
            AuditEvent::TaskAborted {
                task_id: task_id.clone(),
            },
            "task aborted",
        );
        if let Some(actor) = actor {
            record = record.with_actor(actor);
        }
        self.record(instance_id, record);
    }

    pub fn record_merge(&self, instance_id: &ProcessInstanceId, task_id: &TaskInstanceId) {
        self.record(
            instance_id,
            AuditRecord::new(
                AuditEvent::VariablesMerged {
                    task_id: task_id.clone(),
                },
                "task outputs merged into process variables",
            ),
        );
    }

    /// The full history for one instance, oldest first
    pub fn events_for(&self, instance_id: &ProcessInstanceId) -> Vec<AuditRecord> {
        self.events
            .get(instance_id)
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn event_count(&self, instance_id: &ProcessInstanceId) -> usize {
        self.events
            .get(instance_id)
            .map(|records| records.len())
            .unwrap_or(0)
    }

    pub fn total_events(&self) -> usize {
        self.events.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn clear(&self, instance_id: &ProcessInstanceId) {
        self.events.remove(instance_id);
    }
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_accumulate_in_order() {
        let trail = AuditTrail::new();
        let id = ProcessInstanceId::new("inst-1");
        let task_id = TaskInstanceId::new("task-1");

        trail.record_created(&id);
        trail.record_started(&id);
        trail.record_task_created(&id, &task_id, &NodeId::new("first-line"));
        trail.record_task_transition(&id, &task_id, "claim", Some("admin"));

        let events = trail.events_for(&id);
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].event, AuditEvent::InstanceCreated);
        assert_eq!(events[2].description, "task created at node 'first-line'");
        assert_eq!(events[3].actor.as_deref(), Some("admin"));
        assert_eq!(trail.event_count(&id), 4);
    }

    #[test]
    fn test_histories_are_isolated_per_instance() {
        let trail = AuditTrail::new();
        let first = ProcessInstanceId::new("inst-1");
        let second = ProcessInstanceId::new("inst-2");

        trail.record_created(&first);
        trail.record_created(&second);
        trail.record_started(&second);

        assert_eq!(trail.event_count(&first), 1);
        assert_eq!(trail.event_count(&second), 2);
        assert_eq!(trail.total_events(), 3);

        trail.clear(&second);
        assert_eq!(trail.event_count(&second), 0);
        assert_eq!(trail.total_events(), 1);
    }

    #[test]
    fn test_unknown_instance_has_empty_history() {
        let trail = AuditTrail::new();
        assert!(trail.events_for(&ProcessInstanceId::new("missing")).is_empty());
        assert_eq!(trail.event_count(&ProcessInstanceId::new("missing")), 0);
    }
}
