//! Completed processes: the terminal record of an execution
//!
//! When an instance completes or aborts it is reaped from the live
//! index, and a CompletedProcess record takes its place. The record
//! keeps the final variable snapshot readable after the instance itself
//! is gone.

use crate::{
    InstanceState, NodeId, ProcessDefinitionId, ProcessInstance, ProcessInstanceId, TaskInstanceId,
    TaskState,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The terminal record of a process execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletedProcess {
    /// The instance ID
    pub instance_id: ProcessInstanceId,
    /// The definition the instance was created from
    pub definition_id: ProcessDefinitionId,
    /// Final state (Completed or Aborted)
    pub final_state: InstanceState,
    /// Final committed variable snapshot
    pub variables: HashMap<String, Value>,
    /// Outcome of every task the instance produced, in creation order
    pub task_outcomes: Vec<TaskOutcome>,
    /// When the instance started, if it was started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the instance ended
    pub ended_at: DateTime<Utc>,
    /// Total duration in seconds, counted from start
    pub duration_secs: i64,
}

impl CompletedProcess {
    /// Build the terminal record from a finished instance
    pub fn from_instance(instance: &ProcessInstance) -> Self {
        let ended_at = instance.completed_at.unwrap_or_else(Utc::now);
        let duration_secs = instance
            .started_at
            .map(|s| ended_at.signed_duration_since(s).num_seconds())
            .unwrap_or(0);

        Self {
            instance_id: instance.id.clone(),
            definition_id: instance.definition_id.clone(),
            final_state: instance.state,
            variables: instance.variables.clone(),
            task_outcomes: instance.tasks.iter().map(TaskOutcome::from).collect(),
            started_at: instance.started_at,
            ended_at,
            duration_secs,
        }
    }

    /// Whether the process ran to the end of its definition
    pub fn is_success(&self) -> bool {
        self.final_state == InstanceState::Completed
    }

    /// Tasks that were completed (vs aborted or left pending)
    pub fn tasks_completed(&self) -> usize {
        self.task_outcomes
            .iter()
            .filter(|o| o.final_state == TaskState::Completed)
            .count()
    }
}

/// The outcome of a single task
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// The task ID
    pub task_id: TaskInstanceId,
    /// The node that produced the task
    pub node_id: NodeId,
    /// The task name
    pub name: String,
    /// The state the task ended in
    pub final_state: TaskState,
    /// Who worked the task, if anyone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_owner: Option<String>,
    /// When the task reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&crate::TaskInstance> for TaskOutcome {
    fn from(task: &crate::TaskInstance) -> Self {
        Self {
            task_id: task.id.clone(),
            node_id: task.node_id.clone(),
            name: task.name.clone(),
            final_state: task.state,
            actual_owner: task.actual_owner.clone(),
            completed_at: task.completed_at,
        }
    }
}
