//! Process instances: running executions of process definitions
//!
//! A ProcessInstance tracks the runtime state of one execution: the
//! variable map, the tasks it has produced (in creation order), and the
//! node it is currently suspended on. Tasks live inside the instance
//! record so a task transition and the variable merge it carries commit
//! as one store write.

use crate::{NodeId, ProcessDefinitionId, TaskInstance, TaskInstanceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ── Instance Identifier ──────────────────────────────────────────────

/// Unique identifier for a process instance
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessInstanceId(pub String);

impl ProcessInstanceId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for ProcessInstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Instance State ───────────────────────────────────────────────────

/// The lifecycle state of a process instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InstanceState {
    /// Executing or suspended on a user task
    #[default]
    Active,
    /// Ran to the end of its definition
    Completed,
    /// Aborted by an authorized caller
    Aborted,
    /// Resumption faulted; preserved for inspection
    Error,
}

impl InstanceState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Error)
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "Active",
            Self::Completed => "Completed",
            Self::Aborted => "Aborted",
            Self::Error => "Error",
        };
        write!(f, "{}", s)
    }
}

// ── Process Instance ─────────────────────────────────────────────────

/// A running execution of a process definition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessInstance {
    /// Unique instance identifier
    pub id: ProcessInstanceId,
    /// The definition this instance was created from
    pub definition_id: ProcessDefinitionId,
    /// Current state
    pub state: InstanceState,
    /// Process variables
    pub variables: HashMap<String, Value>,
    /// Tasks produced by this instance, in creation order
    pub tasks: Vec<TaskInstance>,
    /// The node execution is suspended on, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_node: Option<NodeId>,
    /// Set on the first call to start; guards double starts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// The fault that moved the instance to Error, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the instance was created
    pub created_at: DateTime<Utc>,
    /// When the instance was last updated
    pub updated_at: DateTime<Utc>,
    /// When the instance reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProcessInstance {
    /// Create a new instance with its initial variables
    pub fn new(definition_id: ProcessDefinitionId, variables: HashMap<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            id: ProcessInstanceId::generate(),
            definition_id,
            state: InstanceState::Active,
            variables,
            tasks: Vec::new(),
            current_node: None,
            started_at: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Mark the instance as started
    pub fn mark_started(&mut self) {
        self.started_at = Some(Utc::now());
        self.touch();
    }

    /// Whether start has already been called
    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Write a process variable
    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
        self.touch();
    }

    /// Read a process variable
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Append a task produced by a user-task node
    pub fn add_task(&mut self, task: TaskInstance) {
        self.tasks.push(task);
        self.touch();
    }

    /// Get a task by ID
    pub fn task(&self, id: &TaskInstanceId) -> Option<&TaskInstance> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Get a task by ID, mutably
    pub fn task_mut(&mut self, id: &TaskInstanceId) -> Option<&mut TaskInstance> {
        self.tasks.iter_mut().find(|t| &t.id == id)
    }

    /// All non-terminal tasks, in creation order
    pub fn active_tasks(&self) -> Vec<&TaskInstance> {
        self.tasks.iter().filter(|t| !t.is_terminal()).collect()
    }

    /// Complete the instance
    pub fn complete(&mut self) {
        self.state = InstanceState::Completed;
        self.current_node = None;
        self.completed_at = Some(Utc::now());
        self.touch();
    }

    /// Abort the instance
    pub fn abort(&mut self) {
        self.state = InstanceState::Aborted;
        self.current_node = None;
        self.completed_at = Some(Utc::now());
        self.touch();
    }

    /// Move the instance to Error, preserving it for inspection
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.state = InstanceState::Error;
        self.error = Some(reason.into());
        self.touch();
    }

    /// Check if the instance is active
    pub fn is_active(&self) -> bool {
        self.state == InstanceState::Active
    }

    /// Check if the instance is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UserTaskNode;
    use serde_json::json;

    fn make_instance() -> ProcessInstance {
        let mut variables = HashMap::new();
        variables.insert("traveller".to_string(), json!({"name": "John"}));
        ProcessInstance::new(ProcessDefinitionId::new("approvals"), variables)
    }

    fn make_task(instance: &ProcessInstance) -> TaskInstance {
        let node = UserTaskNode::new("firstLineApproval").with_potential_group("managers");
        TaskInstance::from_node(
            instance.id.clone(),
            NodeId::new("first-line"),
            &node,
            &instance.variables,
        )
    }

    #[test]
    fn test_create_instance() {
        let inst = make_instance();
        assert_eq!(inst.state, InstanceState::Active);
        assert!(inst.is_active());
        assert!(!inst.is_terminal());
        assert!(!inst.has_started());
        assert_eq!(inst.variable("traveller").unwrap()["name"], json!("John"));
    }

    #[test]
    fn test_start_marker() {
        let mut inst = make_instance();
        assert!(!inst.has_started());
        inst.mark_started();
        assert!(inst.has_started());
    }

    #[test]
    fn test_task_bookkeeping() {
        let mut inst = make_instance();
        let mut task = make_task(&inst);
        task.ready();
        let task_id = task.id.clone();
        inst.add_task(task);

        assert_eq!(inst.active_tasks().len(), 1);
        assert!(inst.task(&task_id).is_some());

        inst.task_mut(&task_id).unwrap().complete();
        assert_eq!(inst.active_tasks().len(), 0);
        // completed tasks stay in the record
        assert_eq!(inst.tasks.len(), 1);
    }

    #[test]
    fn test_active_tasks_creation_order() {
        let mut inst = make_instance();
        let mut first = make_task(&inst);
        first.ready();
        let mut second = make_task(&inst);
        second.ready();
        let first_id = first.id.clone();

        inst.add_task(first);
        inst.add_task(second);

        let active = inst.active_tasks();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].id, first_id);
    }

    #[test]
    fn test_complete() {
        let mut inst = make_instance();
        inst.mark_started();
        inst.current_node = Some(NodeId::new("first-line"));
        inst.complete();

        assert_eq!(inst.state, InstanceState::Completed);
        assert!(inst.is_terminal());
        assert!(inst.current_node.is_none());
        assert!(inst.completed_at.is_some());
    }

    #[test]
    fn test_abort() {
        let mut inst = make_instance();
        inst.abort();
        assert_eq!(inst.state, InstanceState::Aborted);
        assert!(inst.is_terminal());
    }

    #[test]
    fn test_fail_preserves_reason() {
        let mut inst = make_instance();
        inst.fail("node 'second-line' not found");
        assert_eq!(inst.state, InstanceState::Error);
        assert!(inst.error.as_deref().unwrap().contains("second-line"));
    }

    #[test]
    fn test_set_variable_overwrites() {
        let mut inst = make_instance();
        inst.set_variable("approver", json!("manager"));
        inst.set_variable("approver", json!("director"));
        assert_eq!(inst.variable("approver").unwrap(), &json!("director"));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!InstanceState::Active.is_terminal());
        assert!(InstanceState::Completed.is_terminal());
        assert!(InstanceState::Aborted.is_terminal());
        assert!(InstanceState::Error.is_terminal());
    }

    #[test]
    fn test_instance_id() {
        let id = ProcessInstanceId::generate();
        assert!(!id.0.is_empty());
        assert!(id.short().len() <= 8);

        let named = ProcessInstanceId::new("inst-1");
        assert_eq!(format!("{}", named), "inst-1");
    }
}
