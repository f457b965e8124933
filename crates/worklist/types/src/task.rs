//! Task instances: the human work items a process suspends on
//!
//! A TaskInstance is created when execution reaches a user-task node. It
//! carries the resolved potential-owner sets, the input payload, and the
//! outputs collected so far. State guards live in the engine's lifecycle
//! module; the mutators here are unguarded primitives.

use crate::{NodeId, ProcessInstanceId, UserTaskNode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

// ── Task Identifier ──────────────────────────────────────────────────

/// Unique identifier for a task instance
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskInstanceId(pub String);

impl TaskInstanceId {
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

impl std::fmt::Display for TaskInstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Task State ───────────────────────────────────────────────────────

/// The lifecycle state of a task instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TaskState {
    /// Created but potential owners not yet resolved
    #[default]
    Created,
    /// Waiting for a potential owner to claim it
    Ready,
    /// Claimed: an actual owner is set
    Reserved,
    /// The owner has started working
    InProgress,
    /// Successfully completed, outputs committed
    Completed,
    /// Aborted before completion
    Aborted,
}

impl TaskState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "Created",
            Self::Ready => "Ready",
            Self::Reserved => "Reserved",
            Self::InProgress => "InProgress",
            Self::Completed => "Completed",
            Self::Aborted => "Aborted",
        };
        write!(f, "{}", s)
    }
}

// ── Task Instance ────────────────────────────────────────────────────

/// A human work item created at a user-task node
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskInstance {
    /// Unique task identifier
    pub id: TaskInstanceId,
    /// The process instance this task belongs to
    pub process_instance_id: ProcessInstanceId,
    /// The node that produced this task
    pub node_id: NodeId,
    /// The task name shown to workers
    pub name: String,
    /// Current lifecycle state
    pub state: TaskState,
    /// Users allowed to work on this task (resolved at creation)
    pub potential_users: HashSet<String>,
    /// Groups whose members are allowed to work on this task
    pub potential_groups: HashSet<String>,
    /// The user who claimed the task, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_owner: Option<String>,
    /// Input payload resolved from process variables
    pub inputs: HashMap<String, Value>,
    /// Outputs collected so far
    pub outputs: HashMap<String, Value>,
    /// Output mapping carried from the definition: output key to the
    /// process variable it merges into
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub output_mappings: HashMap<String, String>,
    /// When the task was created
    pub created_at: DateTime<Utc>,
    /// When the task was last updated
    pub updated_at: DateTime<Utc>,
    /// When the task reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskInstance {
    /// Create a task from a user-task node, resolving owner references
    /// and input mappings against the current process variables
    pub fn from_node(
        process_instance_id: ProcessInstanceId,
        node_id: NodeId,
        node: &UserTaskNode,
        variables: &HashMap<String, Value>,
    ) -> Self {
        let potential_users = node
            .potential_users
            .iter()
            .filter_map(|r| r.resolve(variables))
            .collect();
        let potential_groups = node
            .potential_groups
            .iter()
            .filter_map(|r| r.resolve(variables))
            .collect();
        let inputs = node
            .inputs
            .iter()
            .filter_map(|(key, source)| source.resolve(variables).map(|v| (key.clone(), v)))
            .collect();

        let now = Utc::now();
        Self {
            id: TaskInstanceId::generate(),
            process_instance_id,
            node_id,
            name: node.task_name.clone(),
            state: TaskState::Created,
            potential_users,
            potential_groups,
            actual_owner: None,
            inputs,
            outputs: HashMap::new(),
            output_mappings: node.outputs.clone(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Advance to Ready: the task is claimable by its potential owners
    pub fn ready(&mut self) {
        self.state = TaskState::Ready;
        self.touch();
    }

    /// Reserve the task for an owner
    pub fn reserve(&mut self, owner: impl Into<String>) {
        self.actual_owner = Some(owner.into());
        self.state = TaskState::Reserved;
        self.touch();
    }

    /// Mark work as started
    pub fn start(&mut self) {
        self.state = TaskState::InProgress;
        self.touch();
    }

    /// Release the task back to its potential owners
    pub fn release(&mut self) {
        self.actual_owner = None;
        self.state = TaskState::Ready;
        self.touch();
    }

    /// Record an output value
    pub fn set_output(&mut self, key: impl Into<String>, value: Value) {
        self.outputs.insert(key.into(), value);
        self.touch();
    }

    /// The process variable an output key merges into. Unmapped keys
    /// pass through under their own name.
    pub fn variable_for<'a>(&'a self, key: &'a str) -> &'a str {
        self.output_mappings.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Complete the task
    pub fn complete(&mut self) {
        self.state = TaskState::Completed;
        self.completed_at = Some(Utc::now());
        self.touch();
    }

    /// Abort the task
    pub fn abort(&mut self) {
        self.state = TaskState::Aborted;
        self.completed_at = Some(Utc::now());
        self.touch();
    }

    /// Check if the task is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Check if the task is claimed by the given user
    pub fn is_owned_by(&self, user: &str) -> bool {
        self.actual_owner.as_deref() == Some(user)
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

    fn make_task() -> TaskInstance {
        let node = UserTaskNode::new("firstLineApproval")
            .with_potential_group("managers")
            .with_input("traveller", "traveller")
            .with_output("approved", "firstLineApproval");
        let mut variables = HashMap::new();
        variables.insert("traveller".to_string(), json!({"name": "John"}));

        TaskInstance::from_node(
            ProcessInstanceId::new("inst-1"),
            NodeId::new("first-line"),
            &node,
            &variables,
        )
    }

    #[test]
    fn test_from_node_resolves_inputs() {
        let task = make_task();
        assert_eq!(task.name, "firstLineApproval");
        assert_eq!(task.state, TaskState::Created);
        assert!(task.potential_groups.contains("managers"));
        assert_eq!(task.inputs.get("traveller").unwrap(), &json!({"name": "John"}));
        assert!(task.actual_owner.is_none());
    }

    #[test]
    fn test_output_mapping_carried_from_node() {
        let task = make_task();
        assert_eq!(task.variable_for("approved"), "firstLineApproval");
        assert_eq!(task.variable_for("comment"), "comment");
    }

    #[test]
    fn test_from_node_resolves_variable_owner() {
        let node = UserTaskNode::new("secondLineApproval")
            .with_potential_user_from("approver")
            .with_potential_group("managers");
        let mut variables = HashMap::new();
        variables.insert("approver".to_string(), json!("manager"));

        let task = TaskInstance::from_node(
            ProcessInstanceId::new("inst-1"),
            NodeId::new("second-line"),
            &node,
            &variables,
        );
        assert!(task.potential_users.contains("manager"));
    }

    #[test]
    fn test_unresolvable_owner_is_skipped() {
        let node = UserTaskNode::new("task")
            .with_potential_user_from("missing")
            .with_potential_group("managers");
        let variables = HashMap::new();

        let task = TaskInstance::from_node(
            ProcessInstanceId::new("inst-1"),
            NodeId::new("n"),
            &node,
            &variables,
        );
        assert!(task.potential_users.is_empty());
        assert!(task.potential_groups.contains("managers"));
    }

    #[test]
    fn test_lifecycle_mutators() {
        let mut task = make_task();
        task.ready();
        assert_eq!(task.state, TaskState::Ready);

        task.reserve("admin");
        assert_eq!(task.state, TaskState::Reserved);
        assert!(task.is_owned_by("admin"));
        assert!(!task.is_owned_by("john"));

        task.start();
        assert_eq!(task.state, TaskState::InProgress);

        task.set_output("approved", json!(true));
        task.complete();
        assert_eq!(task.state, TaskState::Completed);
        assert!(task.is_terminal());
        assert!(task.completed_at.is_some());
        assert_eq!(task.outputs.get("approved").unwrap(), &json!(true));
    }

    #[test]
    fn test_release_clears_owner() {
        let mut task = make_task();
        task.ready();
        task.reserve("admin");
        task.release();

        assert_eq!(task.state, TaskState::Ready);
        assert!(task.actual_owner.is_none());
    }

    #[test]
    fn test_abort() {
        let mut task = make_task();
        task.ready();
        task.abort();
        assert_eq!(task.state, TaskState::Aborted);
        assert!(task.is_terminal());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TaskState::Created.is_terminal());
        assert!(!TaskState::Ready.is_terminal());
        assert!(!TaskState::Reserved.is_terminal());
        assert!(!TaskState::InProgress.is_terminal());
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Aborted.is_terminal());
    }

    #[test]
    fn test_task_id() {
        let id = TaskInstanceId::generate();
        assert!(!id.0.is_empty());
        assert!(id.short().len() <= 8);
    }
}
