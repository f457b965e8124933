//! Process definitions: the blueprint a process instance executes
//!
//! A ProcessDefinition is an ordered sequence of nodes. Execution runs
//! the sequence from the top, evaluating variable assignments inline and
//! suspending at each user-task node until the task reaches a terminal
//! state. Definitions are immutable once validated; to modify one,
//! register a new version.

use crate::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

// ── Identifiers ──────────────────────────────────────────────────────

/// Unique identifier for a process definition
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessDefinitionId(pub String);

impl ProcessDefinitionId {
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

impl std::fmt::Display for ProcessDefinitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a node within a process definition
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Process Definition ───────────────────────────────────────────────

/// A process definition: an ordered sequence of nodes
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessDefinition {
    /// Unique identifier
    pub id: ProcessDefinitionId,
    /// Human-readable name
    pub name: String,
    /// Version for tracking definition evolution
    pub version: u32,
    /// The nodes, in execution order
    pub nodes: Vec<ProcessNode>,
    /// When this definition was created
    pub created_at: DateTime<Utc>,
}

impl ProcessDefinition {
    /// Create a new, empty process definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ProcessDefinitionId::generate(),
            name: name.into(),
            version: 1,
            nodes: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: ProcessDefinitionId) -> Self {
        self.id = id;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Append a node to the execution sequence
    pub fn add_node(&mut self, node: ProcessNode) -> EngineResult<()> {
        if self.nodes.iter().any(|n| n.id == node.id) {
            return Err(EngineError::ValidationError(format!(
                "duplicate node id: {}",
                node.id
            )));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// The first node of the sequence
    pub fn first_node(&self) -> Option<&ProcessNode> {
        self.nodes.first()
    }

    /// The node executed after the given one, if any
    pub fn node_after(&self, id: &NodeId) -> Option<&ProcessNode> {
        let pos = self.nodes.iter().position(|n| &n.id == id)?;
        self.nodes.get(pos + 1)
    }

    /// Get a node by ID
    pub fn get_node(&self, id: &NodeId) -> Option<&ProcessNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Total number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Validate the definition for structural correctness
    pub fn validate(&self) -> EngineResult<()> {
        if self.nodes.is_empty() {
            return Err(EngineError::ValidationError(
                "process must have at least one node".into(),
            ));
        }

        let mut seen_ids = HashSet::new();
        for node in &self.nodes {
            if !seen_ids.insert(&node.id) {
                return Err(EngineError::ValidationError(format!(
                    "duplicate node id: {}",
                    node.id
                )));
            }

            match &node.kind {
                NodeKind::SetVariable { name, .. } => {
                    if name.is_empty() {
                        return Err(EngineError::ValidationError(format!(
                            "node '{}' assigns an unnamed variable",
                            node.id
                        )));
                    }
                }
                NodeKind::UserTask(task) => task.validate(&node.id)?,
            }
        }

        Ok(())
    }
}

// ── Process Node ─────────────────────────────────────────────────────

/// A node in the execution sequence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessNode {
    /// Unique identifier within this definition
    pub id: NodeId,
    /// What the node does when execution reaches it
    pub kind: NodeKind,
}

impl ProcessNode {
    /// Create a variable-assignment node
    pub fn set_variable(id: impl Into<String>, name: impl Into<String>, value: Value) -> Self {
        Self {
            id: NodeId::new(id),
            kind: NodeKind::SetVariable {
                name: name.into(),
                value,
            },
        }
    }

    /// Create a user-task node
    pub fn user_task(id: impl Into<String>, task: UserTaskNode) -> Self {
        Self {
            id: NodeId::new(id),
            kind: NodeKind::UserTask(task),
        }
    }
}

/// What a node does when execution reaches it
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum NodeKind {
    /// Assign a value to a process variable and continue
    SetVariable { name: String, value: Value },
    /// Suspend execution until a human task reaches a terminal state
    UserTask(UserTaskNode),
}

// ── User Task Node ───────────────────────────────────────────────────

/// The template for a human task created when execution suspends
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserTaskNode {
    /// The task name shown to workers
    pub task_name: String,
    /// Users allowed to work on the task
    pub potential_users: Vec<OwnerRef>,
    /// Groups whose members are allowed to work on the task
    pub potential_groups: Vec<OwnerRef>,
    /// Task input payload: input key to its source
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub inputs: HashMap<String, InputSource>,
    /// Output mapping: task output key to process variable name.
    /// Outputs with no mapping merge under their own key.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub outputs: HashMap<String, String>,
}

impl UserTaskNode {
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            potential_users: Vec::new(),
            potential_groups: Vec::new(),
            inputs: HashMap::new(),
            outputs: HashMap::new(),
        }
    }

    /// Allow a named user to work on the task
    pub fn with_potential_user(mut self, name: impl Into<String>) -> Self {
        self.potential_users.push(OwnerRef::Name(name.into()));
        self
    }

    /// Allow the user named by a process variable to work on the task
    pub fn with_potential_user_from(mut self, variable: impl Into<String>) -> Self {
        self.potential_users
            .push(OwnerRef::FromVariable(variable.into()));
        self
    }

    /// Allow members of a named group to work on the task
    pub fn with_potential_group(mut self, name: impl Into<String>) -> Self {
        self.potential_groups.push(OwnerRef::Name(name.into()));
        self
    }

    /// Copy a process variable into the task input payload
    pub fn with_input(mut self, key: impl Into<String>, variable: impl Into<String>) -> Self {
        self.inputs
            .insert(key.into(), InputSource::Variable(variable.into()));
        self
    }

    /// Put a literal value into the task input payload
    pub fn with_literal_input(mut self, key: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(key.into(), InputSource::Literal(value));
        self
    }

    /// Map a task output key onto a process variable
    pub fn with_output(mut self, key: impl Into<String>, variable: impl Into<String>) -> Self {
        self.outputs.insert(key.into(), variable.into());
        self
    }

    /// The process variable a task output key merges into
    pub fn variable_for_output<'a>(&'a self, key: &'a str) -> &'a str {
        self.outputs.get(key).map(String::as_str).unwrap_or(key)
    }

    fn validate(&self, node_id: &NodeId) -> EngineResult<()> {
        if self.task_name.is_empty() {
            return Err(EngineError::ValidationError(format!(
                "user task at node '{}' has no name",
                node_id
            )));
        }
        if self.potential_users.is_empty() && self.potential_groups.is_empty() {
            return Err(EngineError::ValidationError(format!(
                "user task '{}' has no potential owners",
                self.task_name
            )));
        }
        for variable in self.outputs.values() {
            if variable.is_empty() {
                return Err(EngineError::ValidationError(format!(
                    "user task '{}' maps an output to an unnamed variable",
                    self.task_name
                )));
            }
        }
        Ok(())
    }
}

// ── Owner and Input References ───────────────────────────────────────

/// How a potential owner is named in a definition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnerRef {
    /// A literal user or group name
    Name(String),
    /// The string value of a process variable at task creation time
    FromVariable(String),
}

impl OwnerRef {
    /// Resolve against the process variables. A reference to a missing
    /// or non-string variable resolves to nothing.
    pub fn resolve(&self, variables: &HashMap<String, Value>) -> Option<String> {
        match self {
            Self::Name(name) => Some(name.clone()),
            Self::FromVariable(variable) => variables
                .get(variable)
                .and_then(Value::as_str)
                .map(String::from),
        }
    }
}

/// Where a task input value comes from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputSource {
    /// The current value of a process variable
    Variable(String),
    /// A literal value
    Literal(Value),
}

impl InputSource {
    pub fn resolve(&self, variables: &HashMap<String, Value>) -> Option<Value> {
        match self {
            Self::Variable(variable) => variables.get(variable).cloned(),
            Self::Literal(value) => Some(value.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_approvals_definition() -> ProcessDefinition {
        let mut def = ProcessDefinition::new("approvals");
        def.add_node(ProcessNode::set_variable(
            "set-approver",
            "approver",
            json!("manager"),
        ))
        .unwrap();
        def.add_node(ProcessNode::user_task(
            "first-line",
            UserTaskNode::new("firstLineApproval")
                .with_potential_group("managers")
                .with_input("traveller", "traveller")
                .with_output("approved", "firstLineApproval"),
        ))
        .unwrap();
        def.add_node(ProcessNode::user_task(
            "second-line",
            UserTaskNode::new("secondLineApproval")
                .with_potential_group("managers")
                .with_potential_user_from("approver")
                .with_output("approved", "secondLineApproval"),
        ))
        .unwrap();
        def
    }

    #[test]
    fn test_build_definition() {
        let def = make_approvals_definition();
        assert_eq!(def.name, "approvals");
        assert_eq!(def.version, 1);
        assert_eq!(def.node_count(), 3);
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_node_sequence() {
        let def = make_approvals_definition();
        assert_eq!(def.first_node().unwrap().id, NodeId::new("set-approver"));

        let next = def.node_after(&NodeId::new("set-approver")).unwrap();
        assert_eq!(next.id, NodeId::new("first-line"));

        let last = def.node_after(&NodeId::new("second-line"));
        assert!(last.is_none());
    }

    #[test]
    fn test_duplicate_node_id() {
        let mut def = ProcessDefinition::new("dup");
        def.add_node(ProcessNode::set_variable("a", "x", json!(1)))
            .unwrap();
        let result = def.add_node(ProcessNode::set_variable("a", "y", json!(2)));
        assert!(matches!(result, Err(EngineError::ValidationError(_))));
    }

    #[test]
    fn test_validate_empty_definition() {
        let def = ProcessDefinition::new("empty");
        assert!(matches!(
            def.validate(),
            Err(EngineError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_task_without_owners() {
        let mut def = ProcessDefinition::new("unowned");
        def.add_node(ProcessNode::user_task(
            "t",
            UserTaskNode::new("orphaned"),
        ))
        .unwrap();
        assert!(matches!(
            def.validate(),
            Err(EngineError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_unnamed_task() {
        let mut def = ProcessDefinition::new("unnamed");
        def.add_node(ProcessNode::user_task(
            "t",
            UserTaskNode::new("").with_potential_group("managers"),
        ))
        .unwrap();
        assert!(matches!(
            def.validate(),
            Err(EngineError::ValidationError(_))
        ));
    }

    #[test]
    fn test_owner_ref_resolution() {
        let mut variables = HashMap::new();
        variables.insert("approver".to_string(), json!("manager"));
        variables.insert("count".to_string(), json!(3));

        assert_eq!(
            OwnerRef::Name("john".into()).resolve(&variables),
            Some("john".to_string())
        );
        assert_eq!(
            OwnerRef::FromVariable("approver".into()).resolve(&variables),
            Some("manager".to_string())
        );
        // missing and non-string variables resolve to nothing
        assert_eq!(OwnerRef::FromVariable("missing".into()).resolve(&variables), None);
        assert_eq!(OwnerRef::FromVariable("count".into()).resolve(&variables), None);
    }

    #[test]
    fn test_input_source_resolution() {
        let mut variables = HashMap::new();
        variables.insert("traveller".to_string(), json!({"name": "John"}));

        assert_eq!(
            InputSource::Variable("traveller".into()).resolve(&variables),
            Some(json!({"name": "John"}))
        );
        assert_eq!(InputSource::Variable("missing".into()).resolve(&variables), None);
        assert_eq!(
            InputSource::Literal(json!(42)).resolve(&variables),
            Some(json!(42))
        );
    }

    #[test]
    fn test_output_mapping() {
        let task = UserTaskNode::new("review").with_output("approved", "firstLineApproval");
        assert_eq!(task.variable_for_output("approved"), "firstLineApproval");
        // unmapped keys pass through unchanged
        assert_eq!(task.variable_for_output("comment"), "comment");
    }

    #[test]
    fn test_definition_id() {
        let id = ProcessDefinitionId::generate();
        assert!(!id.0.is_empty());
        assert!(id.short().len() <= 8);

        let named = ProcessDefinitionId::new("approvals");
        assert_eq!(format!("{}", named), "approvals");
    }
}
