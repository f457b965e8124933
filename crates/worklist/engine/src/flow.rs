//! Flow abstraction: how the engine walks a process
//!
//! The runtime never interprets definitions directly. It asks a [`Flow`]
//! to advance from the last visited node and acts on the step it gets
//! back: suspend on a user task, or finish the instance. Automated
//! nodes between two user tasks run inside `advance`, so a single call
//! always lands on the next suspension point.

use serde_json::Value;
use std::collections::HashMap;
use worklist_types::{
    EngineError, EngineResult, NodeId, NodeKind, ProcessDefinition, ProcessDefinitionId,
    UserTaskNode,
};

/// Where a flow came to rest after advancing.
#[derive(Clone, Debug)]
pub enum FlowStep {
    /// The flow reached a user task and suspends until it completes
    UserTask {
        node_id: NodeId,
        node: UserTaskNode,
    },
    /// The flow ran off the end; the instance is done
    Complete,
}

/// An executable process, registered with the engine by id.
///
/// `advance` starts from the node after `from` (or from the first node
/// when `from` is `None`), executes automated nodes against the
/// variables in place, and stops at the next user task or the end.
pub trait Flow: Send + Sync {
    fn id(&self) -> &ProcessDefinitionId;

    fn name(&self) -> &str;

    fn version(&self) -> u32 {
        1
    }

    /// Checked once at registration
    fn validate(&self) -> EngineResult<()>;

    fn advance(
        &self,
        variables: &mut HashMap<String, Value>,
        from: Option<&NodeId>,
    ) -> EngineResult<FlowStep>;
}

impl Flow for ProcessDefinition {
    fn id(&self) -> &ProcessDefinitionId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn validate(&self) -> EngineResult<()> {
        ProcessDefinition::validate(self)
    }

    fn advance(
        &self,
        variables: &mut HashMap<String, Value>,
        from: Option<&NodeId>,
    ) -> EngineResult<FlowStep> {
        let mut next = match from {
            None => self.first_node(),
            Some(node_id) => {
                if self.get_node(node_id).is_none() {
                    return Err(EngineError::NodeNotFound(node_id.clone()));
                }
                self.node_after(node_id)
            }
        };

        while let Some(node) = next {
            match &node.kind {
                NodeKind::SetVariable { name, value } => {
                    variables.insert(name.clone(), value.clone());
                    next = self.node_after(&node.id);
                }
                NodeKind::UserTask(task) => {
                    return Ok(FlowStep::UserTask {
                        node_id: node.id.clone(),
                        node: task.clone(),
                    });
                }
            }
        }
        Ok(FlowStep::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use worklist_types::ProcessNode;

    fn make_definition() -> ProcessDefinition {
        let mut def = ProcessDefinition::new("approvals");
        def.add_node(ProcessNode::set_variable(
            "set-approver",
            "approver",
            json!("manager"),
        ))
        .unwrap();
        def.add_node(ProcessNode::user_task(
            "first-line",
            UserTaskNode::new("firstLineApproval").with_potential_group("managers"),
        ))
        .unwrap();
        def.add_node(ProcessNode::user_task(
            "second-line",
            UserTaskNode::new("secondLineApproval").with_potential_group("managers"),
        ))
        .unwrap();
        def
    }

    #[test]
    fn test_advance_runs_automated_nodes_up_to_first_task() {
        let def = make_definition();
        let mut variables = HashMap::new();

        let step = def.advance(&mut variables, None).unwrap();
        assert_eq!(variables.get("approver").unwrap(), &json!("manager"));
        match step {
            FlowStep::UserTask { node_id, node } => {
                assert_eq!(node_id, NodeId::new("first-line"));
                assert_eq!(node.task_name, "firstLineApproval");
            }
            FlowStep::Complete => panic!("expected a user task"),
        }
    }

    #[test]
    fn test_advance_moves_between_tasks() {
        let def = make_definition();
        let mut variables = HashMap::new();

        let step = def
            .advance(&mut variables, Some(&NodeId::new("first-line")))
            .unwrap();
        assert!(matches!(
            step,
            FlowStep::UserTask { node_id, .. } if node_id == NodeId::new("second-line")
        ));
    }

    #[test]
    fn test_advance_past_last_task_completes() {
        let def = make_definition();
        let mut variables = HashMap::new();

        let step = def
            .advance(&mut variables, Some(&NodeId::new("second-line")))
            .unwrap();
        assert!(matches!(step, FlowStep::Complete));
    }

    #[test]
    fn test_advance_from_unknown_node_fails() {
        let def = make_definition();
        let mut variables = HashMap::new();

        let err = def
            .advance(&mut variables, Some(&NodeId::new("missing")))
            .unwrap_err();
        assert!(matches!(err, EngineError::NodeNotFound(_)));
    }
}
