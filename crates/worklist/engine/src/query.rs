//! Work item queries
//!
//! Pure read-side filtering: which of an instance's live tasks a given
//! caller may see. Queries never mutate anything, so asking twice gives
//! the same answer.

use crate::authorization;
use worklist_types::{EngineResult, ProcessInstance, SecurityPolicy, TaskInstance};

/// The non-terminal tasks of an instance visible to the caller, in
/// creation order.
pub fn visible_tasks(
    instance: &ProcessInstance,
    policy: &SecurityPolicy,
) -> EngineResult<Vec<TaskInstance>> {
    let mut visible = Vec::new();
    for task in instance.active_tasks() {
        if authorization::evaluate(task, policy)? {
            visible.push(task.clone());
        }
    }
    Ok(visible)
}
