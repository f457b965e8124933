//! Potential-owner authorization for work items
//!
//! A task is visible to a caller when the caller's name is among the
//! task's potential users, or any of the caller's roles is among its
//! potential groups. Visibility looks only at potential owners; whether
//! the task is currently reserved is a lifecycle concern, checked
//! separately by the transition guards.

use worklist_types::{EngineError, EngineResult, SecurityPolicy, TaskInstance};

/// Decides whether the policy's principal may see and act on the task.
///
/// An anonymous principal (no name, no roles) is rejected outright with
/// [`EngineError::InvalidPolicy`] rather than silently denied.
pub fn evaluate(task: &TaskInstance, policy: &SecurityPolicy) -> EngineResult<bool> {
    let principal = policy.principal();
    if principal.is_anonymous() {
        return Err(EngineError::InvalidPolicy(
            "principal has no name and no roles".to_string(),
        ));
    }
    if task.potential_users.contains(principal.name()) {
        return Ok(true);
    }
    Ok(principal
        .roles()
        .iter()
        .any(|role| task.potential_groups.contains(role)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use worklist_types::{NodeId, Principal, ProcessInstanceId, TaskInstance, UserTaskNode};

    fn make_task() -> TaskInstance {
        let node = UserTaskNode::new("firstLineApproval")
            .with_potential_user("john")
            .with_potential_group("managers");
        TaskInstance::from_node(
            ProcessInstanceId::new("inst-1"),
            NodeId::new("first-line"),
            &node,
            &HashMap::new(),
        )
    }

    #[test]
    fn test_group_membership_grants_access() {
        let task = make_task();
        let policy = SecurityPolicy::of(Principal::new("admin").with_role("managers"));
        assert!(evaluate(&task, &policy).unwrap());
    }

    #[test]
    fn test_named_user_grants_access() {
        let task = make_task();
        let policy = SecurityPolicy::of(Principal::new("john"));
        assert!(evaluate(&task, &policy).unwrap());
    }

    #[test]
    fn test_unrelated_role_is_denied() {
        let task = make_task();
        let policy = SecurityPolicy::of(Principal::new("mary").with_role("mgmt"));
        assert!(!evaluate(&task, &policy).unwrap());
    }

    #[test]
    fn test_reservation_does_not_affect_visibility() {
        let mut task = make_task();
        task.ready();
        task.reserve("admin");
        let policy = SecurityPolicy::of(Principal::new("john"));
        assert!(evaluate(&task, &policy).unwrap());
    }

    #[test]
    fn test_anonymous_principal_is_rejected() {
        let task = make_task();
        let policy = SecurityPolicy::of(Principal::new(""));
        assert!(matches!(
            evaluate(&task, &policy),
            Err(EngineError::InvalidPolicy(_))
        ));
    }
}
