//! Error types for the worklist engine

use crate::{NodeId, ProcessDefinitionId, ProcessInstanceId, TaskInstanceId};

/// Errors that can occur in engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Process definition not found: {0}")]
    DefinitionNotFound(ProcessDefinitionId),

    #[error("Process instance not found: {0}")]
    InstanceNotFound(ProcessInstanceId),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskInstanceId),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Unknown transition: {0}")]
    UnknownTransition(String),

    #[error("Process instance already started: {0}")]
    AlreadyStarted(ProcessInstanceId),

    #[error("Invalid security policy: {0}")]
    InvalidPolicy(String),

    #[error("Definition validation error: {0}")]
    ValidationError(String),

    #[error("Flow fault: {0}")]
    FlowFault(String),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
