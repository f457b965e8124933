//! Guarded task lifecycle transitions
//!
//! Tasks move through Created -> Ready -> Reserved -> InProgress and
//! end in Completed or Aborted. Every transition is checked in a fixed
//! order: visibility first (the caller must be a potential owner), then
//! ownership (a task held by someone else rejects everyone but its
//! owner), then the state machine itself. Completing a Ready task
//! claims it implicitly in the same call.

use crate::authorization;
use serde_json::Value;
use std::collections::HashMap;
use worklist_types::{EngineError, EngineResult, SecurityPolicy, TaskInstance, TaskState};

// ── Transitions ──────────────────────────────────────────────────────

/// A requested change to a single task.
#[derive(Clone, Debug)]
pub enum TaskTransition {
    /// Reserve the task for the caller
    Claim,
    /// Begin working a reserved task
    Start,
    /// Finish the task, folding the payload into its outputs first
    Complete { outputs: HashMap<String, Value> },
    /// Abort the task, and with it the owning instance
    Abort,
    /// Hand a reserved task back to its potential owners
    Release,
}

impl TaskTransition {
    /// Parses the uniform string entry point. The payload only means
    /// something for `complete`; the other transitions ignore it.
    pub fn from_name(name: &str, payload: HashMap<String, Value>) -> EngineResult<Self> {
        match name {
            "claim" => Ok(Self::Claim),
            "start" => Ok(Self::Start),
            "complete" => Ok(Self::Complete { outputs: payload }),
            "abort" => Ok(Self::Abort),
            "release" => Ok(Self::Release),
            other => Err(EngineError::UnknownTransition(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Start => "start",
            Self::Complete { .. } => "complete",
            Self::Abort => "abort",
            Self::Release => "release",
        }
    }
}

/// What the runtime has left to do after a transition went through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The task changed state or hands; nothing else follows
    Updated,
    /// The task completed; merge its outputs and resume the flow
    Completed,
    /// The task aborted; the owning instance can never advance past it
    Aborted,
}

// ── Guards ───────────────────────────────────────────────────────────

fn check_visibility(task: &TaskInstance, policy: &SecurityPolicy) -> EngineResult<()> {
    if authorization::evaluate(task, policy)? {
        Ok(())
    } else {
        Err(EngineError::NotAuthorized(format!(
            "user '{}' is not a potential owner of task '{}'",
            policy.principal(),
            task.id
        )))
    }
}

/// A reserved task rejects everyone but its owner, whatever roles the
/// caller holds.
fn check_ownership(task: &TaskInstance, policy: &SecurityPolicy) -> EngineResult<()> {
    match &task.actual_owner {
        Some(owner) if owner != policy.principal().name() => Err(EngineError::NotAuthorized(
            format!("task '{}' is reserved by '{}'", task.id, owner),
        )),
        _ => Ok(()),
    }
}

fn invalid_state(task: &TaskInstance, verb: &str) -> EngineError {
    EngineError::InvalidTransition(format!(
        "cannot {} task '{}' in state {}",
        verb, task.id, task.state
    ))
}

// ── Apply ────────────────────────────────────────────────────────────

/// Validates and applies a transition, mutating the task in place.
pub fn apply(
    task: &mut TaskInstance,
    transition: TaskTransition,
    policy: &SecurityPolicy,
) -> EngineResult<TransitionOutcome> {
    check_visibility(task, policy)?;
    check_ownership(task, policy)?;

    let caller = policy.principal().name().to_string();
    match transition {
        TaskTransition::Claim => {
            if task.state != TaskState::Ready {
                return Err(invalid_state(task, "claim"));
            }
            task.reserve(caller);
            Ok(TransitionOutcome::Updated)
        }
        TaskTransition::Start => {
            if task.state != TaskState::Reserved {
                return Err(invalid_state(task, "start"));
            }
            task.start();
            Ok(TransitionOutcome::Updated)
        }
        TaskTransition::Complete { outputs } => {
            if !matches!(
                task.state,
                TaskState::Ready | TaskState::Reserved | TaskState::InProgress
            ) {
                return Err(invalid_state(task, "complete"));
            }
            if task.state == TaskState::Ready {
                task.reserve(caller);
            }
            for (key, value) in outputs {
                task.set_output(key, value);
            }
            task.complete();
            Ok(TransitionOutcome::Completed)
        }
        TaskTransition::Abort => {
            if task.is_terminal() {
                return Err(invalid_state(task, "abort"));
            }
            task.abort();
            Ok(TransitionOutcome::Aborted)
        }
        TaskTransition::Release => {
            if !matches!(task.state, TaskState::Reserved | TaskState::InProgress) {
                return Err(invalid_state(task, "release"));
            }
            task.release();
            Ok(TransitionOutcome::Updated)
        }
    }
}

/// Records an output on a claimed task without completing it. The task
/// must be Reserved or InProgress, so an unclaimed task has to be
/// claimed first.
pub fn set_output(
    task: &mut TaskInstance,
    key: impl Into<String>,
    value: Value,
    policy: &SecurityPolicy,
) -> EngineResult<()> {
    check_visibility(task, policy)?;
    check_ownership(task, policy)?;
    if !matches!(task.state, TaskState::Reserved | TaskState::InProgress) {
        return Err(invalid_state(task, "set outputs on"));
    }
    task.set_output(key, value);
    Ok(())
}
