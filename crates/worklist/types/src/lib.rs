//! Worklist Domain Types
//!
//! The data model for a human-task workflow engine: processes that run
//! until they reach a user-task node, suspend, and resume once a person
//! has claimed and completed the task.
//!
//! # Key Concepts
//!
//! - **ProcessDefinition**: An ordered sequence of nodes. Variable
//!   assignments run inline; user-task nodes suspend execution.
//! - **ProcessInstance**: A running execution of a definition, holding
//!   the variable map and every task it has produced.
//! - **TaskInstance**: A human work item with resolved potential-owner
//!   sets, an actual owner once claimed, and an output payload.
//! - **Principal / SecurityPolicy**: The caller identity (user name plus
//!   roles) attached to every task query and transition.
//! - **CompletedProcess**: The terminal record kept after an instance is
//!   reaped from the live index.
//!
//! # Design Principles
//!
//! 1. Tasks live inside their instance record, so completing a task and
//!    merging its outputs commit as one write.
//! 2. Ownership is explicit. An actual owner is set by claim and cleared
//!    only by release; it is never silently overwritten.
//! 3. Visibility is decided by potential owners alone, never by who
//!    currently holds the task.

#![deny(unsafe_code)]

mod completion;
mod definition;
mod errors;
mod identity;
mod instance;
mod task;

pub use completion::*;
pub use definition::*;
pub use errors::*;
pub use identity::*;
pub use instance::*;
pub use task::*;
