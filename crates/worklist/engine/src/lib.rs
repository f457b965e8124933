//! Worklist Engine Runtime
//!
//! Executes processes that pause for people. A registered [`Flow`] runs
//! until it reaches a user-task node, where the engine materializes a
//! work item, offers it to the node's potential owners, and suspends.
//! Completing the work item merges its outputs into the process
//! variables and resumes the flow, synchronously, until the next task
//! or the end of the process.
//!
//! # Key Components
//!
//! - [`ProcessEngine`]: instance lifecycle, work item queries and the
//!   task entry points
//! - [`DefinitionRegistry`]: registered flows, versioned by name
//! - [`lifecycle`]: the guarded claim/start/complete/abort/release
//!   state machine
//! - [`InstanceStore`] / [`TaskIndex`]: injectable persistence
//! - [`AuditTrail`]: per-instance history of everything that happened
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use serde_json::json;
//! use worklist_engine::ProcessEngine;
//! use worklist_types::{Principal, ProcessDefinition, ProcessNode, SecurityPolicy, UserTaskNode};
//!
//! let engine = ProcessEngine::new();
//!
//! let mut def = ProcessDefinition::new("review");
//! def.add_node(ProcessNode::user_task(
//!     "review",
//!     UserTaskNode::new("reviewDocument").with_potential_group("reviewers"),
//! ))
//! .unwrap();
//! let def_id = engine.register_definition(Arc::new(def)).unwrap();
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! rt.block_on(async {
//!     let reviewer = SecurityPolicy::of(Principal::new("jane").with_role("reviewers"));
//!
//!     let id = engine.create_instance(&def_id, HashMap::new()).await.unwrap();
//!     engine.start(&id).await.unwrap();
//!
//!     let items = engine.work_items(&id, &reviewer).await.unwrap();
//!     assert_eq!(items.len(), 1);
//!
//!     let outputs = HashMap::from([("approved".to_string(), json!(true))]);
//!     engine
//!         .complete_work_item(&id, &items[0].id, outputs, &reviewer)
//!         .await
//!         .unwrap();
//!
//!     // the finished instance is archived away from the live index
//!     assert!(engine.find_by_id(&id).await.unwrap().is_none());
//! });
//! ```

#![deny(unsafe_code)]

pub mod authorization;
pub mod config;
pub mod events;
pub mod flow;
pub mod lifecycle;
pub mod memory;
pub mod query;
pub mod registry;
pub mod runtime;
pub mod store;

pub use config::EngineConfig;
pub use events::{AuditEvent, AuditRecord, AuditTrail};
pub use flow::{Flow, FlowStep};
pub use lifecycle::{TaskTransition, TransitionOutcome};
pub use memory::{InMemoryInstanceStore, InMemoryTaskIndex};
pub use registry::DefinitionRegistry;
pub use runtime::ProcessEngine;
pub use store::{InstanceStore, TaskIndex};
