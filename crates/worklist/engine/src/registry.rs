//! Registry of executable process definitions
//!
//! Flows register once, keyed by definition id, with a secondary index
//! from process name to every registered version of that name. The
//! registry validates a flow before accepting it and never accepts the
//! same id twice.

use crate::flow::Flow;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use worklist_types::{EngineError, EngineResult, ProcessDefinitionId};

pub struct DefinitionRegistry {
    definitions: DashMap<ProcessDefinitionId, Arc<dyn Flow>>,
    by_name: DashMap<String, Vec<ProcessDefinitionId>>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self {
            definitions: DashMap::new(),
            by_name: DashMap::new(),
        }
    }

    /// Validates and stores a flow, indexing it under its name.
    pub fn register(&self, flow: Arc<dyn Flow>) -> EngineResult<ProcessDefinitionId> {
        flow.validate()?;
        let id = flow.id().clone();
        let name = flow.name().to_string();
        let version = flow.version();

        match self.definitions.entry(id.clone()) {
            Entry::Occupied(_) => {
                return Err(EngineError::ValidationError(format!(
                    "definition '{}' is already registered",
                    id
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(flow);
            }
        }
        self.by_name.entry(name.clone()).or_default().push(id.clone());

        tracing::info!(definition_id = %id, name = %name, version, "process definition registered");
        Ok(id)
    }

    pub fn get(&self, id: &ProcessDefinitionId) -> EngineResult<Arc<dyn Flow>> {
        self.definitions
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| EngineError::DefinitionNotFound(id.clone()))
    }

    pub fn contains(&self, id: &ProcessDefinitionId) -> bool {
        self.definitions.contains_key(id)
    }

    /// The highest registered version for a process name
    pub fn latest_by_name(&self, name: &str) -> Option<Arc<dyn Flow>> {
        self.versions_by_name(name).into_iter().next_back()
    }

    /// All registered versions for a process name, oldest first
    pub fn versions_by_name(&self, name: &str) -> Vec<Arc<dyn Flow>> {
        let ids = match self.by_name.get(name) {
            Some(ids) => ids.clone(),
            None => return Vec::new(),
        };
        let mut flows: Vec<Arc<dyn Flow>> = ids
            .iter()
            .filter_map(|id| self.definitions.get(id).map(|entry| entry.clone()))
            .collect();
        flows.sort_by_key(|flow| flow.version());
        flows
    }

    pub fn remove(&self, id: &ProcessDefinitionId) -> Option<Arc<dyn Flow>> {
        let (_, flow) = self.definitions.remove(id)?;
        if let Some(mut ids) = self.by_name.get_mut(flow.name()) {
            ids.retain(|candidate| candidate != id);
        }
        Some(flow)
    }

    pub fn count(&self) -> usize {
        self.definitions.len()
    }
}

impl Default for DefinitionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
