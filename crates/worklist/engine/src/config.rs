//! Engine configuration

use serde::{Deserialize, Serialize};

/// Tuning knobs for the process engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How many times a faulted resumption is retried before the
    /// instance is marked as errored
    pub resume_retry_limit: u32,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resume_retry_limit(mut self, limit: u32) -> Self {
        self.resume_retry_limit = limit;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resume_retry_limit: 3,
        }
    }
}
