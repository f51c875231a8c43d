//! Tunables for the service manager facade and native backends

use serde::{Deserialize, Serialize};

use crate::buffer::{DEFAULT_MAX_BUFFER, DEFAULT_MAX_PAGES};

/// Default dependency walk depth
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Settings shared by the facade and the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Operations allowed to run on the worker pool at once
    pub workers: usize,
    /// Largest buffer the negotiator will allocate for one native call
    pub max_buffer_bytes: usize,
    /// Largest number of pages accepted from one paged enumeration
    pub max_pages: usize,
    /// Depth limit for transitive dependent walks
    pub max_depth: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_buffer_bytes: DEFAULT_MAX_BUFFER,
            max_pages: DEFAULT_MAX_PAGES,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ManagerConfig {
    /// Clamp values that would make the facade unusable
    pub fn normalized(mut self) -> Self {
        self.workers = self.workers.max(1);
        self.max_pages = self.max_pages.max(1);
        self.max_buffer_bytes = self.max_buffer_bytes.max(4096);
        self
    }
}
