use serde::{Deserialize, Serialize};

use threadline_persist::DEFAULT_HISTORY_LIMIT;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Recent messages replayed into each producer call
    pub history_limit: usize,
    /// Completion tokens reserved in the pre-flight check when the request
    /// does not name its own `max_completion_tokens`
    pub reserved_completion_tokens: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            reserved_completion_tokens: 0,
        }
    }
}
