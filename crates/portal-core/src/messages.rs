//! Control messages a page may post to the offline cache manager.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages understood by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate the waiting worker without waiting for old pages to close.
    SkipWaiting,
}

impl ControlMessage {
    /// Interpret an arbitrary posted value. Anything unrecognised yields `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Interpret raw JSON text posted by a page.
    pub fn from_json(text: &str) -> Option<Self> {
        serde_json::from_str::<Value>(text)
            .ok()
            .and_then(|v| Self::from_value(&v))
    }
}
