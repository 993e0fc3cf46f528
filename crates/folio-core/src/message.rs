//! Control channel messages sent by the host page

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A structured message on the control channel, tagged by `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Leave the waiting state and activate immediately
    SkipWaiting,
}

impl ControlMessage {
    pub fn from_json(data: &str) -> Result<Self, CoreError> {
        serde_json::from_str(data).map_err(|e| CoreError::InvalidMessage(e.to_string()))
    }
}
