//! Coordination messages and their JSON wire form

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppResult;
use crate::models::SharedState;
use crate::peer::PeerId;

/// A message exchanged between peers of one group.
///
/// On the wire every message is a JSON object tagged by `type`, carrying the
/// sender as `tabId`:
///
/// ```text
/// { "type": "heartbeat" | "new_main_tab" | "main_tab_closed" | "state_update",
///   "tabId"?: string, "isMain"?: bool, "state"?: SharedState }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Periodic liveness signal from the current MAIN
    #[serde(rename = "heartbeat")]
    Heartbeat {
        #[serde(rename = "isMain", default)]
        is_main: bool,
        #[serde(rename = "tabId")]
        sender: PeerId,
    },
    /// The sender has just taken over as MAIN
    #[serde(rename = "new_main_tab")]
    NewMain {
        #[serde(rename = "tabId")]
        sender: PeerId,
    },
    /// The MAIN is going away; any visible follower may take over.
    /// The sender id is informational only.
    #[serde(rename = "main_tab_closed")]
    MainClosed {
        #[serde(rename = "tabId", default, skip_serializing_if = "Option::is_none")]
        sender: Option<PeerId>,
    },
    /// Full copy of the authoritative state
    #[serde(rename = "state_update")]
    StateUpdate {
        state: SharedState,
        #[serde(rename = "tabId")]
        sender: PeerId,
    },
}

impl Message {
    pub fn heartbeat(sender: &PeerId) -> Self {
        Message::Heartbeat {
            is_main: true,
            sender: sender.clone(),
        }
    }

    pub fn new_main(sender: &PeerId) -> Self {
        Message::NewMain {
            sender: sender.clone(),
        }
    }

    pub fn main_closed(sender: &PeerId) -> Self {
        Message::MainClosed {
            sender: Some(sender.clone()),
        }
    }

    pub fn state_update(state: SharedState, sender: &PeerId) -> Self {
        Message::StateUpdate {
            state,
            sender: sender.clone(),
        }
    }

    /// Wire tag of this message
    pub fn tag(&self) -> &'static str {
        match self {
            Message::Heartbeat { .. } => "heartbeat",
            Message::NewMain { .. } => "new_main_tab",
            Message::MainClosed { .. } => "main_tab_closed",
            Message::StateUpdate { .. } => "state_update",
        }
    }

    pub fn sender(&self) -> Option<&PeerId> {
        match self {
            Message::Heartbeat { sender, .. }
            | Message::NewMain { sender }
            | Message::StateUpdate { sender, .. } => Some(sender),
            Message::MainClosed { sender } => sender.as_ref(),
        }
    }

    pub fn encode(&self) -> AppResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode a wire value. Values without a known `type` tag are errors;
    /// callers drop them.
    pub fn decode(value: Value) -> AppResult<Self> {
        Ok(serde_json::from_value(value)?)
    }
}
