//! Serializable cursor snapshots.
//!
//! A [`CursorSnapshot`] is the persisted execution position of one named
//! state machine. The payload is whatever the machine produced; this crate
//! never looks inside it.

use serde::{Deserialize, Serialize};

/// Cursor state of one active state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorSnapshot {
    pub state_machine_name: String,
    /// Opaque per-machine cursor payload.
    pub cursors: serde_json::Value,
}

/// Cursor state of every active machine, in manager order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMachineManagerSnapshot {
    pub active_state_machines: Vec<CursorSnapshot>,
}

impl StateMachineManagerSnapshot {
    /// Look up the cursors recorded for `name`.
    pub fn cursors_for(&self, name: &str) -> Option<&serde_json::Value> {
        self.active_state_machines
            .iter()
            .find(|c| c.state_machine_name == name)
            .map(|c| &c.cursors)
    }

    pub fn len(&self) -> usize {
        self.active_state_machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active_state_machines.is_empty()
    }
}
