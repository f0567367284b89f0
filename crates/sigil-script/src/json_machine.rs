//! Looping state machines declared as JSON.
//!
//! A definition names the machine and lists its nodes:
//!
//! ```json
//! { "name": "patrol", "nodes": ["gate", "tower", "yard"] }
//! ```
//!
//! The machine starts on the first node and moves to the next one on every
//! update, wrapping at the end. Its cursor payload is `{ "node": "<name>" }`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::loader::MachineLoader;
use crate::machine::StateMachine;
use crate::ScriptError;

// ---------------------------------------------------------------------------
// JsonMachineDefinition
// ---------------------------------------------------------------------------

/// The on-disk form of a looping machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonMachineDefinition {
    pub name: String,
    pub nodes: Vec<String>,
}

// ---------------------------------------------------------------------------
// JsonMachine
// ---------------------------------------------------------------------------

/// A machine that cycles through the nodes of its definition.
#[derive(Debug, Clone)]
pub struct JsonMachine {
    definition: JsonMachineDefinition,
    node: usize,
}

impl JsonMachine {
    /// Build a machine positioned on the first node.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::InvalidCursor`] if the definition has no nodes.
    pub fn new(definition: JsonMachineDefinition) -> Result<Self, ScriptError> {
        if definition.nodes.is_empty() {
            return Err(ScriptError::InvalidCursor {
                name: definition.name,
                details: "machine has no nodes".to_owned(),
            });
        }
        Ok(Self {
            definition,
            node: 0,
        })
    }

    pub fn current_node(&self) -> &str {
        &self.definition.nodes[self.node]
    }
}

impl StateMachine for JsonMachine {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn update(&mut self) {
        self.node = (self.node + 1) % self.definition.nodes.len();
    }

    fn cursors(&self) -> serde_json::Value {
        serde_json::json!({ "node": self.current_node() })
    }

    fn restore_cursors(&mut self, cursors: &serde_json::Value) -> Result<(), ScriptError> {
        let wanted = cursors.get("node").and_then(serde_json::Value::as_str);
        let idx = wanted
            .and_then(|n| self.definition.nodes.iter().position(|x| x == n))
            .ok_or_else(|| ScriptError::InvalidCursor {
                name: self.definition.name.clone(),
                details: format!("no such node in {cursors}"),
            })?;
        self.node = idx;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JsonMachineLoader
// ---------------------------------------------------------------------------

/// Reads [`JsonMachineDefinition`] files from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMachineLoader;

impl JsonMachineLoader {
    pub fn new() -> Self {
        Self
    }
}

impl MachineLoader for JsonMachineLoader {
    fn load_machine(&mut self, location: &Path) -> Result<Box<dyn StateMachine>, ScriptError> {
        let load_error = |details: String| ScriptError::Load {
            location: location.to_path_buf(),
            details,
        };
        let text = std::fs::read_to_string(location).map_err(|e| load_error(e.to_string()))?;
        let definition: JsonMachineDefinition =
            serde_json::from_str(&text).map_err(|e| load_error(e.to_string()))?;
        if definition.nodes.is_empty() {
            return Err(load_error("machine has no nodes".to_owned()));
        }
        tracing::debug!(
            name = %definition.name,
            nodes = definition.nodes.len(),
            "json state machine parsed"
        );
        let machine = JsonMachine::new(definition)?;
        Ok(Box::new(machine))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
