//! Named state-machine instances and the manager that owns them.
//!
//! The [`StateMachineManager`] keeps its machines in the order they were
//! added. Every operation that walks the set (update, snapshot, dispose)
//! uses that order, so two managers populated from the same definitions in
//! the same order produce identical per-tick cursor sequences.
//!
//! # Lifecycle
//!
//! ```text
//! Empty -> Populated -> Restoring -> Active -> Disposed
//! ```
//!
//! - `add_machine` moves `Empty` to `Populated`.
//! - `restore` before the first tick moves to `Restoring`.
//! - `update` moves to `Active`.
//! - `dispose` is terminal. Updating, restoring, or disposing again after it
//!   is a sequencing bug and panics.

use std::path::Path;

use crate::cursor::{CursorSnapshot, StateMachineManagerSnapshot};
use crate::loader::MachineLoader;
use crate::ScriptError;

// ---------------------------------------------------------------------------
// StateMachine
// ---------------------------------------------------------------------------

/// A running automaton as seen from the session.
///
/// Transition semantics live entirely behind this trait.
pub trait StateMachine {
    /// The name declared by the machine's definition. Unique per manager.
    fn name(&self) -> &str;

    /// Advance every active cursor by one logical tick.
    fn update(&mut self);

    /// The current cursor payload.
    fn cursors(&self) -> serde_json::Value;

    /// Reposition execution to a previously captured cursor payload.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::InvalidCursor`] if the payload does not
    /// describe a valid position for this machine.
    fn restore_cursors(&mut self, cursors: &serde_json::Value) -> Result<(), ScriptError>;

    /// Release resources held by the machine.
    fn dispose(&mut self) {}
}

// ---------------------------------------------------------------------------
// ManagerPhase
// ---------------------------------------------------------------------------

/// Lifecycle phase of a [`StateMachineManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerPhase {
    Empty,
    Populated,
    Restoring,
    Active,
    Disposed,
}

// ---------------------------------------------------------------------------
// StateMachineManager
// ---------------------------------------------------------------------------

/// Owns the active, named state machines of a session.
pub struct StateMachineManager {
    machines: Vec<Box<dyn StateMachine>>,
    phase: ManagerPhase,
}

impl Default for StateMachineManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachineManager {
    pub fn new() -> Self {
        Self {
            machines: Vec::new(),
            phase: ManagerPhase::Empty,
        }
    }

    /// Load the definition at `location` and add it to the active set.
    ///
    /// Returns the name of the new machine.
    ///
    /// # Errors
    ///
    /// - [`ScriptError::Load`] (or whatever the loader reports) if the
    ///   definition cannot be loaded.
    /// - [`ScriptError::DuplicateMachine`] if a machine of the same name is
    ///   already active.
    ///
    /// # Panics
    ///
    /// Panics if the manager has been disposed.
    pub fn add_machine(
        &mut self,
        loader: &mut dyn MachineLoader,
        location: &Path,
    ) -> Result<&str, ScriptError> {
        self.assert_not_disposed("add_machine");
        let machine = loader.load_machine(location)?;
        tracing::debug!(
            name = machine.name(),
            location = %location.display(),
            "state machine loaded"
        );
        self.insert_machine(machine)
    }

    /// Add an already-constructed machine to the active set.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::DuplicateMachine`] if the name is taken.
    ///
    /// # Panics
    ///
    /// Panics if the manager has been disposed.
    pub fn insert_machine(
        &mut self,
        machine: Box<dyn StateMachine>,
    ) -> Result<&str, ScriptError> {
        self.assert_not_disposed("insert_machine");
        if self.contains(machine.name()) {
            return Err(ScriptError::DuplicateMachine {
                name: machine.name().to_owned(),
            });
        }
        if self.phase == ManagerPhase::Empty {
            self.phase = ManagerPhase::Populated;
        }
        self.machines.push(machine);
        let added = self.machines.len() - 1;
        Ok(self.machines[added].name())
    }

    /// Advance every machine by one tick, in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the manager has been disposed.
    pub fn update(&mut self) {
        self.assert_not_disposed("update");
        self.phase = ManagerPhase::Active;
        for machine in &mut self.machines {
            machine.update();
        }
    }

    /// Capture the cursors of every active machine, keyed by name.
    pub fn snapshot(&self) -> StateMachineManagerSnapshot {
        StateMachineManagerSnapshot {
            active_state_machines: self
                .machines
                .iter()
                .map(|m| CursorSnapshot {
                    state_machine_name: m.name().to_owned(),
                    cursors: m.cursors(),
                })
                .collect(),
        }
    }

    /// Reposition the machine named `name` to `cursors`.
    ///
    /// # Errors
    ///
    /// - [`ScriptError::UnknownMachine`] if no active machine has that name
    ///   (e.g. the save predates a content change).
    /// - [`ScriptError::InvalidCursor`] if the machine rejects the payload.
    ///
    /// # Panics
    ///
    /// Panics if the manager has been disposed.
    pub fn restore(&mut self, name: &str, cursors: &serde_json::Value) -> Result<(), ScriptError> {
        self.assert_not_disposed("restore");
        if matches!(self.phase, ManagerPhase::Empty | ManagerPhase::Populated) {
            self.phase = ManagerPhase::Restoring;
        }

        let Some(idx) = self.machines.iter().position(|m| m.name() == name) else {
            return Err(ScriptError::UnknownMachine {
                name: name.to_owned(),
                active: self.names().join(", "),
            });
        };
        self.machines[idx].restore_cursors(cursors)?;
        tracing::debug!(name, "state machine cursors restored");
        Ok(())
    }

    /// Dispose every machine. The manager holds no machines afterwards.
    ///
    /// # Panics
    ///
    /// Panics if the manager was already disposed.
    pub fn dispose(&mut self) {
        self.assert_not_disposed("dispose");
        for machine in &mut self.machines {
            machine.dispose();
        }
        tracing::debug!(count = self.machines.len(), "state machines disposed");
        self.machines.clear();
        self.phase = ManagerPhase::Disposed;
    }

    // -- accessors ----------------------------------------------------------

    pub fn phase(&self) -> ManagerPhase {
        self.phase
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.machines.iter().any(|m| m.name() == name)
    }

    /// Names of the active machines, in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.machines.iter().map(|m| m.name()).collect()
    }

    /// Read access to a machine by name.
    pub fn get(&self, name: &str) -> Option<&dyn StateMachine> {
        self.machines
            .iter()
            .find(|m| m.name() == name)
            .map(|m| m.as_ref())
    }

    fn assert_not_disposed(&self, operation: &str) {
        assert!(
            self.phase != ManagerPhase::Disposed,
            "{operation} called on a disposed state machine manager"
        );
    }
}

impl std::fmt::Debug for StateMachineManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachineManager")
            .field("phase", &self.phase)
            .field("machines", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
