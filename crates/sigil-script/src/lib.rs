//! Sigil Script -- live state machines and level scripts for a session.
//!
//! This crate owns everything that runs once content has been resolved:
//!
//! - [`machine`]: the [`StateMachine`](machine::StateMachine) capability and
//!   the [`StateMachineManager`](machine::StateMachineManager) that loads,
//!   ticks, snapshots, restores, and disposes named machines.
//! - [`cursor`]: serializable cursor snapshots exchanged with the save layer.
//! - [`level_script`]: the closed [`LevelScript`](level_script::LevelScript)
//!   lifecycle interface and the ordered
//!   [`LevelScriptSet`](level_script::LevelScriptSet) that dispatches it.
//! - [`loader`]: the boundary traits for the external script compiler.
//! - [`json_machine`]: a [`MachineLoader`](loader::MachineLoader) for looping
//!   machines declared as JSON files.
//!
//! Automaton internals are opaque here. A machine is a name, an `update`,
//! and a cursor payload that round-trips through `serde_json::Value`.

#![deny(unsafe_code)]

pub mod cursor;
pub mod json_machine;
pub mod level_script;
pub mod loader;
pub mod machine;

use std::path::PathBuf;

use crate::level_script::LifecycleEvent;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by script and state-machine operations.
///
/// None of these are fatal to a session: callers log them and carry on with
/// the remaining scripts or machines.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// A definition could not be read, compiled, or instantiated.
    #[error("failed to load '{location}': {details}")]
    Load {
        /// The definition file that failed.
        location: PathBuf,
        /// Reader or compiler message.
        details: String,
    },

    /// A machine with this name is already active.
    #[error("state machine '{name}' is already active")]
    DuplicateMachine {
        /// The name declared by the rejected definition.
        name: String,
    },

    /// No active machine has this name.
    #[error("no active state machine named '{name}'. Active machines: [{active}]")]
    UnknownMachine {
        /// The name that was looked up.
        name: String,
        /// Comma-separated names of the active machines.
        active: String,
    },

    /// The machine rejected a cursor payload.
    #[error("invalid cursors for state machine '{name}': {details}")]
    InvalidCursor {
        /// The machine that rejected the payload.
        name: String,
        /// Why the payload does not fit the machine.
        details: String,
    },

    /// A level script lifecycle hook failed.
    #[error("level script '{script}' failed in {hook}: {details}")]
    Hook {
        /// Name of the failing level script.
        script: String,
        /// The lifecycle hook being dispatched.
        hook: LifecycleEvent,
        /// The script host's error message.
        details: String,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::cursor::{CursorSnapshot, StateMachineManagerSnapshot};
    pub use crate::json_machine::{JsonMachine, JsonMachineDefinition, JsonMachineLoader};
    pub use crate::level_script::{DispatchReport, LevelScript, LevelScriptSet, LifecycleEvent};
    pub use crate::loader::{LoadFailure, LoadReport, MachineLoader, ScriptProvider};
    pub use crate::machine::{ManagerPhase, StateMachine, StateMachineManager};
    pub use crate::ScriptError;
}
