//! Sigil Session -- the per-session script lifecycle controller.
//!
//! This crate drives everything the lower crates provide through one running
//! session: content resolution at `init`, cursor restore before the first
//! tick, ordered ticking, and deterministic teardown at `unload`.
//!
//! # Quick Start
//!
//! ```
//! use sigil_content::prelude::*;
//! use sigil_script::prelude::*;
//! use sigil_session::prelude::*;
//!
//! struct NoScripts;
//!
//! impl ScriptProvider for NoScripts {
//!     fn initialize(&mut self, _locations: &[std::path::PathBuf]) -> LoadReport {
//!         LoadReport::default()
//!     }
//!     fn instantiate_level_scripts(&mut self) -> Vec<Box<dyn LevelScript>> {
//!         Vec::new()
//!     }
//! }
//!
//! struct NoMachines;
//!
//! impl MachineLoader for NoMachines {
//!     fn load_machine(
//!         &mut self,
//!         location: &std::path::Path,
//!     ) -> Result<Box<dyn StateMachine>, ScriptError> {
//!         Err(ScriptError::Load {
//!             location: location.to_path_buf(),
//!             details: "no machines in this example".to_owned(),
//!         })
//!     }
//! }
//!
//! let store = MemoryFileStore::new();
//! let mut session = ScriptSession::new(SessionConfig::default());
//!
//! session.init(&store, &SessionComponentState::new_game(), &mut NoScripts, &mut NoMachines);
//! session.before_start();
//! session.tick();
//! session.tick();
//! assert_eq!(session.tick_count(), 2);
//!
//! let state = session.component_state().unwrap();
//! assert!(!state.first_run);
//! session.unload();
//! ```

#![deny(unsafe_code)]

pub mod checkpoint;
pub mod config;
pub mod session;
pub mod snapshot;
pub mod state;

use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by session persistence and configuration.
///
/// Lifecycle operations themselves never return errors: per-file and
/// per-machine failures are collected in their reports, and sequencing
/// mistakes panic.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A file or directory could not be read or written.
    #[error("I/O error at '{path}': {details}")]
    Io {
        /// The file or directory being accessed.
        path: PathBuf,
        /// The underlying I/O error message.
        details: String,
    },

    /// A persisted document could not be parsed or produced.
    #[error("failed to (de)serialize '{path}': {details}")]
    Serialization {
        /// The document being read or written.
        path: PathBuf,
        /// The serde_json error message.
        details: String,
    },

    /// The snapshot's recorded hash does not match its contents.
    #[error(
        "session snapshot hash mismatch: recorded {recorded} but recomputed {recomputed}. \
         The checkpoint may be corrupted or tampered with."
    )]
    HashMismatch {
        /// Hex BLAKE3 hash stored in the snapshot.
        recorded: String,
        /// Hex BLAKE3 hash of the state as loaded.
        recomputed: String,
    },

    /// A checkpoint name that cannot be used as a directory name.
    #[error("invalid session name '{name}': must be non-empty and contain no path separators")]
    InvalidSessionName {
        /// The rejected name.
        name: String,
    },
}

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the content crate for convenience.
pub use sigil_content;

/// Re-export the script crate for convenience.
pub use sigil_script;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common session usage.
pub mod prelude {
    pub use crate::checkpoint::CheckpointStore;
    pub use crate::config::SessionConfig;
    pub use crate::session::{InitReport, RestoreReport, ScriptSession, SessionPhase, TickDiagnostics};
    pub use crate::snapshot::SessionSnapshot;
    pub use crate::state::SessionComponentState;
    pub use crate::SessionError;
}
