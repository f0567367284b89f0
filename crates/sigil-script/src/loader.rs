//! Boundary traits for the external script compiler.
//!
//! The session never compiles anything itself. It hands the resolved
//! physical locations to a [`ScriptProvider`] and asks it for level-script
//! instances, and it asks a [`MachineLoader`] for one state machine per
//! captured definition location.

use std::path::{Path, PathBuf};

use crate::level_script::LevelScript;
use crate::machine::StateMachine;
use crate::ScriptError;

/// A definition that could not be loaded, with enough context to diagnose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub location: PathBuf,
    pub details: String,
}

impl LoadFailure {
    pub fn new(location: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            details: details.into(),
        }
    }
}

impl From<&ScriptError> for LoadFailure {
    fn from(error: &ScriptError) -> Self {
        match error {
            ScriptError::Load { location, details } => Self::new(location.clone(), details.clone()),
            other => Self::new(PathBuf::new(), other.to_string()),
        }
    }
}

/// Outcome of [`ScriptProvider::initialize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Number of locations compiled into level-script definitions.
    pub loaded: usize,
    /// Locations that were not level scripts and were passed over.
    pub skipped: usize,
    pub failures: Vec<LoadFailure>,
}

/// Compiles resolved script files and instantiates level scripts.
pub trait ScriptProvider {
    /// Compile every script the session needs. Called once per session with
    /// every value of the resolved mapping, base and overlay alike.
    ///
    /// Per-file failures are returned in the report; they never abort the
    /// rest of the batch.
    fn initialize(&mut self, locations: &[PathBuf]) -> LoadReport;

    /// Fresh level-script instances for every compiled definition, in
    /// the order the locations were given.
    fn instantiate_level_scripts(&mut self) -> Vec<Box<dyn LevelScript>>;
}

/// Loads one state-machine definition into a live instance.
pub trait MachineLoader {
    /// # Errors
    ///
    /// Returns [`ScriptError::Load`] if the definition cannot be read or
    /// compiled.
    fn load_machine(&mut self, location: &Path) -> Result<Box<dyn StateMachine>, ScriptError>;
}
