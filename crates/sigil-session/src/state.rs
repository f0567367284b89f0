//! The persisted shape of the session component.
//!
//! The checkpoint layer owns the file format; this type dictates what goes
//! into it. Keys are camelCase on the wire.

use serde::{Deserialize, Serialize};
use sigil_content::overlay::BaseManifest;
use sigil_script::cursor::StateMachineManagerSnapshot;

/// Script component state carried across a save/load boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionComponentState {
    /// `true` until the session has ticked at least once.
    pub first_run: bool,

    /// Base level-script logical paths, in declaration order.
    #[serde(default)]
    pub level_script_logical_paths: Vec<String>,

    /// Base state-machine logical paths, in declaration order.
    #[serde(default)]
    pub state_machine_logical_paths: Vec<String>,

    /// Cursors of every active state machine at save time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_state_machine_manager: Option<StateMachineManagerSnapshot>,
}

impl SessionComponentState {
    /// State for a brand-new session with no declared content.
    pub fn new_game() -> Self {
        Self {
            first_run: true,
            level_script_logical_paths: Vec::new(),
            state_machine_logical_paths: Vec::new(),
            script_state_machine_manager: None,
        }
    }

    /// State for a brand-new session declaring `manifest` as its base content.
    pub fn with_manifest(manifest: &BaseManifest) -> Self {
        Self {
            level_script_logical_paths: manifest.level_scripts.clone(),
            state_machine_logical_paths: manifest.state_machines.clone(),
            ..Self::new_game()
        }
    }

    /// The base manifest declared by this state.
    pub fn manifest(&self) -> BaseManifest {
        BaseManifest {
            level_scripts: self.level_script_logical_paths.clone(),
            state_machines: self.state_machine_logical_paths.clone(),
        }
    }
}

impl Default for SessionComponentState {
    fn default() -> Self {
        Self::new_game()
    }
}
