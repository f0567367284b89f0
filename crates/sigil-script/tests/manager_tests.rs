//! Integration tests for state-machine snapshot/restore and determinism.

use std::path::{Path, PathBuf};

use proptest::prelude::*;
use sigil_script::prelude::*;

// -- test machine -----------------------------------------------------------

/// A machine with several cursors that walk a small cyclic graph. The step
/// size is derived from the definition file name so different machines
/// move differently.
struct WalkerMachine {
    name: String,
    step: u32,
    cursors: Vec<u32>,
}

impl StateMachine for WalkerMachine {
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&mut self) {
        for (i, c) in self.cursors.iter_mut().enumerate() {
            *c = (*c + self.step + i as u32) % 17;
        }
    }

    fn cursors(&self) -> serde_json::Value {
        serde_json::json!({ "positions": self.cursors })
    }

    fn restore_cursors(&mut self, cursors: &serde_json::Value) -> Result<(), ScriptError> {
        let positions = cursors
            .get("positions")
            .cloned()
            .ok_or_else(|| ScriptError::InvalidCursor {
                name: self.name.clone(),
                details: "missing positions".to_owned(),
            })?;
        self.cursors =
            serde_json::from_value(positions).map_err(|e| ScriptError::InvalidCursor {
                name: self.name.clone(),
                details: e.to_string(),
            })?;
        Ok(())
    }
}

struct WalkerLoader;

impl MachineLoader for WalkerLoader {
    fn load_machine(&mut self, location: &Path) -> Result<Box<dyn StateMachine>, ScriptError> {
        let name = location
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ScriptError::Load {
                location: location.to_path_buf(),
                details: "no file name".to_owned(),
            })?
            .to_owned();
        let step = name.len() as u32;
        Ok(Box::new(WalkerMachine {
            name,
            step,
            cursors: vec![0, 5, 11],
        }))
    }
}

fn definitions() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/content/missions/intro.sm"),
        PathBuf::from("/content/missions/boss.sm"),
    ]
}

fn fresh_manager() -> StateMachineManager {
    let mut manager = StateMachineManager::new();
    for location in definitions() {
        manager.add_machine(&mut WalkerLoader, &location).unwrap();
    }
    manager
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn restore_known_and_unknown_names() {
    // Session with two active machines, advanced a few ticks.
    let mut running = fresh_manager();
    for _ in 0..3 {
        running.update();
    }
    let saved = running.snapshot();
    assert_eq!(saved.len(), 2);
    assert_eq!(saved.active_state_machines[0].state_machine_name, "intro");
    assert_eq!(saved.active_state_machines[1].state_machine_name, "boss");
    let cursors_x = saved.cursors_for("intro").unwrap().clone();

    // A fresh manager from the same definitions.
    let mut restored = fresh_manager();
    let boss_default = restored.snapshot().cursors_for("boss").unwrap().clone();

    assert!(restored.restore("intro", &cursors_x).is_ok());
    assert!(restored
        .restore("ghost", &serde_json::json!({ "positions": [1] }))
        .is_err());

    let after = restored.snapshot();
    assert_eq!(after.cursors_for("intro"), Some(&cursors_x));
    assert_eq!(after.cursors_for("boss"), Some(&boss_default));
}

#[test]
fn snapshot_is_pure() {
    let mut manager = fresh_manager();
    manager.update();
    let first = manager.snapshot();
    let second = manager.snapshot();
    assert_eq!(first, second);
    assert_eq!(manager.phase(), ManagerPhase::Active);
}

#[test]
fn snapshot_survives_json_round_trip() {
    let mut manager = fresh_manager();
    manager.update();
    let snapshot = manager.snapshot();

    let json = serde_json::to_string(&snapshot).unwrap();
    let parsed: StateMachineManagerSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, snapshot);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Identical definitions and load order give identical per-tick cursor
    /// sequences.
    #[test]
    fn update_is_deterministic(ticks in 0usize..40) {
        let mut a = fresh_manager();
        let mut b = fresh_manager();
        for _ in 0..ticks {
            a.update();
            b.update();
            prop_assert_eq!(a.snapshot(), b.snapshot());
        }
    }

    /// restore(snapshot(S)) on an unchanged active set reproduces S, and
    /// the restored manager keeps evolving identically.
    #[test]
    fn restore_of_snapshot_is_exact(before in 0usize..30, after in 0usize..30) {
        let mut original = fresh_manager();
        for _ in 0..before {
            original.update();
        }
        let saved = original.snapshot();

        let mut restored = fresh_manager();
        for entry in &saved.active_state_machines {
            prop_assert!(restored.restore(&entry.state_machine_name, &entry.cursors).is_ok());
        }
        prop_assert_eq!(restored.snapshot(), saved.clone());

        for _ in 0..after {
            original.update();
            restored.update();
        }
        prop_assert_eq!(restored.snapshot(), original.snapshot());

        // Restoring the manager onto its own snapshot is a no-op.
        let own = restored.snapshot();
        for entry in &own.active_state_machines {
            prop_assert!(restored.restore(&entry.state_machine_name, &entry.cursors).is_ok());
        }
        prop_assert_eq!(restored.snapshot(), own);
    }
}
