//! Sigil WASM Host -- sandboxed level scripts.
//!
//! This crate is a concrete script provider for a session: each level-script
//! file is a WebAssembly module (binary `.wasm` or WAT text) that runs in a
//! fuel-metered Wasmtime instance with no filesystem, network, threading, or
//! wall-clock access.
//!
//! # Architecture
//!
//! - **`WasmConfig`**: fuel budget per hook call, memory cap, and which file
//!   extensions are level scripts.
//! - **`ScriptInstance`**: one instantiated module and its store.
//! - **`WasmLevelScript`**: adapts a `ScriptInstance` to the
//!   [`LevelScript`](sigil_script::level_script::LevelScript) lifecycle.
//! - **`WasmScriptProvider`**: compiles resolved files once and hands out
//!   fresh instances per session.
//!
//! # Lifecycle exports
//!
//! A module is a level script if it exports at least one of `game_started`,
//! `update`, `game_finished`, `dispose` (all `() -> ()`). Missing hooks are
//! no-ops.
//!
//! # Host API
//!
//! Modules may import from the `"sigil"` namespace:
//!
//! - `log(level: i32, msg_ptr: i32, msg_len: i32)`
//! - `tick_number() -> i64`
//!
//! # Example
//!
//! ```no_run
//! use sigil_script::prelude::*;
//! use sigil_wasm_host::{WasmConfig, WasmLevelScript};
//!
//! let config = WasmConfig::default();
//! let wat = r#"(module (func (export "update") nop))"#;
//! let mut script = WasmLevelScript::from_bytes(&config, "noop", wat.as_bytes()).unwrap();
//! script.update().unwrap();
//! ```

#![deny(unsafe_code)]

pub mod host_api;
mod level_script;
mod module;
mod provider;

pub use host_api::ScriptHostState;
pub use level_script::WasmLevelScript;
pub use module::{ScriptInstance, WasmConfig, LIFECYCLE_EXPORTS};
pub use provider::WasmScriptProvider;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by WASM script operations.
#[derive(Debug, thiserror::Error)]
pub enum WasmError {
    /// The script file could not be read.
    #[error("failed to read script '{path}': {details}")]
    Io {
        path: std::path::PathBuf,
        details: String,
    },

    /// The WASM binary could not be compiled (invalid bytecode or WAT syntax).
    #[error("WASM compilation failed: {0}")]
    CompileError(String),

    /// The module exports none of the lifecycle hooks.
    #[error("module '{name}' exports no lifecycle hook (expected one of game_started, update, game_finished, dispose)")]
    NoLifecycleExports {
        name: String,
    },

    /// The module exhausted its fuel budget during a hook call.
    #[error("WASM script ran out of fuel (budget: {budget} units) -- possible infinite loop or excessive computation")]
    OutOfFuel {
        budget: u64,
    },

    /// A WASM trap occurred during execution (e.g. unreachable instruction,
    /// division by zero, out-of-bounds memory access).
    #[error("WASM trap: {0}")]
    Trap(String),

    /// A general runtime error from the Wasmtime engine.
    #[error("WASM runtime error: {0}")]
    Runtime(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_script::prelude::*;

    const COUNTING_SCRIPT: &str = r#"
        (module
          (import "sigil" "log" (func $log (param i32 i32 i32)))
          (import "sigil" "tick_number" (func $tick (result i64)))
          (memory (export "memory") 1)
          (data (i32.const 0) "started")
          (global $started (mut i32) (i32.const 0))
          (global $updates (mut i32) (i32.const 0))
          (global $finished (mut i32) (i32.const 0))
          (global $last_tick (mut i64) (i64.const -1))
          (func (export "game_started")
            (global.set $started (i32.add (global.get $started) (i32.const 1)))
            (call $log (i32.const 2) (i32.const 0) (i32.const 7)))
          (func (export "update")
            (global.set $updates (i32.add (global.get $updates) (i32.const 1)))
            (global.set $last_tick (call $tick)))
          (func (export "game_finished")
            (global.set $finished (i32.add (global.get $finished) (i32.const 1))))
          (func (export "get_started") (result i32) (global.get $started))
          (func (export "get_updates") (result i32) (global.get $updates))
          (func (export "get_finished") (result i32) (global.get $finished))
          (func (export "get_last_tick") (result i64) (global.get $last_tick)))
    "#;

    const UPDATE_ONLY: &str = r#"(module (func (export "update") nop))"#;

    const FUEL_HOG: &str = r#"
        (module
          (func (export "update")
            (loop $spin (br $spin))))
    "#;

    const TRAPS: &str = r#"(module (func (export "game_started") unreachable))"#;

    const NO_HOOKS: &str = r#"(module (func (export "tick") nop))"#;

    fn load(wat: &str) -> WasmLevelScript {
        WasmLevelScript::from_bytes(&WasmConfig::default(), "test_script", wat.as_bytes())
            .unwrap()
    }

    #[test]
    fn lifecycle_hooks_reach_the_module() {
        let mut script = load(COUNTING_SCRIPT);

        script.game_started().unwrap();
        script.update().unwrap();
        script.update().unwrap();
        script.game_finished().unwrap();

        let instance = script.instance_mut();
        assert_eq!(instance.call_i32_export("get_started").unwrap(), 1);
        assert_eq!(instance.call_i32_export("get_updates").unwrap(), 2);
        assert_eq!(instance.call_i32_export("get_finished").unwrap(), 1);
    }

    #[test]
    fn tick_number_counts_dispatched_ticks() {
        let mut script = load(COUNTING_SCRIPT);

        script.game_started().unwrap();
        script.update().unwrap();
        script.update().unwrap();

        // game_started ran as tick 0, the two updates as ticks 1 and 2.
        let last = script.instance_mut().call_i64_export("get_last_tick").unwrap();
        assert_eq!(last, 2);
    }

    #[test]
    fn host_calls_are_counted_per_hook() {
        let mut script = load(COUNTING_SCRIPT);

        script.game_started().unwrap();
        assert_eq!(script.instance().host_state().host_call_count, 1);

        script.update().unwrap();
        assert_eq!(script.instance().host_state().host_call_count, 1);
    }

    #[test]
    fn missing_hooks_are_no_ops() {
        let mut script = load(UPDATE_ONLY);
        script.game_started().unwrap();
        script.update().unwrap();
        script.game_finished().unwrap();
        script.dispose().unwrap();
    }

    #[test]
    fn module_without_hooks_is_rejected() {
        let err = WasmLevelScript::from_bytes(&WasmConfig::default(), "tick_only", NO_HOOKS.as_bytes())
            .unwrap_err();
        assert!(
            matches!(err, WasmError::NoLifecycleExports { ref name } if name == "tick_only"),
            "expected NoLifecycleExports, got: {err:?}"
        );
    }

    #[test]
    fn invalid_source_is_compile_error() {
        let err = WasmLevelScript::from_bytes(&WasmConfig::default(), "broken", b"(module (func")
            .unwrap_err();
        assert!(matches!(err, WasmError::CompileError(_)), "got: {err:?}");
    }

    #[test]
    fn fuel_exhaustion_surfaces_as_hook_error() {
        let config = WasmConfig {
            fuel_per_call: 10_000,
            ..WasmConfig::default()
        };
        let mut script =
            WasmLevelScript::from_bytes(&config, "hog", FUEL_HOG.as_bytes()).unwrap();

        let err = script.update().unwrap_err();
        match err {
            ScriptError::Hook { script, hook, details } => {
                assert_eq!(script, "hog");
                assert_eq!(hook, LifecycleEvent::Update);
                assert!(details.contains("ran out of fuel"), "details: {details}");
            }
            other => panic!("expected Hook error, got: {other:?}"),
        }
    }

    #[test]
    fn fuel_budget_resets_between_calls() {
        let mut script = load(UPDATE_ONLY);
        let first = script.instance_mut().call_hook("update").unwrap();
        let second = script.instance_mut().call_hook("update").unwrap();
        assert_eq!(first, second);
        assert!(first.is_some());
    }

    #[test]
    fn trap_is_reported_not_panicked() {
        let mut script = load(TRAPS);
        let err = script.game_started().unwrap_err();
        assert!(matches!(
            err,
            ScriptError::Hook { hook: LifecycleEvent::GameStarted, .. }
        ));
    }

    #[test]
    fn wasi_imports_fail_to_instantiate() {
        let wat = r#"
            (module
              (import "wasi_snapshot_preview1" "fd_write"
                (func (param i32 i32 i32 i32) (result i32)))
              (func (export "update") nop))
        "#;
        let result = WasmLevelScript::from_bytes(&WasmConfig::default(), "wasi", wat.as_bytes());
        assert!(matches!(result, Err(WasmError::Runtime(_))));
    }
}
