//! Compiling and instantiating WASM level scripts.
//!
//! [`ScriptInstance`] wraps one Wasmtime instance of a level-script module.
//! It enforces fuel metering and memory limits, and calls lifecycle exports
//! by name, treating an absent export as a no-op.

use wasmtime::{Engine, Instance, Linker, Module, Store};

use crate::host_api::{register_host_api, ScriptHostState};
use crate::WasmError;

/// Export names a level-script module may provide.
pub const LIFECYCLE_EXPORTS: [&str; 4] = ["game_started", "update", "game_finished", "dispose"];

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the level-script sandbox.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WasmConfig {
    /// Fuel units granted per hook call. When fuel runs out, execution
    /// traps with [`WasmError::OutOfFuel`]. Default: 1,000,000.
    pub fuel_per_call: u64,

    /// Maximum linear memory a module may allocate, in bytes.
    /// Default: 16 MiB (16,777,216 bytes).
    pub memory_limit_bytes: usize,

    /// File extensions (without the dot) the provider compiles as level
    /// scripts. Other resolved files (state-machine definitions) are passed
    /// over. Default: `["vs"]`.
    pub level_script_extensions: Vec<String>,
}

impl Default for WasmConfig {
    fn default() -> Self {
        Self {
            fuel_per_call: 1_000_000,
            memory_limit_bytes: 16 * 1024 * 1024, // 16 MiB
            level_script_extensions: vec!["vs".to_owned()],
        }
    }
}

/// Build a Wasmtime engine with fuel metering enabled.
pub(crate) fn fuel_engine() -> Result<Engine, WasmError> {
    let mut engine_config = wasmtime::Config::new();
    engine_config.consume_fuel(true);
    Engine::new(&engine_config)
        .map_err(|e| WasmError::Runtime(format!("failed to create Wasmtime engine: {e}")))
}

/// Compile `bytes` and check that the module exports at least one lifecycle
/// hook.
pub(crate) fn compile_level_script(
    engine: &Engine,
    name: &str,
    bytes: &[u8],
) -> Result<Module, WasmError> {
    let module = Module::new(engine, bytes).map_err(|e| WasmError::CompileError(format!("{e}")))?;

    let has_hook = module
        .exports()
        .any(|export| LIFECYCLE_EXPORTS.contains(&export.name()));
    if !has_hook {
        return Err(WasmError::NoLifecycleExports {
            name: name.to_owned(),
        });
    }
    Ok(module)
}

// ---------------------------------------------------------------------------
// ScriptInstance
// ---------------------------------------------------------------------------

/// One instantiated level-script module.
///
/// # Sandbox Guarantees
///
/// - No WASI (no filesystem, no network, no wall-clock time)
/// - Only the `"sigil"` host functions are importable
/// - Fuel metering bounds every hook call
/// - Memory is capped at [`WasmConfig::memory_limit_bytes`]
pub struct ScriptInstance {
    store: Store<ScriptHostState>,
    instance: Instance,
    config: WasmConfig,
}

impl ScriptInstance {
    /// Instantiate a compiled module in a fresh store.
    ///
    /// # Errors
    ///
    /// Returns [`WasmError::Runtime`] if instantiation fails (e.g. the
    /// module imports something other than the `"sigil"` host API).
    pub fn instantiate(
        engine: &Engine,
        module: &Module,
        config: &WasmConfig,
        script_name: &str,
    ) -> Result<Self, WasmError> {
        let mut store = Store::new(
            engine,
            ScriptHostState::new(script_name, config.memory_limit_bytes),
        );
        store.limiter(|state| &mut state.limits);
        store
            .set_fuel(config.fuel_per_call)
            .map_err(|e| WasmError::Runtime(format!("failed to set fuel: {e}")))?;

        let mut linker = Linker::new(engine);
        register_host_api(&mut linker)
            .map_err(|e| WasmError::Runtime(format!("failed to register host API: {e}")))?;

        let instance = linker
            .instantiate(&mut store, module)
            .map_err(|e| WasmError::Runtime(format!("{e}")))?;

        tracing::debug!(
            script = script_name,
            fuel_per_call = config.fuel_per_call,
            memory_limit = config.memory_limit_bytes,
            "level script instantiated"
        );

        Ok(Self {
            store,
            instance,
            config: config.clone(),
        })
    }

    /// Returns `true` if the module exports a function named `name`.
    pub fn has_export(&mut self, name: &str) -> bool {
        self.instance.get_func(&mut self.store, name).is_some()
    }

    /// Call the `() -> ()` export `name` with a fresh fuel budget.
    ///
    /// Returns `Ok(None)` if the export does not exist, otherwise the fuel
    /// consumed.
    ///
    /// # Errors
    ///
    /// - [`WasmError::OutOfFuel`] if the call exhausts the fuel budget.
    /// - [`WasmError::Trap`] if a WASM trap occurs.
    /// - [`WasmError::Runtime`] if the export has the wrong signature.
    pub fn call_hook(&mut self, name: &str) -> Result<Option<u64>, WasmError> {
        if !self.has_export(name) {
            return Ok(None);
        }

        self.store.data_mut().begin_call();
        self.store
            .set_fuel(self.config.fuel_per_call)
            .map_err(|e| WasmError::Runtime(format!("failed to set fuel: {e}")))?;

        let hook = self
            .instance
            .get_typed_func::<(), ()>(&mut self.store, name)
            .map_err(|e| WasmError::Runtime(format!("failed to resolve {name}(): {e}")))?;

        hook.call(&mut self.store, ())
            .map_err(|e| self.classify_trap(e))?;

        let remaining = self
            .store
            .get_fuel()
            .map_err(|e| WasmError::Runtime(format!("failed to read fuel: {e}")))?;
        let consumed = self.config.fuel_per_call.saturating_sub(remaining);

        tracing::trace!(
            script = %self.store.data().script_name,
            hook = name,
            fuel_consumed = consumed,
            "hook completed"
        );

        Ok(Some(consumed))
    }

    /// Call a named export that takes no arguments and returns an `i32`.
    ///
    /// Fuel is NOT reset before this call.
    pub fn call_i32_export(&mut self, name: &str) -> Result<i32, WasmError> {
        let func = self
            .instance
            .get_typed_func::<(), i32>(&mut self.store, name)
            .map_err(|e| WasmError::Runtime(format!("failed to resolve export '{name}': {e}")))?;
        func.call(&mut self.store, ())
            .map_err(|e| self.classify_trap(e))
    }

    /// Call a named export that takes no arguments and returns an `i64`.
    ///
    /// Fuel is NOT reset before this call.
    pub fn call_i64_export(&mut self, name: &str) -> Result<i64, WasmError> {
        let func = self
            .instance
            .get_typed_func::<(), i64>(&mut self.store, name)
            .map_err(|e| WasmError::Runtime(format!("failed to resolve export '{name}': {e}")))?;
        func.call(&mut self.store, ())
            .map_err(|e| self.classify_trap(e))
    }

    pub fn host_state(&self) -> &ScriptHostState {
        self.store.data()
    }

    pub fn host_state_mut(&mut self) -> &mut ScriptHostState {
        self.store.data_mut()
    }

    pub fn config(&self) -> &WasmConfig {
        &self.config
    }

    /// Classify a Wasmtime error into the appropriate [`WasmError`] variant.
    fn classify_trap(&self, error: anyhow::Error) -> WasmError {
        if let Some(trap) = error.downcast_ref::<wasmtime::Trap>() {
            if *trap == wasmtime::Trap::OutOfFuel {
                return WasmError::OutOfFuel {
                    budget: self.config.fuel_per_call,
                };
            }
            return WasmError::Trap(format!("{error}"));
        }

        // The trap is sometimes wrapped in a backtrace context.
        for cause in error.chain() {
            if let Some(trap) = cause.downcast_ref::<wasmtime::Trap>() {
                if *trap == wasmtime::Trap::OutOfFuel {
                    return WasmError::OutOfFuel {
                        budget: self.config.fuel_per_call,
                    };
                }
                return WasmError::Trap(format!("{error}"));
            }
        }
        WasmError::Runtime(format!("{error}"))
    }
}

impl std::fmt::Debug for ScriptInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptInstance")
            .field("host_state", self.store.data())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
