//! [`LevelScript`] adapter over a [`ScriptInstance`].

use sigil_script::prelude::*;

use crate::module::{compile_level_script, fuel_engine, ScriptInstance, WasmConfig};
use crate::WasmError;

/// A WASM module driven through the level-script lifecycle.
///
/// The adapter owns a tick counter: every `game_started` or `update` call
/// publishes the counter to the module through `tick_number()` and then
/// advances it.
#[derive(Debug)]
pub struct WasmLevelScript {
    name: String,
    instance: ScriptInstance,
    ticks: u64,
}

impl WasmLevelScript {
    /// Compile and instantiate a standalone script with its own engine.
    ///
    /// # Errors
    ///
    /// Returns [`WasmError::CompileError`] for invalid bytes,
    /// [`WasmError::NoLifecycleExports`] if the module exports no hook, or
    /// [`WasmError::Runtime`] if instantiation fails.
    pub fn from_bytes(config: &WasmConfig, name: &str, bytes: &[u8]) -> Result<Self, WasmError> {
        let engine = fuel_engine()?;
        let module = compile_level_script(&engine, name, bytes)?;
        let instance = ScriptInstance::instantiate(&engine, &module, config, name)?;
        Ok(Self::from_instance(name, instance))
    }

    pub fn from_instance(name: &str, instance: ScriptInstance) -> Self {
        Self {
            name: name.to_owned(),
            instance,
            ticks: 0,
        }
    }

    pub fn instance(&self) -> &ScriptInstance {
        &self.instance
    }

    pub fn instance_mut(&mut self) -> &mut ScriptInstance {
        &mut self.instance
    }

    /// Ticks dispatched so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn run(&mut self, event: LifecycleEvent) -> Result<(), ScriptError> {
        if matches!(event, LifecycleEvent::GameStarted | LifecycleEvent::Update) {
            self.instance.host_state_mut().tick = self.ticks;
            self.ticks += 1;
        }

        self.instance
            .call_hook(event.hook_name())
            .map(|_| ())
            .map_err(|e| ScriptError::Hook {
                script: self.name.clone(),
                hook: event,
                details: e.to_string(),
            })
    }
}

impl LevelScript for WasmLevelScript {
    fn name(&self) -> &str {
        &self.name
    }

    fn game_started(&mut self) -> Result<(), ScriptError> {
        self.run(LifecycleEvent::GameStarted)
    }

    fn update(&mut self) -> Result<(), ScriptError> {
        self.run(LifecycleEvent::Update)
    }

    fn game_finished(&mut self) -> Result<(), ScriptError> {
        self.run(LifecycleEvent::GameFinished)
    }

    fn dispose(&mut self) -> Result<(), ScriptError> {
        self.run(LifecycleEvent::Dispose)
    }
}
