//! [`ScriptProvider`] backed by Wasmtime.
//!
//! Modules are compiled once in [`initialize`](ScriptProvider::initialize)
//! and instantiated into fresh stores each time the session asks for level
//! scripts, so a reloaded session never sees globals from a previous run.

use std::path::{Path, PathBuf};

use sigil_script::prelude::*;
use wasmtime::{Engine, Module};

use crate::level_script::WasmLevelScript;
use crate::module::{compile_level_script, fuel_engine, ScriptInstance, WasmConfig};
use crate::WasmError;

struct CompiledScript {
    name: String,
    location: PathBuf,
    module: Module,
}

/// Compiles resolved `.vs` files into WASM level scripts.
pub struct WasmScriptProvider {
    engine: Engine,
    config: WasmConfig,
    compiled: Vec<CompiledScript>,
}

impl WasmScriptProvider {
    /// # Errors
    ///
    /// Returns [`WasmError::Runtime`] if the Wasmtime engine cannot be created.
    pub fn new(config: WasmConfig) -> Result<Self, WasmError> {
        Ok(Self {
            engine: fuel_engine()?,
            config,
            compiled: Vec::new(),
        })
    }

    pub fn config(&self) -> &WasmConfig {
        &self.config
    }

    /// Names of the compiled scripts, in load order.
    pub fn compiled_names(&self) -> Vec<&str> {
        self.compiled.iter().map(|c| c.name.as_str()).collect()
    }

    fn is_level_script(&self, location: &Path) -> bool {
        location
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.config.level_script_extensions.iter().any(|e| e == ext))
    }

    fn compile_file(&self, location: &Path) -> Result<CompiledScript, WasmError> {
        let bytes = std::fs::read(location).map_err(|e| WasmError::Io {
            path: location.to_path_buf(),
            details: e.to_string(),
        })?;
        let name = location
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| location.display().to_string());
        let module = compile_level_script(&self.engine, &name, &bytes)?;
        Ok(CompiledScript {
            name,
            location: location.to_path_buf(),
            module,
        })
    }
}

impl ScriptProvider for WasmScriptProvider {
    fn initialize(&mut self, locations: &[PathBuf]) -> LoadReport {
        self.compiled.clear();
        let mut report = LoadReport::default();

        for location in locations {
            if !self.is_level_script(location) {
                report.skipped += 1;
                continue;
            }

            match self.compile_file(location) {
                Ok(compiled) => {
                    tracing::debug!(
                        script = %compiled.name,
                        location = %location.display(),
                        "compiled level script"
                    );
                    self.compiled.push(compiled);
                    report.loaded += 1;
                }
                Err(WasmError::NoLifecycleExports { name }) => {
                    tracing::debug!(
                        script = %name,
                        location = %location.display(),
                        "module exports no lifecycle hook, not a level script"
                    );
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        location = %location.display(),
                        error = %e,
                        "failed to compile level script"
                    );
                    report.failures.push(LoadFailure::new(location, e.to_string()));
                }
            }
        }

        tracing::info!(
            loaded = report.loaded,
            skipped = report.skipped,
            failed = report.failures.len(),
            "WASM script provider initialized"
        );
        report
    }

    fn instantiate_level_scripts(&mut self) -> Vec<Box<dyn LevelScript>> {
        let mut scripts: Vec<Box<dyn LevelScript>> = Vec::with_capacity(self.compiled.len());
        for compiled in &self.compiled {
            match ScriptInstance::instantiate(
                &self.engine,
                &compiled.module,
                &self.config,
                &compiled.name,
            ) {
                Ok(instance) => {
                    scripts.push(Box::new(WasmLevelScript::from_instance(
                        &compiled.name,
                        instance,
                    )));
                }
                Err(e) => {
                    tracing::warn!(
                        script = %compiled.name,
                        location = %compiled.location.display(),
                        error = %e,
                        "failed to instantiate level script"
                    );
                }
            }
        }
        scripts
    }
}

impl std::fmt::Debug for WasmScriptProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmScriptProvider")
            .field("config", &self.config)
            .field("compiled", &self.compiled_names())
            .finish_non_exhaustive()
    }
}
