//! Host API for WASM level scripts.
//!
//! Defines the [`ScriptHostState`] that lives inside each Wasmtime
//! [`Store`](wasmtime::Store) and the [`register_host_api`] function that
//! registers the host functions under the `"sigil"` import namespace.
//!
//! # Host Functions (registered under `"sigil"` module)
//!
//! - `tick_number() -> i64` -- ticks this script has been dispatched before
//!   the current hook call.
//! - `log(level: i32, msg_ptr: i32, msg_len: i32)`

use wasmtime::{Caller, Linker, StoreLimits, StoreLimitsBuilder};

// ---------------------------------------------------------------------------
// ScriptHostState
// ---------------------------------------------------------------------------

/// State held inside the Wasmtime store of one level script.
pub struct ScriptHostState {
    /// Name of the script, used as a logging field.
    pub script_name: String,

    /// Value returned by `tick_number()`. Set by the level-script adapter
    /// before each tick hook.
    pub tick: u64,

    /// Number of host function calls made during the current hook call.
    /// Reset by [`begin_call`](Self::begin_call).
    pub host_call_count: u32,

    /// Memory limiter enforcing [`WasmConfig::memory_limit_bytes`](crate::WasmConfig::memory_limit_bytes).
    pub(crate) limits: StoreLimits,
}

impl ScriptHostState {
    pub fn new(script_name: &str, memory_limit_bytes: usize) -> Self {
        Self {
            script_name: script_name.to_owned(),
            tick: 0,
            host_call_count: 0,
            limits: StoreLimitsBuilder::new()
                .memory_size(memory_limit_bytes)
                .build(),
        }
    }

    /// Reset per-call state before a hook runs.
    pub fn begin_call(&mut self) {
        self.host_call_count = 0;
    }
}

impl std::fmt::Debug for ScriptHostState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptHostState")
            .field("script_name", &self.script_name)
            .field("tick", &self.tick)
            .field("host_call_count", &self.host_call_count)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Host function registration
// ---------------------------------------------------------------------------

/// Register all host functions under the `"sigil"` WASM import namespace.
///
/// # Errors
///
/// Returns an error if any function fails to register.
pub fn register_host_api(linker: &mut Linker<ScriptHostState>) -> Result<(), anyhow::Error> {
    linker.func_wrap("sigil", "tick_number", host_tick_number)?;
    linker.func_wrap("sigil", "log", host_log)?;
    Ok(())
}

/// Read a UTF-8 string from WASM linear memory at the given (ptr, len).
fn read_wasm_string(
    caller: &mut Caller<'_, ScriptHostState>,
    ptr: i32,
    len: i32,
) -> Result<String, String> {
    let memory = caller
        .get_export("memory")
        .and_then(|e| e.into_memory())
        .ok_or_else(|| {
            "WASM module must export 'memory' to use string-based host functions -- \
             add `(memory (export \"memory\") 1)` to your module"
                .to_owned()
        })?;

    if ptr < 0 || len < 0 {
        return Err(format!("negative string bounds: ptr={ptr}, len={len}"));
    }

    let data = memory.data(&caller);
    let start = ptr as usize;
    let end = start + len as usize;

    if end > data.len() {
        return Err(format!(
            "WASM string read out of bounds: ptr={ptr}, len={len}, memory_size={}",
            data.len()
        ));
    }

    String::from_utf8(data[start..end].to_vec())
        .map_err(|e| format!("WASM string at ptr={ptr} len={len} is not valid UTF-8: {e}"))
}

/// `tick_number() -> i64`
fn host_tick_number(mut caller: Caller<'_, ScriptHostState>) -> i64 {
    caller.data_mut().host_call_count += 1;
    caller.data().tick as i64
}

/// `log(level: i32, msg_ptr: i32, msg_len: i32)`
///
/// Level mapping: 0 = trace, 1 = debug, 2 = info, 3 = warn, 4 = error.
fn host_log(mut caller: Caller<'_, ScriptHostState>, level: i32, msg_ptr: i32, msg_len: i32) {
    caller.data_mut().host_call_count += 1;

    let msg = match read_wasm_string(&mut caller, msg_ptr, msg_len) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "log: failed to read message from WASM memory");
            return;
        }
    };

    let script = caller.data().script_name.as_str();
    match level {
        0 => tracing::trace!(source = "wasm", script, "{msg}"),
        1 => tracing::debug!(source = "wasm", script, "{msg}"),
        2 => tracing::info!(source = "wasm", script, "{msg}"),
        3 => tracing::warn!(source = "wasm", script, "{msg}"),
        4 => tracing::error!(source = "wasm", script, "{msg}"),
        _ => tracing::info!(source = "wasm", script, level = level, "{msg}"),
    }
}
