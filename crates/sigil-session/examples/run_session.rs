//! Run a scripted session, save it, and resume it from the checkpoint.
//!
//! ```text
//! cargo run -p sigil-session --example run_session
//! cargo run -p sigil-session --example run_session -- session.json state.json
//! ```
//!
//! With arguments, the first is a [`SessionConfig`] JSON file and the second
//! a [`SessionComponentState`] JSON file declaring the base content.
//! Without them, demo content is written to a temporary directory:
//! one WASM level script, one looping state machine, and one overlay that
//! replaces the level script. Set `RUST_LOG=info` (or `debug`) to follow the
//! lifecycle.

use std::path::{Path, PathBuf};

use anyhow::Context;
use sigil_content::prelude::*;
use sigil_script::prelude::*;
use sigil_session::prelude::*;
use sigil_wasm_host::{WasmConfig, WasmScriptProvider};

const TICKS: u64 = 12;

// ---------------------------------------------------------------------------
// Demo content
// ---------------------------------------------------------------------------

const BASE_LEVEL: &str = r#"
    (module
      (import "sigil" "log" (func $log (param i32 i32 i32)))
      (memory (export "memory") 1)
      (data (i32.const 0) "base level started")
      (func (export "game_started")
        (call $log (i32.const 2) (i32.const 0) (i32.const 18))))
"#;

const OVERLAY_LEVEL: &str = r#"
    (module
      (import "sigil" "log" (func $log (param i32 i32 i32)))
      (import "sigil" "tick_number" (func $tick (result i64)))
      (memory (export "memory") 1)
      (data (i32.const 0) "overlay level started")
      (data (i32.const 32) "fourth tick")
      (func (export "game_started")
        (call $log (i32.const 2) (i32.const 0) (i32.const 21)))
      (func (export "update")
        (if (i64.eq (call $tick) (i64.const 3))
          (then (call $log (i32.const 2) (i32.const 32) (i32.const 11)))))
      (func (export "game_finished")
        (call $log (i32.const 1) (i32.const 0) (i32.const 7))))
"#;

fn write(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}

fn write_demo_content(root: &Path) -> anyhow::Result<SessionConfig> {
    write(&root.join("Content/levels/main.vs"), BASE_LEVEL)?;
    write(
        &root.join("Content/missions/patrol.vsc"),
        r#"{ "name": "patrol", "nodes": ["gate", "tower", "yard", "barracks"] }"#,
    )?;
    write(&root.join("Mods/1001.sbm/VisualScripts/levels/main.vs"), OVERLAY_LEVEL)?;

    Ok(SessionConfig {
        is_server: true,
        resolver: ResolverConfig {
            content_root: root.join("Content"),
            mods_root: root.join("Mods"),
            ..Default::default()
        },
        overlays: vec![OverlaySource::new(1001, "Night Shift")],
    })
}

fn demo_manifest() -> BaseManifest {
    BaseManifest {
        level_scripts: vec!["levels/main.vs".to_owned()],
        state_machines: vec!["missions/patrol.vsc".to_owned()],
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn run(
    config: &SessionConfig,
    state: &SessionComponentState,
    ticks: u64,
) -> anyhow::Result<SessionSnapshot> {
    let store = LocalFileStore::new();
    let mut provider = WasmScriptProvider::new(WasmConfig::default())?;
    let mut session = ScriptSession::new(config.clone());

    let report = session.init(&store, state, &mut provider, &mut JsonMachineLoader::new());
    println!(
        "init: {} mapped, {} level script(s), {} machine(s), {} overlay(s) applied",
        session.resolved().map_or(0, |r| r.len()),
        report.level_scripts,
        report.machines_loaded,
        report.resolution.applied_overlays.len(),
    );

    let restore = session.before_start();
    if !restore.restored.is_empty() {
        println!("restored cursors: {}", restore.restored.join(", "));
    }

    for _ in 0..ticks {
        session.tick();
    }
    let diagnostics = session.last_diagnostics();
    println!(
        "ran {} tick(s); last tick {:?} total, {} hook failure(s)",
        session.tick_count(),
        diagnostics.total_time,
        diagnostics.hook_failures
    );

    let snapshot = session
        .capture_snapshot()?
        .context("server session produced no snapshot")?;
    session.unload();
    Ok(snapshot)
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let demo_dir = tempfile::tempdir().context("creating demo directory")?;
    let (config, state, saves_root) = match std::env::args().nth(1) {
        Some(path) => {
            let path = PathBuf::from(path);
            let config = SessionConfig::from_json_file(&path)?;
            let state = match std::env::args().nth(2) {
                Some(state_path) => {
                    let text = std::fs::read_to_string(&state_path)
                        .with_context(|| format!("reading {state_path}"))?;
                    serde_json::from_str(&text)
                        .with_context(|| format!("parsing {state_path}"))?
                }
                None => SessionComponentState::new_game(),
            };
            let saves = path
                .parent()
                .map_or_else(|| PathBuf::from("Saves"), |p| p.join("Saves"));
            (config, state, saves)
        }
        None => {
            let config = write_demo_content(demo_dir.path())?;
            let state = SessionComponentState::with_manifest(&demo_manifest());
            (config, state, demo_dir.path().join("Saves"))
        }
    };

    let checkpoints = CheckpointStore::new(saves_root);

    let snapshot = run(&config, &state, TICKS)?;
    let bytes = checkpoints.save("demo", &snapshot)?;
    checkpoints.save_last_session("demo")?;
    println!("saved checkpoint 'demo' ({bytes} bytes, hash {})", &snapshot.hash[..16]);

    let last = checkpoints
        .last_session()?
        .context("no last session recorded after save")?;
    let loaded = checkpoints
        .load(&last)?
        .with_context(|| format!("checkpoint '{last}' vanished after save"))?;
    let resumed = run(&config, &loaded.state, TICKS / 2)?;
    println!(
        "resumed session: first_run = {}, cursors = {}",
        resumed.state.first_run,
        serde_json::to_string(&resumed.state.script_state_machine_manager)?
    );
    println!("checkpoints on disk: {:?}", checkpoints.list_sessions()?);

    Ok(())
}
