//! The session lifecycle controller.
//!
//! [`ScriptSession`] exclusively owns the resolved content, the
//! [`StateMachineManager`] and the [`LevelScriptSet`] of one running session
//! and drives them through:
//!
//! ```text
//! Uninitialized --init--> Initialized --before_start--> Restored --tick--> Running --unload--> Unloaded
//! ```
//!
//! A non-server session is [`SessionPhase::Inert`] from construction and
//! every lifecycle call on it is a no-op.
//!
//! # Tick ordering
//!
//! Within a tick, every state machine advances before any level script hook
//! runs. The first tick of a brand-new session dispatches `game_started`;
//! every later tick dispatches `update`.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use sigil_content::overlay::{BaseManifest, OverlayResolver, ResolutionReport, ResolvedContent};
use sigil_content::store::FileStore;
use sigil_script::prelude::*;

use crate::config::SessionConfig;
use crate::snapshot::SessionSnapshot;
use crate::state::SessionComponentState;
use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionPhase
// ---------------------------------------------------------------------------

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Initialized,
    Restored,
    Running,
    Unloaded,
    /// Non-authoritative session; nothing runs.
    Inert,
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Outcome of [`ScriptSession::init`].
#[derive(Debug, Clone, Default)]
pub struct InitReport {
    pub resolution: ResolutionReport,
    /// Result of handing every resolved location to the script provider.
    pub scripts: LoadReport,
    /// Level scripts instantiated into the session.
    pub level_scripts: usize,
    /// State machines added to the manager.
    pub machines_loaded: usize,
    pub machine_failures: Vec<LoadFailure>,
}

/// Outcome of [`ScriptSession::before_start`].
#[derive(Debug, Default)]
pub struct RestoreReport {
    /// Machines whose cursors were restored, in snapshot order.
    pub restored: Vec<String>,
    /// Snapshot entries that could not be applied.
    pub failures: Vec<ScriptError>,
}

/// Timing diagnostics for the last tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Zero-based index of the tick.
    pub tick: u64,
    /// Whether this tick dispatched `game_started` rather than `update`.
    pub first_run: bool,
    /// Time spent advancing state machines.
    pub machine_update_time: Duration,
    /// Wall-clock time per script hook, in dispatch order.
    pub script_times: Vec<(String, Duration)>,
    /// Hooks that returned an error this tick.
    pub hook_failures: usize,
    /// Total time for the tick.
    pub total_time: Duration,
}

// ---------------------------------------------------------------------------
// ScriptSession
// ---------------------------------------------------------------------------

/// Lifecycle controller for one session's scripts and state machines.
pub struct ScriptSession {
    config: SessionConfig,
    phase: SessionPhase,
    /// Per-session first-run flag. Cleared by the first tick, re-armed only
    /// by [`reset`](Self::reset).
    first_run: bool,
    /// Set by the first tick and never cleared, not even by `reset`.
    has_ticked: bool,
    manifest: BaseManifest,
    resolved: Option<ResolvedContent>,
    manager: Option<StateMachineManager>,
    scripts: LevelScriptSet,
    /// Cursors captured by the previous save, applied in `before_start`.
    pending_restore: Option<StateMachineManagerSnapshot>,
    tick_count: u64,
    last_diagnostics: TickDiagnostics,
}

impl ScriptSession {
    pub fn new(config: SessionConfig) -> Self {
        let phase = if config.is_server {
            SessionPhase::Uninitialized
        } else {
            SessionPhase::Inert
        };
        Self {
            config,
            phase,
            first_run: true,
            has_ticked: false,
            manifest: BaseManifest::default(),
            resolved: None,
            manager: None,
            scripts: LevelScriptSet::new(),
            pending_restore: None,
            tick_count: 0,
            last_diagnostics: TickDiagnostics::default(),
        }
    }

    /// Resolve content, load every script and state machine, and record the
    /// incoming first-run flag.
    ///
    /// The base manifest comes from `state`. Every resolved location, base or
    /// overlay, goes to `provider`; the manager is populated from the
    /// pre-overlay state-machine list through `machine_loader`. Individual
    /// load failures are reported, not fatal.
    ///
    /// # Panics
    ///
    /// Panics if a server session has already been initialized.
    pub fn init<S: FileStore + ?Sized>(
        &mut self,
        store: &S,
        state: &SessionComponentState,
        provider: &mut dyn ScriptProvider,
        machine_loader: &mut dyn MachineLoader,
    ) -> InitReport {
        if self.is_inert() {
            tracing::debug!("init skipped: session is not authoritative");
            return InitReport::default();
        }
        assert!(
            self.phase == SessionPhase::Uninitialized,
            "init called on a session in phase {:?}",
            self.phase
        );

        self.first_run = state.first_run;
        self.manifest = state.manifest();
        self.pending_restore = state.script_state_machine_manager.clone();

        let resolved = OverlayResolver::new(store, &self.config.resolver)
            .resolve(&self.manifest, &self.config.overlays);

        let scripts = provider.initialize(&resolved.locations());
        for failure in &scripts.failures {
            tracing::warn!(
                location = %failure.location.display(),
                details = %failure.details,
                "script definition failed to load"
            );
        }
        self.scripts = LevelScriptSet::from_scripts(provider.instantiate_level_scripts());

        let mut manager = StateMachineManager::new();
        let mut machine_failures = Vec::new();
        for location in resolved.state_machine_locations() {
            match manager.add_machine(machine_loader, location) {
                Ok(name) => {
                    tracing::debug!(name, location = %location.display(), "state machine added");
                }
                Err(e) => {
                    tracing::warn!(
                        location = %location.display(),
                        error = %e,
                        "state machine failed to load"
                    );
                    machine_failures.push(LoadFailure::new(location.clone(), e.to_string()));
                }
            }
        }

        let report = InitReport {
            resolution: resolved.report().clone(),
            scripts,
            level_scripts: self.scripts.len(),
            machines_loaded: manager.len(),
            machine_failures,
        };

        self.manager = Some(manager);
        self.resolved = Some(resolved);
        self.phase = SessionPhase::Initialized;

        tracing::info!(
            first_run = self.first_run,
            level_scripts = report.level_scripts,
            state_machines = report.machines_loaded,
            "session initialized"
        );
        report
    }

    /// Apply the cursors captured by the previous save, if any.
    ///
    /// An entry naming a machine that is no longer active, or carrying
    /// cursors the machine rejects, is logged and skipped; the remaining
    /// entries are still restored.
    ///
    /// # Panics
    ///
    /// Panics if the session is not in [`SessionPhase::Initialized`].
    pub fn before_start(&mut self) -> RestoreReport {
        let mut report = RestoreReport::default();
        if self.is_inert() {
            return report;
        }
        assert!(
            self.phase == SessionPhase::Initialized,
            "before_start called on a session in phase {:?}",
            self.phase
        );

        if let (Some(snapshot), Some(manager)) = (self.pending_restore.take(), self.manager.as_mut())
        {
            for entry in &snapshot.active_state_machines {
                match manager.restore(&entry.state_machine_name, &entry.cursors) {
                    Ok(()) => report.restored.push(entry.state_machine_name.clone()),
                    Err(e) => {
                        tracing::warn!(
                            name = %entry.state_machine_name,
                            error = %e,
                            "state machine restore failed"
                        );
                        report.failures.push(e);
                    }
                }
            }
        }

        self.phase = SessionPhase::Restored;
        tracing::info!(
            restored = report.restored.len(),
            failed = report.failures.len(),
            "session ready to start"
        );
        report
    }

    /// Run one tick: advance every state machine, then dispatch the level
    /// scripts. Clears the first-run flag.
    ///
    /// # Panics
    ///
    /// Panics if the session has not been initialized or has been unloaded.
    pub fn tick(&mut self) {
        if self.is_inert() {
            return;
        }
        assert!(
            matches!(
                self.phase,
                SessionPhase::Initialized | SessionPhase::Restored | SessionPhase::Running
            ),
            "tick called on a session in phase {:?}",
            self.phase
        );

        let tick_start = Instant::now();
        let first_run = self.first_run;

        let machines_start = Instant::now();
        if let Some(manager) = self.manager.as_mut() {
            manager.update();
        }
        let machine_update_time = machines_start.elapsed();

        let dispatch = self.scripts.dispatch_tick(first_run);

        if first_run {
            tracing::debug!(tick = self.tick_count, "first run: game started");
        }
        self.first_run = false;
        self.has_ticked = true;
        self.phase = SessionPhase::Running;

        self.last_diagnostics = TickDiagnostics {
            tick: self.tick_count,
            first_run,
            machine_update_time,
            script_times: dispatch.script_times,
            hook_failures: dispatch.failures.len(),
            total_time: tick_start.elapsed(),
        };
        self.tick_count += 1;

        tracing::trace!(
            tick = self.last_diagnostics.tick,
            hook_failures = self.last_diagnostics.hook_failures,
            total_us = self.last_diagnostics.total_time.as_micros() as u64,
            "tick complete"
        );
    }

    /// Tear the session down: `game_finished` then `dispose` on every level
    /// script, dispose the state-machine manager, then drop the scripts.
    ///
    /// # Panics
    ///
    /// Panics if the session was never initialized or is already unloaded.
    pub fn unload(&mut self) {
        if self.is_inert() {
            return;
        }
        assert!(
            matches!(
                self.phase,
                SessionPhase::Initialized | SessionPhase::Restored | SessionPhase::Running
            ),
            "unload called on a session in phase {:?}",
            self.phase
        );

        let teardown = self.scripts.finish_and_dispose();
        if let Some(mut manager) = self.manager.take() {
            manager.dispose();
        }
        self.scripts.clear();
        self.phase = SessionPhase::Unloaded;

        tracing::info!(
            ticks = self.tick_count,
            hook_failures = teardown.failures.len(),
            "session unloaded"
        );
    }

    /// The state to persist for this session, or `None` on a non-server
    /// session (there is nothing to save).
    ///
    /// `first_run` is `false` once any tick has run, even if
    /// [`reset`](Self::reset) has re-armed the live flag since.
    pub fn component_state(&self) -> Option<SessionComponentState> {
        if self.is_inert() {
            return None;
        }
        Some(SessionComponentState {
            first_run: self.first_run && !self.has_ticked,
            level_script_logical_paths: self.manifest.level_scripts.clone(),
            state_machine_logical_paths: self.manifest.state_machines.clone(),
            script_state_machine_manager: self.manager.as_ref().map(|m| m.snapshot()),
        })
    }

    /// [`component_state`](Self::component_state) wrapped with the tick count
    /// and an integrity hash.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Serialization`] if the state cannot be hashed.
    pub fn capture_snapshot(&self) -> Result<Option<SessionSnapshot>, SessionError> {
        self.component_state()
            .map(|state| SessionSnapshot::capture(state, self.tick_count))
            .transpose()
    }

    /// Dispose the state-machine manager, if any, and re-arm the first-run
    /// flag so the next tick dispatches `game_started` again. The level-script
    /// set is left as it is, and the persisted flag stays `false` once the
    /// session has ticked.
    pub fn reset(&mut self) {
        if let Some(mut manager) = self.manager.take() {
            manager.dispose();
        }
        self.first_run = true;
        tracing::debug!("session reset: first run re-armed");
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_inert(&self) -> bool {
        self.phase == SessionPhase::Inert
    }

    pub fn first_run(&self) -> bool {
        self.first_run
    }

    /// Number of ticks run since `init`.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The resolved content mapping, once initialized.
    pub fn resolved(&self) -> Option<&ResolvedContent> {
        self.resolved.as_ref()
    }

    /// Physical locations of the state machines the manager was populated
    /// from.
    pub fn state_machine_locations(&self) -> &[PathBuf] {
        match &self.resolved {
            Some(resolved) => resolved.state_machine_locations(),
            None => &[],
        }
    }

    pub fn manager(&self) -> Option<&StateMachineManager> {
        self.manager.as_ref()
    }

    pub fn level_scripts(&self) -> &LevelScriptSet {
        &self.scripts
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }
}

impl std::fmt::Debug for ScriptSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptSession")
            .field("phase", &self.phase)
            .field("first_run", &self.first_run)
            .field("has_ticked", &self.has_ticked)
            .field("tick_count", &self.tick_count)
            .field("manager", &self.manager)
            .field("scripts", &self.scripts)
            .finish_non_exhaustive()
    }
}
