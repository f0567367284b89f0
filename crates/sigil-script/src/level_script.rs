//! Level scripts and their ordered dispatch.
//!
//! Every level script implements the same closed set of lifecycle hooks.
//! [`LevelScriptSet`] calls them in collection order:
//!
//! - the first tick of a brand-new session: `game_started` on every script;
//! - every other tick: `update` on every script;
//! - teardown: `game_finished` then `dispose`, script by script.
//!
//! A failing hook is logged and recorded; dispatch continues with the next
//! script.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::ScriptError;

// ---------------------------------------------------------------------------
// LifecycleEvent
// ---------------------------------------------------------------------------

/// The lifecycle hooks a level script exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LifecycleEvent {
    GameStarted,
    Update,
    GameFinished,
    Dispose,
}

impl LifecycleEvent {
    /// The hook's export / method name.
    pub fn hook_name(self) -> &'static str {
        match self {
            LifecycleEvent::GameStarted => "game_started",
            LifecycleEvent::Update => "update",
            LifecycleEvent::GameFinished => "game_finished",
            LifecycleEvent::Dispose => "dispose",
        }
    }
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.hook_name())
    }
}

// ---------------------------------------------------------------------------
// LevelScript
// ---------------------------------------------------------------------------

/// A per-session script object with start/update/finish/dispose hooks.
pub trait LevelScript {
    fn name(&self) -> &str;

    /// Called once, on the first tick of a brand-new session.
    fn game_started(&mut self) -> Result<(), ScriptError>;

    /// Called on every tick that is not the first-run tick.
    fn update(&mut self) -> Result<(), ScriptError>;

    /// Called once at teardown, always before [`dispose`](Self::dispose).
    fn game_finished(&mut self) -> Result<(), ScriptError>;

    fn dispose(&mut self) -> Result<(), ScriptError>;

    /// Invoke the hook for `event`.
    fn dispatch(&mut self, event: LifecycleEvent) -> Result<(), ScriptError> {
        match event {
            LifecycleEvent::GameStarted => self.game_started(),
            LifecycleEvent::Update => self.update(),
            LifecycleEvent::GameFinished => self.game_finished(),
            LifecycleEvent::Dispose => self.dispose(),
        }
    }
}

// ---------------------------------------------------------------------------
// DispatchReport
// ---------------------------------------------------------------------------

/// What happened during one pass over the set.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Number of hook invocations, successful or not.
    pub dispatched: usize,
    /// Wall-clock time per script invocation, in dispatch order.
    pub script_times: Vec<(String, Duration)>,
    pub failures: Vec<ScriptError>,
}

impl DispatchReport {
    fn merge(&mut self, other: DispatchReport) {
        self.dispatched += other.dispatched;
        self.script_times.extend(other.script_times);
        self.failures.extend(other.failures);
    }
}

// ---------------------------------------------------------------------------
// LevelScriptSet
// ---------------------------------------------------------------------------

/// The ordered level scripts of a session.
#[derive(Default)]
pub struct LevelScriptSet {
    scripts: Vec<Box<dyn LevelScript>>,
}

impl LevelScriptSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_scripts(scripts: Vec<Box<dyn LevelScript>>) -> Self {
        Self { scripts }
    }

    pub fn push(&mut self, script: Box<dyn LevelScript>) {
        self.scripts.push(script);
    }

    /// Run one tick: `game_started` on every script if `first_run`,
    /// otherwise `update`. Never both, never neither.
    pub fn dispatch_tick(&mut self, first_run: bool) -> DispatchReport {
        let event = if first_run {
            LifecycleEvent::GameStarted
        } else {
            LifecycleEvent::Update
        };
        let mut report = DispatchReport::default();
        for script in &mut self.scripts {
            report.merge(Self::invoke(script.as_mut(), event));
        }
        report
    }

    /// Teardown: `game_finished` then `dispose` for each script, in order.
    /// The scripts stay in the set until [`clear`](Self::clear).
    pub fn finish_and_dispose(&mut self) -> DispatchReport {
        let mut report = DispatchReport::default();
        for script in &mut self.scripts {
            report.merge(Self::invoke(script.as_mut(), LifecycleEvent::GameFinished));
            report.merge(Self::invoke(script.as_mut(), LifecycleEvent::Dispose));
        }
        report
    }

    pub fn clear(&mut self) {
        self.scripts.clear();
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Script names in dispatch order.
    pub fn names(&self) -> Vec<&str> {
        self.scripts.iter().map(|s| s.name()).collect()
    }

    fn invoke(script: &mut dyn LevelScript, event: LifecycleEvent) -> DispatchReport {
        let start = Instant::now();
        let result = script.dispatch(event);
        let elapsed = start.elapsed();

        let mut report = DispatchReport {
            dispatched: 1,
            script_times: vec![(script.name().to_owned(), elapsed)],
            failures: Vec::new(),
        };
        if let Err(e) = result {
            tracing::warn!(
                script = script.name(),
                hook = %event,
                error = %e,
                "level script hook failed"
            );
            report.failures.push(e);
        }
        report
    }
}

impl std::fmt::Debug for LevelScriptSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelScriptSet")
            .field("scripts", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
