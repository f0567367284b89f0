//! Layered override resolution for script content.
//!
//! The [`OverlayResolver`] merges a [`BaseManifest`] with an ordered list of
//! [`OverlaySource`]s into a [`ResolvedContent`] mapping:
//!
//! 1. Every base entry is checked against the content root. Missing files
//!    are reported and left out; the rest are inserted.
//! 2. State-machine base entries are additionally captured, in declaration
//!    order, into a separate list of physical locations.
//! 3. Each overlay, in list order, is located (archive folder first, then a
//!    plain folder named after the overlay) and every script file under its
//!    script subfolder is upserted at its logical path.
//!
//! The last writer wins and the key set only grows. The state-machine list
//! from step 2 is never re-derived from the final mapping: an overlay that
//! rewrites a state-machine logical path changes the mapping's value for that
//! path but not which physical definition the session loads.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::store::FileStore;

// ---------------------------------------------------------------------------
// ResolverConfig
// ---------------------------------------------------------------------------

/// Where content lives and which files count as scripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Root that base manifest logical paths are relative to.
    pub content_root: PathBuf,
    /// Directory holding installed overlays.
    pub mods_root: PathBuf,
    /// Folder inside an overlay root that logical paths are relative to.
    /// Default: `"VisualScripts"`.
    pub script_subfolder: String,
    /// File extensions (without the dot) that mark a script or script
    /// container. Default: `["vs", "vsc"]`.
    pub script_extensions: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            content_root: PathBuf::from("Content"),
            mods_root: PathBuf::from("Mods"),
            script_subfolder: "VisualScripts".to_owned(),
            script_extensions: vec!["vs".to_owned(), "vsc".to_owned()],
        }
    }
}

impl ResolverConfig {
    fn is_script_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.script_extensions.iter().any(|e| e == ext))
    }
}

// ---------------------------------------------------------------------------
// Manifest types
// ---------------------------------------------------------------------------

/// The two kinds of resources a base manifest declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceCategory {
    LevelScript,
    StateMachine,
}

/// One declared resource of the base content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub logical_path: String,
    pub category: ResourceCategory,
}

/// The base content declaration for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseManifest {
    /// Logical paths of level scripts, in load order.
    pub level_scripts: Vec<String>,
    /// Logical paths of state-machine definitions, in load order.
    pub state_machines: Vec<String>,
}

impl BaseManifest {
    /// All entries: level scripts first, then state machines, each in
    /// declaration order.
    pub fn entries(&self) -> impl Iterator<Item = ManifestEntry> + '_ {
        let scripts = self.level_scripts.iter().map(|p| ManifestEntry {
            logical_path: p.clone(),
            category: ResourceCategory::LevelScript,
        });
        let machines = self.state_machines.iter().map(|p| ManifestEntry {
            logical_path: p.clone(),
            category: ResourceCategory::StateMachine,
        });
        scripts.chain(machines)
    }
}

/// An installed overlay (mod), identified both by its published id and its
/// folder name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlaySource {
    pub published_file_id: u64,
    pub name: String,
}

impl OverlaySource {
    pub fn new(published_file_id: u64, name: impl Into<String>) -> Self {
        Self {
            published_file_id,
            name: name.into(),
        }
    }

    /// Folder name of the archive-style install (`<id>.sbm`).
    pub fn archive_dir_name(&self) -> String {
        format!("{}.sbm", self.published_file_id)
    }
}

/// Normalize a logical path: backslashes become `/`, and leading `./` or `/`
/// segments are dropped.
pub fn normalize_logical_path(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");
    loop {
        if let Some(rest) = normalized.strip_prefix("./") {
            normalized = rest.to_owned();
        } else if let Some(rest) = normalized.strip_prefix('/') {
            normalized = rest.to_owned();
        } else {
            break;
        }
    }
    normalized
}

// ---------------------------------------------------------------------------
// Resolution output
// ---------------------------------------------------------------------------

/// Who wrote the current value of a mapping entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOrigin {
    /// The base manifest, under the given category.
    Base(ResourceCategory),
    /// The named overlay.
    Overlay(String),
}

/// One logical path and the physical location it currently resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub logical_path: String,
    pub location: PathBuf,
    pub origin: EntryOrigin,
}

/// A base manifest entry with no file behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingResource {
    pub logical_path: String,
    pub category: ResourceCategory,
    pub expected_location: PathBuf,
}

/// An overlay that was located and merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedOverlay {
    pub name: String,
    pub root: PathBuf,
    /// Number of script files the overlay contributed.
    pub files: usize,
}

/// Diagnostics gathered during a resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    pub missing: Vec<MissingResource>,
    /// Names of overlays whose root could not be located or walked.
    pub skipped_overlays: Vec<String>,
    pub applied_overlays: Vec<AppliedOverlay>,
    /// Number of upserts that replaced an existing logical path.
    pub overridden: usize,
}

impl ResolutionReport {
    /// `true` when every base resource was found and every overlay applied.
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.skipped_overlays.is_empty()
    }
}

/// The merged mapping produced by [`OverlayResolver::resolve`].
///
/// Entries keep the position at which their logical path was first seen;
/// overrides replace the location in place.
#[derive(Debug, Clone, Default)]
pub struct ResolvedContent {
    entries: Vec<ResolvedEntry>,
    index: HashMap<String, usize>,
    state_machine_locations: Vec<PathBuf>,
    report: ResolutionReport,
}

impl ResolvedContent {
    /// Insert or overwrite `logical_path`. Returns `true` if an existing
    /// entry was replaced.
    fn upsert(&mut self, logical_path: String, location: PathBuf, origin: EntryOrigin) -> bool {
        match self.index.get(&logical_path) {
            Some(&idx) => {
                let entry = &mut self.entries[idx];
                entry.location = location;
                entry.origin = origin;
                true
            }
            None => {
                self.index.insert(logical_path.clone(), self.entries.len());
                self.entries.push(ResolvedEntry {
                    logical_path,
                    location,
                    origin,
                });
                false
            }
        }
    }

    /// The physical location `logical_path` resolves to.
    pub fn get(&self, logical_path: &str) -> Option<&Path> {
        self.entry(logical_path).map(|e| e.location.as_path())
    }

    pub fn entry(&self, logical_path: &str) -> Option<&ResolvedEntry> {
        self.index.get(logical_path).map(|&idx| &self.entries[idx])
    }

    pub fn contains(&self, logical_path: &str) -> bool {
        self.index.contains_key(logical_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedEntry> {
        self.entries.iter()
    }

    /// Every resolved physical location, in first-seen order. This is what
    /// the script provider compiles.
    pub fn locations(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|e| e.location.clone()).collect()
    }

    /// Physical locations of the base manifest's state machines, captured
    /// before any overlay was applied.
    pub fn state_machine_locations(&self) -> &[PathBuf] {
        &self.state_machine_locations
    }

    pub fn report(&self) -> &ResolutionReport {
        &self.report
    }

    /// The mapping as an ordered map, for comparisons and display.
    pub fn to_map(&self) -> BTreeMap<String, PathBuf> {
        self.entries
            .iter()
            .map(|e| (e.logical_path.clone(), e.location.clone()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// OverlayResolver
// ---------------------------------------------------------------------------

/// Merges base content and overlays over a [`FileStore`].
pub struct OverlayResolver<'a, S: FileStore + ?Sized> {
    store: &'a S,
    config: &'a ResolverConfig,
}

impl<'a, S: FileStore + ?Sized> OverlayResolver<'a, S> {
    pub fn new(store: &'a S, config: &'a ResolverConfig) -> Self {
        Self { store, config }
    }

    /// Run the full merge pass. Never fails: missing base files and
    /// unlocatable overlays are logged and recorded in the report.
    pub fn resolve(&self, manifest: &BaseManifest, overlays: &[OverlaySource]) -> ResolvedContent {
        let mut content = ResolvedContent::default();

        self.apply_base(&mut content, manifest);
        for overlay in overlays {
            self.apply_overlay(&mut content, overlay);
        }

        tracing::debug!(
            entries = content.len(),
            state_machines = content.state_machine_locations.len(),
            overridden = content.report.overridden,
            skipped_overlays = content.report.skipped_overlays.len(),
            "script content resolved"
        );

        content
    }

    /// Locate an overlay's root: `<mods_root>/<id>.sbm` first, then
    /// `<mods_root>/<name>`.
    pub fn locate_overlay_root(&self, overlay: &OverlaySource) -> Option<PathBuf> {
        let archive = self.config.mods_root.join(overlay.archive_dir_name());
        if self.store.directory_exists(&archive) {
            return Some(archive);
        }
        let folder = self.config.mods_root.join(&overlay.name);
        if !overlay.name.is_empty() && self.store.directory_exists(&folder) {
            return Some(folder);
        }
        None
    }

    fn apply_base(&self, content: &mut ResolvedContent, manifest: &BaseManifest) {
        for entry in manifest.entries() {
            let logical_path = normalize_logical_path(&entry.logical_path);
            let location = self.config.content_root.join(&logical_path);

            if !self.store.file_exists(&location) {
                tracing::error!(
                    logical_path = %logical_path,
                    category = ?entry.category,
                    location = %location.display(),
                    "base script resource not found"
                );
                content.report.missing.push(MissingResource {
                    logical_path,
                    category: entry.category,
                    expected_location: location,
                });
                continue;
            }

            // A path already declared as a level script is loaded once, as a
            // level script.
            if entry.category == ResourceCategory::StateMachine && !content.contains(&logical_path)
            {
                content.state_machine_locations.push(location.clone());
            }

            if content.upsert(logical_path.clone(), location, EntryOrigin::Base(entry.category)) {
                tracing::debug!(
                    logical_path = %logical_path,
                    "base manifest declares logical path more than once"
                );
            }
        }
    }

    fn apply_overlay(&self, content: &mut ResolvedContent, overlay: &OverlaySource) {
        let Some(root) = self.locate_overlay_root(overlay) else {
            tracing::warn!(
                overlay = %overlay.name,
                published_file_id = overlay.published_file_id,
                "overlay root not found -- skipping"
            );
            content.report.skipped_overlays.push(overlay.name.clone());
            return;
        };

        let script_root = root.join(&self.config.script_subfolder);
        if !self.store.directory_exists(&script_root) {
            tracing::debug!(
                overlay = %overlay.name,
                root = %root.display(),
                "overlay has no script folder"
            );
            content.report.applied_overlays.push(AppliedOverlay {
                name: overlay.name.clone(),
                root,
                files: 0,
            });
            return;
        }

        let files = match self.store.enumerate_files_recursive(&script_root) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(
                    overlay = %overlay.name,
                    error = %e,
                    "failed to enumerate overlay scripts -- skipping"
                );
                content.report.skipped_overlays.push(overlay.name.clone());
                return;
            }
        };

        let mut contributed = 0;
        for file in files {
            if !self.config.is_script_file(&file) {
                continue;
            }
            let Some(relative) = self.store.relative_to(&script_root, &file) else {
                continue;
            };
            let logical_path = normalize_logical_path(&relative);

            let replaced = content.upsert(
                logical_path.clone(),
                file.clone(),
                EntryOrigin::Overlay(overlay.name.clone()),
            );
            if replaced {
                content.report.overridden += 1;
            }
            tracing::trace!(
                overlay = %overlay.name,
                logical_path = %logical_path,
                location = %file.display(),
                replaced,
                "overlay script applied"
            );
            contributed += 1;
        }

        content.report.applied_overlays.push(AppliedOverlay {
            name: overlay.name.clone(),
            root,
            files: contributed,
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryFileStore;

    fn config() -> ResolverConfig {
        ResolverConfig {
            content_root: PathBuf::from("/content"),
            mods_root: PathBuf::from("/mods"),
            ..Default::default()
        }
    }

    fn base_store() -> MemoryFileStore {
        let mut store = MemoryFileStore::new();
        store.add_file("/content/scripts/level.vs");
        store.add_file("/content/missions/intro.sm");
        store.add_file("/content/missions/boss.sm");
        store
    }

    fn base_manifest() -> BaseManifest {
        BaseManifest {
            level_scripts: vec!["scripts/level.vs".to_owned()],
            state_machines: vec!["missions/intro.sm".to_owned(), "missions/boss.sm".to_owned()],
        }
    }

    #[test]
    fn no_overlays_yields_base_pairs() {
        let store = base_store();
        let config = config();
        let resolved = OverlayResolver::new(&store, &config).resolve(&base_manifest(), &[]);

        let expected: BTreeMap<String, PathBuf> = [
            ("scripts/level.vs", "/content/scripts/level.vs"),
            ("missions/intro.sm", "/content/missions/intro.sm"),
            ("missions/boss.sm", "/content/missions/boss.sm"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), PathBuf::from(v)))
        .collect();

        assert_eq!(resolved.to_map(), expected);
        assert_eq!(
            resolved.state_machine_locations(),
            &[
                PathBuf::from("/content/missions/intro.sm"),
                PathBuf::from("/content/missions/boss.sm"),
            ]
        );
        assert!(resolved.report().is_clean());
    }

    #[test]
    fn overlay_override_does_not_change_state_machine_list() {
        // Base declares missions/intro.sm at A; overlay 1 declares it at B.
        let mut store = MemoryFileStore::new();
        store.add_file("/content/missions/intro.sm");
        store.add_file("/mods/1.sbm/VisualScripts/missions/intro.sm");

        let config = ResolverConfig {
            script_extensions: vec!["vs".to_owned(), "vsc".to_owned(), "sm".to_owned()],
            ..config()
        };
        let manifest = BaseManifest {
            level_scripts: vec![],
            state_machines: vec!["missions/intro.sm".to_owned()],
        };
        let overlays = [OverlaySource::new(1, "first")];

        let resolved = OverlayResolver::new(&store, &config).resolve(&manifest, &overlays);

        assert_eq!(
            resolved.get("missions/intro.sm"),
            Some(Path::new("/mods/1.sbm/VisualScripts/missions/intro.sm"))
        );
        assert_eq!(
            resolved.state_machine_locations(),
            &[PathBuf::from("/content/missions/intro.sm")]
        );
        assert_eq!(resolved.report().overridden, 1);
    }

    #[test]
    fn later_overlay_wins_over_earlier_overlay() {
        let mut store = base_store();
        store.add_file("/mods/1.sbm/VisualScripts/scripts/level.vs");
        store.add_file("/mods/second/VisualScripts/scripts/level.vs");

        let config = config();
        let overlays = [OverlaySource::new(1, "first"), OverlaySource::new(2, "second")];
        let resolved = OverlayResolver::new(&store, &config).resolve(&base_manifest(), &overlays);

        assert_eq!(
            resolved.get("scripts/level.vs"),
            Some(Path::new("/mods/second/VisualScripts/scripts/level.vs"))
        );
        assert_eq!(
            resolved.entry("scripts/level.vs").unwrap().origin,
            EntryOrigin::Overlay("second".to_owned())
        );
        assert_eq!(resolved.report().overridden, 2);
    }

    #[test]
    fn overlay_can_introduce_new_logical_paths() {
        let mut store = base_store();
        store.add_file("/mods/7.sbm/VisualScripts/extra/new_script.vs");

        let config = config();
        let resolved = OverlayResolver::new(&store, &config)
            .resolve(&base_manifest(), &[OverlaySource::new(7, "extra")]);

        assert_eq!(resolved.len(), 4);
        assert_eq!(
            resolved.get("extra/new_script.vs"),
            Some(Path::new("/mods/7.sbm/VisualScripts/extra/new_script.vs"))
        );
        // New entries are appended after the base entries.
        assert_eq!(
            resolved.iter().last().unwrap().logical_path,
            "extra/new_script.vs"
        );
    }

    #[test]
    fn archive_root_preferred_over_named_folder() {
        let mut store = base_store();
        store.add_file("/mods/5.sbm/VisualScripts/scripts/level.vs");
        store.add_file("/mods/named/VisualScripts/scripts/level.vs");

        let config = config();
        let resolver = OverlayResolver::new(&store, &config);
        let overlay = OverlaySource::new(5, "named");

        assert_eq!(
            resolver.locate_overlay_root(&overlay),
            Some(PathBuf::from("/mods/5.sbm"))
        );
        let resolved = resolver.resolve(&base_manifest(), &[overlay]);
        assert_eq!(
            resolved.get("scripts/level.vs"),
            Some(Path::new("/mods/5.sbm/VisualScripts/scripts/level.vs"))
        );
    }

    #[test]
    fn missing_overlay_root_is_skipped() {
        let mut store = base_store();
        store.add_file("/mods/present/VisualScripts/scripts/level.vs");

        let config = config();
        let overlays = [OverlaySource::new(9, "absent"), OverlaySource::new(10, "present")];
        let resolved = OverlayResolver::new(&store, &config).resolve(&base_manifest(), &overlays);

        assert_eq!(resolved.report().skipped_overlays, vec!["absent".to_owned()]);
        assert_eq!(resolved.report().applied_overlays.len(), 1);
        assert_eq!(
            resolved.get("scripts/level.vs"),
            Some(Path::new("/mods/present/VisualScripts/scripts/level.vs"))
        );
    }

    #[test]
    fn missing_base_resource_is_reported_and_resolution_continues() {
        let mut store = MemoryFileStore::new();
        store.add_file("/content/missions/boss.sm");

        let config = config();
        let resolved = OverlayResolver::new(&store, &config).resolve(&base_manifest(), &[]);

        assert_eq!(resolved.len(), 1);
        assert!(resolved.contains("missions/boss.sm"));
        assert!(!resolved.contains("missions/intro.sm"));
        assert_eq!(
            resolved.state_machine_locations(),
            &[PathBuf::from("/content/missions/boss.sm")]
        );

        let missing: Vec<&str> = resolved
            .report()
            .missing
            .iter()
            .map(|m| m.logical_path.as_str())
            .collect();
        assert_eq!(missing, vec!["scripts/level.vs", "missions/intro.sm"]);
        assert!(!resolved.report().is_clean());
    }

    #[test]
    fn non_script_files_are_ignored() {
        let mut store = base_store();
        store.add_file("/mods/3.sbm/VisualScripts/readme.txt");
        store.add_file("/mods/3.sbm/VisualScripts/level.vs.bak");
        store.add_file("/mods/3.sbm/Data/thing.vs");
        store.add_file("/mods/3.sbm/VisualScripts/container.vsc");

        let config = config();
        let resolved = OverlayResolver::new(&store, &config)
            .resolve(&base_manifest(), &[OverlaySource::new(3, "m")]);

        assert_eq!(resolved.len(), 4);
        assert!(resolved.contains("container.vsc"));
        assert!(!resolved.contains("readme.txt"));
        assert_eq!(resolved.report().applied_overlays[0].files, 1);
    }

    #[test]
    fn overlay_without_script_folder_contributes_nothing() {
        let mut store = base_store();
        store.add_dir("/mods/4.sbm");

        let config = config();
        let resolved = OverlayResolver::new(&store, &config)
            .resolve(&base_manifest(), &[OverlaySource::new(4, "empty")]);

        assert_eq!(resolved.len(), 3);
        assert!(resolved.report().skipped_overlays.is_empty());
        assert_eq!(resolved.report().applied_overlays[0].files, 0);
    }

    #[test]
    fn path_declared_twice_is_loaded_once_as_level_script() {
        let mut store = MemoryFileStore::new();
        store.add_file("/content/shared/both.vs");

        let config = config();
        let manifest = BaseManifest {
            level_scripts: vec!["shared/both.vs".to_owned()],
            state_machines: vec!["shared/both.vs".to_owned()],
        };
        let resolved = OverlayResolver::new(&store, &config).resolve(&manifest, &[]);

        assert_eq!(resolved.len(), 1);
        assert!(resolved.state_machine_locations().is_empty());
    }

    #[test]
    fn logical_paths_are_normalized() {
        assert_eq!(normalize_logical_path("a\\b\\c.vs"), "a/b/c.vs");
        assert_eq!(normalize_logical_path("./a/b.vs"), "a/b.vs");
        assert_eq!(normalize_logical_path("/a.vs"), "a.vs");
        assert_eq!(normalize_logical_path("a.vs"), "a.vs");
    }

    #[test]
    fn config_round_trips_through_json_with_defaults() {
        let parsed: ResolverConfig =
            serde_json::from_str(r#"{ "content_root": "/c", "mods_root": "/m" }"#).unwrap();
        assert_eq!(parsed.content_root, PathBuf::from("/c"));
        assert_eq!(parsed.script_subfolder, "VisualScripts");
        assert_eq!(parsed.script_extensions, vec!["vs", "vsc"]);
    }
}
