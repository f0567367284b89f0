//! File-store capability consumed by the overlay resolver.
//!
//! The resolver never touches the filesystem directly. It asks a
//! [`FileStore`] whether files and directories exist, enumerates overlay
//! folders, and converts physical locations back into logical paths.
//!
//! Two implementations are provided:
//!
//! - [`LocalFileStore`] -- the local disk, enumerated with `walkdir` in
//!   file-name order so resolution is reproducible across runs.
//! - [`MemoryFileStore`] -- an in-memory set of paths, for tests and for
//!   embedders that keep content in an archive index.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::ContentError;

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// Blocking, synchronous access to a content store.
///
/// Only called while a session is being initialized, never during a tick.
pub trait FileStore {
    /// Returns `true` if `path` names an existing file.
    fn file_exists(&self, path: &Path) -> bool;

    /// Returns `true` if `path` names an existing directory.
    fn directory_exists(&self, path: &Path) -> bool;

    /// Every file below `root`, recursively, in a stable order.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError`] if `root` is missing or cannot be walked.
    fn enumerate_files_recursive(&self, root: &Path) -> Result<Vec<PathBuf>, ContentError>;

    /// The logical path of `path` relative to `base`, with `/` separators.
    ///
    /// Returns `None` when `path` is not below `base` or equals it.
    fn relative_to(&self, base: &Path, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(base).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            return None;
        }
        Some(parts.join("/"))
    }
}

// ---------------------------------------------------------------------------
// LocalFileStore
// ---------------------------------------------------------------------------

/// [`FileStore`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileStore;

impl LocalFileStore {
    pub fn new() -> Self {
        Self
    }
}

impl FileStore for LocalFileStore {
    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn directory_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn enumerate_files_recursive(&self, root: &Path) -> Result<Vec<PathBuf>, ContentError> {
        if !root.is_dir() {
            return Err(ContentError::MissingDirectory {
                path: root.to_path_buf(),
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| ContentError::Enumerate {
                path: root.to_path_buf(),
                details: e.to_string(),
            })?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

// ---------------------------------------------------------------------------
// MemoryFileStore
// ---------------------------------------------------------------------------

/// In-memory [`FileStore`].
///
/// Adding a file implicitly creates every ancestor directory. Enumeration
/// order is the lexicographic order of the stored paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileStore {
    files: BTreeSet<PathBuf>,
    dirs: BTreeSet<PathBuf>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file (and all of its ancestor directories).
    pub fn add_file(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            self.dirs.insert(ancestor.to_path_buf());
        }
        self.files.insert(path);
    }

    /// Register an empty directory (and its ancestors).
    pub fn add_dir(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            self.dirs.insert(ancestor.to_path_buf());
        }
    }

    /// Number of registered files.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

impl FileStore for MemoryFileStore {
    fn file_exists(&self, path: &Path) -> bool {
        self.files.contains(path)
    }

    fn directory_exists(&self, path: &Path) -> bool {
        self.dirs.contains(path)
    }

    fn enumerate_files_recursive(&self, root: &Path) -> Result<Vec<PathBuf>, ContentError> {
        if !self.dirs.contains(root) {
            return Err(ContentError::MissingDirectory {
                path: root.to_path_buf(),
            });
        }
        Ok(self
            .files
            .iter()
            .filter(|f| f.starts_with(root))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_creates_ancestor_directories() {
        let mut store = MemoryFileStore::new();
        store.add_file("/mods/42.sbm/VisualScripts/a/b.vs");

        assert!(store.file_exists(Path::new("/mods/42.sbm/VisualScripts/a/b.vs")));
        assert!(store.directory_exists(Path::new("/mods/42.sbm/VisualScripts/a")));
        assert!(store.directory_exists(Path::new("/mods/42.sbm")));
        assert!(store.directory_exists(Path::new("/mods")));
        assert!(!store.directory_exists(Path::new("/mods/43.sbm")));
        assert!(!store.file_exists(Path::new("/mods/42.sbm/VisualScripts/a")));
    }

    #[test]
    fn memory_store_counts_files_not_directories() {
        let mut store = MemoryFileStore::new();
        assert_eq!(store.file_count(), 0);

        store.add_file("/content/levels/a.vs");
        store.add_file("/content/levels/b.vs");
        store.add_file("/content/levels/a.vs");
        store.add_dir("/content/empty");

        assert_eq!(store.file_count(), 2);
    }

    #[test]
    fn memory_store_enumerates_only_below_root() {
        let mut store = MemoryFileStore::new();
        store.add_file("/mods/a/VisualScripts/x.vs");
        store.add_file("/mods/a/VisualScripts/sub/y.vsc");
        store.add_file("/mods/b/VisualScripts/z.vs");

        let files = store
            .enumerate_files_recursive(Path::new("/mods/a"))
            .unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("/mods/a/VisualScripts/sub/y.vsc"),
                PathBuf::from("/mods/a/VisualScripts/x.vs"),
            ]
        );
    }

    #[test]
    fn memory_store_missing_root_is_error() {
        let store = MemoryFileStore::new();
        let err = store
            .enumerate_files_recursive(Path::new("/nowhere"))
            .unwrap_err();
        assert!(matches!(err, ContentError::MissingDirectory { .. }));
    }

    #[test]
    fn relative_to_uses_forward_slashes() {
        let store = MemoryFileStore::new();
        let rel = store.relative_to(
            Path::new("/mods/a/VisualScripts"),
            Path::new("/mods/a/VisualScripts/missions/intro.vsc"),
        );
        assert_eq!(rel.as_deref(), Some("missions/intro.vsc"));
    }

    #[test]
    fn relative_to_outside_base_is_none() {
        let store = MemoryFileStore::new();
        assert_eq!(
            store.relative_to(Path::new("/mods/a/VisualScripts"), Path::new("/mods/b/x.vs")),
            None
        );
        assert_eq!(
            store.relative_to(Path::new("/mods/a"), Path::new("/mods/a")),
            None
        );
    }

    #[test]
    fn local_store_walks_directory_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("VisualScripts");
        std::fs::create_dir_all(scripts.join("nested")).unwrap();
        std::fs::write(scripts.join("b.vs"), "b").unwrap();
        std::fs::write(scripts.join("a.vs"), "a").unwrap();
        std::fs::write(scripts.join("nested").join("c.vsc"), "c").unwrap();

        let store = LocalFileStore::new();
        assert!(store.directory_exists(&scripts));
        assert!(store.file_exists(&scripts.join("a.vs")));

        let files = store.enumerate_files_recursive(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| store.relative_to(dir.path(), f).unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "VisualScripts/a.vs".to_owned(),
                "VisualScripts/b.vs".to_owned(),
                "VisualScripts/nested/c.vsc".to_owned(),
            ]
        );
    }

    #[test]
    fn local_store_missing_root_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new();
        let err = store
            .enumerate_files_recursive(&dir.path().join("absent"))
            .unwrap_err();
        assert!(matches!(err, ContentError::MissingDirectory { .. }));
    }
}
