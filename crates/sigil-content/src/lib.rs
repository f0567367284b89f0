//! Sigil Content -- layered script content resolution.
//!
//! This crate turns a base content declaration plus an ordered list of
//! optional overlays (mods) into a single logical-path -> physical-location
//! mapping. Later overlays override earlier ones by logical path; nothing is
//! ever removed from the mapping during resolution.
//!
//! # Modules
//!
//! - [`store`]: the [`FileStore`](store::FileStore) capability the resolver
//!   consumes, with a local-disk and an in-memory implementation.
//! - [`overlay`]: the base manifest, overlay sources, and the
//!   [`OverlayResolver`](overlay::OverlayResolver) merge pass.
//!
//! # Example
//!
//! ```
//! use sigil_content::prelude::*;
//!
//! let mut store = MemoryFileStore::new();
//! store.add_file("/content/missions/intro.vsc");
//!
//! let config = ResolverConfig {
//!     content_root: "/content".into(),
//!     mods_root: "/mods".into(),
//!     ..Default::default()
//! };
//! let manifest = BaseManifest {
//!     level_scripts: vec![],
//!     state_machines: vec!["missions/intro.vsc".to_owned()],
//! };
//!
//! let resolved = OverlayResolver::new(&store, &config).resolve(&manifest, &[]);
//! assert_eq!(resolved.len(), 1);
//! assert_eq!(resolved.state_machine_locations().len(), 1);
//! ```

#![deny(unsafe_code)]

pub mod overlay;
pub mod store;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by file-store operations.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// A directory could not be read or walked.
    #[error("failed to enumerate '{path}': {details}")]
    Enumerate {
        /// The directory being enumerated.
        path: std::path::PathBuf,
        /// Underlying I/O or walk error.
        details: String,
    },

    /// The requested directory does not exist on the store.
    #[error("directory '{path}' does not exist")]
    MissingDirectory {
        /// The directory that was looked up.
        path: std::path::PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::overlay::{
        normalize_logical_path, AppliedOverlay, BaseManifest, EntryOrigin, ManifestEntry,
        MissingResource, OverlayResolver, OverlaySource, ResolutionReport, ResolvedContent,
        ResolvedEntry, ResolverConfig, ResourceCategory,
    };
    pub use crate::store::{FileStore, LocalFileStore, MemoryFileStore};
    pub use crate::ContentError;
}
