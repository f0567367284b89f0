//! Session configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sigil_content::overlay::{OverlaySource, ResolverConfig};

use crate::SessionError;

/// Per-session settings supplied by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Only the authoritative (server) side runs scripts. A non-server
    /// session is inert: every lifecycle call is a no-op. Default: `true`.
    pub is_server: bool,

    /// Where base content and overlays live on the file store.
    pub resolver: ResolverConfig,

    /// Overlays to apply, lowest priority first.
    pub overlays: Vec<OverlaySource>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            is_server: true,
            resolver: ResolverConfig::default(),
            overlays: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Load a config from a JSON file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// [`SessionError::Io`] if the file cannot be read,
    /// [`SessionError::Serialization`] if it is not a valid config.
    pub fn from_json_file(path: &Path) -> Result<Self, SessionError> {
        let text = std::fs::read_to_string(path).map_err(|e| SessionError::Io {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| SessionError::Serialization {
            path: path.to_path_buf(),
            details: e.to_string(),
        })
    }
}
