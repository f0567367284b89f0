//! On-disk checkpoints of session script state.
//!
//! Layout under the saves root:
//!
//! ```text
//! <root>/
//!   last_session.json   pointer to the most recently played session
//!   <session name>/
//!     session.json      SessionSnapshot, pretty JSON
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::snapshot::SessionSnapshot;
use crate::SessionError;

/// File name of the checkpoint inside a session directory.
pub const CHECKPOINT_FILE: &str = "session.json";

/// File name of the last-session pointer inside the saves root.
pub const LAST_SESSION_FILE: &str = "last_session.json";

#[derive(Debug, Serialize, Deserialize)]
struct LastSessionRecord {
    session: String,
}

/// A directory of named session checkpoints.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the checkpoint for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidSessionName`] if `name` is empty, a
    /// relative component, or contains a path separator.
    pub fn session_dir(&self, name: &str) -> Result<PathBuf, SessionError> {
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\']);
        if invalid {
            return Err(SessionError::InvalidSessionName {
                name: name.to_owned(),
            });
        }
        Ok(self.root.join(name))
    }

    /// Write `snapshot` as the checkpoint for `name`, replacing any previous
    /// one. Returns the number of bytes written.
    ///
    /// The file is written next to its final location and renamed into
    /// place, so a failed save leaves the previous checkpoint intact.
    ///
    /// # Errors
    ///
    /// Any I/O or serialization failure. The caller must treat an error as
    /// "not saved".
    pub fn save(&self, name: &str, snapshot: &SessionSnapshot) -> Result<u64, SessionError> {
        let dir = self.session_dir(name)?;
        std::fs::create_dir_all(&dir).map_err(|e| SessionError::Io {
            path: dir.clone(),
            details: e.to_string(),
        })?;

        let path = dir.join(CHECKPOINT_FILE);
        let bytes = serde_json::to_vec_pretty(snapshot).map_err(|e| SessionError::Serialization {
            path: path.clone(),
            details: e.to_string(),
        })?;

        let staging = dir.join(format!("{CHECKPOINT_FILE}.tmp"));
        std::fs::write(&staging, &bytes).map_err(|e| SessionError::Io {
            path: staging.clone(),
            details: e.to_string(),
        })?;
        std::fs::rename(&staging, &path).map_err(|e| SessionError::Io {
            path: path.clone(),
            details: e.to_string(),
        })?;

        tracing::info!(
            session = name,
            path = %path.display(),
            bytes = bytes.len(),
            tick_count = snapshot.tick_count,
            "checkpoint saved"
        );
        Ok(bytes.len() as u64)
    }

    /// Read and verify the checkpoint for `name`. `Ok(None)` if there is
    /// none.
    ///
    /// # Errors
    ///
    /// I/O and parse failures, and [`SessionError::HashMismatch`] if the
    /// file was modified after it was written.
    pub fn load(&self, name: &str) -> Result<Option<SessionSnapshot>, SessionError> {
        let path = self.session_dir(name)?.join(CHECKPOINT_FILE);
        if !path.is_file() {
            tracing::debug!(session = name, path = %path.display(), "no checkpoint");
            return Ok(None);
        }

        let text = std::fs::read_to_string(&path).map_err(|e| SessionError::Io {
            path: path.clone(),
            details: e.to_string(),
        })?;
        let snapshot: SessionSnapshot =
            serde_json::from_str(&text).map_err(|e| SessionError::Serialization {
                path: path.clone(),
                details: e.to_string(),
            })?;
        snapshot.verify()?;

        tracing::info!(
            session = name,
            tick_count = snapshot.tick_count,
            "checkpoint loaded"
        );
        Ok(Some(snapshot))
    }

    /// Names of the sessions that have a checkpoint, sorted by name.
    ///
    /// A missing root is an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Io`] if the root exists but cannot be read.
    pub fn list_sessions(&self) -> Result<Vec<String>, SessionError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| SessionError::Io {
                path: self.root.clone(),
                details: e.to_string(),
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            if !entry.path().join(CHECKPOINT_FILE).is_file() {
                continue;
            }
            sessions.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(sessions)
    }

    // -----------------------------------------------------------------------
    // Last-session pointer
    // -----------------------------------------------------------------------

    /// Record `name` as the most recently played session.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidSessionName`] for a path-like name, otherwise
    /// any I/O or serialization failure.
    pub fn save_last_session(&self, name: &str) -> Result<(), SessionError> {
        self.session_dir(name)?;
        std::fs::create_dir_all(&self.root).map_err(|e| SessionError::Io {
            path: self.root.clone(),
            details: e.to_string(),
        })?;

        let path = self.root.join(LAST_SESSION_FILE);
        let record = LastSessionRecord {
            session: name.to_owned(),
        };
        let bytes = serde_json::to_vec_pretty(&record).map_err(|e| SessionError::Serialization {
            path: path.clone(),
            details: e.to_string(),
        })?;
        std::fs::write(&path, bytes).map_err(|e| SessionError::Io {
            path: path.clone(),
            details: e.to_string(),
        })?;

        tracing::debug!(session = name, "last session recorded");
        Ok(())
    }

    /// The most recently played session, if the pointer exists and still
    /// names a session with a checkpoint on disk.
    ///
    /// An unreadable or stale pointer yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Io`] if the pointer exists but cannot be read.
    pub fn last_session(&self) -> Result<Option<String>, SessionError> {
        let path = self.root.join(LAST_SESSION_FILE);
        if !path.is_file() {
            return Ok(None);
        }

        let text = std::fs::read_to_string(&path).map_err(|e| SessionError::Io {
            path: path.clone(),
            details: e.to_string(),
        })?;
        let record: LastSessionRecord = match serde_json::from_str(&text) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "ignoring unreadable last-session pointer"
                );
                return Ok(None);
            }
        };

        let Ok(dir) = self.session_dir(&record.session) else {
            tracing::warn!(session = %record.session, "ignoring invalid last-session name");
            return Ok(None);
        };
        if !dir.join(CHECKPOINT_FILE).is_file() {
            tracing::debug!(session = %record.session, "last session has no checkpoint");
            return Ok(None);
        }
        Ok(Some(record.session))
    }

    /// Forget the last-session pointer. A missing pointer is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Io`] if the pointer exists but cannot be
    /// removed.
    pub fn clear_last_session(&self) -> Result<(), SessionError> {
        let path = self.root.join(LAST_SESSION_FILE);
        if !path.is_file() {
            return Ok(());
        }
        std::fs::remove_file(&path).map_err(|e| SessionError::Io {
            path: path.clone(),
            details: e.to_string(),
        })?;
        tracing::debug!("last session cleared");
        Ok(())
    }
}
