//! Hashed session snapshots.
//!
//! A [`SessionSnapshot`] wraps the persisted [`SessionComponentState`] with
//! the tick count and a BLAKE3 hex digest of both, so a checkpoint that was
//! truncated or edited is rejected before any cursor is restored from it.

use serde::{Deserialize, Serialize};

use crate::state::SessionComponentState;
use crate::SessionError;

/// Persisted session state plus integrity hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionComponentState,
    /// Ticks run by the session at capture time.
    pub tick_count: u64,
    /// BLAKE3 hex digest (64 lowercase hex chars) of `state` and
    /// `tick_count`. The hash field itself is not included.
    pub hash: String,
}

/// BLAKE3 hex digest over the canonical JSON of the hashable fields.
fn compute_hash(state: &SessionComponentState, tick_count: u64) -> Result<String, SessionError> {
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct HashableState<'a> {
        state: &'a SessionComponentState,
        tick_count: u64,
    }

    let json_bytes = serde_json::to_vec(&HashableState { state, tick_count }).map_err(|e| {
        SessionError::Serialization {
            path: "<session snapshot>".into(),
            details: e.to_string(),
        }
    })?;

    Ok(blake3::hash(&json_bytes).to_hex().to_string())
}

impl SessionSnapshot {
    /// Capture `state` at `tick_count`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Serialization`] if a cursor payload cannot be
    /// serialized.
    pub fn capture(state: SessionComponentState, tick_count: u64) -> Result<Self, SessionError> {
        let hash = compute_hash(&state, tick_count)?;
        Ok(Self {
            state,
            tick_count,
            hash,
        })
    }

    /// Recompute the hash and compare it with the recorded one.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::HashMismatch`] if the contents changed since
    /// capture.
    pub fn verify(&self) -> Result<(), SessionError> {
        let recomputed = compute_hash(&self.state, self.tick_count)?;
        if recomputed != self.hash {
            return Err(SessionError::HashMismatch {
                recorded: self.hash.clone(),
                recomputed,
            });
        }
        Ok(())
    }
}
