/*
    store.rs - Per-session durable state

    One JSON snapshot file per session secret under the data dir. The file
    is owned exclusively by that session's actor; the membership directory
    never touches it. A memory-only mode backs tests.
*/

use super::SessionError;
use crate::core_model::{EventCode, Incident, RecordId, Scratchpad, SessionSecret};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Everything an actor persists between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PersistedSession {
    pub event: EventCode,
    pub secret: SessionSecret,
    pub incidents: Vec<Incident>,
    pub scratchpads: Vec<Scratchpad>,
    pub tombstones: BTreeSet<RecordId>,
}

/// Disk (or memory-only) backing for one session.
#[derive(Debug, Clone)]
pub(crate) struct SessionStore {
    path: Option<PathBuf>,
}

impl SessionStore {
    pub fn in_memory() -> Self {
        SessionStore { path: None }
    }

    pub fn at(dir: &Path, secret: &SessionSecret) -> Self {
        SessionStore {
            path: Some(dir.join(format!("{}.json", secret.as_str()))),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.as_deref().map(Path::exists).unwrap_or(false)
    }

    pub fn load(&self) -> Result<Option<PersistedSession>, SessionError> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let data =
            std::fs::read_to_string(path).map_err(|e| SessionError::Storage(e.to_string()))?;
        let state =
            serde_json::from_str(&data).map_err(|e| SessionError::Storage(e.to_string()))?;
        Ok(Some(state))
    }

    pub fn persist(&self, state: &PersistedSession) -> Result<(), SessionError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SessionError::Storage(e.to_string()))?;
        }
        let data =
            serde_json::to_vec(state).map_err(|e| SessionError::Storage(e.to_string()))?;
        std::fs::write(path, data).map_err(|e| SessionError::Storage(e.to_string()))
    }

    /// Irreversibly erase the session's durable state.
    pub fn erase(&self) -> Result<(), SessionError> {
        if let Some(path) = &self.path {
            if path.exists() {
                std::fs::remove_file(path).map_err(|e| SessionError::Storage(e.to_string()))?;
            }
        }
        Ok(())
    }
}
