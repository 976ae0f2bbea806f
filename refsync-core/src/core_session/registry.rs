/*
    registry.rs - Addressing actors by session secret

    The registry owns the map secret -> handle. `init` runs exactly once
    per session, right after the membership directory creates it; `lookup`
    transparently re-hydrates a parked actor from its snapshot file. A
    session whose file is gone is destroyed (or never existed) and stays
    unreachable.
*/

use super::actor::SessionActor;
use super::handle::SessionHandle;
use super::store::SessionStore;
use super::SessionError;
use crate::core_model::{EventCode, SessionSecret};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

/// Runtime knobs shared by every actor the registry spawns.
#[derive(Debug, Clone)]
pub struct SessionRuntime {
    /// Idle window after which a socketless actor parks itself
    pub idle_timeout: Duration,
    /// Actor mailbox depth
    pub mailbox_capacity: usize,
}

impl Default for SessionRuntime {
    fn default() -> Self {
        SessionRuntime {
            idle_timeout: Duration::from_secs(600),
            mailbox_capacity: 64,
        }
    }
}

/// Spawns, tracks and tears down session actors.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionSecret, SessionHandle>>,
    data_dir: Option<PathBuf>,
    runtime: SessionRuntime,
}

impl SessionRegistry {
    /// Registry without persistence; parked sessions are unrecoverable.
    pub fn in_memory(runtime: SessionRuntime) -> Self {
        SessionRegistry {
            sessions: RwLock::new(HashMap::new()),
            data_dir: None,
            runtime,
        }
    }

    /// Registry persisting one snapshot file per session under
    /// `data_dir/sessions`.
    pub fn new(data_dir: PathBuf, runtime: SessionRuntime) -> Result<Self, SessionError> {
        let dir = data_dir.join("sessions");
        std::fs::create_dir_all(&dir).map_err(|e| SessionError::Storage(e.to_string()))?;
        Ok(SessionRegistry {
            sessions: RwLock::new(HashMap::new()),
            data_dir: Some(dir),
            runtime,
        })
    }

    /// Initialize the actor for a freshly created session. Fires exactly
    /// once; a second init for the same secret is an error.
    pub async fn init(
        &self,
        event: EventCode,
        secret: SessionSecret,
    ) -> Result<SessionHandle, SessionError> {
        let mut sessions = self.sessions.write().await;
        if let Some(handle) = sessions.get(&secret) {
            if !handle.is_closed() {
                return Err(SessionError::AlreadyInitialized(secret));
            }
        }
        let store = self.store_for(&secret);
        if store.exists() {
            return Err(SessionError::AlreadyInitialized(secret));
        }

        let (command_tx, command_rx) = mpsc::channel(self.runtime.mailbox_capacity);
        let actor = SessionActor::new(
            event,
            secret.clone(),
            store,
            self.runtime.idle_timeout,
            command_rx,
        );
        // Persist the empty state up front so a parked-vs-destroyed
        // session can be told apart by file existence alone.
        actor.persist_initial()?;
        tokio::spawn(actor.run());

        let handle = SessionHandle::new(command_tx);
        sessions.insert(secret.clone(), handle.clone());
        info!(session = %secret, "session initialized");
        Ok(handle)
    }

    /// Resolve a handle, re-hydrating a parked actor from disk.
    pub async fn lookup(&self, secret: &SessionSecret) -> Result<SessionHandle, SessionError> {
        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(secret) {
                if !handle.is_closed() {
                    return Ok(handle.clone());
                }
            }
        }

        let mut sessions = self.sessions.write().await;
        // Lost the race: someone else re-hydrated first.
        if let Some(handle) = sessions.get(secret) {
            if !handle.is_closed() {
                return Ok(handle.clone());
            }
        }

        let store = self.store_for(secret);
        let state = store
            .load()?
            .ok_or_else(|| SessionError::SessionNotFound(secret.clone()))?;

        debug!(session = %secret, "re-hydrating parked session");
        let (command_tx, command_rx) = mpsc::channel(self.runtime.mailbox_capacity);
        let actor =
            SessionActor::restore(state, store, self.runtime.idle_timeout, command_rx);
        tokio::spawn(actor.run());

        let handle = SessionHandle::new(command_tx);
        sessions.insert(secret.clone(), handle.clone());
        Ok(handle)
    }

    /// Irreversibly destroy a session: stop the actor and erase its
    /// durable state. Invoked by the membership cascade.
    pub async fn destroy(&self, secret: &SessionSecret) -> Result<(), SessionError> {
        let handle = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(secret)
        };
        match handle {
            Some(handle) if !handle.is_closed() => match handle.destroy().await {
                Ok(()) => Ok(()),
                // Parked between the check and the send; fall through to
                // erasing the snapshot directly.
                Err(SessionError::SessionClosed) => self.store_for(secret).erase(),
                Err(err) => Err(err),
            },
            // Parked or never spawned: erase whatever is on disk.
            _ => self.store_for(secret).erase(),
        }
    }

    fn store_for(&self, secret: &SessionSecret) -> SessionStore {
        match &self.data_dir {
            Some(dir) => SessionStore::at(dir, secret),
            None => SessionStore::in_memory(),
        }
    }
}
