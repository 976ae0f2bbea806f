/*
    store.rs - Durable invitation/roster storage

    The directory's storage is deliberately separate from session actor
    state; the two only meet in the cascade-revoke rule. The trait keeps
    the engine swappable; shipped impls are in-memory (tests) and a JSON
    file that rewrites on every mutation.
*/

use super::invitation::{Invitation, SessionRoster};
use crate::core_model::{EventCode, PeerId, SessionSecret};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::RwLock;

/// Storage faults from the membership store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("membership store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("membership store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable mapping of (user, event) -> invitation and session -> roster.
#[async_trait]
pub trait InvitationStore: Send + Sync {
    async fn invitation(
        &self,
        user: &PeerId,
        event: &EventCode,
    ) -> Result<Option<Invitation>, StoreError>;

    /// Upsert the single live invitation for (user, event).
    async fn put_invitation(&self, invitation: Invitation) -> Result<(), StoreError>;

    async fn delete_invitation(&self, user: &PeerId, event: &EventCode)
        -> Result<(), StoreError>;

    async fn invitations_for_session(
        &self,
        secret: &SessionSecret,
    ) -> Result<Vec<Invitation>, StoreError>;

    async fn roster(&self, secret: &SessionSecret) -> Result<Option<SessionRoster>, StoreError>;

    async fn put_roster(&self, roster: SessionRoster) -> Result<(), StoreError>;

    async fn delete_roster(&self, secret: &SessionSecret) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct MembershipState {
    /// event -> user -> invitation
    invitations: HashMap<EventCode, HashMap<PeerId, Invitation>>,
    rosters: HashMap<SessionSecret, SessionRoster>,
}

/// In-memory store; also the engine behind the file store.
pub struct MemoryInvitationStore {
    state: RwLock<MembershipState>,
}

impl MemoryInvitationStore {
    pub fn new() -> Self {
        MemoryInvitationStore {
            state: RwLock::new(MembershipState::default()),
        }
    }
}

impl Default for MemoryInvitationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InvitationStore for MemoryInvitationStore {
    async fn invitation(
        &self,
        user: &PeerId,
        event: &EventCode,
    ) -> Result<Option<Invitation>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .invitations
            .get(event)
            .and_then(|by_user| by_user.get(user))
            .cloned())
    }

    async fn put_invitation(&self, invitation: Invitation) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state
            .invitations
            .entry(invitation.event.clone())
            .or_default()
            .insert(invitation.user.clone(), invitation);
        Ok(())
    }

    async fn delete_invitation(
        &self,
        user: &PeerId,
        event: &EventCode,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(by_user) = state.invitations.get_mut(event) {
            by_user.remove(user);
            if by_user.is_empty() {
                state.invitations.remove(event);
            }
        }
        Ok(())
    }

    async fn invitations_for_session(
        &self,
        secret: &SessionSecret,
    ) -> Result<Vec<Invitation>, StoreError> {
        let state = self.state.read().await;
        let mut out: Vec<Invitation> = state
            .invitations
            .values()
            .flat_map(|by_user| by_user.values())
            .filter(|inv| &inv.secret == secret)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.user.cmp(&b.user));
        Ok(out)
    }

    async fn roster(&self, secret: &SessionSecret) -> Result<Option<SessionRoster>, StoreError> {
        Ok(self.state.read().await.rosters.get(secret).cloned())
    }

    async fn put_roster(&self, roster: SessionRoster) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.rosters.insert(roster.secret.clone(), roster);
        Ok(())
    }

    async fn delete_roster(&self, secret: &SessionSecret) -> Result<(), StoreError> {
        self.state.write().await.rosters.remove(secret);
        Ok(())
    }
}

/// JSON-file-backed store: full state loaded on open, rewritten on every
/// mutation. Membership data is tiny; simplicity beats cleverness here.
pub struct FileInvitationStore {
    state: RwLock<MembershipState>,
    path: PathBuf,
}

impl FileInvitationStore {
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let state = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            serde_json::from_str(&data)?
        } else {
            MembershipState::default()
        };
        Ok(FileInvitationStore {
            state: RwLock::new(state),
            path,
        })
    }

    fn persist(&self, state: &MembershipState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(state)?)?;
        Ok(())
    }
}

#[async_trait]
impl InvitationStore for FileInvitationStore {
    async fn invitation(
        &self,
        user: &PeerId,
        event: &EventCode,
    ) -> Result<Option<Invitation>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .invitations
            .get(event)
            .and_then(|by_user| by_user.get(user))
            .cloned())
    }

    async fn put_invitation(&self, invitation: Invitation) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state
            .invitations
            .entry(invitation.event.clone())
            .or_default()
            .insert(invitation.user.clone(), invitation);
        self.persist(&state)
    }

    async fn delete_invitation(
        &self,
        user: &PeerId,
        event: &EventCode,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(by_user) = state.invitations.get_mut(event) {
            by_user.remove(user);
            if by_user.is_empty() {
                state.invitations.remove(event);
            }
        }
        self.persist(&state)
    }

    async fn invitations_for_session(
        &self,
        secret: &SessionSecret,
    ) -> Result<Vec<Invitation>, StoreError> {
        let state = self.state.read().await;
        let mut out: Vec<Invitation> = state
            .invitations
            .values()
            .flat_map(|by_user| by_user.values())
            .filter(|inv| &inv.secret == secret)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.user.cmp(&b.user));
        Ok(out)
    }

    async fn roster(&self, secret: &SessionSecret) -> Result<Option<SessionRoster>, StoreError> {
        Ok(self.state.read().await.rosters.get(secret).cloned())
    }

    async fn put_roster(&self, roster: SessionRoster) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.rosters.insert(roster.secret.clone(), roster);
        self.persist(&state)
    }

    async fn delete_roster(&self, secret: &SessionSecret) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.rosters.remove(secret);
        self.persist(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invitation(user: &str, event: &str, secret: &SessionSecret) -> Invitation {
        Invitation::new(
            EventCode::new(event.to_string()),
            secret.clone(),
            PeerId::new(user.to_string()),
            PeerId::new("issuer".to_string()),
            false,
        )
    }

    #[tokio::test]
    async fn test_put_is_upsert_per_user_event() {
        let store = MemoryInvitationStore::new();
        let secret = SessionSecret::generate();
        let event = EventCode::new("RE-VRC-24-1234".to_string());
        let user = PeerId::new("u1".to_string());

        let first = invitation("u1", "RE-VRC-24-1234", &secret);
        let second = invitation("u1", "RE-VRC-24-1234", &secret);
        store.put_invitation(first.clone()).await.unwrap();
        store.put_invitation(second.clone()).await.unwrap();

        let current = store.invitation(&user, &event).await.unwrap().unwrap();
        // The reissued id replaced the first one.
        assert_eq!(current.id, second.id);
        assert_ne!(current.id, first.id);
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("membership.json");
        let secret = SessionSecret::generate();
        let event = EventCode::new("RE-VRC-24-1234".to_string());
        let user = PeerId::new("u1".to_string());

        {
            let store = FileInvitationStore::open(path.clone()).unwrap();
            store
                .put_invitation(invitation("u1", "RE-VRC-24-1234", &secret))
                .await
                .unwrap();
            store
                .put_roster(SessionRoster::new(
                    secret.clone(),
                    event.clone(),
                    user.clone(),
                ))
                .await
                .unwrap();
        }

        let reopened = FileInvitationStore::open(path).unwrap();
        assert!(reopened.invitation(&user, &event).await.unwrap().is_some());
        assert!(reopened.roster(&secret).await.unwrap().is_some());
        assert_eq!(
            reopened
                .invitations_for_session(&secret)
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
