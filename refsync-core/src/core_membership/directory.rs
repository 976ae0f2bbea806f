/*
    directory.rs - The membership/invitation lifecycle

    Gates all access to a session. Durable in its own store, independent
    of whether the session's actor is reachable. The one cross-entity
    transactional rule lives here: removing the last admin ends the whole
    session, atomically with the admin-count check, touching both the
    membership store and the actor's durable state.
*/

use super::invitation::{Invitation, SessionRoster};
use super::store::{InvitationStore, StoreError};
use crate::core_identity::UserDirectory;
use crate::core_model::{EventCode, InvitationId, PeerId, SessionSecret};
use crate::core_session::{SessionError, SessionRegistry};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Membership failures. Authorization failures (NotAdmin, NotMember) are
/// distinct from authentication and never silently downgraded.
#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("no session for this event and address")]
    SessionNotFound,

    #[error("operation requires session admin")]
    NotAdmin,

    #[error("user is not a member of this session")]
    NotMember,

    #[error("user already holds an accepted invitation for this session")]
    AlreadyMember,

    #[error("user has an accepted invitation for this event under another session")]
    AcceptedElsewhere,

    #[error("no invitation on file")]
    InvitationNotFound,

    #[error("invitation id does not match the invitation on file")]
    InvitationSuperseded,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl MembershipError {
    /// Stable reason code surfaced to clients.
    pub fn reason_code(&self) -> &'static str {
        match self {
            MembershipError::SessionNotFound => "session_not_found",
            MembershipError::NotAdmin => "not_admin",
            MembershipError::NotMember => "not_member",
            MembershipError::AlreadyMember => "already_member",
            MembershipError::AcceptedElsewhere => "accepted_elsewhere",
            MembershipError::InvitationNotFound => "invitation_not_found",
            MembershipError::InvitationSuperseded => "invitation_superseded",
            MembershipError::Store(_) => "storage_failure",
            MembershipError::Session(_) => "session_failure",
        }
    }
}

/// What a removal did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// Member removed, session continues
    Removed,
    /// The last admin left: all invitations deleted, session destroyed
    SessionEnded,
}

/// One row of `list`: invitation joined with profile and live presence.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MemberEntry {
    pub peer: PeerId,
    pub display_name: Option<String>,
    pub admin: bool,
    pub accepted: bool,
    pub connected: bool,
}

/// The membership directory, composing store, user directory and the
/// session registry.
pub struct MembershipDirectory {
    store: Arc<dyn InvitationStore>,
    users: Arc<UserDirectory>,
    registry: Arc<SessionRegistry>,
    /// Serializes mutations so the cascade sees a consistent admin count.
    write_guard: Mutex<()>,
}

impl MembershipDirectory {
    pub fn new(
        store: Arc<dyn InvitationStore>,
        users: Arc<UserDirectory>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        MembershipDirectory {
            store,
            users,
            registry,
            write_guard: Mutex::new(()),
        }
    }

    /// Create a session for an event: fresh unguessable address, one
    /// accepted admin invitation for the creator, actor initialized at
    /// that address.
    pub async fn create_session(
        &self,
        event: EventCode,
        creator: PeerId,
    ) -> Result<Invitation, MembershipError> {
        let _guard = self.write_guard.lock().await;

        if let Some(existing) = self.store.invitation(&creator, &event).await? {
            if existing.accepted {
                return Err(MembershipError::AcceptedElsewhere);
            }
        }

        let secret = SessionSecret::generate();
        let invitation = Invitation::for_creator(event.clone(), secret.clone(), creator.clone());
        self.store.put_invitation(invitation.clone()).await?;
        self.store
            .put_roster(SessionRoster::new(secret.clone(), event.clone(), creator))
            .await?;
        self.registry.init(event.clone(), secret.clone()).await?;

        info!(event = %event, session = %secret, "session created");
        Ok(invitation)
    }

    /// The invitation currently on file for (user, event), if any.
    pub async fn invitation_for(
        &self,
        user: &PeerId,
        event: &EventCode,
    ) -> Result<Option<Invitation>, MembershipError> {
        Ok(self.store.invitation(user, event).await?)
    }

    /// Resolve the session a member is admitted to. Requires an accepted
    /// invitation; this is the authorization step in front of every
    /// record operation.
    pub async fn member_session(
        &self,
        user: &PeerId,
        event: &EventCode,
    ) -> Result<Invitation, MembershipError> {
        match self.store.invitation(user, event).await? {
            Some(invitation) if invitation.accepted => Ok(invitation),
            Some(_) => Err(MembershipError::NotMember),
            None => Err(MembershipError::NotMember),
        }
    }

    /// Invite `subject` to the inviter's session. Inviter must be admin.
    /// A subject with an accepted invitation elsewhere in the same event
    /// must leave there first.
    pub async fn invite(
        &self,
        event: &EventCode,
        inviter: &PeerId,
        subject: PeerId,
        as_admin: bool,
    ) -> Result<Invitation, MembershipError> {
        let _guard = self.write_guard.lock().await;

        let inviter_invitation = self
            .store
            .invitation(inviter, event)
            .await?
            .filter(|inv| inv.accepted)
            .ok_or(MembershipError::NotMember)?;
        let secret = inviter_invitation.secret.clone();

        let mut roster = self
            .store
            .roster(&secret)
            .await?
            .ok_or(MembershipError::SessionNotFound)?;
        if !roster.is_admin(inviter) {
            return Err(MembershipError::NotAdmin);
        }

        if let Some(existing) = self.store.invitation(&subject, event).await? {
            if existing.accepted {
                if existing.secret == secret {
                    return Err(MembershipError::AlreadyMember);
                }
                return Err(MembershipError::AcceptedElsewhere);
            }
            // Pending invitations are silently superseded; the first
            // issuer is not notified. Known race, kept as-is.
            debug!(subject = %subject, event = %event, "superseding pending invitation");
        }

        let invitation = Invitation::new(
            event.clone(),
            secret.clone(),
            subject.clone(),
            inviter.clone(),
            as_admin,
        );
        self.store.put_invitation(invitation.clone()).await?;

        roster.members.insert(subject.clone());
        if as_admin {
            roster.admins.insert(subject);
        }
        self.store.put_roster(roster).await?;

        Ok(invitation)
    }

    /// Accept an invitation. The presented id must match the invitation
    /// currently on file, which guards against accepting a superseded
    /// invite.
    pub async fn accept(
        &self,
        event: &EventCode,
        subject: &PeerId,
        invitation_id: &InvitationId,
    ) -> Result<Invitation, MembershipError> {
        let _guard = self.write_guard.lock().await;

        let mut invitation = self
            .store
            .invitation(subject, event)
            .await?
            .ok_or(MembershipError::InvitationNotFound)?;
        if &invitation.id != invitation_id {
            return Err(MembershipError::InvitationSuperseded);
        }

        invitation.accepted = true;
        self.store.put_invitation(invitation.clone()).await?;
        Ok(invitation)
    }

    /// Remove `subject` from the session. Self-revocation is always
    /// allowed; revoking another member requires admin. If the removed
    /// member was the last admin the whole session ends: every remaining
    /// invitation is deleted, membership cleared, actor destroyed. The
    /// write guard makes the cascade atomic with the admin-count check.
    pub async fn remove_member(
        &self,
        event: &EventCode,
        actor: &PeerId,
        subject: &PeerId,
    ) -> Result<RemovalOutcome, MembershipError> {
        let _guard = self.write_guard.lock().await;

        let subject_invitation = self
            .store
            .invitation(subject, event)
            .await?
            .ok_or(MembershipError::NotMember)?;
        let secret = subject_invitation.secret.clone();

        let mut roster = self
            .store
            .roster(&secret)
            .await?
            .ok_or(MembershipError::SessionNotFound)?;

        if actor != subject && !roster.is_admin(actor) {
            return Err(MembershipError::NotAdmin);
        }

        let was_admin = roster.admins.remove(subject);
        roster.members.remove(subject);
        self.store.delete_invitation(subject, event).await?;

        if was_admin && roster.admins.is_empty() {
            // Cascade: the session is unmanageable, end it rather than
            // strand the remaining members.
            let remaining = self.store.invitations_for_session(&secret).await?;
            for invitation in remaining {
                self.store
                    .delete_invitation(&invitation.user, &invitation.event)
                    .await?;
            }
            self.store.delete_roster(&secret).await?;
            self.registry.destroy(&secret).await?;
            info!(event = %event, session = %secret, "last admin left, session ended");
            return Ok(RemovalOutcome::SessionEnded);
        }

        self.store.put_roster(roster).await?;
        debug!(subject = %subject, event = %event, "member removed");
        Ok(RemovalOutcome::Removed)
    }

    /// Invitations joined with directory profiles and live presence from
    /// the actor's socket roster.
    pub async fn list(
        &self,
        event: &EventCode,
        secret: &SessionSecret,
    ) -> Result<Vec<MemberEntry>, MembershipError> {
        let invitations = self.store.invitations_for_session(secret).await?;

        let connected: Vec<PeerId> = match self.registry.lookup(secret).await {
            Ok(handle) => handle.snapshot().await.map(|s| s.roster).unwrap_or_default(),
            // A parked or destroyed actor just means nobody is connected.
            Err(_) => Vec::new(),
        };

        let keys: Vec<PeerId> = invitations.iter().map(|inv| inv.user.clone()).collect();
        let profiles = self.users.lookup_all(&keys).await;

        Ok(invitations
            .into_iter()
            .filter(|inv| &inv.event == event)
            .map(|inv| MemberEntry {
                connected: connected.contains(&inv.user),
                display_name: profiles.get(&inv.user).map(|p| p.display_name.clone()),
                admin: inv.admin,
                accepted: inv.accepted,
                peer: inv.user,
            })
            .collect())
    }
}
