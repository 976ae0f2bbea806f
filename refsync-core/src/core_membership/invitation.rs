/*
    invitation.rs - Membership records

    One live invitation per (user, event). The id is reissued on every
    invite; acceptance flips a bool once; revocation deletes the row
    outright. Membership needs no merge machinery and no tombstones.
*/

use crate::core_model::{EventCode, InvitationId, PeerId, SessionSecret};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Links one identity to one session with admin/accepted flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    /// Opaque id, fresh per invite; `accept` must present the current one
    pub id: InvitationId,

    pub event: EventCode,

    /// The session this invitation admits to; doubles as actor address
    pub secret: SessionSecret,

    /// Who the invitation is for
    pub user: PeerId,

    /// Who issued it
    pub issuer: PeerId,

    pub admin: bool,

    pub accepted: bool,
}

impl Invitation {
    pub fn new(
        event: EventCode,
        secret: SessionSecret,
        user: PeerId,
        issuer: PeerId,
        admin: bool,
    ) -> Self {
        Invitation {
            id: InvitationId::generate(),
            event,
            secret,
            user,
            issuer,
            admin,
            accepted: false,
        }
    }

    /// The creator's own invitation: admin, pre-accepted.
    pub fn for_creator(event: EventCode, secret: SessionSecret, creator: PeerId) -> Self {
        Invitation {
            id: InvitationId::generate(),
            event,
            secret,
            user: creator.clone(),
            issuer: creator,
            admin: true,
            accepted: true,
        }
    }
}

/// One session's roster as the directory tracks it.
///
/// Invariant: admins is a subset of members; a session with non-empty
/// membership has at least one admin or is mid-teardown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRoster {
    pub secret: SessionSecret,
    pub event: EventCode,
    pub admins: BTreeSet<PeerId>,
    pub members: BTreeSet<PeerId>,
}

impl SessionRoster {
    pub fn new(secret: SessionSecret, event: EventCode, creator: PeerId) -> Self {
        SessionRoster {
            secret,
            event,
            admins: BTreeSet::from([creator.clone()]),
            members: BTreeSet::from([creator]),
        }
    }

    pub fn is_admin(&self, peer: &PeerId) -> bool {
        self.admins.contains(peer)
    }

    pub fn is_member(&self, peer: &PeerId) -> bool {
        self.members.contains(peer)
    }
}
