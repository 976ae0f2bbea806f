/*
    types.rs - Common identifier types shared across the sync engine

    Defines:
    - PeerId (algorithm-tagged public key, doubles as merge tie-break key)
    - EventCode, SessionSecret, RecordId, InvitationId
*/

use serde::{Deserialize, Serialize};
use std::fmt;

/// Public-key-derived identity of a device/user.
///
/// The string form is `<algorithm-tag>:<hex-encoded key>` and is used both
/// as durable identity and as the merge tie-break key. Ordering is plain
/// string ordering; merge correctness depends on every replica comparing
/// peers the same way, so this must never become algorithm-aware.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new(id: String) -> Self {
        PeerId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Competition event code, e.g. "RE-VRC-24-1234".
///
/// Every API surface is namespaced by event; a user holds at most one
/// accepted session per event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventCode(pub String);

impl EventCode {
    pub fn new(code: String) -> Self {
        EventCode(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque, unguessable session address.
///
/// Doubles as the actor address: holding the secret is necessary but not
/// sufficient for access (membership is still checked at the edge).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionSecret(pub String);

impl SessionSecret {
    pub fn new(secret: String) -> Self {
        SessionSecret(secret)
    }

    /// Generate a fresh 256-bit secret, hex encoded.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        SessionSecret(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-chosen, opaque record identifier.
///
/// Ids are minted on the device so that record creation commutes: two
/// devices can create unrelated records offline without collision.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: String) -> Self {
        RecordId(id)
    }

    pub fn generate() -> Self {
        use uuid::Uuid;
        RecordId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Invitation identifier, reissued on every invite.
///
/// Acceptance is checked against the id currently on file, which guards
/// against accepting a superseded invitation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvitationId(pub String);

impl InvitationId {
    pub fn new(id: String) -> Self {
        InvitationId(id)
    }

    pub fn generate() -> Self {
        use uuid::Uuid;
        InvitationId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvitationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_secret_generation() {
        let s1 = SessionSecret::generate();
        let s2 = SessionSecret::generate();
        assert_ne!(s1, s2);
        assert_eq!(s1.0.len(), 64);
    }

    #[test]
    fn test_record_id_generation() {
        let id1 = RecordId::generate();
        let id2 = RecordId::generate();
        assert_ne!(id1, id2);
        assert!(!id1.0.is_empty());
    }

    #[test]
    fn test_peer_id_ordering_is_string_ordering() {
        let a = PeerId::new("ecdsa-p384:02aa".to_string());
        let b = PeerId::new("ecdsa-p384:02ab".to_string());
        assert!(b > a);
    }

    #[test]
    fn test_invitation_id_generation() {
        let id1 = InvitationId::generate();
        let id2 = InvitationId::generate();
        assert_ne!(id1, id2);
    }
}
