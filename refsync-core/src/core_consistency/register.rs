/*
    register.rs - Per-field Last-Write-Wins register

    Each tracked field of a synchronizable record carries one KeyRegister.
    The edit counter is the logical clock; the wall-clock instant is
    advisory only and never consulted during merge. Count ties are broken
    by comparing the writer's peer string, greater peer wins.
*/

use crate::core_model::types::PeerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One archived write: the value that was replaced, who wrote it, when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The value this field held before the superseding write
    pub value: Value,

    /// Peer that had written the archived value
    pub peer: PeerId,

    /// Advisory wall-clock instant of the archived write
    pub instant: DateTime<Utc>,
}

/// LWW register for a single tracked field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRegister {
    /// Monotonic edit counter, strictly increasing per accepted write
    pub count: u64,

    /// Identity of the last writer
    pub peer: PeerId,

    /// Advisory timestamp of the last write
    pub instant: DateTime<Utc>,

    /// Append-only archive of superseded writes
    pub history: Vec<HistoryEntry>,
}

impl KeyRegister {
    /// Register for a freshly initialized field, owned by its creator.
    pub fn initial(owner: PeerId) -> Self {
        KeyRegister {
            count: 0,
            peer: owner,
            instant: Utc::now(),
            history: Vec::new(),
        }
    }

    /// Whether a write carrying this register supersedes one carrying
    /// `other`. Higher count wins; on a count tie the greater peer string
    /// wins. Two offline peers can edit from the same base count with no
    /// shared clock, so the tie-break must be deterministic and identical
    /// on every replica.
    pub fn supersedes(&self, other: &KeyRegister) -> bool {
        if self.count != other.count {
            self.count > other.count
        } else {
            self.peer > other.peer
        }
    }

    /// Whether two registers describe the same write.
    pub fn same_write(&self, other: &KeyRegister) -> bool {
        self.count == other.count && self.peer == other.peer
    }

    /// Record a local edit: archive the current write into history and
    /// advance the counter.
    pub fn advance(&mut self, archived_value: Value, editor: PeerId) {
        self.history.push(HistoryEntry {
            value: archived_value,
            peer: self.peer.clone(),
            instant: self.instant,
        });
        self.count += 1;
        self.peer = editor;
        self.instant = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn peer(s: &str) -> PeerId {
        PeerId::new(s.to_string())
    }

    #[test]
    fn test_initial_register() {
        let reg = KeyRegister::initial(peer("p1"));
        assert_eq!(reg.count, 0);
        assert_eq!(reg.peer, peer("p1"));
        assert!(reg.history.is_empty());
    }

    #[test]
    fn test_higher_count_supersedes() {
        let mut a = KeyRegister::initial(peer("p1"));
        let b = KeyRegister::initial(peer("p2"));
        a.advance(json!(null), peer("p1"));

        assert!(a.supersedes(&b));
        assert!(!b.supersedes(&a));
    }

    #[test]
    fn test_count_tie_broken_by_peer_string() {
        let mut a = KeyRegister::initial(peer("p1"));
        let mut b = KeyRegister::initial(peer("p1"));
        a.advance(json!("base"), peer("aaa"));
        b.advance(json!("base"), peer("bbb"));

        // "bbb" > "aaa" lexicographically
        assert!(b.supersedes(&a));
        assert!(!a.supersedes(&b));
    }

    #[test]
    fn test_register_never_supersedes_itself() {
        let reg = KeyRegister::initial(peer("p1"));
        assert!(!reg.supersedes(&reg.clone()));
        assert!(reg.same_write(&reg.clone()));
    }

    #[test]
    fn test_advance_archives_prior_write() {
        let mut reg = KeyRegister::initial(peer("p1"));
        reg.advance(json!("first"), peer("p2"));

        assert_eq!(reg.count, 1);
        assert_eq!(reg.peer, peer("p2"));
        assert_eq!(reg.history.len(), 1);
        assert_eq!(reg.history[0].value, json!("first"));
        assert_eq!(reg.history[0].peer, peer("p1"));
    }
}
