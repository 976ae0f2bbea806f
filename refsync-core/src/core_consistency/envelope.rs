/*
    envelope.rs - Consistency envelope carried by every synchronizable record

    One KeyRegister per tracked field, stored under the field name. The
    envelope is initialized atomically and completely with its record:
    there is never a record with a partial envelope.
*/

use super::register::KeyRegister;
use crate::core_model::types::PeerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-record consistency metadata: field name -> LWW register.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConsistencyEnvelope {
    registers: BTreeMap<String, KeyRegister>,
}

impl ConsistencyEnvelope {
    /// Empty envelope. Only useful as a placeholder before
    /// [`initialize`](crate::core_consistency::initialize) runs.
    pub fn new() -> Self {
        ConsistencyEnvelope {
            registers: BTreeMap::new(),
        }
    }

    /// Envelope with one register per tracked field, all at count 0.
    pub fn initial(fields: &[&str], owner: &PeerId) -> Self {
        let registers = fields
            .iter()
            .map(|f| (f.to_string(), KeyRegister::initial(owner.clone())))
            .collect();
        ConsistencyEnvelope { registers }
    }

    pub fn register(&self, field: &str) -> Option<&KeyRegister> {
        self.registers.get(field)
    }

    pub fn register_mut(&mut self, field: &str) -> Option<&mut KeyRegister> {
        self.registers.get_mut(field)
    }

    /// Replace a field's register wholesale (merge winner takes all:
    /// count, peer, instant and history).
    pub fn replace_register(&mut self, field: &str, register: KeyRegister) {
        self.registers.insert(field.to_string(), register);
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.registers.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_envelope_covers_all_fields() {
        let owner = PeerId::new("p1".to_string());
        let env = ConsistencyEnvelope::initial(&["notes", "outcome"], &owner);

        assert_eq!(env.fields().count(), 2);
        assert_eq!(env.register("notes").unwrap().count, 0);
        assert_eq!(env.register("outcome").unwrap().peer, owner);
        assert!(env.register("id").is_none());
    }

    #[test]
    fn test_replace_register() {
        let owner = PeerId::new("p1".to_string());
        let mut env = ConsistencyEnvelope::initial(&["notes"], &owner);

        let mut winner = KeyRegister::initial(PeerId::new("p2".to_string()));
        winner.advance(serde_json::json!(null), PeerId::new("p2".to_string()));
        env.replace_register("notes", winner.clone());

        assert_eq!(env.register("notes").unwrap(), &winner);
    }
}
