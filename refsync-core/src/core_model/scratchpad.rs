/*
    scratchpad.rs - Shared per-match notes

    One scratchpad per match, keyed by a match-scoped id the caller
    chooses. Unlike incidents, scratchpads are never deleted; they only
    ever update.
*/

use super::field_codec::{json_field, typed_field};
use super::types::{EventCode, PeerId, RecordId};
use crate::core_consistency::{
    initialize, ConsistencyEnvelope, ConsistencyError, Synchronizable,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Autonomous-period winner recorded on the match scratchpad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoWinner {
    Red,
    Blue,
    Tie,
    None,
}

impl Default for AutoWinner {
    fn default() -> Self {
        AutoWinner::None
    }
}

/// Per-match shared referee notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scratchpad {
    /// Match-scoped id, caller-chosen (excluded from merge)
    pub id: RecordId,

    /// Owning event (excluded from merge)
    pub event: EventCode,

    /// Autonomous winner ruling
    pub auto_winner: AutoWinner,

    /// Free-text match notes
    pub notes: String,

    /// Per-field merge metadata
    pub consistency: ConsistencyEnvelope,
}

impl Scratchpad {
    const TRACKED: &'static [&'static str] = &["auto_winner", "notes"];
    const IGNORED: &'static [&'static str] = &["id", "event", "consistency"];

    /// Create a scratchpad with a complete envelope owned by `owner`.
    pub fn new(id: RecordId, event: EventCode, owner: &PeerId) -> Self {
        let mut scratchpad = Scratchpad {
            id,
            event,
            auto_winner: AutoWinner::default(),
            notes: String::new(),
            consistency: ConsistencyEnvelope::new(),
        };
        initialize(&mut scratchpad, owner);
        scratchpad
    }
}

impl Synchronizable for Scratchpad {
    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn tracked_fields() -> &'static [&'static str] {
        Self::TRACKED
    }

    fn ignored_fields() -> &'static [&'static str] {
        Self::IGNORED
    }

    fn field(&self, name: &str) -> Result<Value, ConsistencyError> {
        match name {
            "auto_winner" => json_field(name, &self.auto_winner),
            "notes" => json_field(name, &self.notes),
            other => Err(ConsistencyError::UntrackedField(other.to_string())),
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), ConsistencyError> {
        match name {
            "auto_winner" => self.auto_winner = typed_field(name, value)?,
            "notes" => self.notes = typed_field(name, value)?,
            other => return Err(ConsistencyError::UntrackedField(other.to_string())),
        }
        Ok(())
    }

    fn envelope(&self) -> &ConsistencyEnvelope {
        &self.consistency
    }

    fn envelope_mut(&mut self) -> &mut ConsistencyEnvelope {
        &mut self.consistency
    }
}
