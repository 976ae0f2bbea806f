//! Closed union of the record kinds a session synchronizes.

use super::incident::Incident;
use super::scratchpad::Scratchpad;
use super::types::{EventCode, RecordId};
use serde::{Deserialize, Serialize};

/// Either synchronizable record kind, as handed to the Session Actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionRecord {
    Incident(Incident),
    Scratchpad(Scratchpad),
}

impl SessionRecord {
    pub fn record_id(&self) -> &RecordId {
        match self {
            SessionRecord::Incident(incident) => &incident.id,
            SessionRecord::Scratchpad(scratchpad) => &scratchpad.id,
        }
    }

    pub fn event(&self) -> &EventCode {
        match self {
            SessionRecord::Incident(incident) => &incident.event,
            SessionRecord::Scratchpad(scratchpad) => &scratchpad.event,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SessionRecord::Incident(_) => "incident",
            SessionRecord::Scratchpad(_) => "scratchpad",
        }
    }
}
