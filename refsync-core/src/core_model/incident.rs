/*
    incident.rs - Rule-violation records logged by referees

    An incident is the primary synchronizable record: created on one
    device, possibly edited concurrently on several, merged per field by
    the consistency core. The id is minted by the creating device.
*/

use super::field_codec::{json_field, typed_field};
use super::types::{EventCode, PeerId, RecordId};
use crate::core_consistency::{
    initialize, ConsistencyEnvelope, ConsistencyError, Synchronizable,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Severity of a logged violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentOutcome {
    /// Noted, no penalty
    General,
    /// Minor rule violation
    Minor,
    /// Major rule violation
    Major,
    /// Robot disabled for the match
    Disabled,
}

impl Default for IncidentOutcome {
    fn default() -> Self {
        IncidentOutcome::General
    }
}

impl fmt::Display for IncidentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IncidentOutcome::General => "general",
            IncidentOutcome::Minor => "minor",
            IncidentOutcome::Major => "major",
            IncidentOutcome::Disabled => "disabled",
        };
        write!(f, "{}", s)
    }
}

/// A rule-violation record for one team in one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Caller-chosen opaque id (excluded from merge)
    pub id: RecordId,

    /// Owning event (excluded from merge)
    pub event: EventCode,

    /// Owning match (excluded from merge)
    pub match_id: String,

    /// Team the incident is charged to
    pub team: String,

    /// Severity ruling
    pub outcome: IncidentOutcome,

    /// Rule numbers cited, e.g. ["<G1>", "<S3>"]
    pub rules: Vec<String>,

    /// Free-text referee notes
    pub notes: String,

    /// Per-field merge metadata
    pub consistency: ConsistencyEnvelope,
}

impl Incident {
    const TRACKED: &'static [&'static str] = &["team", "outcome", "rules", "notes"];
    const IGNORED: &'static [&'static str] = &["id", "event", "match_id", "consistency"];

    /// Create a new incident with a complete envelope owned by `owner`.
    pub fn new(
        id: RecordId,
        event: EventCode,
        match_id: String,
        team: String,
        owner: &PeerId,
    ) -> Self {
        let mut incident = Incident {
            id,
            event,
            match_id,
            team,
            outcome: IncidentOutcome::default(),
            rules: Vec::new(),
            notes: String::new(),
            consistency: ConsistencyEnvelope::new(),
        };
        initialize(&mut incident, owner);
        incident
    }
}

impl Synchronizable for Incident {
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
            "team" => json_field(name, &self.team),
            "outcome" => json_field(name, &self.outcome),
            "rules" => json_field(name, &self.rules),
            "notes" => json_field(name, &self.notes),
            other => Err(ConsistencyError::UntrackedField(other.to_string())),
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), ConsistencyError> {
        match name {
            "team" => self.team = typed_field(name, value)?,
            "outcome" => self.outcome = typed_field(name, value)?,
            "rules" => self.rules = typed_field(name, value)?,
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

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(s: &str) -> PeerId {
        PeerId::new(s.to_string())
    }

    #[test]
    fn test_new_incident_has_complete_envelope() {
        let incident = Incident::new(
            RecordId::generate(),
            EventCode::new("RE-VRC-24-1234".to_string()),
            "Q12".to_string(),
            "1234A".to_string(),
            &peer("p1"),
        );

        for field in Incident::tracked_fields() {
            let reg = incident.consistency.register(field).unwrap();
            assert_eq!(reg.count, 0);
            assert_eq!(reg.peer, peer("p1"));
        }
    }

    #[test]
    fn test_field_round_trip() {
        let mut incident = Incident::new(
            RecordId::generate(),
            EventCode::new("RE-VRC-24-1234".to_string()),
            "Q12".to_string(),
            "1234A".to_string(),
            &peer("p1"),
        );

        incident
            .set_field("outcome", serde_json::json!("major"))
            .unwrap();
        assert_eq!(incident.outcome, IncidentOutcome::Major);
        assert_eq!(
            incident.field("outcome").unwrap(),
            serde_json::json!("major")
        );
    }

    #[test]
    fn test_ignored_fields_are_not_readable_as_tracked() {
        let incident = Incident::new(
            RecordId::generate(),
            EventCode::new("RE-VRC-24-1234".to_string()),
            "Q12".to_string(),
            "1234A".to_string(),
            &peer("p1"),
        );

        assert!(incident.field("id").is_err());
        assert!(incident.field("match_id").is_err());
    }
}
