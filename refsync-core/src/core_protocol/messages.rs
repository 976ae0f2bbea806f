/*
    messages.rs - The real-time message set

    A closed, tagged set of payloads wrapped {payload, sender, date}. The
    shapes are symmetric: the same decoder serves client->actor and
    actor->client. Adding a message kind is a compile-time-checked change
    because every consumer matches exhaustively.
*/

use crate::core_model::{Incident, PeerId, RecordId, Scratchpad};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Everything an actor knows about one session, as sent to a newly joined
/// socket and served on the polling path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub incidents: Vec<Incident>,
    pub scratchpads: Vec<Scratchpad>,
    /// Tombstoned record ids; grow-only for the session's lifetime
    pub deleted: BTreeSet<RecordId>,
    /// Identities currently holding a live socket
    pub roster: Vec<PeerId>,
}

/// Message payloads, one tag per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    IncidentAdd { incident: Incident },
    IncidentUpdate { incident: Incident },
    IncidentRemove { id: RecordId },
    ScratchpadUpdate { scratchpad: Scratchpad },
    /// Free-text broadcast to every connected device
    Message { message: String },
    RosterChanged { roster: Vec<PeerId> },
    Snapshot { snapshot: SessionSnapshot },
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::IncidentAdd { .. } => "incident_add",
            Payload::IncidentUpdate { .. } => "incident_update",
            Payload::IncidentRemove { .. } => "incident_remove",
            Payload::ScratchpadUpdate { .. } => "scratchpad_update",
            Payload::Message { .. } => "message",
            Payload::RosterChanged { .. } => "roster_changed",
            Payload::Snapshot { .. } => "snapshot",
        }
    }
}

/// Who authored a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum MessageSender {
    Server,
    Client { peer: PeerId },
}

/// The wire envelope: payload fields flattened beside sender and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(flatten)]
    pub payload: Payload,
    pub sender: MessageSender,
    pub date: DateTime<Utc>,
}

impl WireMessage {
    pub fn from_server(payload: Payload) -> Self {
        WireMessage {
            payload,
            sender: MessageSender::Server,
            date: Utc::now(),
        }
    }

    pub fn from_client(peer: PeerId, payload: Payload) -> Self {
        WireMessage {
            payload,
            sender: MessageSender::Client { peer },
            date: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_model::EventCode;

    #[test]
    fn test_wire_tag_is_flattened() {
        let msg = WireMessage::from_server(Payload::Message {
            message: "fields reset".to_string(),
        });

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["message"], "fields reset");
        assert_eq!(json["sender"]["role"], "server");
        assert!(json["date"].is_string());
    }

    #[test]
    fn test_one_decoder_serves_both_directions() {
        let peer = PeerId::new("ecdsa-p384:02aa".to_string());
        let incident = Incident::new(
            RecordId::new("inc-1".to_string()),
            EventCode::new("RE-VRC-24-1234".to_string()),
            "Q12".to_string(),
            "1234A".to_string(),
            &peer,
        );

        let from_client = WireMessage::from_client(
            peer,
            Payload::IncidentAdd {
                incident: incident.clone(),
            },
        );
        let text = serde_json::to_string(&from_client).unwrap();
        let decoded: WireMessage = serde_json::from_str(&text).unwrap();

        match decoded.payload {
            Payload::IncidentAdd { incident: got } => assert_eq!(got.id, incident.id),
            other => panic!("expected incident_add, got {}", other.kind()),
        }
    }

    #[test]
    fn test_unknown_tag_fails_to_decode() {
        let result = serde_json::from_str::<WireMessage>(
            r#"{"type":"defragment","sender":{"role":"server"},"date":"2024-01-01T00:00:00Z"}"#,
        );
        assert!(result.is_err());
    }
}
