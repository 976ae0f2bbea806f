//! End-to-end: two devices, one event, offline divergence, convergence
//!
//! Drives the engine exactly as the edge does: membership gates access,
//! the actor merges and fans out, both devices end up with the same
//! authoritative record.

use refsync_core::core_consistency::apply_local_edit;
use refsync_core::core_identity::{Keypair, UserDirectory};
use refsync_core::core_membership::{MembershipDirectory, MemoryInvitationStore, RemovalOutcome};
use refsync_core::core_model::{EventCode, Incident, RecordId, SessionRecord};
use refsync_core::core_protocol::{MessageSender, Payload, WireMessage};
use refsync_core::core_session::{SessionRegistry, SessionRuntime};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

fn event() -> EventCode {
    EventCode::new("RE-VRC-24-1234".to_string())
}

async fn engine() -> (MembershipDirectory, Arc<SessionRegistry>, Arc<UserDirectory>) {
    let registry = Arc::new(SessionRegistry::in_memory(SessionRuntime::default()));
    let users = Arc::new(UserDirectory::in_memory());
    let directory = MembershipDirectory::new(
        Arc::new(MemoryInvitationStore::new()),
        users.clone(),
        registry.clone(),
    );
    (directory, registry, users)
}

#[tokio::test]
async fn test_two_devices_converge_after_offline_edits() {
    let (directory, registry, users) = engine().await;

    // Two referees with real device keys.
    let head_ref = Keypair::generate();
    let scorer = Keypair::generate();
    users
        .register(head_ref.peer_id(), "Head Ref".to_string())
        .await
        .unwrap();
    users
        .register(scorer.peer_id(), "Scorekeeper".to_string())
        .await
        .unwrap();

    // Head ref creates the session and invites the scorekeeper.
    let created = directory
        .create_session(event(), head_ref.peer_id())
        .await
        .unwrap();
    let pending = directory
        .invite(&event(), &head_ref.peer_id(), scorer.peer_id(), false)
        .await
        .unwrap();
    directory
        .accept(&event(), &scorer.peer_id(), &pending.id)
        .await
        .unwrap();

    let handle = registry.lookup(&created.secret).await.unwrap();

    // The head ref logs an incident while online.
    let base = Incident::new(
        RecordId::new("inc-1".to_string()),
        event(),
        "Q12".to_string(),
        "1234A".to_string(),
        &head_ref.peer_id(),
    );
    handle
        .add_record(
            SessionRecord::Incident(base.clone()),
            MessageSender::Client {
                peer: head_ref.peer_id(),
            },
        )
        .await
        .unwrap();

    // Both devices go offline with a copy and edit disjoint fields.
    let mut on_head_ref = base.clone();
    apply_local_edit(
        &mut on_head_ref,
        "notes",
        json!("entanglement at the climb"),
        &head_ref.peer_id(),
    )
    .unwrap();

    let mut on_scorer = base.clone();
    apply_local_edit(&mut on_scorer, "outcome", json!("major"), &scorer.peer_id()).unwrap();

    // The scorekeeper reconnects first, with a live socket.
    let (tx, mut rx) = mpsc::channel::<WireMessage>(32);
    handle.join(scorer.peer_id(), tx).await.unwrap();

    handle
        .edit_record(
            SessionRecord::Scratchpad(refsync_core::core_model::Scratchpad::new(
                RecordId::new("Q12".to_string()),
                event(),
                &scorer.peer_id(),
            )),
            MessageSender::Client {
                peer: scorer.peer_id(),
            },
        )
        .await
        .unwrap();
    handle
        .edit_record(
            SessionRecord::Incident(on_scorer),
            MessageSender::Client {
                peer: scorer.peer_id(),
            },
        )
        .await
        .unwrap();
    let outcome = handle
        .edit_record(
            SessionRecord::Incident(on_head_ref),
            MessageSender::Client {
                peer: head_ref.peer_id(),
            },
        )
        .await
        .unwrap();

    // Disjoint fields: both edits survive, nothing rejected.
    assert!(outcome.rejected.is_empty());
    let authoritative = match outcome.record {
        SessionRecord::Incident(incident) => incident,
        other => panic!("expected incident, got {}", other.kind()),
    };
    assert_eq!(authoritative.notes, "entanglement at the climb");
    assert_eq!(
        serde_json::to_value(&authoritative.outcome).unwrap(),
        json!("major")
    );

    // The connected device heard every update in actor order.
    let mut updates = Vec::new();
    while let Ok(message) = rx.try_recv() {
        updates.push(message.payload);
    }
    assert!(matches!(updates.first(), Some(Payload::Snapshot { .. })));
    assert!(updates
        .iter()
        .any(|p| matches!(p, Payload::IncidentUpdate { .. })));

    // And the snapshot agrees with the merged record.
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.incidents.len(), 1);
    assert_eq!(snapshot.incidents[0].notes, authoritative.notes);
    assert_eq!(snapshot.scratchpads.len(), 1);

    // The head ref leaving ends the session for everyone.
    let removal = directory
        .remove_member(&event(), &head_ref.peer_id(), &head_ref.peer_id())
        .await
        .unwrap();
    assert_eq!(removal, RemovalOutcome::SessionEnded);
    assert!(registry.lookup(&created.secret).await.is_err());
}
