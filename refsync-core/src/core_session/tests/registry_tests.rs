//! Registry lifecycle: init-once, parking, re-hydration, destroy

use crate::core_model::{
    EventCode, Incident, PeerId, RecordId, SessionRecord, SessionSecret,
};
use crate::core_protocol::MessageSender;
use crate::core_session::{SessionError, SessionRegistry, SessionRuntime};
use std::time::Duration;

fn event() -> EventCode {
    EventCode::new("RE-VRC-24-1234".to_string())
}

fn incident(id: &str, owner: &PeerId) -> Incident {
    Incident::new(
        RecordId::new(id.to_string()),
        event(),
        "Q1".to_string(),
        "1234A".to_string(),
        owner,
    )
}

fn short_idle() -> SessionRuntime {
    SessionRuntime {
        idle_timeout: Duration::from_millis(100),
        mailbox_capacity: 16,
    }
}

#[tokio::test]
async fn test_init_fires_exactly_once() {
    let registry = SessionRegistry::in_memory(SessionRuntime::default());
    let secret = SessionSecret::generate();

    registry.init(event(), secret.clone()).await.unwrap();
    let err = registry.init(event(), secret).await.unwrap_err();
    assert!(matches!(err, SessionError::AlreadyInitialized(_)));
}

#[tokio::test]
async fn test_lookup_unknown_secret_fails() {
    let registry = SessionRegistry::in_memory(SessionRuntime::default());
    let err = registry
        .lookup(&SessionSecret::generate())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::SessionNotFound(_)));
}

#[tokio::test]
async fn test_parked_session_rehydrates_with_state() {
    let dir = tempfile::tempdir().unwrap();
    let registry = SessionRegistry::new(dir.path().to_path_buf(), short_idle()).unwrap();
    let secret = SessionSecret::generate();
    let p1 = PeerId::new("p1".to_string());

    let handle = registry.init(event(), secret.clone()).await.unwrap();
    handle
        .add_record(
            SessionRecord::Incident(incident("inc-1", &p1)),
            MessageSender::Client { peer: p1.clone() },
        )
        .await
        .unwrap();

    // No sockets, no traffic: the actor parks itself.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(handle.is_closed());

    // Lookup re-hydrates from the snapshot file, records intact.
    let revived = registry.lookup(&secret).await.unwrap();
    let snapshot = revived.snapshot().await.unwrap();
    assert_eq!(snapshot.incidents.len(), 1);
}

#[tokio::test]
async fn test_destroy_is_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let registry =
        SessionRegistry::new(dir.path().to_path_buf(), SessionRuntime::default()).unwrap();
    let secret = SessionSecret::generate();
    let p1 = PeerId::new("p1".to_string());

    let handle = registry.init(event(), secret.clone()).await.unwrap();
    handle
        .add_record(
            SessionRecord::Incident(incident("inc-1", &p1)),
            MessageSender::Client { peer: p1.clone() },
        )
        .await
        .unwrap();

    registry.destroy(&secret).await.unwrap();

    // Durable state is erased: nothing to re-hydrate.
    let err = registry.lookup(&secret).await.unwrap_err();
    assert!(matches!(err, SessionError::SessionNotFound(_)));
    assert!(handle.is_closed());
}

#[tokio::test]
async fn test_destroy_parked_session_erases_disk_state() {
    let dir = tempfile::tempdir().unwrap();
    let registry = SessionRegistry::new(dir.path().to_path_buf(), short_idle()).unwrap();
    let secret = SessionSecret::generate();

    let handle = registry.init(event(), secret.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(handle.is_closed());

    registry.destroy(&secret).await.unwrap();
    let err = registry.lookup(&secret).await.unwrap_err();
    assert!(matches!(err, SessionError::SessionNotFound(_)));
}
