//! End-to-end route tests against an in-memory AppState
//!
//! Every request is genuinely signed; these tests exercise the same
//! canonicalization path a device uses.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use refsync_core::config::Config;
use refsync_core::core_identity::{sign_request, CanonicalRequest, Keypair};
use refsync_core::core_model::{EventCode, Incident, RecordId};
use serde_json::Value;
use tower::ServiceExt;

const HOST: &str = "sync.test";
const EVENT: &str = "RE-VRC-24-1234";

fn app() -> Router {
    let state = refsync_server::AppState::in_memory(Config::default());
    refsync_server::build_router(state)
}

fn signed(
    keypair: &Keypair,
    method: &str,
    path: &str,
    params: &[(&str, &str)],
    body: &str,
) -> Request<Body> {
    let query: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let canonical = CanonicalRequest {
        method,
        host: HOST,
        path,
        query: &query,
        body,
    };
    let triple = sign_request(keypair, &canonical);

    let mut full = query;
    full.push(("publickey".to_string(), triple.public_key));
    full.push(("signature".to_string(), triple.signature));
    full.push(("signature_date".to_string(), triple.date));
    let query_string = serde_urlencoded::to_string(&full).expect("encodable query");

    Request::builder()
        .method(method)
        .uri(format!("{}?{}", path, query_string))
        .header("host", HOST)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("infallible");
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn register(app: &Router, keypair: &Keypair, name: &str) {
    let (status, _) = send(
        app,
        signed(keypair, "PUT", "/api/user", &[("name", name)], ""),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unsigned_request_is_rejected_at_the_edge() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/{}/create", EVENT))
        .header("host", HOST)
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "missing_signature");
}

#[tokio::test]
async fn test_unregistered_key_cannot_create_session() {
    let app = app();
    let keypair = Keypair::generate();

    let path = format!("/api/{}/create", EVENT);
    let (status, body) = send(&app, signed(&keypair, "POST", &path, &[], "")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unknown_key");
}

#[tokio::test]
async fn test_registration_then_session_lifecycle() {
    let app = app();
    let admin = Keypair::generate();
    let scorer = Keypair::generate();
    register(&app, &admin, "Head Ref").await;
    register(&app, &scorer, "Scorekeeper").await;

    // Create the session.
    let path = format!("/api/{}/create", EVENT);
    let (status, invitation) = send(&app, signed(&admin, "POST", &path, &[], "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invitation["admin"], true);
    assert_eq!(invitation["accepted"], true);

    // Invite the scorekeeper.
    let path = format!("/api/{}/invite", EVENT);
    let scorer_peer = scorer.peer_id().0;
    let (status, pending) = send(
        &app,
        signed(&admin, "PUT", &path, &[("user", scorer_peer.as_str())], ""),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending["accepted"], false);

    // The scorekeeper sees and accepts their invitation.
    let path = format!("/api/{}/invitation", EVENT);
    let (status, on_file) = send(&app, signed(&scorer, "GET", &path, &[], "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(on_file["id"], pending["id"]);

    let path = format!("/api/{}/accept", EVENT);
    let invitation_id = on_file["id"].as_str().unwrap().to_string();
    let (status, accepted) = send(
        &app,
        signed(
            &scorer,
            "PUT",
            &path,
            &[("invitation", invitation_id.as_str())],
            "",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["accepted"], true);

    // The scorekeeper logs an incident.
    let incident = Incident::new(
        RecordId::new("inc-1".to_string()),
        EventCode::new(EVENT.to_string()),
        "Q12".to_string(),
        "1234A".to_string(),
        &scorer.peer_id(),
    );
    let body = serde_json::to_string(&incident).unwrap();
    let path = format!("/api/{}/incident", EVENT);
    let (status, stored) = send(&app, signed(&scorer, "PUT", &path, &[], &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["record"]["id"], "inc-1");

    // Both members see it in the snapshot.
    let path = format!("/api/{}/data", EVENT);
    let (status, snapshot) = send(&app, signed(&admin, "GET", &path, &[], "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["incidents"].as_array().unwrap().len(), 1);

    // Roster listing shows both profiles.
    let path = format!("/api/{}/list", EVENT);
    let (status, members) = send(&app, signed(&admin, "GET", &path, &[], "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(members.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_non_admin_invite_is_forbidden_not_downgraded() {
    let app = app();
    let admin = Keypair::generate();
    let scorer = Keypair::generate();
    let third = Keypair::generate();
    register(&app, &admin, "Head Ref").await;
    register(&app, &scorer, "Scorekeeper").await;
    register(&app, &third, "Third").await;

    let path = format!("/api/{}/create", EVENT);
    send(&app, signed(&admin, "POST", &path, &[], "")).await;

    let path = format!("/api/{}/invite", EVENT);
    let scorer_peer = scorer.peer_id().0;
    let (_, pending) = send(
        &app,
        signed(&admin, "PUT", &path, &[("user", scorer_peer.as_str())], ""),
    )
    .await;
    let accept_path = format!("/api/{}/accept", EVENT);
    send(
        &app,
        signed(
            &scorer,
            "PUT",
            &accept_path,
            &[("invitation", pending["id"].as_str().unwrap())],
            "",
        ),
    )
    .await;

    let third_peer = third.peer_id().0;
    let (status, body) = send(
        &app,
        signed(&scorer, "PUT", &path, &[("user", third_peer.as_str())], ""),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "not_admin");
}

#[tokio::test]
async fn test_tombstoned_incident_reports_already_deleted() {
    let app = app();
    let admin = Keypair::generate();
    register(&app, &admin, "Head Ref").await;

    let path = format!("/api/{}/create", EVENT);
    send(&app, signed(&admin, "POST", &path, &[], "")).await;

    let incident = Incident::new(
        RecordId::new("inc-1".to_string()),
        EventCode::new(EVENT.to_string()),
        "Q12".to_string(),
        "1234A".to_string(),
        &admin.peer_id(),
    );
    let body = serde_json::to_string(&incident).unwrap();
    let path = format!("/api/{}/incident", EVENT);
    send(&app, signed(&admin, "PUT", &path, &[], &body)).await;
    send(&app, signed(&admin, "DELETE", &path, &[("id", "inc-1")], "")).await;

    // Re-adding the tombstoned id is an expected outcome, not an error.
    let (status, response) = send(&app, signed(&admin, "PUT", &path, &[], &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["already_deleted"], "inc-1");
}

#[tokio::test]
async fn test_integration_token_reads_snapshot() {
    let app = app();
    let admin = Keypair::generate();
    register(&app, &admin, "Head Ref").await;

    let path = format!("/api/{}/create", EVENT);
    send(&app, signed(&admin, "POST", &path, &[], "")).await;

    let path = format!("/api/{}/integration", EVENT);
    let (status, issued) = send(&app, signed(&admin, "PUT", &path, &[], "")).await;
    assert_eq!(status, StatusCode::OK);
    let token = issued["token"].as_str().unwrap().to_string();

    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/{}/data", EVENT))
        .header("host", HOST)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, snapshot) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(snapshot["incidents"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_leave_ends_session_for_everyone() {
    let app = app();
    let admin = Keypair::generate();
    let scorer = Keypair::generate();
    register(&app, &admin, "Head Ref").await;
    register(&app, &scorer, "Scorekeeper").await;

    let path = format!("/api/{}/create", EVENT);
    send(&app, signed(&admin, "POST", &path, &[], "")).await;

    let invite_path = format!("/api/{}/invite", EVENT);
    let scorer_peer = scorer.peer_id().0;
    let (_, pending) = send(
        &app,
        signed(&admin, "PUT", &invite_path, &[("user", scorer_peer.as_str())], ""),
    )
    .await;
    let accept_path = format!("/api/{}/accept", EVENT);
    send(
        &app,
        signed(
            &scorer,
            "PUT",
            &accept_path,
            &[("invitation", pending["id"].as_str().unwrap())],
            "",
        ),
    )
    .await;

    // The only admin leaves: cascade.
    let (status, outcome) = send(&app, signed(&admin, "DELETE", &invite_path, &[], "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "session_ended");

    // The scorekeeper's invitation is gone and the session unreachable.
    let path = format!("/api/{}/invitation", EVENT);
    let (status, body) = send(&app, signed(&scorer, "GET", &path, &[], "")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "invitation_not_found");

    let path = format!("/api/{}/data", EVENT);
    let (status, _) = send(&app, signed(&scorer, "GET", &path, &[], "")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
