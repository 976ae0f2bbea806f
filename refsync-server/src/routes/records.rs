//! Record routes: snapshot polling and incident/scratchpad mutations
//!
//! Lost tie-breaks and tombstoned ids are expected steady-state results,
//! so they come back as structured JSON, not HTTP errors; the device
//! decides whether to surface them.

use crate::auth::Caller;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, Query, RawQuery, State};
use axum::http::header::{AUTHORIZATION, HOST};
use axum::http::{HeaderMap, Uri};
use axum::Json;
use refsync_core::core_identity::{
    CanonicalRequest, SigningTriple, PUBLIC_KEY_PARAM, SIGNATURE_DATE_PARAM, SIGNATURE_PARAM,
};
use refsync_core::core_model::{
    EventCode, Incident, PeerId, RecordId, Scratchpad, SessionRecord, SessionSecret,
};
use refsync_core::core_protocol::{MessageSender, SessionSnapshot};
use refsync_core::core_session::{EditOutcome, SessionError, SessionHandle};
use serde::Deserialize;
use serde_json::{json, Value};

async fn member_handle(
    state: &AppState,
    peer: &PeerId,
    event: &EventCode,
) -> ApiResult<SessionHandle> {
    let invitation = state.directory.member_session(peer, event).await?;
    Ok(state.registry.lookup(&invitation.secret).await?)
}

fn client(peer: &PeerId) -> MessageSender {
    MessageSender::Client { peer: peer.clone() }
}

fn edit_response(outcome: EditOutcome) -> Value {
    json!({
        "record": outcome.record,
        "changed": outcome.changed,
        "rejected": outcome.rejected,
    })
}

fn already_deleted(id: &RecordId) -> Value {
    json!({ "already_deleted": id })
}

/// PUT /api/:event/incident — store a freshly created incident.
pub async fn add_incident(
    State(state): State<AppState>,
    Path(event): Path<String>,
    Caller(identity): Caller,
    Json(incident): Json<Incident>,
) -> ApiResult<Json<Value>> {
    let event = EventCode::new(event);
    let handle = member_handle(&state, &identity.peer, &event).await?;

    match handle
        .add_record(SessionRecord::Incident(incident), client(&identity.peer))
        .await
    {
        Ok(record) => Ok(Json(json!({ "record": record }))),
        Err(SessionError::AlreadyDeleted(id)) => Ok(Json(already_deleted(&id))),
        Err(err) => Err(err.into()),
    }
}

/// POST /api/:event/incident — merge a device's copy; the response
/// carries the authoritative record even when the device lost.
pub async fn edit_incident(
    State(state): State<AppState>,
    Path(event): Path<String>,
    Caller(identity): Caller,
    Json(incident): Json<Incident>,
) -> ApiResult<Json<Value>> {
    let event = EventCode::new(event);
    let handle = member_handle(&state, &identity.peer, &event).await?;

    match handle
        .edit_record(SessionRecord::Incident(incident), client(&identity.peer))
        .await
    {
        Ok(outcome) => Ok(Json(edit_response(outcome))),
        Err(SessionError::AlreadyDeleted(id)) => Ok(Json(already_deleted(&id))),
        Err(err) => Err(err.into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    id: String,
}

/// DELETE /api/:event/incident — tombstone an id.
pub async fn delete_incident(
    State(state): State<AppState>,
    Path(event): Path<String>,
    Caller(identity): Caller,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Json<Value>> {
    let event = EventCode::new(event);
    let handle = member_handle(&state, &identity.peer, &event).await?;

    let id = RecordId::new(query.id);
    handle.delete_record(id.clone(), client(&identity.peer)).await?;
    Ok(Json(json!({ "deleted": id })))
}

/// PUT /api/:event/scratchpad — merge a match scratchpad (creation is
/// the first edit).
pub async fn edit_scratchpad(
    State(state): State<AppState>,
    Path(event): Path<String>,
    Caller(identity): Caller,
    Json(scratchpad): Json<Scratchpad>,
) -> ApiResult<Json<Value>> {
    let event = EventCode::new(event);
    let handle = member_handle(&state, &identity.peer, &event).await?;

    let outcome = handle
        .edit_record(SessionRecord::Scratchpad(scratchpad), client(&identity.peer))
        .await?;
    Ok(Json(edit_response(outcome)))
}

/// GET /api/:event/data — full snapshot, the polling path.
///
/// Mounted outside the signature middleware because it accepts either
/// credential: a signed request from a member, or a bearer integration
/// token scoped to this event's session.
pub async fn data(
    State(state): State<AppState>,
    Path(event): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
) -> ApiResult<Json<SessionSnapshot>> {
    let event = EventCode::new(event);

    if let Some(bearer) = bearer_token(&headers) {
        let claims = state
            .integration
            .verify(bearer, &event)
            .map_err(ApiError::Auth)?;
        let snapshot = snapshot_at(&state, &claims.session).await?;
        return Ok(Json(snapshot));
    }

    // Signed path: rebuild the canonical string this handler's route
    // skipped the middleware for.
    let query: Vec<(String, String)> = match raw_query.as_deref() {
        Some(raw) => serde_urlencoded::from_str(raw)
            .map_err(|e| ApiError::BadRequest(format!("unparseable query string: {}", e)))?,
        None => Vec::new(),
    };
    let triple = SigningTriple {
        public_key: query_value(&query, PUBLIC_KEY_PARAM),
        signature: query_value(&query, SIGNATURE_PARAM),
        date: query_value(&query, SIGNATURE_DATE_PARAM),
    };
    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let canonical = CanonicalRequest {
        method: "GET",
        host,
        path: uri.path(),
        query: &query,
        body: "",
    };

    let identity = state
        .verifier
        .verify(&triple, &canonical)
        .await
        .map_err(ApiError::Auth)?;
    let handle = member_handle(&state, &identity.peer, &event).await?;
    Ok(Json(handle.snapshot().await?))
}

async fn snapshot_at(state: &AppState, secret: &SessionSecret) -> ApiResult<SessionSnapshot> {
    let handle = state.registry.lookup(secret).await?;
    Ok(handle.snapshot().await?)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

fn query_value(query: &[(String, String)], key: &str) -> String {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
        .unwrap_or_default()
}
