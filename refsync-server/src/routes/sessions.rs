//! Session lifecycle and membership routes

use crate::auth::Caller;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use refsync_core::core_membership::{Invitation, MemberEntry, MembershipError, RemovalOutcome};
use refsync_core::core_model::{EventCode, InvitationId, PeerId};
use serde::Deserialize;
use serde_json::{json, Value};

/// POST /api/:event/create — create a session, creator seated as
/// accepted admin.
pub async fn create(
    State(state): State<AppState>,
    Path(event): Path<String>,
    Caller(identity): Caller,
) -> ApiResult<Json<Invitation>> {
    let invitation = state
        .directory
        .create_session(EventCode::new(event), identity.peer)
        .await?;
    Ok(Json(invitation))
}

/// GET /api/:event/invitation — the caller's invitation on file.
pub async fn invitation(
    State(state): State<AppState>,
    Path(event): Path<String>,
    Caller(identity): Caller,
) -> ApiResult<Json<Invitation>> {
    let invitation = state
        .directory
        .invitation_for(&identity.peer, &EventCode::new(event))
        .await?
        .ok_or(ApiError::Membership(MembershipError::InvitationNotFound))?;
    Ok(Json(invitation))
}

#[derive(Debug, Deserialize)]
pub struct AcceptQuery {
    invitation: String,
}

/// PUT /api/:event/accept — accept the invitation currently on file.
pub async fn accept(
    State(state): State<AppState>,
    Path(event): Path<String>,
    Caller(identity): Caller,
    Query(query): Query<AcceptQuery>,
) -> ApiResult<Json<Invitation>> {
    let invitation = state
        .directory
        .accept(
            &EventCode::new(event),
            &identity.peer,
            &InvitationId::new(query.invitation),
        )
        .await?;
    Ok(Json(invitation))
}

#[derive(Debug, Deserialize)]
pub struct InviteQuery {
    user: String,
    #[serde(default)]
    admin: bool,
}

/// PUT /api/:event/invite — invite a user (admin only).
pub async fn invite(
    State(state): State<AppState>,
    Path(event): Path<String>,
    Caller(identity): Caller,
    Query(query): Query<InviteQuery>,
) -> ApiResult<Json<Invitation>> {
    let invitation = state
        .directory
        .invite(
            &EventCode::new(event),
            &identity.peer,
            PeerId::new(query.user),
            query.admin,
        )
        .await?;
    Ok(Json(invitation))
}

#[derive(Debug, Deserialize)]
pub struct RevokeQuery {
    /// Absent means self-leave
    user: Option<String>,
}

/// DELETE /api/:event/invite — leave, or revoke another member (admin).
pub async fn revoke(
    State(state): State<AppState>,
    Path(event): Path<String>,
    Caller(identity): Caller,
    Query(query): Query<RevokeQuery>,
) -> ApiResult<Json<Value>> {
    let subject = query
        .user
        .map(PeerId::new)
        .unwrap_or_else(|| identity.peer.clone());
    let outcome = state
        .directory
        .remove_member(&EventCode::new(event), &identity.peer, &subject)
        .await?;
    let outcome = match outcome {
        RemovalOutcome::Removed => "removed",
        RemovalOutcome::SessionEnded => "session_ended",
    };
    Ok(Json(json!({ "outcome": outcome })))
}

/// GET /api/:event/list — invitations joined with profiles and presence.
pub async fn list(
    State(state): State<AppState>,
    Path(event): Path<String>,
    Caller(identity): Caller,
) -> ApiResult<Json<Vec<MemberEntry>>> {
    let event = EventCode::new(event);
    let invitation = state.directory.member_session(&identity.peer, &event).await?;
    let entries = state.directory.list(&event, &invitation.secret).await?;
    Ok(Json(entries))
}

/// PUT /api/:event/integration — issue a session-scoped automation
/// token (admin only).
pub async fn integration(
    State(state): State<AppState>,
    Path(event): Path<String>,
    Caller(identity): Caller,
) -> ApiResult<Json<Value>> {
    let event = EventCode::new(event);
    let invitation = state.directory.member_session(&identity.peer, &event).await?;
    if !invitation.admin {
        return Err(ApiError::Membership(MembershipError::NotAdmin));
    }

    let ttl = state.config.sync.integration_token_ttl;
    let token = state
        .integration
        .issue(event, invitation.secret, ttl)
        .map_err(ApiError::Auth)?;
    Ok(Json(json!({
        "token": token,
        "expires_in_seconds": ttl.as_secs(),
    })))
}
