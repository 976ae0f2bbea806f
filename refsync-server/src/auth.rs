//! Signature verification at the edge
//!
//! A middleware buffers the body, rebuilds the canonical string exactly
//! as the client signed it, and verifies the triple carried in the query
//! params. Requests failing authentication never reach a handler, let
//! alone session state. Handlers pick their requirement via extractor:
//! [`VerifiedKey`] (key possession only, the registration path) or
//! [`Caller`] (registered identity).

use crate::error::ApiError;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::HOST;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use refsync_core::core_identity::{
    AuthError, CanonicalRequest, Identity, SigningTriple, UserProfile, PUBLIC_KEY_PARAM,
    SIGNATURE_DATE_PARAM, SIGNATURE_PARAM,
};
use refsync_core::core_model::PeerId;
use tracing::debug;

/// Bodies above this are rejected before verification.
const BODY_LIMIT: usize = 1024 * 1024;

/// Inserted by the middleware after successful verification.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub peer: PeerId,
    pub profile: Option<UserProfile>,
}

/// Verify the signing triple on every request passing through.
pub async fn authenticate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    match verify_request(&state, request).await {
        Ok(request) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

async fn verify_request(state: &AppState, request: Request) -> Result<Request, ApiError> {
    let (mut parts, body) = request.into_parts();

    let bytes = axum::body::to_bytes(body, BODY_LIMIT)
        .await
        .map_err(|e| ApiError::BadRequest(format!("unreadable body: {}", e)))?;
    let body_str = std::str::from_utf8(&bytes)
        .map_err(|_| ApiError::BadRequest("body is not valid UTF-8".to_string()))?;

    let query: Vec<(String, String)> = match parts.uri.query() {
        Some(raw) => serde_urlencoded::from_str(raw)
            .map_err(|e| ApiError::BadRequest(format!("unparseable query string: {}", e)))?,
        None => Vec::new(),
    };

    let triple = SigningTriple {
        public_key: query_value(&query, PUBLIC_KEY_PARAM),
        signature: query_value(&query, SIGNATURE_PARAM),
        date: query_value(&query, SIGNATURE_DATE_PARAM),
    };

    let host = parts
        .headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let canonical = CanonicalRequest {
        method: parts.method.as_str(),
        host,
        path: parts.uri.path(),
        query: &query,
        body: body_str,
    };

    let peer = state.verifier.verify_key(&triple, &canonical)?;
    let profile = state.users.lookup(&peer).await;
    debug!(peer = %peer, registered = profile.is_some(), "request authenticated");

    parts.extensions.insert(AuthContext { peer, profile });
    Ok(Request::from_parts(parts, Body::from(bytes)))
}

fn query_value(query: &[(String, String)], key: &str) -> String {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
        .unwrap_or_default()
}

/// A caller that proved key possession; may not be registered yet.
pub struct VerifiedKey(pub PeerId);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for VerifiedKey {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let context = parts
            .extensions
            .get::<AuthContext>()
            .ok_or(ApiError::Auth(AuthError::MissingSignature))?;
        Ok(VerifiedKey(context.peer.clone()))
    }
}

/// A verified, registered caller.
pub struct Caller(pub Identity);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let context = parts
            .extensions
            .get::<AuthContext>()
            .ok_or(ApiError::Auth(AuthError::MissingSignature))?;
        let profile = context
            .profile
            .clone()
            .ok_or(ApiError::Auth(AuthError::UnknownKey))?;
        Ok(Caller(Identity {
            peer: context.peer.clone(),
            display_name: profile.display_name,
        }))
    }
}
