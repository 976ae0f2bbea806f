//! Edge error mapping
//!
//! Every failure leaves the edge as JSON `{"error": {"code", "message"}}`
//! with a stable machine-readable code. Authentication and authorization
//! failures map to distinct codes and are never downgraded into one
//! another.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use refsync_core::core_identity::AuthError;
use refsync_core::core_membership::MembershipError;
use refsync_core::core_session::SessionError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Membership(#[from] MembershipError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Auth(err) => (StatusCode::UNAUTHORIZED, err.reason_code()),
            ApiError::Membership(err) => {
                let status = match err {
                    MembershipError::NotAdmin | MembershipError::NotMember => {
                        StatusCode::FORBIDDEN
                    }
                    MembershipError::SessionNotFound
                    | MembershipError::InvitationNotFound => StatusCode::NOT_FOUND,
                    MembershipError::AlreadyMember
                    | MembershipError::AcceptedElsewhere
                    | MembershipError::InvitationSuperseded => StatusCode::CONFLICT,
                    MembershipError::Store(_) | MembershipError::Session(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, err.reason_code())
            }
            ApiError::Session(err) => match err {
                SessionError::AlreadyDeleted(_) => (StatusCode::CONFLICT, "already_deleted"),
                SessionError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "session_not_found"),
                SessionError::WrongEvent { .. } => (StatusCode::BAD_REQUEST, "wrong_event"),
                SessionError::AlreadyInitialized(_) => {
                    (StatusCode::CONFLICT, "already_initialized")
                }
                SessionError::SessionClosed
                | SessionError::Consistency(_)
                | SessionError::Storage(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "session_failure")
                }
            },
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(code, error = %self, "request failed");
        }
        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}
