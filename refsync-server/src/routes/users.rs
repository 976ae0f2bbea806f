//! User registration

use crate::auth::VerifiedKey;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use refsync_core::core_identity::UserProfile;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct RegisterQuery {
    name: String,
}

/// PUT /api/user — create or update the caller's profile.
///
/// Requires a valid signature but not a registered key: this is where a
/// key becomes registered.
pub async fn register(
    State(state): State<AppState>,
    VerifiedKey(peer): VerifiedKey,
    Query(query): Query<RegisterQuery>,
) -> ApiResult<Json<UserProfile>> {
    let profile = state
        .users
        .register(peer, query.name)
        .await
        .map_err(anyhow::Error::new)?;
    info!(peer = %profile.key, "user registered");
    Ok(Json(profile))
}
