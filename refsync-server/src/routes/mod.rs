//! Route table
//!
//! Everything except `/data` sits behind the signature middleware; `/data`
//! does its own dual auth (signed member or bearer integration token) in
//! the handler.

use crate::auth;
use crate::state::AppState;
use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod records;
mod sessions;
mod users;
mod ws;

pub fn build_router(state: AppState) -> Router {
    let signed = Router::new()
        .route("/api/user", put(users::register))
        .route("/api/:event/create", post(sessions::create))
        .route("/api/:event/invitation", get(sessions::invitation))
        .route("/api/:event/accept", put(sessions::accept))
        .route(
            "/api/:event/invite",
            put(sessions::invite).delete(sessions::revoke),
        )
        .route("/api/:event/list", get(sessions::list))
        .route("/api/:event/integration", put(sessions::integration))
        .route(
            "/api/:event/incident",
            put(records::add_incident)
                .post(records::edit_incident)
                .delete(records::delete_incident),
        )
        .route("/api/:event/scratchpad", put(records::edit_scratchpad))
        .route("/api/:event/join", get(ws::join))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ));

    Router::new()
        .merge(signed)
        .route("/api/:event/data", get(records::data))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
