//! The real-time channel
//!
//! One signed WebSocket per active session. The actor only ever sees a
//! bounded channel sender; two pump tasks bridge it to the socket. The
//! actor's snapshot arrives as the first frame; client frames are the
//! same tagged message set going the other way. Disconnects surface to
//! the actor as a leave, or passively as a failed send.

use crate::auth::Caller;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use refsync_core::core_model::{EventCode, PeerId, SessionRecord};
use refsync_core::core_protocol::{MessageSender, Payload, WireMessage};
use refsync_core::core_session::SessionHandle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// GET /api/:event/join — upgrade to the session's live channel.
pub async fn join(
    State(state): State<AppState>,
    Path(event): Path<String>,
    Caller(identity): Caller,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let event = EventCode::new(event);
    let invitation = state
        .directory
        .member_session(&identity.peer, &event)
        .await?;
    let handle = state.registry.lookup(&invitation.secret).await?;
    let capacity = state.config.sync.socket_capacity;

    info!(peer = %identity.peer, event = %event, "websocket join");
    Ok(ws.on_upgrade(move |socket| client_connection(socket, handle, identity.peer, capacity)))
}

async fn client_connection(
    socket: WebSocket,
    handle: SessionHandle,
    peer: PeerId,
    capacity: usize,
) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<WireMessage>(capacity);

    if let Err(err) = handle.join(peer.clone(), tx).await {
        warn!(peer = %peer, error = %err, "join failed after upgrade");
        return;
    }

    // Actor -> socket. Ends when the actor drops the sender (superseded
    // or destroyed) or the socket dies.
    let outbound = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(err) => {
                    warn!(error = %err, "failed to encode outbound message");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Socket -> actor.
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_client_frame(&handle, &peer, &text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(peer = %peer, error = %err, "websocket read error");
                break;
            }
        }
    }

    let _ = handle.leave(peer.clone()).await;
    outbound.abort();
    debug!(peer = %peer, "websocket closed");
}

async fn handle_client_frame(handle: &SessionHandle, peer: &PeerId, text: &str) {
    let message: WireMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => {
            debug!(peer = %peer, error = %err, "undecodable client frame dropped");
            return;
        }
    };

    // The authenticated socket identity is authoritative; the sender
    // field inside the frame is not trusted.
    let by = MessageSender::Client { peer: peer.clone() };

    // Failures here are rejections (tombstoned id, wrong event); the
    // device reconciles from the next snapshot rather than via an error
    // channel.
    let result = match message.payload {
        Payload::IncidentAdd { incident } => handle
            .add_record(SessionRecord::Incident(incident), by)
            .await
            .map(|_| ()),
        Payload::IncidentUpdate { incident } => handle
            .edit_record(SessionRecord::Incident(incident), by)
            .await
            .map(|_| ()),
        Payload::IncidentRemove { id } => handle.delete_record(id, by).await,
        Payload::ScratchpadUpdate { scratchpad } => handle
            .edit_record(SessionRecord::Scratchpad(scratchpad), by)
            .await
            .map(|_| ()),
        Payload::Message { message } => handle.message(message, by).await,
        // Server-to-client kinds arriving from a client are dropped.
        Payload::RosterChanged { .. } | Payload::Snapshot { .. } => Ok(()),
    };

    if let Err(err) = result {
        debug!(peer = %peer, error = %err, "client frame rejected");
    }
}
