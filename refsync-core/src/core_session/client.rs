/*
    client.rs - One connected socket inside an actor

    The actor never touches the network directly: a client is a bounded
    channel sender whose receiving end is pumped into the real socket by
    the edge. A send either succeeds or marks the client inactive; there
    is no heartbeat. A closed or backlogged channel both count as a dead
    socket, which the next roster broadcast repairs.
*/

use crate::core_model::PeerId;
use crate::core_protocol::WireMessage;
use tokio::sync::mpsc;
use tracing::debug;

/// One identity's live connection to a session.
#[derive(Debug)]
pub(crate) struct SessionClient {
    pub peer: PeerId,
    sender: mpsc::Sender<WireMessage>,
    pub active: bool,
}

impl SessionClient {
    pub fn new(peer: PeerId, sender: mpsc::Sender<WireMessage>) -> Self {
        SessionClient {
            peer,
            sender,
            active: true,
        }
    }

    /// Deliver a message; on failure the client is marked inactive and
    /// the caller schedules eviction. Never blocks the actor.
    pub fn send(&mut self, message: WireMessage) -> bool {
        if !self.active {
            return false;
        }
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(err) => {
                debug!(peer = %self.peer, error = %err, "socket send failed, marking inactive");
                self.active = false;
                false
            }
        }
    }
}
