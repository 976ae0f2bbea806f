/*
    handle.rs - Cloneable address of a running session actor

    Thin wrapper over the command channel: every method packages a command
    with a oneshot reply and awaits it. A closed mailbox means the actor
    parked or was destroyed; callers surface that as SessionClosed and the
    registry decides whether re-hydration is possible.
*/

use super::actor::{EditOutcome, SessionCommand};
use super::SessionError;
use crate::core_model::{PeerId, RecordId, SessionRecord};
use crate::core_protocol::{MessageSender, SessionSnapshot, WireMessage};
use tokio::sync::{mpsc, oneshot};

/// Handle to one session's actor.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<SessionCommand>) -> Self {
        SessionHandle { command_tx }
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| SessionError::SessionClosed)
    }

    pub async fn add_record(
        &self,
        record: SessionRecord,
        by: MessageSender,
    ) -> Result<SessionRecord, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::AddRecord { record, by, reply }).await?;
        rx.await.map_err(|_| SessionError::SessionClosed)?
    }

    pub async fn edit_record(
        &self,
        record: SessionRecord,
        by: MessageSender,
    ) -> Result<EditOutcome, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::EditRecord { record, by, reply }).await?;
        rx.await.map_err(|_| SessionError::SessionClosed)?
    }

    pub async fn delete_record(
        &self,
        id: RecordId,
        by: MessageSender,
    ) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::DeleteRecord { id, by, reply }).await?;
        rx.await.map_err(|_| SessionError::SessionClosed)?
    }

    /// Register a socket for `peer`. The actor sends the full snapshot as
    /// the socket's first message and supersedes any previous socket held
    /// by the same identity.
    pub async fn join(
        &self,
        peer: PeerId,
        socket: mpsc::Sender<WireMessage>,
    ) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Join { peer, socket, reply }).await?;
        rx.await.map_err(|_| SessionError::SessionClosed)
    }

    pub async fn leave(&self, peer: PeerId) -> Result<(), SessionError> {
        self.send(SessionCommand::Leave { peer }).await
    }

    pub async fn message(&self, message: String, by: MessageSender) -> Result<(), SessionError> {
        self.send(SessionCommand::Message { message, by }).await
    }

    /// Irreversible teardown; resolves once durable state is erased.
    pub async fn destroy(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Destroy { reply }).await?;
        rx.await.map_err(|_| SessionError::SessionClosed)
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SessionError::SessionClosed)
    }
}
