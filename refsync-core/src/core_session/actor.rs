/*
    actor.rs - The per-session actor

    Sole authoritative holder of one session's records and socket roster.
    All operations on a session run one at a time in mailbox order, which
    makes read-merge-write-broadcast safe without locks. Different
    sessions are independent tasks with no shared state.

    Lifecycle: uninitialized -> active -> destroyed (terminal). An idle
    actor with no sockets parks itself; its snapshot file stays on disk
    and the registry re-hydrates it on next use. Destroy erases the file.
*/

use super::client::SessionClient;
use super::store::{PersistedSession, SessionStore};
use super::SessionError;
use crate::core_consistency::{equivalent, merge, Synchronizable};
use crate::core_model::{
    EventCode, Incident, PeerId, RecordId, Scratchpad, SessionRecord, SessionSecret,
};
use crate::core_protocol::{MessageSender, Payload, SessionSnapshot, WireMessage};
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Result of an edit: the authoritative record plus which fields the
/// candidate won and lost. Lost fields are expected steady state, not
/// errors.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub record: SessionRecord,
    pub changed: Vec<String>,
    pub rejected: Vec<String>,
}

/// Mailbox commands. Every mutation carries the authenticated author so
/// broadcasts attribute correctly.
#[derive(Debug)]
pub enum SessionCommand {
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    AddRecord {
        record: SessionRecord,
        by: MessageSender,
        reply: oneshot::Sender<Result<SessionRecord, SessionError>>,
    },
    EditRecord {
        record: SessionRecord,
        by: MessageSender,
        reply: oneshot::Sender<Result<EditOutcome, SessionError>>,
    },
    DeleteRecord {
        id: RecordId,
        by: MessageSender,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Join {
        peer: PeerId,
        socket: mpsc::Sender<WireMessage>,
        reply: oneshot::Sender<()>,
    },
    Leave {
        peer: PeerId,
    },
    Message {
        message: String,
        by: MessageSender,
    },
    Destroy {
        reply: oneshot::Sender<()>,
    },
}

pub(crate) struct SessionActor {
    event: EventCode,
    secret: SessionSecret,
    incidents: HashMap<RecordId, Incident>,
    scratchpads: HashMap<RecordId, Scratchpad>,
    tombstones: BTreeSet<RecordId>,
    clients: Vec<SessionClient>,
    store: SessionStore,
    idle_timeout: Duration,
    last_activity: Instant,
    command_rx: mpsc::Receiver<SessionCommand>,
}

impl SessionActor {
    pub fn new(
        event: EventCode,
        secret: SessionSecret,
        store: SessionStore,
        idle_timeout: Duration,
        command_rx: mpsc::Receiver<SessionCommand>,
    ) -> Self {
        SessionActor {
            event,
            secret,
            incidents: HashMap::new(),
            scratchpads: HashMap::new(),
            tombstones: BTreeSet::new(),
            clients: Vec::new(),
            store,
            idle_timeout,
            last_activity: Instant::now(),
            command_rx,
        }
    }

    pub fn restore(
        state: PersistedSession,
        store: SessionStore,
        idle_timeout: Duration,
        command_rx: mpsc::Receiver<SessionCommand>,
    ) -> Self {
        let mut actor = SessionActor::new(state.event, state.secret, store, idle_timeout, command_rx);
        actor.incidents = state
            .incidents
            .into_iter()
            .map(|i| (i.id.clone(), i))
            .collect();
        actor.scratchpads = state
            .scratchpads
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();
        actor.tombstones = state.tombstones;
        actor
    }

    pub async fn run(mut self) {
        info!(session = %self.secret, event = %self.event, "session actor active");
        let tick = (self.idle_timeout / 4).max(Duration::from_millis(100));
        let mut idle = tokio::time::interval(tick);
        idle.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(SessionCommand::Destroy { reply }) => {
                        self.destroy();
                        let _ = reply.send(());
                        return;
                    }
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                _ = idle.tick() => {
                    if self.clients.is_empty()
                        && self.last_activity.elapsed() >= self.idle_timeout
                    {
                        debug!(session = %self.secret, "idle timeout, parking actor");
                        break;
                    }
                }
            }
        }
        info!(session = %self.secret, "session actor parked");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        self.last_activity = Instant::now();
        match command {
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            SessionCommand::AddRecord { record, by, reply } => {
                let _ = reply.send(self.add_record(record, by));
            }
            SessionCommand::EditRecord { record, by, reply } => {
                let _ = reply.send(self.edit_record(record, by));
            }
            SessionCommand::DeleteRecord { id, by, reply } => {
                let _ = reply.send(self.delete_record(id, by));
            }
            SessionCommand::Join { peer, socket, reply } => {
                self.join(peer, socket);
                let _ = reply.send(());
            }
            SessionCommand::Leave { peer } => self.leave(&peer),
            SessionCommand::Message { message, by } => {
                self.broadcast(
                    WireMessage {
                        payload: Payload::Message { message },
                        sender: by,
                        date: chrono::Utc::now(),
                    },
                    None,
                );
            }
            SessionCommand::Destroy { .. } => unreachable!("handled in run loop"),
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        let mut incidents: Vec<Incident> = self.incidents.values().cloned().collect();
        incidents.sort_by(|a, b| a.id.cmp(&b.id));
        let mut scratchpads: Vec<Scratchpad> = self.scratchpads.values().cloned().collect();
        scratchpads.sort_by(|a, b| a.id.cmp(&b.id));

        SessionSnapshot {
            incidents,
            scratchpads,
            deleted: self.tombstones.clone(),
            roster: self.roster(),
        }
    }

    fn add_record(
        &mut self,
        record: SessionRecord,
        by: MessageSender,
    ) -> Result<SessionRecord, SessionError> {
        self.check_event(&record)?;
        let id = record.record_id().clone();
        if self.tombstones.contains(&id) {
            return Err(SessionError::AlreadyDeleted(id));
        }

        let payload = match &record {
            SessionRecord::Incident(incident) => {
                self.incidents.insert(id, incident.clone());
                Payload::IncidentAdd {
                    incident: incident.clone(),
                }
            }
            // Scratchpads have no distinct add on the wire; creation is
            // the first update.
            SessionRecord::Scratchpad(scratchpad) => {
                self.scratchpads.insert(id, scratchpad.clone());
                Payload::ScratchpadUpdate {
                    scratchpad: scratchpad.clone(),
                }
            }
        };

        self.persist()?;
        self.broadcast(
            WireMessage {
                payload,
                sender: by,
                date: chrono::Utc::now(),
            },
            None,
        );
        Ok(record)
    }

    fn edit_record(
        &mut self,
        candidate: SessionRecord,
        by: MessageSender,
    ) -> Result<EditOutcome, SessionError> {
        self.check_event(&candidate)?;
        let id = candidate.record_id().clone();
        if self.tombstones.contains(&id) {
            return Err(SessionError::AlreadyDeleted(id));
        }

        let (resolved, changed, rejected, fresh) = match candidate {
            SessionRecord::Incident(candidate) => {
                let (resolved, changed, rejected, fresh) =
                    Self::resolve(self.incidents.get(&id), &candidate)?;
                self.incidents.insert(id, resolved.clone());
                (SessionRecord::Incident(resolved), changed, rejected, fresh)
            }
            SessionRecord::Scratchpad(candidate) => {
                let (resolved, changed, rejected, fresh) =
                    Self::resolve(self.scratchpads.get(&id), &candidate)?;
                self.scratchpads.insert(id, resolved.clone());
                (
                    SessionRecord::Scratchpad(resolved),
                    changed,
                    rejected,
                    fresh,
                )
            }
        };

        // Nothing new to say: the merged record carries the same writes
        // the session already broadcast.
        if fresh {
            self.persist()?;
            let payload = match &resolved {
                SessionRecord::Incident(incident) => Payload::IncidentUpdate {
                    incident: incident.clone(),
                },
                SessionRecord::Scratchpad(scratchpad) => Payload::ScratchpadUpdate {
                    scratchpad: scratchpad.clone(),
                },
            };
            self.broadcast(
                WireMessage {
                    payload,
                    sender: by,
                    date: chrono::Utc::now(),
                },
                None,
            );
        }

        Ok(EditOutcome {
            record: resolved,
            changed,
            rejected,
        })
    }

    /// Merge a candidate against the stored copy. Returns the resolved
    /// record, the candidate's won/lost fields, and whether the result
    /// differs from what was stored (i.e. is worth broadcasting).
    fn resolve<T: Synchronizable>(
        stored: Option<&T>,
        candidate: &T,
    ) -> Result<(T, Vec<String>, Vec<String>, bool), SessionError> {
        let outcome = merge(stored, Some(candidate))
            .map_err(|e| SessionError::Consistency(e.to_string()))?;
        // A merge with a present remote side always resolves.
        let resolved = outcome
            .resolved
            .ok_or_else(|| SessionError::Consistency("merge resolved to nothing".to_string()))?;
        let fresh = match stored {
            Some(previous) => !equivalent(&resolved, previous),
            None => true,
        };
        Ok((resolved, outcome.changed, outcome.rejected, fresh))
    }

    fn delete_record(&mut self, id: RecordId, by: MessageSender) -> Result<(), SessionError> {
        self.tombstones.insert(id.clone());
        self.incidents.remove(&id);
        self.scratchpads.remove(&id);
        self.persist()?;
        self.broadcast(
            WireMessage {
                payload: Payload::IncidentRemove { id },
                sender: by,
                date: chrono::Utc::now(),
            },
            None,
        );
        Ok(())
    }

    fn join(&mut self, peer: PeerId, socket: mpsc::Sender<WireMessage>) {
        // Last connection wins: at most one live socket per identity.
        if let Some(pos) = self.clients.iter().position(|c| c.peer == peer) {
            let mut superseded = self.clients.remove(pos);
            superseded.send(WireMessage::from_server(Payload::Message {
                message: "connection superseded by a newer device".to_string(),
            }));
            debug!(peer = %peer, "superseded previous socket");
        }

        let mut client = SessionClient::new(peer.clone(), socket);
        let delivered = client.send(WireMessage::from_server(Payload::Snapshot {
            snapshot: self.snapshot_with(&peer),
        }));
        // A socket that cannot even take the snapshot is already dead.
        if delivered {
            self.clients.push(client);
        }

        let roster = self.roster();
        self.broadcast(
            WireMessage::from_server(Payload::RosterChanged { roster }),
            Some(&peer),
        );
    }

    /// Snapshot as seen by a socket that is about to be registered: its
    /// own identity is already part of the roster it receives.
    fn snapshot_with(&self, joining: &PeerId) -> SessionSnapshot {
        let mut snapshot = self.snapshot();
        if !snapshot.roster.contains(joining) {
            snapshot.roster.push(joining.clone());
        }
        snapshot
    }

    fn leave(&mut self, peer: &PeerId) {
        let before = self.clients.len();
        self.clients.retain(|c| &c.peer != peer);
        if self.clients.len() != before {
            let roster = self.roster();
            self.broadcast(
                WireMessage::from_server(Payload::RosterChanged { roster }),
                None,
            );
        }
    }

    /// Fan a message out to every live socket. Any failed send evicts
    /// that socket and triggers a roster-changed broadcast to the
    /// survivors, which self-heals the roster without heartbeats.
    fn broadcast(&mut self, message: WireMessage, except: Option<&PeerId>) {
        let mut message = message;
        let mut except = except.cloned();
        loop {
            let mut evicted = false;
            for client in self.clients.iter_mut() {
                if Some(&client.peer) == except.as_ref() {
                    continue;
                }
                if client.active && !client.send(message.clone()) {
                    evicted = true;
                }
            }
            if !evicted {
                break;
            }
            self.clients.retain(|c| c.active);
            warn!(session = %self.secret, "evicted failed sockets, rebroadcasting roster");
            message = WireMessage::from_server(Payload::RosterChanged {
                roster: self.roster(),
            });
            except = None;
        }
    }

    fn roster(&self) -> Vec<PeerId> {
        self.clients
            .iter()
            .filter(|c| c.active)
            .map(|c| c.peer.clone())
            .collect()
    }

    fn check_event(&self, record: &SessionRecord) -> Result<(), SessionError> {
        if record.event() != &self.event {
            return Err(SessionError::WrongEvent {
                expected: self.event.clone(),
                got: record.event().clone(),
            });
        }
        Ok(())
    }

    /// Write the initial empty snapshot at init time, before the actor
    /// task starts.
    pub(crate) fn persist_initial(&self) -> Result<(), SessionError> {
        self.persist()
    }

    fn persist(&self) -> Result<(), SessionError> {
        self.store.persist(&PersistedSession {
            event: self.event.clone(),
            secret: self.secret.clone(),
            incidents: self.incidents.values().cloned().collect(),
            scratchpads: self.scratchpads.values().cloned().collect(),
            tombstones: self.tombstones.clone(),
        })
    }

    /// Terminal: erase durable state and drop every socket.
    fn destroy(&mut self) {
        info!(session = %self.secret, event = %self.event, "destroying session");
        if let Err(err) = self.store.erase() {
            warn!(session = %self.secret, error = %err, "failed to erase session state");
        }
        self.clients.clear();
        self.incidents.clear();
        self.scratchpads.clear();
        self.tombstones.clear();
    }
}
