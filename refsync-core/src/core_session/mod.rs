//! Session actors: one serialized-execution task per sharing session
//!
//! The actor is the sole authoritative holder of a session's records and
//! its live-socket roster. Mutations are merged through the consistency
//! core and the merged result is what gets stored and broadcast, so a
//! device that lost a field tie-break learns the authoritative value
//! immediately.

mod actor;
mod client;
mod handle;
mod registry;
mod store;

pub use actor::{EditOutcome, SessionCommand};
pub use handle::SessionHandle;
pub use registry::{SessionRegistry, SessionRuntime};

use crate::core_model::{EventCode, RecordId, SessionSecret};
use thiserror::Error;

/// Session-layer failures. Conflict outcomes (lost tie-breaks) are not
/// errors; they come back as structured data in [`EditOutcome`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// The id was tombstoned; adds and edits are permanently rejected
    #[error("record {0} was deleted; the id is tombstoned")]
    AlreadyDeleted(RecordId),

    /// Candidate record belongs to a different event than the session
    #[error("record belongs to event {got}, session serves {expected}")]
    WrongEvent { expected: EventCode, got: EventCode },

    /// Actor mailbox is gone (parked or destroyed)
    #[error("session is not running")]
    SessionClosed,

    /// No live actor and no durable state at this address
    #[error("no session at address {0}")]
    SessionNotFound(SessionSecret),

    /// Second init for an already-initialized session
    #[error("session {0} already initialized")]
    AlreadyInitialized(SessionSecret),

    /// Merge-layer failure surfaced by an edit
    #[error("consistency failure: {0}")]
    Consistency(String),

    /// Storage fault; fatal to the in-flight operation only
    #[error("session storage failure: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests;
