/*
    traits.rs - The Synchronizable contract

    A record type opts into per-field conflict resolution by declaring its
    tracked and ignored fields statically and exposing field access as JSON
    values. The ignored set always contains the record id, the owning
    event/match keys, and the envelope itself; those never merge.
*/

use super::envelope::ConsistencyEnvelope;
use crate::core_model::types::RecordId;
use serde_json::Value;
use thiserror::Error;

/// Errors from envelope initialization, local edits, and merges.
#[derive(Debug, Error)]
pub enum ConsistencyError {
    /// Edit attempted on a field in the record's ignored set
    #[error("field `{0}` is ignored and cannot be edited through the sync layer")]
    IgnoredField(String),

    /// Edit attempted on a field the record does not track
    #[error("field `{0}` is not tracked for consistency")]
    UntrackedField(String),

    /// A tracked field has no register: the envelope was never initialized
    #[error("no register for tracked field `{0}`; envelope not initialized")]
    MissingRegister(String),

    /// Field value could not be converted to or from its JSON form
    #[error("field `{field}` codec failure: {message}")]
    FieldCodec { field: String, message: String },
}

/// A record whose mutable fields merge via per-field LWW registers.
pub trait Synchronizable: Clone {
    /// Caller-chosen opaque id, excluded from merge.
    fn record_id(&self) -> &RecordId;

    /// Fields resolved per-register during merge.
    fn tracked_fields() -> &'static [&'static str];

    /// Statically declared exclusion set: id, owning event/match keys and
    /// the envelope itself. Checked at envelope-init and edit time.
    fn ignored_fields() -> &'static [&'static str];

    /// Read a tracked field as a JSON value.
    fn field(&self, name: &str) -> Result<Value, ConsistencyError>;

    /// Write a tracked field from a JSON value.
    fn set_field(&mut self, name: &str, value: Value) -> Result<(), ConsistencyError>;

    fn envelope(&self) -> &ConsistencyEnvelope;

    fn envelope_mut(&mut self) -> &mut ConsistencyEnvelope;
}
