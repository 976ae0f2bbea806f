/*
    merge.rs - Initialization, local edits and deterministic merge

    The only local mutation path is apply_local_edit; merge reconciles two
    independently edited copies field by field. Both are pure: no I/O, no
    randomness beyond advisory timestamps recorded in registers.
*/

use super::envelope::ConsistencyEnvelope;
use super::traits::{ConsistencyError, Synchronizable};
use crate::core_model::types::PeerId;
use serde_json::Value;

/// Result of merging a local and a remote copy of one record.
#[derive(Debug, Clone)]
pub struct MergeOutcome<T> {
    /// The authoritative record after the merge; `None` iff both sides
    /// were absent.
    pub resolved: Option<T>,

    /// Fields where the remote side won
    pub changed: Vec<String>,

    /// Fields where the remote side carried a competing write and lost
    pub rejected: Vec<String>,
}

/// Attach a complete envelope to a freshly created record: one register
/// per tracked field at count 0, owned by `owner`.
pub fn initialize<T: Synchronizable>(record: &mut T, owner: &PeerId) {
    debug_assert!(
        T::tracked_fields()
            .iter()
            .all(|f| !T::ignored_fields().contains(f)),
        "tracked and ignored field sets overlap"
    );
    *record.envelope_mut() = ConsistencyEnvelope::initial(T::tracked_fields(), owner);
}

/// Apply an edit made on this device: archive the prior write into the
/// field's history, advance the counter, record the editor as last writer.
pub fn apply_local_edit<T: Synchronizable>(
    record: &mut T,
    field: &str,
    new_value: Value,
    editor: &PeerId,
) -> Result<(), ConsistencyError> {
    if T::ignored_fields().contains(&field) {
        return Err(ConsistencyError::IgnoredField(field.to_string()));
    }
    if !T::tracked_fields().contains(&field) {
        return Err(ConsistencyError::UntrackedField(field.to_string()));
    }

    let prior = record.field(field)?;
    let register = record
        .envelope_mut()
        .register_mut(field)
        .ok_or_else(|| ConsistencyError::MissingRegister(field.to_string()))?;
    register.advance(prior, editor.clone());
    record.set_field(field, new_value)
}

/// Merge a remote copy of a record into the local one.
///
/// Absent-vs-present resolves wholesale: a record one side has never seen
/// wins over nothing (create vs. unseen-delete). When both sides are
/// present, each tracked field resolves independently: the remote register
/// wins iff its count is higher, or the counts tie and its peer string is
/// greater. The winning register replaces the losing one entirely.
pub fn merge<T: Synchronizable>(
    local: Option<&T>,
    remote: Option<&T>,
) -> Result<MergeOutcome<T>, ConsistencyError> {
    let (local, remote) = match (local, remote) {
        (None, None) => {
            return Ok(MergeOutcome {
                resolved: None,
                changed: Vec::new(),
                rejected: Vec::new(),
            })
        }
        (Some(local), None) => {
            return Ok(MergeOutcome {
                resolved: Some(local.clone()),
                changed: Vec::new(),
                rejected: Vec::new(),
            })
        }
        (None, Some(remote)) => {
            return Ok(MergeOutcome {
                resolved: Some(remote.clone()),
                changed: T::tracked_fields().iter().map(|f| f.to_string()).collect(),
                rejected: Vec::new(),
            })
        }
        (Some(local), Some(remote)) => (local, remote),
    };

    let mut resolved = local.clone();
    let mut changed = Vec::new();
    let mut rejected = Vec::new();

    for &field in T::tracked_fields() {
        let remote_register = match remote.envelope().register(field) {
            Some(r) => r,
            // Remote predates this field; the local register stands.
            None => continue,
        };

        let remote_wins = match resolved.envelope().register(field) {
            Some(local_register) => {
                if remote_register.same_write(local_register) {
                    continue;
                }
                remote_register.supersedes(local_register)
            }
            None => true,
        };

        if remote_wins {
            resolved.set_field(field, remote.field(field)?)?;
            resolved
                .envelope_mut()
                .replace_register(field, remote_register.clone());
            changed.push(field.to_string());
        } else {
            rejected.push(field.to_string());
        }
    }

    Ok(MergeOutcome {
        resolved: Some(resolved),
        changed,
        rejected,
    })
}

/// True iff every tracked field carries the same write on both sides,
/// judged by (count, peer). Used to skip redundant re-broadcast.
pub fn equivalent<T: Synchronizable>(left: &T, right: &T) -> bool {
    T::tracked_fields().iter().all(|&field| {
        match (left.envelope().register(field), right.envelope().register(field)) {
            (Some(l), Some(r)) => l.same_write(r),
            (None, None) => true,
            _ => false,
        }
    })
}
