//! Consistency Core: pure per-field LWW registers and merge
//!
//! No I/O lives here. The Session Actor calls [`merge`] on every edit and
//! broadcasts the resolved record; devices run the same code against their
//! local store, which is what makes offline editing converge.

mod envelope;
mod merge;
mod register;
mod traits;

pub use envelope::ConsistencyEnvelope;
pub use merge::{apply_local_edit, equivalent, initialize, merge, MergeOutcome};
pub use register::{HistoryEntry, KeyRegister};
pub use traits::{ConsistencyError, Synchronizable};

#[cfg(test)]
mod tests;
