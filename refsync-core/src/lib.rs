//! refsync-core: the synchronization engine behind a multi-device
//! referee incident log.
//!
//! Layered leaves-first: the consistency core is pure per-field LWW
//! merge; identity verifies signed requests; the membership directory
//! gates access; one session actor per sharing session holds the
//! authoritative state and fans changes out to connected devices.

pub mod config;
pub mod core_consistency;
pub mod core_identity;
pub mod core_membership;
pub mod core_model;
pub mod core_protocol;
pub mod core_session;
pub mod logging;

pub use logging::{init_logging, LogLevel};
