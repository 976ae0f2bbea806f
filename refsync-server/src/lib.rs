//! refsync-server library surface
//!
//! The edge router as a library so integration tests can drive the exact
//! route table the binary serves.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
