//! Real-time wire protocol shared by both directions

mod messages;

pub use messages::{MessageSender, Payload, SessionSnapshot, WireMessage};
