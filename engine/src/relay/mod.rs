//! Per-connection session relay.
//!
//! A session joins three activities around one connection: the inbound pump
//! applies client control messages, the queue pump reads the owner's
//! notification log, and egress is the only task that writes to the client.

mod frame;
mod session;

#[cfg(test)]
mod tests;

pub use frame::Frame;
pub use session::{CloseReason, RelayBridge, Session, SessionState, SessionSummary};
