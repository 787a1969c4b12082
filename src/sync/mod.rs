//! Sync layer.
//!
//! Implements:
//! - The per-process [`PeerSession`] and its connection state machine
//! - FIFO buffering of pre-connect messages ([`OutboundQueue`])
//! - Last-writer-wins merging of remote state ([`merge_full_state`])
//! - The [`SyncOrchestrator`] driving handshake, full sync, and incremental
//!   message dispatch

mod merge;
mod orchestrator;
mod queue;
mod session;

pub use merge::*;
pub use orchestrator::*;
pub use queue::*;
pub use session::*;
