//! Transport layer.
//!
//! Wraps a peer-to-peer, ordered, reliable byte-stream connection between
//! exactly two endpoints and the offer/answer negotiation that produces one:
//!
//! - **Framed channel**: [`PeerChannel`] with u32 length-prefixed frames and
//!   at-most-once [`ChannelEvent`] notifications
//! - **Negotiation**: [`Initiator`]/[`accept_offer`] asymmetric offer/answer
//!   exchange plus network-path discovery
//! - **Blob encoding**: base64 JSON offer/answer strings and share links for
//!   out-of-band exchange
//!
//! The channel performs real network I/O with unbounded duration; the
//! negotiator imposes the only timeouts.

mod channel;
mod negotiate;

pub use channel::*;
pub use negotiate::*;
