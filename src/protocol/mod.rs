//! Message protocol layer.
//!
//! Defines the envelope and typed payloads exchanged over an open channel
//! and the JSON wire codec for both. Decoding a malformed envelope is
//! non-fatal: callers log and drop it, and the channel stays open.

mod envelope;

pub use envelope::*;
