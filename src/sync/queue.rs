//! Outbound message queue.
//!
//! Buffers envelopes generated before the channel is open and drains them in
//! original send order once it is. Owned exclusively by the local session;
//! cleared on disconnect, never retried.

use std::collections::VecDeque;

use crate::protocol::Envelope;

/// FIFO buffer of envelopes awaiting delivery.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    pending: VecDeque<Envelope>,
}

impl OutboundQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an envelope, preserving send order.
    pub fn push(&mut self, envelope: Envelope) {
        self.pending.push_back(envelope);
    }

    /// Take all pending envelopes in append order, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<Envelope> {
        self.pending.drain(..).collect()
    }

    /// Drop all pending envelopes. Undelivered messages are not retried.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Number of envelopes waiting.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
