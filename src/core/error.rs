//! Error types shared across layers.
//!
//! Layer-specific errors live next to their layer (`TransportError`,
//! `NegotiateError`, `ProtocolError`, `SyncError`); this module holds the
//! store contract error and the top-level roll-up.

use thiserror::Error;

/// Errors surfaced by the local store collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Underlying persistence failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Top-level pantrylink errors.
#[derive(Debug, Error)]
pub enum PantrylinkError {
    /// Transport channel error.
    #[error("transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    /// Offer/answer negotiation error.
    #[error("negotiation error: {0}")]
    Negotiate(#[from] crate::transport::NegotiateError),

    /// Envelope encode/decode error.
    #[error("protocol error: {0}")]
    Protocol(#[from] crate::protocol::ProtocolError),

    /// Sync orchestration error.
    #[error("sync error: {0}")]
    Sync(#[from] crate::sync::SyncError),

    /// Local store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
