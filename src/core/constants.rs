//! Protocol constants.
//!
//! Timeouts and limits shared across the transport and sync layers.

use std::time::Duration;

// =============================================================================
// NEGOTIATION TIMING
// =============================================================================

/// Bound on network-path discovery during offer/answer creation.
///
/// If discovery has not settled by then, negotiation proceeds with whatever
/// paths were found.
pub const PATH_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Bound on the entire `connecting` state.
///
/// Exceeding it forces the session into `error` and surfaces the manual
/// fallback to the host UI.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Per-candidate dial timeout while answering an offer.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// FRAMING
// =============================================================================

/// Length-prefix size for wire frames (u32 LE).
pub const FRAME_HEADER_SIZE: usize = 4;

/// Maximum accepted frame payload. A full-sync response carrying an entire
/// library fits comfortably below this.
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Length of a generated peer identifier in characters.
pub const PEER_ID_LEN: usize = 12;
