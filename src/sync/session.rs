//! Peer session state machine.
//!
//! One [`PeerSession`] exists per application instance for its lifetime.
//! Its `local_peer_id` is stable for the process; `remote_peer_id` and the
//! connection state reset on every disconnect. A generation counter guards
//! completions and timers armed in a previous cycle: anything carrying a
//! stale generation is a guaranteed no-op.

use crate::core::PeerId;

/// Connection lifecycle state.
///
/// `disconnected → connecting → connected`, with `error` terminal reachable
/// from `connecting`, and any state back to `disconnected` on explicit
/// disconnect or channel closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session in progress.
    Disconnected,
    /// Negotiation or channel establishment in progress.
    Connecting,
    /// Channel established and network path live.
    Connected,
    /// Negotiation failed; waiting for a human to retry manually.
    Error,
}

/// Which side of the offer/answer exchange this session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Proposed the session description (sends the offer, requests the
    /// full sync).
    Initiator,
    /// Replied to an offer with an answer.
    Responder,
}

/// Cancellable handle for the connecting-state timeout.
///
/// Firing is routed back through the session; a timer from a previous
/// generation does nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectTimer {
    generation: u64,
}

/// Per-process session state, reused across connect/disconnect cycles.
#[derive(Debug)]
pub struct PeerSession {
    local_peer_id: PeerId,
    remote_peer_id: Option<PeerId>,
    role: Option<Role>,
    state: ConnectionState,
    generation: u64,
    // `connecting → connected` needs both: the two signals arrive
    // independently and out of order.
    path_live: bool,
    channel_open: bool,
}

impl PeerSession {
    /// Create a session with a freshly generated local peer id.
    pub fn new() -> Self {
        Self::with_peer_id(PeerId::generate())
    }

    /// Create a session with a fixed local peer id.
    pub fn with_peer_id(local_peer_id: PeerId) -> Self {
        Self {
            local_peer_id,
            remote_peer_id: None,
            role: None,
            state: ConnectionState::Disconnected,
            generation: 0,
            path_live: false,
            channel_open: false,
        }
    }

    /// The stable local peer id.
    pub fn local_peer_id(&self) -> &PeerId {
        &self.local_peer_id
    }

    /// The remote peer id, once a handshake has been received.
    pub fn remote_peer_id(&self) -> Option<&PeerId> {
        self.remote_peer_id.as_ref()
    }

    /// This cycle's negotiation role, if a cycle is in progress.
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Current generation. Bumped on every new cycle and every reset.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the session is connected.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Begin a new connect cycle in the given role.
    pub fn begin_connecting(&mut self, role: Role) {
        self.generation += 1;
        self.role = Some(role);
        self.remote_peer_id = None;
        self.path_live = false;
        self.channel_open = false;
        self.state = ConnectionState::Connecting;
    }

    /// Record that the network layer reports a live path.
    ///
    /// Returns `true` if this completed the transition to connected.
    pub fn on_path_live(&mut self) -> bool {
        self.path_live = true;
        self.try_establish()
    }

    /// Record that the transport channel reports established.
    ///
    /// Returns `true` if this completed the transition to connected.
    pub fn on_channel_open(&mut self) -> bool {
        self.channel_open = true;
        self.try_establish()
    }

    fn try_establish(&mut self) -> bool {
        if self.state == ConnectionState::Connecting && self.path_live && self.channel_open {
            self.state = ConnectionState::Connected;
            true
        } else {
            false
        }
    }

    /// Record the remote peer id from a handshake message.
    pub fn set_remote_peer_id(&mut self, peer_id: PeerId) {
        self.remote_peer_id = Some(peer_id);
    }

    /// Arm the connecting-state timeout for the current cycle.
    pub fn arm_connect_timer(&self) -> ConnectTimer {
        ConnectTimer {
            generation: self.generation,
        }
    }

    /// Handle a connect-timer expiry.
    ///
    /// Returns `true` if the timer was current and the session moved to
    /// `error`; a stale timer or an already-settled state is a no-op.
    pub fn on_connect_timeout(&mut self, timer: ConnectTimer) -> bool {
        if timer.generation != self.generation || self.state != ConnectionState::Connecting {
            return false;
        }
        self.state = ConnectionState::Error;
        self.clear_signals();
        true
    }

    /// Mark negotiation failed.
    pub fn fail(&mut self) {
        self.state = ConnectionState::Error;
        self.clear_signals();
    }

    /// Reset to disconnected. The local peer id survives; everything else
    /// clears and the generation advances so in-flight completions no-op.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = ConnectionState::Disconnected;
        self.remote_peer_id = None;
        self.role = None;
        self.clear_signals();
    }

    fn clear_signals(&mut self) {
        self.path_live = false;
        self.channel_open = false;
    }
}

impl Default for PeerSession {
    fn default() -> Self {
        Self::new()
    }
}
