//! Sync orchestrator.
//!
//! Drives handshake-after-connect, full-state exchange, and dispatch of
//! incoming messages to entity handlers. The orchestrator is a plain value
//! driven by its host on one task: channel events, timer expiries, and UI
//! entry points all arrive through `&mut self` methods, so no locking is
//! required around session or queue state.
//!
//! Every completion that crosses an await re-checks the session generation
//! before applying side effects; a disconnect mid-operation turns the rest
//! of that operation into a no-op.

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::merge::merge_full_state;
use super::queue::OutboundQueue;
use super::session::{ConnectTimer, ConnectionState, PeerSession, Role};
use crate::core::{PeerId, StoreError};
use crate::protocol::{Envelope, Handshake, Payload, ProtocolError};
use crate::store::LocalStore;
use crate::transport::{
    ChannelEvent, Initiator, NegotiateError, NegotiatedChannel, PeerChannel, TransportError,
    accept_offer,
};

/// Errors from sync orchestration.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Failed to encode an outbound envelope.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Offer/answer negotiation failure.
    #[error("negotiation error: {0}")]
    Negotiate(#[from] NegotiateError),

    /// Channel failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// `complete_connection` called with no offer outstanding.
    #[error("no negotiation in progress")]
    NotNegotiating,
}

/// Outbound notifications for the host UI, emitted as a single tagged
/// stream rather than named callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The connection state changed.
    StateChanged(ConnectionState),
    /// A handshake arrived; the remote peer is identified.
    PeerConnected(PeerId),
    /// The remote peer went away.
    PeerDisconnected,
    /// A valid envelope of the given type was received.
    MessageReceived {
        /// Wire `type` string of the message.
        kind: &'static str,
    },
    /// A full-sync merge completed; dependent views should reload.
    StoreReloaded,
    /// A terminal error a human must resolve (manual fallback).
    Error(String),
}

/// Orchestrates one peer session over a store `S`.
///
/// Constructed once at application start and reused across repeated
/// connect/disconnect cycles.
#[derive(Debug)]
pub struct SyncOrchestrator<S> {
    store: S,
    session: PeerSession,
    queue: OutboundQueue,
    channel: Option<PeerChannel>,
    pending_offer: Option<Initiator>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl<S: LocalStore> SyncOrchestrator<S> {
    /// Create an orchestrator with a fresh peer id.
    ///
    /// Returns the orchestrator and the receiver for its session events.
    pub fn new(store: S) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        Self::with_session(store, PeerSession::new())
    }

    /// Create an orchestrator around an existing session value.
    pub fn with_session(
        store: S,
        session: PeerSession,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                store,
                session,
                queue: OutboundQueue::new(),
                channel: None,
                pending_offer: None,
                events: tx,
            },
            rx,
        )
    }

    /// The stable local peer id.
    pub fn local_peer_id(&self) -> &PeerId {
        self.session.local_peer_id()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// The remote peer id, once handshaken.
    pub fn remote_peer_id(&self) -> Option<&PeerId> {
        self.session.remote_peer_id()
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Arm the connecting-state timeout for the current cycle.
    ///
    /// The orchestrator does not schedule the expiry itself; the host
    /// sleeps [`CONNECT_TIMEOUT`](crate::core::constants::CONNECT_TIMEOUT)
    /// and then routes the handle back through
    /// [`handle_connect_timeout`](Self::handle_connect_timeout). A handle
    /// from a cycle that has since reset is a no-op.
    pub fn arm_connect_timer(&self) -> ConnectTimer {
        self.session.arm_connect_timer()
    }

    // =========================================================================
    // UI ENTRY POINTS
    // =========================================================================

    /// Begin a session as initiator: produce the shareable offer string.
    pub async fn create_offer(&mut self) -> Result<String, SyncError> {
        self.session.begin_connecting(Role::Initiator);
        self.emit(SessionEvent::StateChanged(ConnectionState::Connecting));

        match Initiator::create_offer(self.session.local_peer_id()).await {
            Ok((initiator, offer)) => {
                self.pending_offer = Some(initiator);
                Ok(offer)
            }
            Err(err) => {
                self.negotiation_failed(&err);
                Err(err.into())
            }
        }
    }

    /// Begin a session as responder: accept a received offer and produce the
    /// answer string to return out-of-band.
    ///
    /// The returned receiver carries the channel's events; the host forwards
    /// them into [`handle_channel_event`](Self::handle_channel_event).
    pub async fn accept_offer(
        &mut self,
        offer: &str,
    ) -> Result<(String, mpsc::UnboundedReceiver<ChannelEvent>), SyncError> {
        self.session.begin_connecting(Role::Responder);
        self.emit(SessionEvent::StateChanged(ConnectionState::Connecting));

        match accept_offer(offer, self.session.local_peer_id()).await {
            Ok((negotiated, answer)) => {
                let events = self.install_channel(negotiated).await;
                Ok((answer, events))
            }
            Err(err) => {
                self.negotiation_failed(&err);
                Err(err.into())
            }
        }
    }

    /// Complete an initiated session with the answer string.
    pub async fn complete_connection(
        &mut self,
        answer: &str,
    ) -> Result<mpsc::UnboundedReceiver<ChannelEvent>, SyncError> {
        let initiator = self.pending_offer.take().ok_or(SyncError::NotNegotiating)?;

        match initiator.complete(answer).await {
            Ok(negotiated) => Ok(self.install_channel(negotiated).await),
            Err(err) => {
                self.negotiation_failed(&err);
                Err(err.into())
            }
        }
    }

    /// Attach an already-negotiated channel (hosts doing their own
    /// signaling, and tests). Marks the network path live; the `Open`
    /// channel event completes the transition to connected.
    pub async fn attach_channel(&mut self, channel: PeerChannel, role: Role) {
        if self.session.state() != ConnectionState::Connecting || self.session.role() != Some(role)
        {
            self.session.begin_connecting(role);
            self.emit(SessionEvent::StateChanged(ConnectionState::Connecting));
        }
        self.channel = Some(channel);
        if self.session.on_path_live() {
            self.on_connected().await;
        }
    }

    /// Explicitly tear down the session. Undelivered queued messages are
    /// dropped; the local peer id survives for the next cycle.
    pub async fn disconnect(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close().await;
        }
        self.pending_offer = None;
        self.teardown();
    }

    /// Ask the peer for its full state (user-triggered).
    pub async fn request_full_sync(&mut self) -> Result<(), SyncError> {
        self.broadcast(Payload::FullSyncRequest).await
    }

    /// Mirror a local mutation outward as the corresponding envelope.
    ///
    /// Best-effort: queued while connecting, transmitted while connected,
    /// silently skipped otherwise. There is no outbox replay after a
    /// reconnect.
    pub async fn broadcast(&mut self, payload: Payload) -> Result<(), SyncError> {
        let envelope = Envelope::new(self.session.local_peer_id().clone(), payload);
        match self.session.state() {
            ConnectionState::Connected => self.send_now(&envelope).await?,
            ConnectionState::Connecting => self.queue.push(envelope),
            ConnectionState::Disconnected | ConnectionState::Error => {
                debug!(kind = envelope.payload.kind(), "not connected, skipping broadcast");
            }
        }
        Ok(())
    }

    // =========================================================================
    // EVENT HANDLERS
    // =========================================================================

    /// Handle one channel event forwarded by the host.
    pub async fn handle_channel_event(&mut self, event: ChannelEvent) -> Result<(), SyncError> {
        match event {
            ChannelEvent::Open => {
                if self.session.on_channel_open() {
                    self.on_connected().await;
                }
            }
            ChannelEvent::Message(bytes) => {
                // Events may sit buffered in the host's receiver across a
                // disconnect; a message for a session that already reset
                // must not touch the store or the peer identity.
                if !self.session.is_connected() {
                    debug!("dropping message for inactive session");
                    return Ok(());
                }
                match Envelope::decode(&bytes) {
                    Ok(envelope) => self.dispatch(envelope).await?,
                    Err(err) => warn!(%err, "dropping malformed envelope"),
                }
            }
            ChannelEvent::Closed => {
                if let Some(channel) = &mut self.channel {
                    channel.mark_closed();
                }
                self.channel = None;
                self.teardown();
            }
        }
        Ok(())
    }

    /// Handle a connect-timer expiry armed via
    /// [`arm_connect_timer`](Self::arm_connect_timer). Stale timers no-op.
    pub fn handle_connect_timeout(&mut self, timer: ConnectTimer) {
        if self.session.on_connect_timeout(timer) {
            self.queue.clear();
            self.channel = None;
            self.pending_offer = None;
            self.emit(SessionEvent::Error(
                "connection attempt timed out; exchange the answer manually and retry".into(),
            ));
            self.emit(SessionEvent::StateChanged(ConnectionState::Error));
        }
    }

    // =========================================================================
    // INTERNAL
    // =========================================================================

    async fn install_channel(
        &mut self,
        negotiated: NegotiatedChannel,
    ) -> mpsc::UnboundedReceiver<ChannelEvent> {
        self.channel = Some(negotiated.channel);
        if self.session.on_path_live() {
            self.on_connected().await;
        }
        negotiated.events
    }

    /// Both connectivity signals arrived: announce ourselves and drain the
    /// queue. Runs at most once per cycle.
    async fn on_connected(&mut self) {
        self.emit(SessionEvent::StateChanged(ConnectionState::Connected));

        let handshake = Envelope::new(
            self.session.local_peer_id().clone(),
            Payload::Handshake(Handshake {
                peer_id: self.session.local_peer_id().clone(),
            }),
        );
        if let Err(err) = self.send_now(&handshake).await {
            warn!(%err, "handshake send failed");
        }

        if self.session.role() == Some(Role::Initiator) {
            let request = Envelope::new(
                self.session.local_peer_id().clone(),
                Payload::FullSyncRequest,
            );
            if let Err(err) = self.send_now(&request).await {
                warn!(%err, "full sync request send failed");
            }
        }

        self.flush_queue().await;
    }

    /// Drain the outbound queue in append order. A transmission failure
    /// stops the flush; the remaining messages are dropped, not retried.
    async fn flush_queue(&mut self) {
        let pending = self.queue.drain();
        let total = pending.len();
        for (sent, envelope) in pending.into_iter().enumerate() {
            if let Err(err) = self.send_now(&envelope).await {
                warn!(%err, sent, dropped = total - sent, "flush aborted");
                return;
            }
        }
        if total > 0 {
            debug!(count = total, "outbound queue flushed");
        }
    }

    async fn send_now(&mut self, envelope: &Envelope) -> Result<(), SyncError> {
        let bytes = envelope.encode()?;
        match &mut self.channel {
            Some(channel) => Ok(channel.send(&bytes).await?),
            None => Err(SyncError::Transport(TransportError::Closed)),
        }
    }

    async fn dispatch(&mut self, envelope: Envelope) -> Result<(), SyncError> {
        self.emit(SessionEvent::MessageReceived {
            kind: envelope.payload.kind(),
        });

        match envelope.payload {
            Payload::Handshake(handshake) => {
                self.session.set_remote_peer_id(handshake.peer_id.clone());
                self.emit(SessionEvent::PeerConnected(handshake.peer_id));
            }

            Payload::FullSyncRequest => {
                let generation = self.session.generation();
                let state = self.store.full_state().await?;
                if self.session.generation() != generation || !self.session.is_connected() {
                    debug!("session changed while reading state, dropping sync response");
                    return Ok(());
                }
                let response = Envelope::new(
                    self.session.local_peer_id().clone(),
                    Payload::FullSyncResponse(state),
                );
                if let Err(err) = self.send_now(&response).await {
                    warn!(%err, "full sync response send failed");
                }
            }

            Payload::FullSyncResponse(state) => {
                let generation = self.session.generation();
                merge_full_state(&self.store, &state).await?;
                // The session may have reset while the merge was in flight;
                // the merge itself is id-scoped and safe, but dependent
                // views only reload for a live session.
                if self.session.generation() == generation && self.session.is_connected() {
                    self.emit(SessionEvent::StoreReloaded);
                } else {
                    debug!("session reset during merge, skipping reload");
                }
            }

            Payload::RecipeCreate(recipe) => {
                if self.store.recipe(&recipe.id).await?.is_none() {
                    self.store.upsert_recipe(recipe).await?;
                } else {
                    debug!(id = %recipe.id, "recipe create replay ignored");
                }
            }
            Payload::RecipeUpdate(recipe) => {
                match self.store.recipe(&recipe.id).await? {
                    Some(local) if recipe.updated_at < local.updated_at => {
                        debug!(id = %recipe.id, "stale recipe update ignored");
                    }
                    _ => self.store.upsert_recipe(recipe).await?,
                }
            }
            Payload::RecipeDelete(delete) => {
                self.store.delete_recipe(&delete.id).await?;
            }

            Payload::MealCreate(meal) => {
                if self.store.recipe(&meal.recipe_id).await?.is_none() {
                    debug!(id = %meal.id, recipe = %meal.recipe_id, "meal references unknown recipe, dropped");
                } else if self.store.meal(&meal.id).await?.is_none() {
                    self.store.upsert_meal(meal).await?;
                } else {
                    debug!(id = %meal.id, "meal create replay ignored");
                }
            }
            Payload::MealUpdate(meal) => {
                if self.store.recipe(&meal.recipe_id).await?.is_none() {
                    debug!(id = %meal.id, recipe = %meal.recipe_id, "meal references unknown recipe, dropped");
                    return Ok(());
                }
                match self.store.meal(&meal.id).await? {
                    Some(local) if meal.updated_at < local.updated_at => {
                        debug!(id = %meal.id, "stale meal update ignored");
                    }
                    _ => self.store.upsert_meal(meal).await?,
                }
            }
            Payload::MealDelete(delete) => {
                self.store.delete_meal(&delete.id).await?;
            }

            Payload::ShoppingCreate(item) => {
                if self.store.shopping_item(&item.id).await?.is_none() {
                    self.store.upsert_shopping_item(item).await?;
                } else {
                    debug!(id = %item.id, "shopping create replay ignored");
                }
            }
            Payload::ShoppingUpdate(item) => {
                match self.store.shopping_item(&item.id).await? {
                    Some(local) if item.created_at < local.created_at => {
                        debug!(id = %item.id, "stale shopping update ignored");
                    }
                    _ => self.store.upsert_shopping_item(item).await?,
                }
            }
            Payload::ShoppingDelete(delete) => {
                self.store.delete_shopping_item(&delete.id).await?;
            }
            Payload::ShoppingClear => {
                self.store.clear_shopping_items().await?;
            }
        }
        Ok(())
    }

    fn negotiation_failed(&mut self, err: &NegotiateError) {
        warn!(%err, "negotiation failed");
        self.channel = None;
        self.pending_offer = None;
        self.queue.clear();
        self.session.fail();
        self.emit(SessionEvent::Error(err.to_string()));
        self.emit(SessionEvent::StateChanged(ConnectionState::Error));
    }

    fn teardown(&mut self) {
        self.queue.clear();
        let had_peer = self.session.remote_peer_id().is_some();
        self.session.reset();
        if had_peer {
            self.emit(SessionEvent::PeerDisconnected);
        }
        self.emit(SessionEvent::StateChanged(ConnectionState::Disconnected));
    }

    fn emit(&self, event: SessionEvent) {
        // The host may have dropped the receiver; events are advisory.
        let _ = self.events.send(event);
    }
}
