//! # Pantrylink
//!
//! Peer-to-peer replication core for a local-first meal planning app.
//!
//! Two devices pair by exchanging an offer and an answer string out-of-band
//! (a link, a QR code, copy-paste). Once paired they hold a single framed
//! channel over which typed JSON envelopes replicate recipes, planned meals,
//! and the shopping list in both directions, with last-writer-wins conflict
//! resolution on wall-clock timestamps.
//!
//! There is no relay and no server: exactly two peers, a direct channel,
//! and a full-state exchange on connect followed by incremental updates.
//!
//! ## Modules
//!
//! - [`core`]: Shared ids, timestamps, constants, and the error roll-up
//! - [`model`]: Replicated entities (recipes, meals, shopping items)
//! - [`store`]: The [`store::LocalStore`] persistence trait and an
//!   in-memory implementation
//! - [`protocol`]: The JSON envelope codec and message payloads
//! - [`transport`]: Framed peer channel and offer/answer negotiation
//! - [`sync`]: Session state machine, outbound queue, merge logic, and the
//!   orchestrator tying it all together
//!
//! ## Example
//!
//! ```rust,no_run
//! use pantrylink::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PantrylinkError> {
//!     let store = MemoryStore::new();
//!     let (mut orchestrator, mut events) = SyncOrchestrator::new(store);
//!
//!     // Share this string with the other device, then feed its answer
//!     // back through `complete_connection`.
//!     let offer = orchestrator.create_offer().await?;
//!     println!("offer: {offer}");
//!
//!     while let Some(event) = events.recv().await {
//!         println!("session: {event:?}");
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod core;
pub mod model;
pub mod protocol;
pub mod store;
pub mod sync;
pub mod transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{EntityId, PantrylinkError, PeerId, Syncable, Timestamp};
    pub use crate::model::{FullState, Ingredient, Meal, Recipe, ShoppingItem};
    pub use crate::protocol::{Envelope, Payload};
    pub use crate::store::{LocalStore, MemoryStore};
    pub use crate::sync::{
        ConnectionState, PeerSession, Role, SessionEvent, SyncOrchestrator,
    };
    pub use crate::transport::{ChannelEvent, PeerChannel};
}

// Re-export commonly used items at crate root
pub use crate::core::{PantrylinkError, PeerId};
pub use crate::store::LocalStore;
pub use crate::sync::{SessionEvent, SyncOrchestrator};
