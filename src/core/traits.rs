//! Core identifier types and the [`Syncable`] trait.
//!
//! Everything the merge engine needs to know about an entity collection is
//! captured here: a stable unique id plus one ordering field.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::constants::PEER_ID_LEN;

/// Milliseconds since the Unix epoch, as carried on the wire.
pub type Timestamp = u64;

/// Stable unique identifier of a syncable entity.
///
/// Assigned at creation and never reused. The same id received from a remote
/// peer denotes the same logical entity, never a coincidental collision.
pub type EntityId = String;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as Timestamp
}

/// Opaque identifier of one application instance.
///
/// Generated once per process and stable for its lifetime; survives repeated
/// connect/disconnect cycles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Generate a random peer identifier.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let id: String = (0..PEER_ID_LEN)
            .map(|_| {
                const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
                ALPHABET[rng.gen_range(0..ALPHABET.len())] as char
            })
            .collect();
        Self(id)
    }

    /// Wrap an existing identifier (e.g. received in a handshake).
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The minimal shape the merge engine requires of an entity collection.
///
/// Mutable entities that support in-place edits order by `updated_at`;
/// append-mostly entities order by `created_at`. The merge engine only sees
/// the ordering value, not which field produced it.
pub trait Syncable {
    /// Stable unique id of this entity.
    fn id(&self) -> &EntityId;

    /// Ordering field value used for last-writer-wins resolution.
    fn ordering(&self) -> Timestamp;
}
