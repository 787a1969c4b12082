//! Core identifiers, constants, and error types (always included).

pub mod constants;
pub mod error;
pub mod traits;

pub use error::{PantrylinkError, StoreError};
pub use traits::{EntityId, PeerId, Syncable, Timestamp, now_millis};
