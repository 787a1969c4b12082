//! Envelope and typed payloads.
//!
//! Wire format (JSON, once the channel is established):
//!
//! ```text
//! { "id": "...", "type": "...", "timestamp": 1725000000000,
//!   "senderId": "...", "data": { ... } }
//! ```
//!
//! `data` is omitted for payload-less types. Envelopes are immutable once
//! constructed and never persisted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::core::{EntityId, PeerId, Timestamp, now_millis};
use crate::model::{FullState, Meal, Recipe, ShoppingItem};

/// Envelope encode/decode errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Envelope is not valid JSON or violates the wire shape.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The `type` field names no known payload.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// The payload body is required for this type but absent.
    #[error("missing data for message type: {0}")]
    MissingData(&'static str),

    /// A required envelope field is empty.
    #[error("empty envelope field: {0}")]
    EmptyField(&'static str),
}

/// Body of a `handshake` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// The sender's stable peer id.
    pub peer_id: PeerId,
}

/// Body of a `*_delete` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delete {
    /// Id of the entity to remove.
    pub id: EntityId,
}

/// Typed payload of an envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Session handshake carrying the sender's peer id.
    Handshake(Handshake),
    /// A recipe was created.
    RecipeCreate(Recipe),
    /// A recipe was edited.
    RecipeUpdate(Recipe),
    /// A recipe was deleted.
    RecipeDelete(Delete),
    /// A meal was scheduled.
    MealCreate(Meal),
    /// A scheduled meal was edited.
    MealUpdate(Meal),
    /// A scheduled meal was removed.
    MealDelete(Delete),
    /// A shopping row was added.
    ShoppingCreate(ShoppingItem),
    /// A shopping row was edited (e.g. checked off).
    ShoppingUpdate(ShoppingItem),
    /// A shopping row was removed.
    ShoppingDelete(Delete),
    /// The whole shopping list was cleared.
    ShoppingClear,
    /// Request for the peer's entire state.
    FullSyncRequest,
    /// The peer's entire state for all three collections.
    FullSyncResponse(FullState),
}

impl Payload {
    /// The wire `type` string for this payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Handshake(_) => "handshake",
            Payload::RecipeCreate(_) => "recipe_create",
            Payload::RecipeUpdate(_) => "recipe_update",
            Payload::RecipeDelete(_) => "recipe_delete",
            Payload::MealCreate(_) => "meal_create",
            Payload::MealUpdate(_) => "meal_update",
            Payload::MealDelete(_) => "meal_delete",
            Payload::ShoppingCreate(_) => "shopping_create",
            Payload::ShoppingUpdate(_) => "shopping_update",
            Payload::ShoppingDelete(_) => "shopping_delete",
            Payload::ShoppingClear => "shopping_clear",
            Payload::FullSyncRequest => "full_sync_request",
            Payload::FullSyncResponse(_) => "full_sync_response",
        }
    }

    fn data(&self) -> Result<Option<Value>, serde_json::Error> {
        Ok(match self {
            Payload::Handshake(h) => Some(serde_json::to_value(h)?),
            Payload::RecipeCreate(r) | Payload::RecipeUpdate(r) => {
                Some(serde_json::to_value(r)?)
            }
            Payload::MealCreate(m) | Payload::MealUpdate(m) => Some(serde_json::to_value(m)?),
            Payload::ShoppingCreate(i) | Payload::ShoppingUpdate(i) => {
                Some(serde_json::to_value(i)?)
            }
            Payload::RecipeDelete(d) | Payload::MealDelete(d) | Payload::ShoppingDelete(d) => {
                Some(serde_json::to_value(d)?)
            }
            Payload::FullSyncResponse(s) => Some(serde_json::to_value(s)?),
            Payload::ShoppingClear | Payload::FullSyncRequest => None,
        })
    }

    fn from_wire(kind: &str, data: Option<Value>) -> Result<Self, ProtocolError> {
        fn body<T: serde::de::DeserializeOwned>(
            kind: &'static str,
            data: Option<Value>,
        ) -> Result<T, ProtocolError> {
            let value = data.ok_or(ProtocolError::MissingData(kind))?;
            Ok(serde_json::from_value(value)?)
        }

        Ok(match kind {
            "handshake" => Payload::Handshake(body("handshake", data)?),
            "recipe_create" => Payload::RecipeCreate(body("recipe_create", data)?),
            "recipe_update" => Payload::RecipeUpdate(body("recipe_update", data)?),
            "recipe_delete" => Payload::RecipeDelete(body("recipe_delete", data)?),
            "meal_create" => Payload::MealCreate(body("meal_create", data)?),
            "meal_update" => Payload::MealUpdate(body("meal_update", data)?),
            "meal_delete" => Payload::MealDelete(body("meal_delete", data)?),
            "shopping_create" => Payload::ShoppingCreate(body("shopping_create", data)?),
            "shopping_update" => Payload::ShoppingUpdate(body("shopping_update", data)?),
            "shopping_delete" => Payload::ShoppingDelete(body("shopping_delete", data)?),
            "shopping_clear" => Payload::ShoppingClear,
            "full_sync_request" => Payload::FullSyncRequest,
            "full_sync_response" => Payload::FullSyncResponse(body("full_sync_response", data)?),
            other => return Err(ProtocolError::UnknownType(other.to_string())),
        })
    }
}

/// Raw JSON shape of an envelope on the wire.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    timestamp: Timestamp,
    sender_id: PeerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

/// The unit of wire exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Random id, unique per message.
    pub id: String,
    /// Sender-side send time (millis since epoch).
    pub timestamp: Timestamp,
    /// The sender's peer id.
    pub sender_id: PeerId,
    /// Typed message body.
    pub payload: Payload,
}

impl Envelope {
    /// Construct a new envelope with a fresh id and the current time.
    pub fn new(sender_id: PeerId, payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: now_millis(),
            sender_id,
            payload,
        }
    }

    /// Serialize to JSON bytes for the wire.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let wire = WireEnvelope {
            id: self.id.clone(),
            kind: self.payload.kind().to_string(),
            timestamp: self.timestamp,
            sender_id: self.sender_id.clone(),
            data: self.payload.data()?,
        };
        Ok(serde_json::to_vec(&wire)?)
    }

    /// Deserialize and validate an envelope from wire bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let wire: WireEnvelope = serde_json::from_slice(bytes)?;
        if wire.id.is_empty() {
            return Err(ProtocolError::EmptyField("id"));
        }
        if wire.sender_id.as_str().is_empty() {
            return Err(ProtocolError::EmptyField("senderId"));
        }
        let payload = Payload::from_wire(&wire.kind, wire.data)?;
        Ok(Self {
            id: wire.id,
            timestamp: wire.timestamp,
            sender_id: wire.sender_id,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> PeerId {
        PeerId::from_string("peer-a".into())
    }

    #[test]
    fn test_envelope_wire_shape() {
        let recipe = Recipe::new("Ramen", 2);
        let env = Envelope::new(sender(), Payload::RecipeCreate(recipe));

        let bytes = env.encode().unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(json["type"], "recipe_create");
        assert_eq!(json["senderId"], "peer-a");
        assert!(json["data"]["updatedAt"].is_u64());
        assert!(!json["id"].as_str().unwrap().is_empty());
    }

    #[test]
    fn test_payloadless_types_omit_data() {
        let env = Envelope::new(sender(), Payload::FullSyncRequest);
        let json: Value = serde_json::from_slice(&env.encode().unwrap()).unwrap();
        assert!(json.get("data").is_none());

        let back = Envelope::decode(&env.encode().unwrap()).unwrap();
        assert_eq!(back.payload, Payload::FullSyncRequest);
    }

    #[test]
    fn test_roundtrip_all_kinds() {
        let recipe = Recipe::new("Tacos", 4);
        let meal = Meal::new(recipe.id.clone(), "2026-09-03", 4);
        let item = ShoppingItem::new("limes", 4.0, None);
        let delete = Delete { id: "x1".into() };

        let payloads = vec![
            Payload::Handshake(Handshake { peer_id: sender() }),
            Payload::RecipeCreate(recipe.clone()),
            Payload::RecipeUpdate(recipe.clone()),
            Payload::RecipeDelete(delete.clone()),
            Payload::MealCreate(meal.clone()),
            Payload::MealUpdate(meal),
            Payload::MealDelete(delete.clone()),
            Payload::ShoppingCreate(item.clone()),
            Payload::ShoppingUpdate(item),
            Payload::ShoppingDelete(delete),
            Payload::ShoppingClear,
            Payload::FullSyncRequest,
            Payload::FullSyncResponse(FullState::default()),
        ];

        for payload in payloads {
            let env = Envelope::new(sender(), payload.clone());
            let back = Envelope::decode(&env.encode().unwrap()).unwrap();
            assert_eq!(back.payload, payload);
            assert_eq!(back.id, env.id);
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let raw = br#"{"id":"1","type":"recipe_rename","timestamp":1,"senderId":"p"}"#;
        let result = Envelope::decode(raw);
        assert!(matches!(result, Err(ProtocolError::UnknownType(_))));
    }

    #[test]
    fn test_missing_data_rejected() {
        let raw = br#"{"id":"1","type":"recipe_create","timestamp":1,"senderId":"p"}"#;
        let result = Envelope::decode(raw);
        assert!(matches!(result, Err(ProtocolError::MissingData(_))));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let result = Envelope::decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_empty_sender_rejected() {
        let raw = br#"{"id":"1","type":"full_sync_request","timestamp":1,"senderId":""}"#;
        let result = Envelope::decode(raw);
        assert!(matches!(result, Err(ProtocolError::EmptyField("senderId"))));
    }
}
