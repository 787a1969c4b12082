//! Entity collections reconciled by the merge engine.
//!
//! Three collections are synchronized between peers: the recipe library, the
//! meal schedule, and the shopping list. Recipes and meals support in-place
//! edits and order by `updated_at`; shopping rows are append-mostly and order
//! by `created_at`.
//!
//! Field names follow the application's JSON schema (camelCase on the wire).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{EntityId, Syncable, Timestamp, now_millis};

/// Generate a fresh entity id.
pub fn new_entity_id() -> EntityId {
    Uuid::new_v4().to_string()
}

/// The three entity collections this core reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// The recipe library.
    Recipes,
    /// The meal schedule.
    Meals,
    /// The shopping list.
    ShoppingItems,
}

impl Collection {
    /// Stable name used in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Recipes => "recipes",
            Collection::Meals => "meals",
            Collection::ShoppingItems => "shopping_items",
        }
    }
}

/// One ingredient row inside a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    /// Ingredient name.
    pub name: String,
    /// Amount in `unit` units. Fractions are stored as decimals.
    pub quantity: f64,
    /// Measurement unit (cup, tbsp, g, ...).
    pub unit: String,
    /// Whether the ingredient is optional.
    #[serde(default)]
    pub optional: bool,
}

/// A recipe record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    /// Stable unique id.
    pub id: EntityId,
    /// Recipe name.
    pub name: String,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// Ingredient list for the default serving count.
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    /// Preparation steps, in order.
    #[serde(default)]
    pub instructions: Vec<String>,
    /// Default serving count.
    pub servings: u32,
    /// Free-form tags (cuisine, dietary restrictions, ...).
    #[serde(default)]
    pub tags: Vec<String>,
    /// Category (Main Course, Dessert, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Preparation time in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_time: Option<u32>,
    /// Cooking time in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cook_time: Option<u32>,
    /// Creation time (millis since epoch).
    pub created_at: Timestamp,
    /// Last edit time (millis since epoch). Ordering field.
    pub updated_at: Timestamp,
}

impl Recipe {
    /// Create a new recipe with a fresh id and current timestamps.
    pub fn new(name: impl Into<String>, servings: u32) -> Self {
        let now = now_millis();
        Self {
            id: new_entity_id(),
            name: name.into(),
            description: String::new(),
            ingredients: Vec::new(),
            instructions: Vec::new(),
            servings,
            tags: Vec::new(),
            category: None,
            prep_time: None,
            cook_time: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Syncable for Recipe {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn ordering(&self) -> Timestamp {
        self.updated_at
    }
}

/// A scheduled meal: one recipe planned for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    /// Stable unique id.
    pub id: EntityId,
    /// Id of the recipe being cooked. Must exist in the recipe collection
    /// for the meal to be importable.
    pub recipe_id: EntityId,
    /// Scheduled date, ISO 8601 (`YYYY-MM-DD`).
    pub date: String,
    /// Serving count for this occasion.
    pub servings: u32,
    /// Creation time (millis since epoch).
    pub created_at: Timestamp,
    /// Last edit time (millis since epoch). Ordering field.
    pub updated_at: Timestamp,
}

impl Meal {
    /// Schedule a recipe for a date with a fresh id and current timestamps.
    pub fn new(recipe_id: EntityId, date: impl Into<String>, servings: u32) -> Self {
        let now = now_millis();
        Self {
            id: new_entity_id(),
            recipe_id,
            date: date.into(),
            servings,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Syncable for Meal {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn ordering(&self) -> Timestamp {
        self.updated_at
    }
}

/// One row of the shopping list.
///
/// Shopping rows have no per-row update semantics worth reconciling; the list
/// is append-mostly and cleared wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingItem {
    /// Stable unique id.
    pub id: EntityId,
    /// Item name.
    pub name: String,
    /// Amount in `unit` units.
    pub quantity: f64,
    /// Measurement unit, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Whether the item has been checked off.
    #[serde(default)]
    pub checked: bool,
    /// Creation time (millis since epoch). Ordering field.
    pub created_at: Timestamp,
}

impl ShoppingItem {
    /// Create a new shopping row with a fresh id and current timestamp.
    pub fn new(name: impl Into<String>, quantity: f64, unit: Option<String>) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
            quantity,
            unit,
            checked: false,
            created_at: now_millis(),
        }
    }
}

impl Syncable for ShoppingItem {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn ordering(&self) -> Timestamp {
        self.created_at
    }
}

/// The entire current state of all three collections, as carried by a
/// full-sync response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullState {
    /// Every recipe in the sender's library.
    pub recipes: Vec<Recipe>,
    /// Every scheduled meal.
    pub meals: Vec<Meal>,
    /// Every shopping-list row.
    pub shopping_items: Vec<ShoppingItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ids_unique() {
        let a = new_entity_id();
        let b = new_entity_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_recipe_wire_shape() {
        let mut recipe = Recipe::new("Pad Thai", 4);
        recipe.prep_time = Some(15);
        recipe.ingredients.push(Ingredient {
            name: "rice noodles".into(),
            quantity: 200.0,
            unit: "g".into(),
            optional: false,
        });

        let json = serde_json::to_value(&recipe).unwrap();
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("prepTime").is_some());
        // Absent optionals are omitted entirely
        assert!(json.get("cookTime").is_none());

        let back: Recipe = serde_json::from_value(json).unwrap();
        assert_eq!(back, recipe);
    }

    #[test]
    fn test_ordering_fields() {
        let recipe = Recipe::new("Soup", 2);
        assert_eq!(recipe.ordering(), recipe.updated_at);

        let item = ShoppingItem::new("leeks", 3.0, None);
        assert_eq!(item.ordering(), item.created_at);
    }

    #[test]
    fn test_full_state_roundtrip() {
        let recipe = Recipe::new("Stew", 4);
        let state = FullState {
            meals: vec![Meal::new(recipe.id.clone(), "2026-09-01", 4)],
            recipes: vec![recipe],
            shopping_items: vec![ShoppingItem::new("carrots", 0.5, Some("kg".into()))],
        };

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("shoppingItems"));
        let back: FullState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
