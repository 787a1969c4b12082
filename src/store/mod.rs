//! Local store collaborator contract.
//!
//! The persistent store is external to this core: it owns create/read/
//! update/delete per entity collection and is invoked by the orchestrator
//! and merge engine through the [`LocalStore`] trait. [`MemoryStore`] is a
//! plain in-memory implementation used by tests and by hosts without a
//! persistence layer.
//!
//! All operations are asynchronous and independent of the sync core's
//! connection state: a store call issued while connected may complete after
//! a disconnect.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::core::{EntityId, StoreError};
use crate::model::{FullState, Meal, Recipe, ShoppingItem};

/// Asynchronous CRUD contract over the three entity collections.
///
/// `upsert_*` is create-or-replace; create-vs-update policy (idempotent
/// replay, ordering comparisons) is enforced by the callers, not the store.
#[allow(async_fn_in_trait)]
pub trait LocalStore {
    /// All recipes.
    async fn recipes(&self) -> Result<Vec<Recipe>, StoreError>;
    /// One recipe by id, if present.
    async fn recipe(&self, id: &EntityId) -> Result<Option<Recipe>, StoreError>;
    /// Insert or replace a recipe.
    async fn upsert_recipe(&self, recipe: Recipe) -> Result<(), StoreError>;
    /// Delete a recipe by id. Deleting an absent id is not an error.
    async fn delete_recipe(&self, id: &EntityId) -> Result<(), StoreError>;

    /// All scheduled meals.
    async fn meals(&self) -> Result<Vec<Meal>, StoreError>;
    /// One meal by id, if present.
    async fn meal(&self, id: &EntityId) -> Result<Option<Meal>, StoreError>;
    /// Insert or replace a meal.
    async fn upsert_meal(&self, meal: Meal) -> Result<(), StoreError>;
    /// Delete a meal by id. Deleting an absent id is not an error.
    async fn delete_meal(&self, id: &EntityId) -> Result<(), StoreError>;

    /// All shopping-list rows.
    async fn shopping_items(&self) -> Result<Vec<ShoppingItem>, StoreError>;
    /// One shopping row by id, if present.
    async fn shopping_item(&self, id: &EntityId) -> Result<Option<ShoppingItem>, StoreError>;
    /// Insert or replace a shopping row.
    async fn upsert_shopping_item(&self, item: ShoppingItem) -> Result<(), StoreError>;
    /// Delete a shopping row by id. Deleting an absent id is not an error.
    async fn delete_shopping_item(&self, id: &EntityId) -> Result<(), StoreError>;
    /// Empty the shopping list wholesale.
    async fn clear_shopping_items(&self) -> Result<(), StoreError>;

    /// Snapshot the entire current state of all three collections.
    async fn full_state(&self) -> Result<FullState, StoreError> {
        Ok(FullState {
            recipes: self.recipes().await?,
            meals: self.meals().await?,
            shopping_items: self.shopping_items().await?,
        })
    }
}

/// In-memory [`LocalStore`] backed by hash maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    recipes: Mutex<HashMap<EntityId, Recipe>>,
    meals: Mutex<HashMap<EntityId, Meal>>,
    shopping: Mutex<HashMap<EntityId, ShoppingItem>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock<'a, T>(map: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
        // Every write is a single map insert/remove, so a poisoned lock
        // still holds consistent data.
        map.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LocalStore for MemoryStore {
    async fn recipes(&self) -> Result<Vec<Recipe>, StoreError> {
        let mut all: Vec<Recipe> = Self::lock(&self.recipes).values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    async fn recipe(&self, id: &EntityId) -> Result<Option<Recipe>, StoreError> {
        Ok(Self::lock(&self.recipes).get(id).cloned())
    }

    async fn upsert_recipe(&self, recipe: Recipe) -> Result<(), StoreError> {
        Self::lock(&self.recipes).insert(recipe.id.clone(), recipe);
        Ok(())
    }

    async fn delete_recipe(&self, id: &EntityId) -> Result<(), StoreError> {
        Self::lock(&self.recipes).remove(id);
        Ok(())
    }

    async fn meals(&self) -> Result<Vec<Meal>, StoreError> {
        let mut all: Vec<Meal> = Self::lock(&self.meals).values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    async fn meal(&self, id: &EntityId) -> Result<Option<Meal>, StoreError> {
        Ok(Self::lock(&self.meals).get(id).cloned())
    }

    async fn upsert_meal(&self, meal: Meal) -> Result<(), StoreError> {
        Self::lock(&self.meals).insert(meal.id.clone(), meal);
        Ok(())
    }

    async fn delete_meal(&self, id: &EntityId) -> Result<(), StoreError> {
        Self::lock(&self.meals).remove(id);
        Ok(())
    }

    async fn shopping_items(&self) -> Result<Vec<ShoppingItem>, StoreError> {
        let mut all: Vec<ShoppingItem> = Self::lock(&self.shopping).values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    async fn shopping_item(&self, id: &EntityId) -> Result<Option<ShoppingItem>, StoreError> {
        Ok(Self::lock(&self.shopping).get(id).cloned())
    }

    async fn upsert_shopping_item(&self, item: ShoppingItem) -> Result<(), StoreError> {
        Self::lock(&self.shopping).insert(item.id.clone(), item);
        Ok(())
    }

    async fn delete_shopping_item(&self, id: &EntityId) -> Result<(), StoreError> {
        Self::lock(&self.shopping).remove(id);
        Ok(())
    }

    async fn clear_shopping_items(&self) -> Result<(), StoreError> {
        Self::lock(&self.shopping).clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recipe_crud() {
        let store = MemoryStore::new();
        let recipe = Recipe::new("Omelette", 2);
        let id = recipe.id.clone();

        store.upsert_recipe(recipe.clone()).await.unwrap();
        assert_eq!(store.recipe(&id).await.unwrap(), Some(recipe));
        assert_eq!(store.recipes().await.unwrap().len(), 1);

        store.delete_recipe(&id).await.unwrap();
        assert_eq!(store.recipe(&id).await.unwrap(), None);

        // Deleting again is a no-op
        store.delete_recipe(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let store = MemoryStore::new();
        let mut recipe = Recipe::new("Bread", 1);
        store.upsert_recipe(recipe.clone()).await.unwrap();

        recipe.name = "Sourdough".into();
        store.upsert_recipe(recipe.clone()).await.unwrap();

        let stored = store.recipe(&recipe.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Sourdough");
        assert_eq!(store.recipes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_shopping() {
        let store = MemoryStore::new();
        for name in ["milk", "eggs", "flour"] {
            store
                .upsert_shopping_item(ShoppingItem::new(name, 1.0, None))
                .await
                .unwrap();
        }
        assert_eq!(store.shopping_items().await.unwrap().len(), 3);

        store.clear_shopping_items().await.unwrap();
        assert!(store.shopping_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_full_state_snapshot() {
        let store = MemoryStore::new();
        let recipe = Recipe::new("Curry", 4);
        store
            .upsert_meal(Meal::new(recipe.id.clone(), "2026-09-02", 4))
            .await
            .unwrap();
        store.upsert_recipe(recipe).await.unwrap();

        let state = store.full_state().await.unwrap();
        assert_eq!(state.recipes.len(), 1);
        assert_eq!(state.meals.len(), 1);
        assert!(state.shopping_items.is_empty());
    }
}
