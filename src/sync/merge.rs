//! Conflict resolver / merge engine.
//!
//! Applies last-writer-wins semantics per entity collection when merging a
//! full-sync response into the local store. The decision rule is pure
//! ([`resolve`]); [`merge_full_state`] runs it against the store, collection
//! by collection.

use tracing::debug;

use crate::core::{StoreError, Syncable};
use crate::model::{Collection, FullState};
use crate::store::LocalStore;

/// What to do with one remote entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// No local entity shares the id: create it locally.
    Create,
    /// Remote ordering field is strictly greater: overwrite local fields.
    Overwrite,
    /// Local wins, including ties. Ties favoring local is an explicit
    /// product decision, not causal ordering.
    KeepLocal,
}

/// Resolve one remote entity against the local copy, if any.
pub fn resolve<T: Syncable>(local: Option<&T>, remote: &T) -> MergeAction {
    match local {
        None => MergeAction::Create,
        Some(local) if remote.ordering() > local.ordering() => MergeAction::Overwrite,
        Some(_) => MergeAction::KeepLocal,
    }
}

/// Counters describing what one merge did, per collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Entities created locally.
    pub created: usize,
    /// Entities overwritten by a newer remote copy.
    pub overwritten: usize,
    /// Entities where the local copy won.
    pub kept_local: usize,
    /// Meals skipped because their recipe is absent even after the recipe
    /// merge.
    pub meals_skipped: usize,
}

/// Merge an entire remote [`FullState`] into the local store.
///
/// Recipes merge first so the meal dependency check sees the just-merged
/// recipe collection. A meal whose `recipe_id` is still unknown is skipped
/// with no retry; that is not an error. Replaying the same state is
/// idempotent.
pub async fn merge_full_state<S: LocalStore>(
    store: &S,
    remote: &FullState,
) -> Result<MergeStats, StoreError> {
    let mut stats = MergeStats::default();

    for recipe in &remote.recipes {
        let local = store.recipe(&recipe.id).await?;
        match resolve(local.as_ref(), recipe) {
            MergeAction::Create => {
                store.upsert_recipe(recipe.clone()).await?;
                stats.created += 1;
            }
            MergeAction::Overwrite => {
                store.upsert_recipe(recipe.clone()).await?;
                stats.overwritten += 1;
            }
            MergeAction::KeepLocal => stats.kept_local += 1,
        }
    }
    debug!(
        collection = Collection::Recipes.as_str(),
        count = remote.recipes.len(),
        "collection merged"
    );

    for meal in &remote.meals {
        if store.recipe(&meal.recipe_id).await?.is_none() {
            debug!(
                meal = %meal.id,
                recipe = %meal.recipe_id,
                "skipping meal referencing unknown recipe"
            );
            stats.meals_skipped += 1;
            continue;
        }
        let local = store.meal(&meal.id).await?;
        match resolve(local.as_ref(), meal) {
            MergeAction::Create => {
                store.upsert_meal(meal.clone()).await?;
                stats.created += 1;
            }
            MergeAction::Overwrite => {
                store.upsert_meal(meal.clone()).await?;
                stats.overwritten += 1;
            }
            MergeAction::KeepLocal => stats.kept_local += 1,
        }
    }
    debug!(
        collection = Collection::Meals.as_str(),
        count = remote.meals.len(),
        "collection merged"
    );

    for item in &remote.shopping_items {
        let local = store.shopping_item(&item.id).await?;
        match resolve(local.as_ref(), item) {
            MergeAction::Create => {
                store.upsert_shopping_item(item.clone()).await?;
                stats.created += 1;
            }
            MergeAction::Overwrite => {
                store.upsert_shopping_item(item.clone()).await?;
                stats.overwritten += 1;
            }
            MergeAction::KeepLocal => stats.kept_local += 1,
        }
    }
    debug!(
        collection = Collection::ShoppingItems.as_str(),
        count = remote.shopping_items.len(),
        "collection merged"
    );

    debug!(
        created = stats.created,
        overwritten = stats.overwritten,
        kept_local = stats.kept_local,
        meals_skipped = stats.meals_skipped,
        "full-state merge complete"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Meal, Recipe, ShoppingItem};
    use crate::store::MemoryStore;

    fn recipe_at(id: &str, updated_at: u64) -> Recipe {
        let mut recipe = Recipe::new("test", 2);
        recipe.id = id.to_string();
        recipe.created_at = updated_at;
        recipe.updated_at = updated_at;
        recipe
    }

    fn meal_for(id: &str, recipe_id: &str) -> Meal {
        let mut meal = Meal::new(recipe_id.to_string(), "2026-09-01", 2);
        meal.id = id.to_string();
        meal
    }

    #[test]
    fn test_resolve_create_when_absent() {
        let remote = recipe_at("r1", 100);
        assert_eq!(resolve(None, &remote), MergeAction::Create);
    }

    #[test]
    fn test_resolve_lww_strict() {
        let local = recipe_at("r1", 100);

        let newer = recipe_at("r1", 200);
        assert_eq!(resolve(Some(&local), &newer), MergeAction::Overwrite);

        let older = recipe_at("r1", 50);
        assert_eq!(resolve(Some(&local), &older), MergeAction::KeepLocal);

        // Ties keep local
        let tied = recipe_at("r1", 100);
        assert_eq!(resolve(Some(&local), &tied), MergeAction::KeepLocal);
    }

    #[tokio::test]
    async fn test_merge_converges_either_direction() {
        // Two entities sharing an id with orderings 100 and 200: merging in
        // either direction must converge on the 200 copy.
        let older = recipe_at("r1", 100);
        let mut newer = recipe_at("r1", 200);
        newer.name = "winner".into();

        let store_a = MemoryStore::new();
        store_a.upsert_recipe(older.clone()).await.unwrap();
        merge_full_state(
            &store_a,
            &FullState {
                recipes: vec![newer.clone()],
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(store_a.recipe(&"r1".to_string()).await.unwrap(), Some(newer.clone()));

        let store_b = MemoryStore::new();
        store_b.upsert_recipe(newer.clone()).await.unwrap();
        merge_full_state(
            &store_b,
            &FullState {
                recipes: vec![older],
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(store_b.recipe(&"r1".to_string()).await.unwrap(), Some(newer));
    }

    #[tokio::test]
    async fn test_remote_edit_beats_older_local_edit() {
        // Peer A created r1 at t=100; we edited our copy at t=50 before
        // first contact. After the merge A wins and our edit is discarded.
        let mut local = recipe_at("r1", 50);
        local.name = "local edit".into();
        let mut remote = recipe_at("r1", 100);
        remote.name = "peer a".into();

        let store = MemoryStore::new();
        store.upsert_recipe(local).await.unwrap();

        merge_full_state(
            &store,
            &FullState {
                recipes: vec![remote],
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let merged = store.recipe(&"r1".to_string()).await.unwrap().unwrap();
        assert_eq!(merged.updated_at, 100);
        assert_eq!(merged.name, "peer a");
    }

    #[tokio::test]
    async fn test_meal_with_unknown_recipe_skipped() {
        let store = MemoryStore::new();
        let remote = FullState {
            meals: vec![meal_for("m1", "missing-recipe")],
            ..Default::default()
        };

        let stats = merge_full_state(&store, &remote).await.unwrap();
        assert_eq!(stats.meals_skipped, 1);
        assert!(store.meals().await.unwrap().is_empty());
        // No other collection was touched
        assert!(store.recipes().await.unwrap().is_empty());
        assert!(store.shopping_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_meal_imports_against_just_merged_recipe() {
        // The referenced recipe arrives in the same response; recipes merge
        // first so the meal import succeeds.
        let store = MemoryStore::new();
        let remote = FullState {
            recipes: vec![recipe_at("r1", 100)],
            meals: vec![meal_for("m1", "r1")],
            ..Default::default()
        };

        let stats = merge_full_state(&store, &remote).await.unwrap();
        assert_eq!(stats.meals_skipped, 0);
        assert_eq!(store.meals().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_merge_is_idempotent_on_replay() {
        let store = MemoryStore::new();
        let remote = FullState {
            recipes: vec![recipe_at("r1", 100), recipe_at("r2", 100)],
            meals: vec![meal_for("m1", "r1")],
            shopping_items: vec![ShoppingItem::new("milk", 1.0, None)],
        };

        merge_full_state(&store, &remote).await.unwrap();
        merge_full_state(&store, &remote).await.unwrap();

        assert_eq!(store.recipes().await.unwrap().len(), 2);
        assert_eq!(store.meals().await.unwrap().len(), 1);
        assert_eq!(store.shopping_items().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_disjoint_states_union() {
        let store = MemoryStore::new();
        store.upsert_recipe(recipe_at("local-r", 10)).await.unwrap();

        let remote = FullState {
            recipes: vec![recipe_at("remote-r", 20)],
            ..Default::default()
        };
        merge_full_state(&store, &remote).await.unwrap();

        let recipes = store.recipes().await.unwrap();
        assert_eq!(recipes.len(), 2);
    }
}
