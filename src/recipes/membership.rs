use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::repo;
use crate::{error::AppError, users::dto::RecipeCard};

/// Per-user recipe collections that share add/remove semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    pub(crate) fn table(self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "shopping_cart",
        }
    }

    pub(crate) fn duplicate_message(self) -> &'static str {
        match self {
            RecipeList::Favorites => "Recipe is already in favorites",
            RecipeList::ShoppingCart => "Recipe is already in the shopping cart",
        }
    }

    pub(crate) fn missing_message(self) -> &'static str {
        match self {
            RecipeList::Favorites => "Recipe is not in favorites",
            RecipeList::ShoppingCart => "Recipe is not in the shopping cart",
        }
    }
}

/// Storage of (user, recipe) pairs per list.
///
/// `insert` must fail with `Conflict` when the pair is already present.
#[async_trait]
pub trait RecipeListStore: Send + Sync {
    async fn find_card(&self, recipe_id: Uuid) -> Result<Option<RecipeCard>, AppError>;

    async fn insert(&self, list: RecipeList, user_id: Uuid, recipe_id: Uuid) -> Result<(), AppError>;

    /// Returns false when the pair was not present.
    async fn delete(&self, list: RecipeList, user_id: Uuid, recipe_id: Uuid) -> Result<bool, AppError>;
}

#[derive(Clone)]
pub struct PgRecipeListStore {
    db: PgPool,
}

impl PgRecipeListStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecipeListStore for PgRecipeListStore {
    async fn find_card(&self, recipe_id: Uuid) -> Result<Option<RecipeCard>, AppError> {
        repo::find_card(&self.db, recipe_id).await
    }

    async fn insert(&self, list: RecipeList, user_id: Uuid, recipe_id: Uuid) -> Result<(), AppError> {
        repo::add_to_list(&self.db, list, user_id, recipe_id).await
    }

    async fn delete(&self, list: RecipeList, user_id: Uuid, recipe_id: Uuid) -> Result<bool, AppError> {
        repo::remove_from_list(&self.db, list, user_id, recipe_id).await
    }
}

/// Adds a recipe to the list. A second add of the same recipe is a conflict.
pub async fn add(
    store: &dyn RecipeListStore,
    list: RecipeList,
    user_id: Uuid,
    recipe_id: Uuid,
) -> Result<RecipeCard, AppError> {
    let card = store
        .find_card(recipe_id)
        .await?
        .ok_or_else(|| AppError::not_found("Recipe not found"))?;

    if let Err(e) = store.insert(list, user_id, recipe_id).await {
        if matches!(e, AppError::Conflict(_)) {
            warn!(%user_id, %recipe_id, ?list, "duplicate list entry");
        }
        return Err(e);
    }

    info!(%user_id, %recipe_id, ?list, "recipe added");
    Ok(card)
}

/// Removes a recipe from the list. Removing a recipe that is not there is
/// `NotFound`, same as removing an unknown recipe.
pub async fn remove(
    store: &dyn RecipeListStore,
    list: RecipeList,
    user_id: Uuid,
    recipe_id: Uuid,
) -> Result<(), AppError> {
    if store.find_card(recipe_id).await?.is_none() {
        return Err(AppError::not_found("Recipe not found"));
    }
    if !store.delete(list, user_id, recipe_id).await? {
        warn!(%user_id, %recipe_id, ?list, "remove of absent list entry");
        return Err(AppError::not_found(list.missing_message()));
    }
    info!(%user_id, %recipe_id, ?list, "recipe removed");
    Ok(())
}

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use super::*;

    /// In-memory list store; pairs are unique per list like the primary keys.
    #[derive(Default)]
    pub struct MemoryRecipeListStore {
        pub recipes: HashMap<Uuid, RecipeCard>,
        entries: Mutex<HashSet<(RecipeList, Uuid, Uuid)>>,
    }

    impl MemoryRecipeListStore {
        pub fn with_recipe(mut self, recipe_id: Uuid, name: &str) -> Self {
            self.recipes.insert(
                recipe_id,
                RecipeCard {
                    id: recipe_id,
                    name: name.into(),
                    cooking_time: 10,
                },
            );
            self
        }

        pub fn contains(&self, list: RecipeList, user_id: Uuid, recipe_id: Uuid) -> bool {
            self.entries
                .lock()
                .expect("entries lock")
                .contains(&(list, user_id, recipe_id))
        }
    }

    #[async_trait]
    impl RecipeListStore for MemoryRecipeListStore {
        async fn find_card(&self, recipe_id: Uuid) -> Result<Option<RecipeCard>, AppError> {
            Ok(self.recipes.get(&recipe_id).cloned())
        }

        async fn insert(&self, list: RecipeList, user_id: Uuid, recipe_id: Uuid) -> Result<(), AppError> {
            let mut entries = self.entries.lock().expect("entries lock");
            if !entries.insert((list, user_id, recipe_id)) {
                return Err(AppError::conflict(list.duplicate_message()));
            }
            Ok(())
        }

        async fn delete(&self, list: RecipeList, user_id: Uuid, recipe_id: Uuid) -> Result<bool, AppError> {
            Ok(self
                .entries
                .lock()
                .expect("entries lock")
                .remove(&(list, user_id, recipe_id)))
        }
    }
}
