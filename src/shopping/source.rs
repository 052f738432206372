use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::model::{LineItem, LineItemRow};
use crate::error::AppError;

/// Read side of cart membership: flattens the recipes of a cart into line items.
///
/// Implementations must fetch all rows for a cart in one round trip.
#[async_trait]
pub trait CartSource: Send + Sync {
    /// Line items of every recipe in the user's persisted cart.
    /// Fails with `NotFound` when the user does not exist.
    async fn fetch_line_items_for_user_cart(&self, user_id: Uuid) -> Result<Vec<LineItem>, AppError>;

    /// Line items of the given recipes. `recipe_ids` is already deduplicated.
    /// Fails with `NotFound` when any recipe does not exist.
    async fn fetch_line_items_for_recipes(&self, recipe_ids: &[Uuid]) -> Result<Vec<LineItem>, AppError>;
}

#[derive(Clone)]
pub struct PgCartSource {
    db: PgPool,
}

impl PgCartSource {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CartSource for PgCartSource {
    async fn fetch_line_items_for_user_cart(&self, user_id: Uuid) -> Result<Vec<LineItem>, AppError> {
        let known: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;
        if !known {
            return Err(AppError::not_found("User not found"));
        }

        let rows = sqlx::query_as::<_, LineItemRow>(
            r#"
            SELECT i.name, i.measurement_unit, ri.amount
              FROM shopping_cart sc
              JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
              JOIN ingredients i ON i.id = ri.ingredient_id
             WHERE sc.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(LineItem::from).collect())
    }

    async fn fetch_line_items_for_recipes(&self, recipe_ids: &[Uuid]) -> Result<Vec<LineItem>, AppError> {
        if recipe_ids.is_empty() {
            return Ok(Vec::new());
        }

        let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipes WHERE id = ANY($1)")
            .bind(recipe_ids)
            .fetch_one(&self.db)
            .await?;
        if found != recipe_ids.len() as i64 {
            return Err(AppError::not_found("Recipe not found"));
        }

        let rows = sqlx::query_as::<_, LineItemRow>(
            r#"
            SELECT i.name, i.measurement_unit, ri.amount
              FROM recipe_ingredients ri
              JOIN ingredients i ON i.id = ri.ingredient_id
             WHERE ri.recipe_id = ANY($1)
            "#,
        )
        .bind(recipe_ids)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(LineItem::from).collect())
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::{HashMap, HashSet};

    use super::*;

    /// In-memory cart source used by unit and router tests.
    #[derive(Default, Clone)]
    pub struct MemoryCartSource {
        pub users: HashSet<Uuid>,
        pub recipes: HashMap<Uuid, Vec<LineItem>>,
        pub carts: HashMap<Uuid, Vec<Uuid>>,
    }

    impl MemoryCartSource {
        pub fn with_recipe(mut self, recipe_id: Uuid, items: Vec<LineItem>) -> Self {
            self.recipes.insert(recipe_id, items);
            self
        }

        pub fn with_cart(mut self, user_id: Uuid, recipe_ids: Vec<Uuid>) -> Self {
            self.users.insert(user_id);
            self.carts.insert(user_id, recipe_ids);
            self
        }
    }

    #[async_trait]
    impl CartSource for MemoryCartSource {
        async fn fetch_line_items_for_user_cart(&self, user_id: Uuid) -> Result<Vec<LineItem>, AppError> {
            if !self.users.contains(&user_id) {
                return Err(AppError::not_found("User not found"));
            }
            let ids = self.carts.get(&user_id).cloned().unwrap_or_default();
            self.fetch_line_items_for_recipes(&ids).await
        }

        async fn fetch_line_items_for_recipes(&self, recipe_ids: &[Uuid]) -> Result<Vec<LineItem>, AppError> {
            let mut out = Vec::new();
            for id in recipe_ids {
                let items = self
                    .recipes
                    .get(id)
                    .ok_or_else(|| AppError::not_found("Recipe not found"))?;
                out.extend(items.iter().cloned());
            }
            Ok(out)
        }
    }
}
