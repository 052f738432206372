use std::collections::BTreeMap;

use tracing::debug;

use super::{
    model::{AggregateLine, CartScope, IngredientRef, LineItem},
    source::CartSource,
};
use crate::error::AppError;

/// Resolves a cart to its consolidated shopping list.
///
/// The list is sorted by ingredient name, then unit, and contains one line per
/// `(name, unit)` pair. Either the whole list is returned or an error.
pub async fn aggregate(source: &dyn CartSource, scope: &CartScope) -> Result<Vec<AggregateLine>, AppError> {
    let items = match scope {
        CartScope::User(user_id) => source.fetch_line_items_for_user_cart(*user_id).await?,
        CartScope::Session(recipe_ids) => {
            let ids = dedup_ids(recipe_ids);
            source.fetch_line_items_for_recipes(&ids).await?
        }
    };
    let fetched = items.len();
    let lines = aggregate_line_items(items)?;
    debug!(fetched, aggregated = lines.len(), "shopping list aggregated");
    Ok(lines)
}

/// Groups line items by ingredient and sums their amounts.
pub fn aggregate_line_items<I>(items: I) -> Result<Vec<AggregateLine>, AppError>
where
    I: IntoIterator<Item = LineItem>,
{
    let mut groups: BTreeMap<IngredientRef, i64> = BTreeMap::new();
    for item in items {
        validate(&item)?;
        let total = groups.entry(item.ingredient).or_insert(0);
        *total = total
            .checked_add(item.amount)
            .ok_or_else(|| AppError::validation("Ingredient total is out of range"))?;
    }

    Ok(groups
        .into_iter()
        .map(|(ingredient, total_amount)| AggregateLine {
            ingredient,
            total_amount,
        })
        .collect())
}

fn validate(item: &LineItem) -> Result<(), AppError> {
    if item.ingredient.name.trim().is_empty() {
        return Err(AppError::validation("Ingredient name must not be empty"));
    }
    if item.ingredient.unit.trim().is_empty() {
        return Err(AppError::validation(format!(
            "Measurement unit of {} must not be empty",
            item.ingredient.name
        )));
    }
    if item.amount <= 0 {
        return Err(AppError::validation(format!(
            "Amount of {} must be positive, got {}",
            item.ingredient.name, item.amount
        )));
    }
    Ok(())
}

// A cart is a set of recipes; keep first-seen order.
fn dedup_ids(ids: &[uuid::Uuid]) -> Vec<uuid::Uuid> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
