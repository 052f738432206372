use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Identity of an ingredient inside a shopping list.
///
/// Field order matters: the derived `Ord` sorts by name, then unit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IngredientRef {
    pub name: String,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub ingredient: IngredientRef,
    pub amount: i64,
}

impl LineItem {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, amount: i64) -> Self {
        Self {
            ingredient: IngredientRef {
                name: name.into(),
                unit: unit.into(),
            },
            amount,
        }
    }
}

/// Flat row produced by the joined cart query.
#[derive(Debug, FromRow)]
pub struct LineItemRow {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<LineItemRow> for LineItem {
    fn from(r: LineItemRow) -> Self {
        LineItem::new(r.name, r.measurement_unit, i64::from(r.amount))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateLine {
    #[serde(flatten)]
    pub ingredient: IngredientRef,
    pub total_amount: i64,
}

/// Whose cart is being aggregated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartScope {
    /// Persisted cart of an authenticated user.
    User(Uuid),
    /// Recipes supplied by an anonymous caller.
    Session(Vec<Uuid>),
}
