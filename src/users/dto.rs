use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Public profile as seen by the caller.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

/// Compact recipe card used in subscription listings and membership replies.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecipeCard {
    pub id: Uuid,
    pub name: String,
    pub cooking_time: i32,
}

#[derive(Debug, Serialize)]
pub struct Subscription {
    #[serde(flatten)]
    pub author: Profile,
    pub recipes: Vec<RecipeCard>,
    pub recipes_count: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionsQuery {
    pub recipes_limit: Option<usize>,
}
