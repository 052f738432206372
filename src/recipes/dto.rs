use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{catalog::repo::Tag, users::dto::Profile};

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientAmount {
    pub id: Uuid,
    pub amount: i32,
}

/// Body of create and update; update replaces every field.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeRequest {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    #[serde(default)]
    pub tags: Vec<Uuid>,
    #[serde(default)]
    pub ingredients: Vec<IngredientAmount>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecipeFilter {
    pub author: Option<Uuid>,
    /// Comma separated tag slugs, any of which must match.
    pub tags: Option<String>,
    #[serde(default, deserialize_with = "query_flag")]
    pub is_favorited: bool,
    #[serde(default, deserialize_with = "query_flag")]
    pub is_in_shopping_cart: bool,
}

/// Accepts `1`/`0` as well as `true`/`false`.
fn query_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(d)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!("invalid flag {other:?}"))),
    }
}

impl RecipeFilter {
    pub fn tag_slugs(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeIngredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    pub id: Uuid,
    pub name: String,
    pub author: Profile,
    pub text: String,
    pub cooking_time: i32,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub created_at: OffsetDateTime,
}
