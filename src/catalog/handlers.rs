use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use super::repo::{self, Ingredient, Tag};
use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct IngredientSearch {
    pub name: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tags", get(list_tags))
        .route("/tags/:id", get(get_tag))
        .route("/ingredients", get(list_ingredients))
        .route("/ingredients/:id", get(get_ingredient))
}

#[instrument(skip(state))]
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>, AppError> {
    Ok(Json(repo::list_tags(&state.db).await?))
}

#[instrument(skip(state))]
pub async fn get_tag(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Tag>, AppError> {
    repo::find_tag(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Tag not found"))
}

#[instrument(skip(state))]
pub async fn list_ingredients(
    State(state): State<AppState>,
    Query(q): Query<IngredientSearch>,
) -> Result<Json<Vec<Ingredient>>, AppError> {
    let prefix = q.name.as_deref().map(str::trim).filter(|s| !s.is_empty());
    Ok(Json(repo::search_ingredients(&state.db, prefix).await?))
}

#[instrument(skip(state))]
pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ingredient>, AppError> {
    repo::find_ingredient(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Ingredient not found"))
}
