use std::collections::{HashMap, HashSet};

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{RecipeFilter, RecipeIngredient, RecipeRequest, RecipeResponse},
    repo::{self, RecipeFields, RecipeQuery, RecipeRow},
};
use crate::{
    catalog::repo::Tag,
    error::AppError,
    users::{dto::Profile, repo as users_repo},
};

const MAX_NAME_LEN: usize = 150;

pub(crate) fn validate_request(req: &RecipeRequest) -> Result<(), AppError> {
    let name = req.name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(format!(
            "name must be 1 to {MAX_NAME_LEN} characters"
        )));
    }
    if req.text.trim().is_empty() {
        return Err(AppError::validation("text must not be empty"));
    }
    if req.cooking_time < 1 {
        return Err(AppError::validation("cooking_time must be at least 1"));
    }

    let mut seen = HashSet::new();
    for item in &req.ingredients {
        if item.amount < 1 {
            return Err(AppError::validation("ingredient amount must be at least 1"));
        }
        if !seen.insert(item.id) {
            return Err(AppError::validation(format!(
                "ingredient {} is listed twice",
                item.id
            )));
        }
    }

    let mut seen = HashSet::new();
    if !req.tags.iter().all(|t| seen.insert(*t)) {
        return Err(AppError::validation("tags must not repeat"));
    }
    Ok(())
}

async fn check_references(db: &PgPool, req: &RecipeRequest) -> Result<(), AppError> {
    let ingredient_ids: Vec<Uuid> = req.ingredients.iter().map(|i| i.id).collect();
    if !repo::all_ingredients_exist(db, &ingredient_ids).await? {
        return Err(AppError::not_found("Ingredient not found"));
    }
    if !repo::all_tags_exist(db, &req.tags).await? {
        return Err(AppError::not_found("Tag not found"));
    }
    Ok(())
}

fn fields(req: &RecipeRequest) -> RecipeFields<'_> {
    RecipeFields {
        name: req.name.trim(),
        text: req.text.trim(),
        cooking_time: req.cooking_time,
    }
}

/// Loads recipes with authors, tags and ingredients; one query per relation.
pub async fn hydrate(db: &PgPool, viewer: Option<Uuid>, rows: Vec<RecipeRow>) -> Result<Vec<RecipeResponse>, AppError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut author_ids: Vec<Uuid> = rows.iter().map(|r| r.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let authors = users_repo::find_profiles(db, viewer, &author_ids).await?;
    let tags = repo::tags_for(db, &ids).await?;
    let ingredients = repo::ingredients_for(db, &ids).await?;
    assemble(rows, authors, tags, ingredients)
}

fn assemble(
    rows: Vec<RecipeRow>,
    authors: Vec<Profile>,
    mut tags: HashMap<Uuid, Vec<Tag>>,
    mut ingredients: HashMap<Uuid, Vec<RecipeIngredient>>,
) -> Result<Vec<RecipeResponse>, AppError> {
    let authors: HashMap<Uuid, Profile> = authors.into_iter().map(|p| (p.id, p)).collect();

    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        let author = authors
            .get(&r.author_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("author {} of recipe {} missing", r.author_id, r.id))?;
        out.push(RecipeResponse {
            id: r.id,
            name: r.name,
            author,
            text: r.text,
            cooking_time: r.cooking_time,
            tags: tags.remove(&r.id).unwrap_or_default(),
            ingredients: ingredients.remove(&r.id).unwrap_or_default(),
            is_favorited: r.is_favorited,
            is_in_shopping_cart: r.is_in_shopping_cart,
            created_at: r.created_at,
        });
    }
    Ok(out)
}

/// Turns query-string filters into a repository query. `None` means the
/// filters cannot match anything for this caller.
pub(crate) fn build_query(viewer: Option<Uuid>, filter: &RecipeFilter) -> Option<RecipeQuery> {
    if (filter.is_favorited || filter.is_in_shopping_cart) && viewer.is_none() {
        return None;
    }
    Some(RecipeQuery {
        id: None,
        author: filter.author,
        tag_slugs: filter.tag_slugs(),
        favorited_by: viewer.filter(|_| filter.is_favorited),
        in_cart_of: viewer.filter(|_| filter.is_in_shopping_cart),
    })
}

pub async fn list(db: &PgPool, viewer: Option<Uuid>, filter: &RecipeFilter) -> Result<Vec<RecipeResponse>, AppError> {
    let Some(query) = build_query(viewer, filter) else {
        return Ok(Vec::new());
    };
    let rows = repo::list_recipes(db, viewer, &query).await?;
    hydrate(db, viewer, rows).await
}

pub async fn get(db: &PgPool, viewer: Option<Uuid>, id: Uuid) -> Result<RecipeResponse, AppError> {
    let query = RecipeQuery {
        id: Some(id),
        ..RecipeQuery::default()
    };
    let rows = repo::list_recipes(db, viewer, &query).await?;
    hydrate(db, viewer, rows)
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Recipe not found"))
}

pub async fn create(db: &PgPool, author_id: Uuid, req: RecipeRequest) -> Result<RecipeResponse, AppError> {
    validate_request(&req)?;
    check_references(db, &req).await?;

    let mut tx = db.begin().await?;
    let id = repo::insert_recipe_tx(&mut tx, author_id, &fields(&req)).await?;
    repo::replace_links_tx(&mut tx, id, &req.tags, &req.ingredients).await?;
    tx.commit().await?;

    info!(recipe_id = %id, %author_id, "recipe created");
    get(db, Some(author_id), id).await
}

async fn ensure_author(db: &PgPool, user_id: Uuid, recipe_id: Uuid) -> Result<(), AppError> {
    let author = repo::find_author(db, recipe_id)
        .await?
        .ok_or_else(|| AppError::not_found("Recipe not found"))?;
    if author != user_id {
        warn!(%user_id, %recipe_id, "edit of foreign recipe");
        return Err(AppError::Forbidden("Only the author can change this recipe".into()));
    }
    Ok(())
}

pub async fn update(db: &PgPool, user_id: Uuid, recipe_id: Uuid, req: RecipeRequest) -> Result<RecipeResponse, AppError> {
    validate_request(&req)?;
    ensure_author(db, user_id, recipe_id).await?;
    check_references(db, &req).await?;

    let mut tx = db.begin().await?;
    repo::update_recipe_tx(&mut tx, recipe_id, &fields(&req)).await?;
    repo::replace_links_tx(&mut tx, recipe_id, &req.tags, &req.ingredients).await?;
    tx.commit().await?;

    info!(%recipe_id, "recipe updated");
    get(db, Some(user_id), recipe_id).await
}

pub async fn delete(db: &PgPool, user_id: Uuid, recipe_id: Uuid) -> Result<(), AppError> {
    ensure_author(db, user_id, recipe_id).await?;
    repo::delete_recipe(db, recipe_id).await?;
    info!(%recipe_id, "recipe deleted");
    Ok(())
}
