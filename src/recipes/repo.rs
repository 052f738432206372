use std::collections::HashMap;

use anyhow::Context;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    dto::{IngredientAmount, RecipeIngredient},
    membership::RecipeList,
};
use crate::{
    catalog::repo::Tag,
    db::conflict_on_duplicate,
    error::AppError,
    users::dto::RecipeCard,
};

#[derive(Debug, Clone, FromRow)]
pub struct RecipeRow {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub created_at: OffsetDateTime,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

/// Selection applied by [`list_recipes`].
#[derive(Debug, Default)]
pub struct RecipeQuery {
    pub id: Option<Uuid>,
    pub author: Option<Uuid>,
    pub tag_slugs: Vec<String>,
    pub favorited_by: Option<Uuid>,
    pub in_cart_of: Option<Uuid>,
}

pub async fn list_recipes(
    db: &PgPool,
    viewer: Option<Uuid>,
    q: &RecipeQuery,
) -> Result<Vec<RecipeRow>, AppError> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT r.id, r.author_id, r.name, r.text, r.cooking_time, r.created_at, \
         EXISTS(SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ",
    );
    qb.push_bind(viewer);
    qb.push(
        ") AS is_favorited, \
         EXISTS(SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ",
    );
    qb.push_bind(viewer);
    qb.push(") AS is_in_shopping_cart FROM recipes r WHERE TRUE");

    if let Some(id) = q.id {
        qb.push(" AND r.id = ").push_bind(id);
    }
    if let Some(author) = q.author {
        qb.push(" AND r.author_id = ").push_bind(author);
    }
    if !q.tag_slugs.is_empty() {
        qb.push(
            " AND EXISTS(SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id \
             WHERE rt.recipe_id = r.id AND t.slug = ANY(",
        )
        .push_bind(q.tag_slugs.clone())
        .push("))");
    }
    if let Some(user) = q.favorited_by {
        qb.push(" AND EXISTS(SELECT 1 FROM favorites f2 WHERE f2.recipe_id = r.id AND f2.user_id = ")
            .push_bind(user)
            .push(")");
    }
    if let Some(user) = q.in_cart_of {
        qb.push(" AND EXISTS(SELECT 1 FROM shopping_cart c2 WHERE c2.recipe_id = r.id AND c2.user_id = ")
            .push_bind(user)
            .push(")");
    }
    qb.push(" ORDER BY r.created_at DESC, r.id");

    let rows = qb
        .build_query_as::<RecipeRow>()
        .fetch_all(db)
        .await
        .context("list recipes")?;
    Ok(rows)
}

#[derive(FromRow)]
struct TagLink {
    recipe_id: Uuid,
    id: Uuid,
    name: String,
    color: String,
    slug: String,
}

pub async fn tags_for(db: &PgPool, recipe_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Tag>>, AppError> {
    let rows = sqlx::query_as::<_, TagLink>(
        r#"
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
          FROM recipe_tags rt
          JOIN tags t ON t.id = rt.tag_id
         WHERE rt.recipe_id = ANY($1)
         ORDER BY t.name
        "#,
    )
    .bind(recipe_ids)
    .fetch_all(db)
    .await
    .context("tags for recipes")?;

    let mut out: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    for r in rows {
        out.entry(r.recipe_id).or_default().push(Tag {
            id: r.id,
            name: r.name,
            color: r.color,
            slug: r.slug,
        });
    }
    Ok(out)
}

#[derive(FromRow)]
struct IngredientLink {
    recipe_id: Uuid,
    id: Uuid,
    name: String,
    measurement_unit: String,
    amount: i32,
}

pub async fn ingredients_for(
    db: &PgPool,
    recipe_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<RecipeIngredient>>, AppError> {
    let rows = sqlx::query_as::<_, IngredientLink>(
        r#"
        SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
          FROM recipe_ingredients ri
          JOIN ingredients i ON i.id = ri.ingredient_id
         WHERE ri.recipe_id = ANY($1)
         ORDER BY ri.position
        "#,
    )
    .bind(recipe_ids)
    .fetch_all(db)
    .await
    .context("ingredients for recipes")?;

    let mut out: HashMap<Uuid, Vec<RecipeIngredient>> = HashMap::new();
    for r in rows {
        out.entry(r.recipe_id).or_default().push(RecipeIngredient {
            id: r.id,
            name: r.name,
            measurement_unit: r.measurement_unit,
            amount: r.amount,
        });
    }
    Ok(out)
}

pub async fn find_author(db: &PgPool, recipe_id: Uuid) -> Result<Option<Uuid>, AppError> {
    let author = sqlx::query_scalar::<_, Uuid>("SELECT author_id FROM recipes WHERE id = $1")
        .bind(recipe_id)
        .fetch_optional(db)
        .await
        .context("find recipe author")?;
    Ok(author)
}

pub async fn find_card(db: &PgPool, recipe_id: Uuid) -> Result<Option<RecipeCard>, AppError> {
    let card = sqlx::query_as::<_, RecipeCard>("SELECT id, name, cooking_time FROM recipes WHERE id = $1")
        .bind(recipe_id)
        .fetch_optional(db)
        .await
        .context("find recipe card")?;
    Ok(card)
}

async fn count_existing(db: &PgPool, table: &str, ids: &[Uuid]) -> Result<usize, AppError> {
    let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE id = ANY($1)"))
        .bind(ids)
        .fetch_one(db)
        .await
        .with_context(|| format!("count {table}"))?;
    Ok(n as usize)
}

pub async fn all_ingredients_exist(db: &PgPool, ids: &[Uuid]) -> Result<bool, AppError> {
    Ok(ids.is_empty() || count_existing(db, "ingredients", ids).await? == ids.len())
}

pub async fn all_tags_exist(db: &PgPool, ids: &[Uuid]) -> Result<bool, AppError> {
    Ok(ids.is_empty() || count_existing(db, "tags", ids).await? == ids.len())
}

pub struct RecipeFields<'a> {
    pub name: &'a str,
    pub text: &'a str,
    pub cooking_time: i32,
}

const DUPLICATE_NAME: &str = "A recipe with this name already exists";

pub async fn insert_recipe_tx(
    tx: &mut Transaction<'_, Postgres>,
    author_id: Uuid,
    fields: &RecipeFields<'_>,
) -> Result<Uuid, AppError> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO recipes (author_id, name, text, cooking_time)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(author_id)
    .bind(fields.name)
    .bind(fields.text)
    .bind(fields.cooking_time)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| conflict_on_duplicate(e, DUPLICATE_NAME))
}

pub async fn update_recipe_tx(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    fields: &RecipeFields<'_>,
) -> Result<(), AppError> {
    sqlx::query("UPDATE recipes SET name = $2, text = $3, cooking_time = $4 WHERE id = $1")
        .bind(recipe_id)
        .bind(fields.name)
        .bind(fields.text)
        .bind(fields.cooking_time)
        .execute(&mut **tx)
        .await
        .map_err(|e| conflict_on_duplicate(e, DUPLICATE_NAME))?;
    Ok(())
}

/// Replaces the tag links and line items of a recipe, keeping request order.
pub async fn replace_links_tx(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    tags: &[Uuid],
    ingredients: &[IngredientAmount],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await
        .context("clear recipe tags")?;
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await
        .context("clear recipe ingredients")?;

    if !tags.is_empty() {
        sqlx::query(
            "INSERT INTO recipe_tags (recipe_id, tag_id) SELECT $1, t FROM UNNEST($2::uuid[]) AS t",
        )
        .bind(recipe_id)
        .bind(tags)
        .execute(&mut **tx)
        .await
        .context("insert recipe tags")?;
    }

    if !ingredients.is_empty() {
        let ids: Vec<Uuid> = ingredients.iter().map(|i| i.id).collect();
        let amounts: Vec<i32> = ingredients.iter().map(|i| i.amount).collect();
        sqlx::query(
            r#"
            INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount, position)
            SELECT $1, x.ingredient_id, x.amount, x.position::int
              FROM UNNEST($2::uuid[], $3::int[]) WITH ORDINALITY AS x(ingredient_id, amount, position)
            "#,
        )
        .bind(recipe_id)
        .bind(&ids)
        .bind(&amounts)
        .execute(&mut **tx)
        .await
        .context("insert recipe ingredients")?;
    }
    Ok(())
}

pub async fn delete_recipe(db: &PgPool, recipe_id: Uuid) -> Result<(), AppError> {
    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe_id)
        .execute(db)
        .await
        .context("delete recipe")?;
    Ok(())
}

pub async fn add_to_list(db: &PgPool, list: RecipeList, user_id: Uuid, recipe_id: Uuid) -> Result<(), AppError> {
    sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2)",
        list.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(db)
    .await
    .map_err(|e| conflict_on_duplicate(e, list.duplicate_message()))?;
    Ok(())
}

/// Returns false when the recipe was not in the list.
pub async fn remove_from_list(
    db: &PgPool,
    list: RecipeList,
    user_id: Uuid,
    recipe_id: Uuid,
) -> Result<bool, AppError> {
    let res = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        list.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(db)
    .await
    .with_context(|| format!("delete from {}", list.table()))?;
    Ok(res.rows_affected() > 0)
}
