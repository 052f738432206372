use std::collections::HashMap;

use anyhow::Context;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::dto::{Profile, RecipeCard};
use crate::{db::conflict_on_duplicate, error::AppError};

// `$1` is the viewer; NULL makes every `is_subscribed` false.
const PROFILE_COLUMNS: &str = r#"
    u.id, u.email, u.username, u.first_name, u.last_name,
    EXISTS(SELECT 1 FROM follows f WHERE f.author_id = u.id AND f.user_id = $1) AS is_subscribed
"#;

pub async fn list_profiles(db: &PgPool, viewer: Option<Uuid>) -> Result<Vec<Profile>, AppError> {
    let rows = sqlx::query_as::<_, Profile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM users u ORDER BY u.username"
    ))
    .bind(viewer)
    .fetch_all(db)
    .await
    .context("list profiles")?;
    Ok(rows)
}

pub async fn find_profile(db: &PgPool, viewer: Option<Uuid>, id: Uuid) -> Result<Option<Profile>, AppError> {
    let row = sqlx::query_as::<_, Profile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM users u WHERE u.id = $2"
    ))
    .bind(viewer)
    .bind(id)
    .fetch_optional(db)
    .await
    .context("find profile")?;
    Ok(row)
}

pub async fn find_profiles(db: &PgPool, viewer: Option<Uuid>, ids: &[Uuid]) -> Result<Vec<Profile>, AppError> {
    let rows = sqlx::query_as::<_, Profile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM users u WHERE u.id = ANY($2)"
    ))
    .bind(viewer)
    .bind(ids)
    .fetch_all(db)
    .await
    .context("find profiles")?;
    Ok(rows)
}

/// Authors the user follows, ordered by username.
pub async fn list_followed(db: &PgPool, user_id: Uuid) -> Result<Vec<Profile>, AppError> {
    let rows = sqlx::query_as::<_, Profile>(&format!(
        r#"
        SELECT {PROFILE_COLUMNS}
          FROM users u
          JOIN follows fo ON fo.author_id = u.id
         WHERE fo.user_id = $1
         ORDER BY u.username
        "#
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("list followed authors")?;
    Ok(rows)
}

#[derive(FromRow)]
struct AuthoredCard {
    author_id: Uuid,
    id: Uuid,
    name: String,
    cooking_time: i32,
}

/// Recipes of several authors in one query, newest first per author.
pub async fn recipes_by_authors(
    db: &PgPool,
    author_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<RecipeCard>>, AppError> {
    let rows = sqlx::query_as::<_, AuthoredCard>(
        r#"
        SELECT author_id, id, name, cooking_time
          FROM recipes
         WHERE author_id = ANY($1)
         ORDER BY created_at DESC, id
        "#,
    )
    .bind(author_ids)
    .fetch_all(db)
    .await
    .context("recipes by authors")?;

    let mut out: HashMap<Uuid, Vec<RecipeCard>> = HashMap::new();
    for r in rows {
        out.entry(r.author_id).or_default().push(RecipeCard {
            id: r.id,
            name: r.name,
            cooking_time: r.cooking_time,
        });
    }
    Ok(out)
}

pub async fn follow(db: &PgPool, user_id: Uuid, author_id: Uuid) -> Result<(), AppError> {
    sqlx::query("INSERT INTO follows (user_id, author_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(author_id)
        .execute(db)
        .await
        .map_err(|e| conflict_on_duplicate(e, "Already subscribed to this author"))?;
    Ok(())
}

/// Returns false when there was nothing to delete.
pub async fn unfollow(db: &PgPool, user_id: Uuid, author_id: Uuid) -> Result<bool, AppError> {
    let res = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(db)
        .await
        .context("delete follow")?;
    Ok(res.rows_affected() > 0)
}
