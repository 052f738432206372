use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{Profile, RecipeCard, Subscription, SubscriptionsQuery},
    repo,
};
use crate::{
    auth::{AuthUser, MaybeAuthUser},
    error::AppError,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/subscriptions", get(subscriptions))
        .route("/users/:id", get(get_user))
        .route("/users/:id/subscribe", post(subscribe).delete(unsubscribe))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
) -> Result<Json<Vec<Profile>>, AppError> {
    Ok(Json(repo::list_profiles(&state.db, viewer).await?))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Profile>, AppError> {
    repo::find_profile(&state.db, viewer, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("User not found"))
}

#[instrument(skip(state))]
pub async fn subscriptions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<SubscriptionsQuery>,
) -> Result<Json<Vec<Subscription>>, AppError> {
    let authors = repo::list_followed(&state.db, user_id).await?;
    let ids: Vec<Uuid> = authors.iter().map(|a| a.id).collect();
    let mut recipes = repo::recipes_by_authors(&state.db, &ids).await?;
    Ok(Json(assemble_subscriptions(authors, &mut recipes, q.recipes_limit)))
}

#[instrument(skip(state))]
pub async fn subscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(author_id): Path<Uuid>,
    Query(q): Query<SubscriptionsQuery>,
) -> Result<(StatusCode, Json<Subscription>), AppError> {
    ensure_not_self(user_id, author_id)?;
    if repo::find_profile(&state.db, None, author_id).await?.is_none() {
        return Err(AppError::not_found("User not found"));
    }

    repo::follow(&state.db, user_id, author_id).await?;
    info!(%user_id, %author_id, "subscribed");

    let author = repo::find_profile(&state.db, Some(user_id), author_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let mut recipes = repo::recipes_by_authors(&state.db, &[author_id]).await?;
    let view = assemble_subscriptions(vec![author], &mut recipes, q.recipes_limit)
        .pop()
        .ok_or_else(|| anyhow::anyhow!("subscription view missing"))?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(skip(state))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(author_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    ensure_not_self(user_id, author_id)?;
    if !repo::unfollow(&state.db, user_id, author_id).await? {
        warn!(%user_id, %author_id, "unsubscribe from author not followed");
        return Err(AppError::not_found("Not subscribed to this author"));
    }
    info!(%user_id, %author_id, "unsubscribed");
    Ok(StatusCode::NO_CONTENT)
}

fn ensure_not_self(user_id: Uuid, author_id: Uuid) -> Result<(), AppError> {
    if user_id == author_id {
        warn!(%user_id, "self subscription attempted");
        return Err(AppError::validation("Cannot subscribe to yourself"));
    }
    Ok(())
}

fn assemble_subscriptions(
    authors: Vec<Profile>,
    recipes: &mut HashMap<Uuid, Vec<RecipeCard>>,
    limit: Option<usize>,
) -> Vec<Subscription> {
    authors
        .into_iter()
        .map(|author| {
            let mut cards = recipes.remove(&author.id).unwrap_or_default();
            let recipes_count = cards.len() as i64;
            if let Some(limit) = limit {
                cards.truncate(limit);
            }
            Subscription {
                author,
                recipes: cards,
                recipes_count,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use super::*;
    use crate::{app::build_app, state::AppState};

    fn profile(id: Uuid, username: &str) -> Profile {
        Profile {
            id,
            email: format!("{username}@example.com"),
            username: username.into(),
            first_name: "First".into(),
            last_name: "Last".into(),
            is_subscribed: true,
        }
    }

    fn card(name: &str) -> RecipeCard {
        RecipeCard {
            id: Uuid::new_v4(),
            name: name.into(),
            cooking_time: 10,
        }
    }

    #[test]
    fn subscriptions_count_all_recipes_but_show_limited() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut recipes = HashMap::from([(a, vec![card("one"), card("two"), card("three")])]);
        let subs = assemble_subscriptions(vec![profile(a, "anna"), profile(b, "bob")], &mut recipes, Some(2));

        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].recipes_count, 3);
        assert_eq!(subs[0].recipes.len(), 2);
        assert_eq!(subs[0].recipes[0].name, "one");
        assert_eq!(subs[1].recipes_count, 0);
        assert!(subs[1].recipes.is_empty());
    }

    #[test]
    fn subscription_serializes_flat() {
        let sub = Subscription {
            author: profile(Uuid::new_v4(), "anna"),
            recipes: vec![card("soup")],
            recipes_count: 1,
        };
        let json = serde_json::to_value(&sub).unwrap();
        assert_eq!(json["username"], "anna");
        assert_eq!(json["is_subscribed"], true);
        assert_eq!(json["recipes"][0]["name"], "soup");
    }

    #[test]
    fn self_subscription_is_rejected() {
        let id = Uuid::new_v4();
        assert!(matches!(ensure_not_self(id, id), Err(AppError::Validation(_))));
        assert!(ensure_not_self(id, Uuid::new_v4()).is_ok());
    }

    #[tokio::test]
    async fn self_subscription_fails_before_any_query() {
        let state = AppState::fake();
        let user_id = Uuid::new_v4();
        let token = state.test_token(user_id);
        let res = build_app(state)
            .oneshot(
                Request::post(format!("/api/v1/users/{user_id}/subscribe"))
                    .header("Authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
