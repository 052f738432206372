use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{RecipeFilter, RecipeRequest, RecipeResponse},
    membership::{self, RecipeList},
    services,
};
use crate::{
    auth::{AuthUser, MaybeAuthUser},
    error::AppError,
    state::AppState,
    users::dto::RecipeCard,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes))
        .route("/recipes/:id", get(get_recipe))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", post(create_recipe))
        .route(
            "/recipes/:id",
            axum::routing::patch(update_recipe).delete(delete_recipe),
        )
        .route(
            "/recipes/:id/favorite",
            post(add_favorite).delete(remove_favorite),
        )
        .route(
            "/recipes/:id/shopping_cart",
            post(add_to_cart).delete(remove_from_cart),
        )
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(filter): Query<RecipeFilter>,
) -> Result<Json<Vec<RecipeResponse>>, AppError> {
    Ok(Json(services::list(&state.db, viewer, &filter).await?))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RecipeResponse>, AppError> {
    Ok(Json(services::get(&state.db, viewer, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<RecipeRequest>,
) -> Result<(StatusCode, HeaderMap, Json<RecipeResponse>), AppError> {
    let recipe = services::create(&state.db, user_id, payload).await?;

    let mut headers = HeaderMap::new();
    let location = format!("/api/v1/recipes/{}", recipe.id)
        .parse()
        .map_err(|e| anyhow::anyhow!("location header: {e}"))?;
    headers.insert(axum::http::header::LOCATION, location);

    Ok((StatusCode::CREATED, headers, Json(recipe)))
}

#[instrument(skip(state, payload))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RecipeRequest>,
) -> Result<Json<RecipeResponse>, AppError> {
    Ok(Json(services::update(&state.db, user_id, id, payload).await?))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    services::delete(&state.db, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_to(state: &AppState, list: RecipeList, user_id: Uuid, id: Uuid) -> Result<(StatusCode, Json<RecipeCard>), AppError> {
    let card = membership::add(state.recipe_lists.as_ref(), list, user_id, id).await?;
    Ok((StatusCode::CREATED, Json(card)))
}

async fn remove_from(state: &AppState, list: RecipeList, user_id: Uuid, id: Uuid) -> Result<StatusCode, AppError> {
    membership::remove(state.recipe_lists.as_ref(), list, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn add_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<RecipeCard>), AppError> {
    add_to(&state, RecipeList::Favorites, user_id, id).await
}

#[instrument(skip(state))]
pub async fn remove_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    remove_from(&state, RecipeList::Favorites, user_id, id).await
}

#[instrument(skip(state))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<RecipeCard>), AppError> {
    add_to(&state, RecipeList::ShoppingCart, user_id, id).await
}

#[instrument(skip(state))]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    remove_from(&state, RecipeList::ShoppingCart, user_id, id).await
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use crate::{app::build_app, state::AppState};

    #[tokio::test]
    async fn writes_require_authentication() {
        let id = uuid::Uuid::new_v4();
        for (method, uri) in [
            ("POST", "/api/v1/recipes".to_string()),
            ("DELETE", format!("/api/v1/recipes/{id}")),
            ("POST", format!("/api/v1/recipes/{id}/favorite")),
            ("DELETE", format!("/api/v1/recipes/{id}/shopping_cart")),
        ] {
            let res = build_app(AppState::fake())
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(&uri)
                        .header("content-type", "application/json")
                        .body(Body::from("{}"))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(
                res.status(),
                axum::http::StatusCode::UNAUTHORIZED,
                "{method} {uri}"
            );
        }
    }

    #[tokio::test]
    async fn invalid_recipe_is_rejected_before_storage() {
        let state = AppState::fake();
        let token = state.test_token(uuid::Uuid::new_v4());
        let body = serde_json::json!({
            "name": "Soup",
            "text": "Boil.",
            "cooking_time": 0,
            "tags": [],
            "ingredients": [],
        });
        let res = build_app(state)
            .oneshot(
                Request::post("/api/v1/recipes")
                    .header("Authorization", format!("Bearer {token}"))
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    async fn send(state: AppState, method: &str, uri: &str, token: &str) -> axum::http::StatusCode {
        build_app(state)
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("Authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn cart_membership_statuses() {
        use std::sync::Arc;

        use crate::recipes::membership::memory::MemoryRecipeListStore;
        use axum::http::StatusCode;

        let recipe = uuid::Uuid::new_v4();
        let mut state = AppState::fake();
        state.recipe_lists = Arc::new(MemoryRecipeListStore::default().with_recipe(recipe, "Soup"));
        let token = state.test_token(uuid::Uuid::new_v4());
        let uri = format!("/api/v1/recipes/{recipe}/shopping_cart");

        assert_eq!(send(state.clone(), "DELETE", &uri, &token).await, StatusCode::NOT_FOUND);
        assert_eq!(send(state.clone(), "POST", &uri, &token).await, StatusCode::CREATED);
        assert_eq!(send(state.clone(), "POST", &uri, &token).await, StatusCode::CONFLICT);
        assert_eq!(send(state.clone(), "DELETE", &uri, &token).await, StatusCode::NO_CONTENT);

        let unknown = format!("/api/v1/recipes/{}/favorite", uuid::Uuid::new_v4());
        assert_eq!(send(state, "POST", &unknown, &token).await, StatusCode::NOT_FOUND);
    }
}
