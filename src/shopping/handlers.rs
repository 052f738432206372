use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    aggregate::aggregate,
    model::{AggregateLine, CartScope},
    render::{ListFormat, RenderedList},
};
use crate::{auth::MaybeAuthUser, error::AppError, state::AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ShoppingListQuery {
    #[serde(default)]
    pub format: ListFormat,
    /// Comma separated recipe ids; only used for anonymous callers.
    pub recipes: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/recipes/download_shopping_cart", get(download_shopping_cart))
        .route("/recipes/shopping_cart", get(shopping_list))
}

/// Authenticated callers get their persisted cart; anonymous callers must
/// name the recipes themselves.
pub(crate) fn resolve_scope(viewer: Option<Uuid>, recipes: Option<&str>) -> Result<CartScope, AppError> {
    if let Some(user_id) = viewer {
        return Ok(CartScope::User(user_id));
    }
    let Some(raw) = recipes else {
        return Err(AppError::Unauthorized(
            "Sign in or pass the recipes to include".into(),
        ));
    };
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Uuid::parse_str(s).map_err(|_| AppError::validation(format!("invalid recipe id {s:?}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CartScope::Session(ids))
}

#[instrument(skip(state))]
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(q): Query<ShoppingListQuery>,
) -> Result<RenderedList, AppError> {
    let scope = resolve_scope(viewer, q.recipes.as_deref())?;
    let lines = aggregate(state.cart_source.as_ref(), &scope)
        .await
        .inspect_err(|e| warn!(error = %e, ?scope, "shopping list aggregation failed"))?;
    let rendered = state.renderer.render(&lines, q.format);
    info!(
        items = lines.len(),
        format = ?q.format,
        bytes = rendered.body.len(),
        "shopping list rendered"
    );
    Ok(rendered)
}

#[instrument(skip(state))]
pub async fn shopping_list(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(q): Query<ShoppingListQuery>,
) -> Result<Json<Vec<AggregateLine>>, AppError> {
    let scope = resolve_scope(viewer, q.recipes.as_deref())?;
    Ok(Json(aggregate(state.cart_source.as_ref(), &scope).await?))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{
        app::build_app,
        shopping::{model::LineItem, source::memory::MemoryCartSource},
    };

    struct Fixture {
        state: AppState,
        user: Uuid,
        recipe_a: Uuid,
        recipe_b: Uuid,
    }

    fn fixture() -> Fixture {
        let (user, recipe_a, recipe_b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let source = MemoryCartSource::default()
            .with_recipe(
                recipe_a,
                vec![LineItem::new("Flour", "g", 200), LineItem::new("Salt", "g", 5)],
            )
            .with_recipe(
                recipe_b,
                vec![LineItem::new("Flour", "g", 300), LineItem::new("Egg", "pcs", 2)],
            )
            .with_cart(user, vec![recipe_a, recipe_b]);
        let mut state = AppState::fake();
        state.cart_source = Arc::new(source);
        Fixture {
            state,
            user,
            recipe_a,
            recipe_b,
        }
    }

    async fn get(state: AppState, uri: &str, token: Option<String>) -> axum::response::Response {
        let mut req = Request::get(uri);
        if let Some(t) = token {
            req = req.header("Authorization", format!("Bearer {t}"));
        }
        build_app(state)
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_bytes(res: axum::response::Response) -> bytes::Bytes {
        axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap()
    }

    #[test]
    fn scope_prefers_the_signed_in_user() {
        let user = Uuid::new_v4();
        let scope = resolve_scope(Some(user), Some("not-a-uuid")).unwrap();
        assert_eq!(scope, CartScope::User(user));
    }

    #[test]
    fn anonymous_scope_needs_a_recipe_list() {
        assert!(matches!(resolve_scope(None, None), Err(AppError::Unauthorized(_))));
        assert_eq!(resolve_scope(None, Some("")).unwrap(), CartScope::Session(vec![]));
        assert!(matches!(
            resolve_scope(None, Some("abc")),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn downloads_text_list_for_signed_in_user() {
        let f = fixture();
        let token = f.state.test_token(f.user);
        let res = get(f.state, "/api/v1/recipes/download_shopping_cart", Some(token)).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(
            res.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"shopping_list.txt\""
        );
        assert_eq!(&body_bytes(res).await[..], b"Egg pcs 2\nFlour g 500\nSalt g 5\n");
    }

    #[tokio::test]
    async fn downloads_pdf_list() {
        let f = fixture();
        let token = f.state.test_token(f.user);
        let res = get(
            f.state,
            "/api/v1/recipes/download_shopping_cart?format=pdf",
            Some(token),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            res.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"shoppingcart.pdf\""
        );
        let body = body_bytes(res).await;
        let text = String::from_utf8_lossy(&body);
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.contains("(2. Flour - 500 g.) Tj"));
    }

    #[tokio::test]
    async fn anonymous_caller_lists_named_recipes() {
        let f = fixture();
        let uri = format!(
            "/api/v1/recipes/download_shopping_cart?recipes={},{}",
            f.recipe_b, f.recipe_b
        );
        let res = get(f.state, &uri, None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(&body_bytes(res).await[..], b"Egg pcs 2\nFlour g 300\n");
    }

    #[tokio::test]
    async fn anonymous_caller_without_recipes_is_unauthorized() {
        let f = fixture();
        let res = get(f.state, "/api/v1/recipes/download_shopping_cart", None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_recipe_is_not_found() {
        let f = fixture();
        let uri = format!(
            "/api/v1/recipes/download_shopping_cart?recipes={},{}",
            f.recipe_a,
            Uuid::new_v4()
        );
        let res = get(f.state, &uri, None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let f = fixture();
        let token = f.state.test_token(Uuid::new_v4());
        let res = get(f.state, "/api/v1/recipes/download_shopping_cart", Some(token)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_cart_downloads_the_empty_message() {
        let mut f = fixture();
        let lonely = Uuid::new_v4();
        f.state.cart_source = Arc::new(MemoryCartSource::default().with_cart(lonely, vec![]));
        let token = f.state.test_token(lonely);
        let res = get(f.state, "/api/v1/recipes/download_shopping_cart", Some(token)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(&body_bytes(res).await[..], b"Shopping list is empty.\n");
    }

    #[tokio::test]
    async fn json_list_is_sorted_and_flat() {
        let f = fixture();
        let token = f.state.test_token(f.user);
        let res = get(f.state, "/api/v1/recipes/shopping_cart", Some(token)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(res).await).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"name": "Egg", "unit": "pcs", "total_amount": 2},
                {"name": "Flour", "unit": "g", "total_amount": 500},
                {"name": "Salt", "unit": "g", "total_amount": 5},
            ])
        );
    }
}
