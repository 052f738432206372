use recipebook::{app, db, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    recipebook::init_tracing("recipebook=debug,axum=info,tower_http=info");

    let app_state = AppState::init().await?;
    db::migrate(&app_state.db).await?;

    tracing::info!(
        font = %app_state.config.render.font,
        lines_per_page = app_state.config.render.page_capacity(),
        "shopping list renderer ready"
    );

    app::serve(app::build_app(app_state)).await
}
