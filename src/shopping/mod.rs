//! Shopping list pipeline: cart lookup, aggregation and rendering.

pub mod aggregate;
pub mod handlers;
pub mod model;
pub mod pdf;
pub mod render;
pub mod source;

use crate::state::AppState;
use axum::Router;

pub use aggregate::aggregate;
pub use model::{AggregateLine, CartScope, IngredientRef, LineItem};
pub use render::{ListFormat, ListRenderer, RenderedList};
pub use source::{CartSource, PgCartSource};

pub fn router() -> Router<AppState> {
    handlers::routes()
}
