use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::error::AppError;

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connect to database")
}

pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Turns a unique-constraint violation into a client-visible conflict.
pub fn conflict_on_duplicate(err: sqlx::Error, msg: &str) -> AppError {
    if is_unique_violation(&err) {
        AppError::conflict(msg)
    } else {
        AppError::from(err)
    }
}
