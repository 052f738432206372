use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use recipebook::{catalog::repo, db};

/// Load the ingredient catalog from a `name,unit` CSV file.
#[derive(Debug, Parser)]
#[command(name = "load-ingredients", version)]
struct Args {
    /// CSV file with one `name,unit` pair per line.
    #[arg(long, default_value = "data/ingredients.csv")]
    path: PathBuf,

    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Parse and report without writing.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    recipebook::init_tracing("recipebook=info,load_ingredients=info");
    let args = Args::parse();

    let raw = tokio::fs::read_to_string(&args.path)
        .await
        .with_context(|| format!("read {}", args.path.display()))?;
    let rows = repo::parse_ingredient_csv(&raw)?;
    tracing::info!(rows = rows.len(), path = %args.path.display(), "parsed ingredient file");

    if args.dry_run {
        return Ok(());
    }

    let pool = db::connect(&args.database_url).await?;
    db::migrate(&pool).await?;
    let inserted = repo::insert_ingredients(&pool, &rows).await?;
    tracing::info!(inserted, skipped = rows.len() as u64 - inserted, "ingredients loaded");
    Ok(())
}
