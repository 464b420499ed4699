use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Schema for stored analyses, embedded at compile time.
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Connects to PostgreSQL and brings the `resume_analyses` schema up to date.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to apply database migrations")?;

    info!(
        "PostgreSQL ready (schema at {} migration(s))",
        MIGRATOR.iter().count()
    );
    Ok(pool)
}
