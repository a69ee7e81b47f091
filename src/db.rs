use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

/// Opens the pool and brings the schema up to date. The caller owns the pool
/// and is responsible for closing it.
pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("run migrations")?;

    tracing::info!("database connected");
    Ok(db)
}
