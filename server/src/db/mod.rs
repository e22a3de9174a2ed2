// marketplace_server/src/db/mod.rs

pub mod pg_store;

pub use pg_store::PgStore;

use crate::errors::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Connects to Postgres and, if asked to, applies pending migrations.
pub async fn init_pool(database_url: &str, run_migrations: bool) -> Result<PgPool> {
  let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
  info!("Successfully connected to the database.");

  if run_migrations {
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully.");
  }
  Ok(pool)
}
