use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::path::Path;

use crate::config::Config;

pub const MIGRATIONS_DIR: &str = "./migrations";

pub async fn create_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    let migrator = Migrator::new(Path::new(MIGRATIONS_DIR)).await?;
    migrator.run(pool).await?;
    Ok(())
}
