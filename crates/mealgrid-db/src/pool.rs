use std::time::Duration;

use anyhow::{Context, Result, bail};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, FromRow, PgPool};
use tracing::info;

use crate::config::DbConfig;

/// Migrations embedded at compile time from `crates/mealgrid-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Connections per pool. Plan writes are short; one session rarely has more
/// than three in flight.
const MAX_CONNECTIONS: u32 = 5;

/// Create a connection pool for the configured database.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await
        .with_context(|| format!("failed to connect to database at {}", config.redacted_url()))
}

/// Run all pending embedded migrations against the pool.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;

    info!("migrations applied successfully");
    Ok(())
}

/// Create the target database unless it already exists.
///
/// Goes through the `postgres` maintenance database on the same server.
/// Returns whether the database was created.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<bool> {
    let db_name = config
        .database_name()
        .context("could not determine database name from URL")?;
    if !is_plain_identifier(db_name) {
        bail!("database name {db_name:?} must be ASCII letters, digits and underscores");
    }

    let maint_pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.maintenance_url())
        .await
        .with_context(|| {
            format!(
                "failed to connect to maintenance database for {}",
                config.redacted_url()
            )
        })?;

    let result = create_if_missing(&maint_pool, db_name).await;
    maint_pool.close().await;
    result
}

async fn create_if_missing(maint_pool: &PgPool, db_name: &str) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(maint_pool)
            .await
            .context("failed to query pg_database")?;
    if exists {
        info!(db = db_name, "database already exists");
        return Ok(false);
    }

    // CREATE DATABASE cannot take a bind parameter.
    maint_pool
        .execute(format!("CREATE DATABASE {db_name}").as_str())
        .await
        .with_context(|| format!("failed to create database {db_name}"))?;
    info!(db = db_name, "database created");
    Ok(true)
}

fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// What the plan store holds, printed by `mealgrid db-init`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct StoreSummary {
    pub profiles: i64,
    pub plans: i64,
    pub items: i64,
}

pub async fn store_summary(pool: &PgPool) -> Result<StoreSummary> {
    sqlx::query_as(
        "SELECT \
             (SELECT COUNT(DISTINCT profile) FROM plans) AS profiles, \
             (SELECT COUNT(*) FROM plans) AS plans, \
             (SELECT COUNT(*) FROM plan_items) AS items",
    )
    .fetch_one(pool)
    .await
    .context("failed to summarize plan store")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_identifiers() {
        assert!(is_plain_identifier("mealgrid"));
        assert!(is_plain_identifier("mealgrid_test_01"));
        assert!(!is_plain_identifier(""));
        assert!(!is_plain_identifier("meal-grid"));
        assert!(!is_plain_identifier("x; DROP DATABASE postgres"));
    }
}
