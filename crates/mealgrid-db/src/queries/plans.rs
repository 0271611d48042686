//! Database query functions for the `plans` table.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Plan;

/// Insert the plan for `(profile, week_start)`, or return the existing one.
///
/// Concurrent callers racing to create the same week both receive the same
/// row; the unique constraint turns the second insert into a no-op update.
pub async fn insert_plan(pool: &PgPool, profile: &str, week_start: NaiveDate) -> Result<Plan> {
    let plan = sqlx::query_as::<_, Plan>(
        "INSERT INTO plans (profile, week_start) \
         VALUES ($1, $2) \
         ON CONFLICT (profile, week_start) DO UPDATE SET profile = EXCLUDED.profile \
         RETURNING *",
    )
    .bind(profile)
    .bind(week_start)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert plan for week {week_start}"))?;

    Ok(plan)
}

/// Fetch a plan by its ID.
pub async fn get_plan(pool: &PgPool, id: Uuid) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch plan")?;

    Ok(plan)
}

/// Fetch the plan a profile has for the week starting on `week_start`.
pub async fn get_plan_for_week(
    pool: &PgPool,
    profile: &str,
    week_start: NaiveDate,
) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>(
        "SELECT * FROM plans WHERE profile = $1 AND week_start = $2",
    )
    .bind(profile)
    .bind(week_start)
    .fetch_optional(pool)
    .await
    .context("failed to fetch plan for week")?;

    Ok(plan)
}

/// List all plans of a profile, newest week first.
pub async fn list_plans_for_profile(pool: &PgPool, profile: &str) -> Result<Vec<Plan>> {
    let plans = sqlx::query_as::<_, Plan>(
        "SELECT * FROM plans WHERE profile = $1 ORDER BY week_start DESC",
    )
    .bind(profile)
    .fetch_all(pool)
    .await
    .context("failed to list plans")?;

    Ok(plans)
}
