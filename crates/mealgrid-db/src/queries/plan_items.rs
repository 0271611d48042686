//! Database query functions for the `plan_items` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{Day, MealSlot, PlanItem, Recipe};

/// Parameters for writing a plan item.
#[derive(Debug, Clone)]
pub struct NewPlanItem<'a> {
    pub day: Day,
    pub meal_slot: MealSlot,
    pub recipe_id: &'a str,
    pub recipe: &'a Recipe,
}

/// Write the item at `(plan_id, day, meal_slot)`.
///
/// An existing item at the same key is replaced in place: it keeps its id
/// and `created_at`, and takes the new recipe.
pub async fn upsert_item(pool: &PgPool, plan_id: Uuid, item: &NewPlanItem<'_>) -> Result<PlanItem> {
    let row = sqlx::query_as::<_, PlanItem>(
        "INSERT INTO plan_items (plan_id, day, meal_slot, recipe_id, recipe) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (plan_id, day, meal_slot) DO UPDATE \
         SET recipe_id = EXCLUDED.recipe_id, recipe = EXCLUDED.recipe, updated_at = now() \
         RETURNING *",
    )
    .bind(plan_id)
    .bind(item.day)
    .bind(item.meal_slot)
    .bind(item.recipe_id)
    .bind(Json(item.recipe))
    .fetch_one(pool)
    .await
    .with_context(|| {
        format!(
            "failed to write plan item {} {} for plan {plan_id}",
            item.day, item.meal_slot
        )
    })?;

    Ok(row)
}

/// List the items of a plan ordered by day, then slot.
pub async fn list_items_for_plan(pool: &PgPool, plan_id: Uuid) -> Result<Vec<PlanItem>> {
    let rows = sqlx::query_as::<_, PlanItem>(
        "SELECT * FROM plan_items WHERE plan_id = $1 \
         ORDER BY array_position(ARRAY['monday','tuesday','wednesday','thursday','friday','saturday','sunday'], day), \
                  array_position(ARRAY['breakfast','lunch','dinner'], meal_slot)",
    )
    .bind(plan_id)
    .fetch_all(pool)
    .await
    .context("failed to list plan items")?;

    Ok(rows)
}

/// Delete an item. Returns the number of rows removed (0 or 1).
pub async fn delete_item(pool: &PgPool, plan_id: Uuid, item_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM plan_items WHERE plan_id = $1 AND id = $2")
        .bind(plan_id)
        .bind(item_id)
        .execute(pool)
        .await
        .context("failed to delete plan item")?;

    Ok(result.rows_affected())
}

/// Count the items of a plan.
pub async fn count_items(pool: &PgPool, plan_id: Uuid) -> Result<i64> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM plan_items WHERE plan_id = $1")
        .bind(plan_id)
        .fetch_one(pool)
        .await
        .context("failed to count plan items")?;

    Ok(count.0)
}
