//! [`MealPlanBackend`] over the `mealgrid-db` Postgres schema.
//!
//! Plans belong to a profile name. The store enforces one plan per
//! (profile, week) and one item per (plan, day, slot), so `create_plan` and
//! `add_item` are idempotent upserts.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use mealgrid_db::models;
use mealgrid_db::queries::{plan_items, plans};

use super::{BackendError, BackendPlan, MealPlanBackend, NewPlanItem, PlanItem};
use crate::week::WeekKey;

/// Postgres-backed plan store.
#[derive(Debug, Clone)]
pub struct PgMealPlanBackend {
    pool: PgPool,
}

impl PgMealPlanBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load(&self, plan: models::Plan) -> Result<BackendPlan, BackendError> {
        let rows = plan_items::list_items_for_plan(&self.pool, plan.id).await?;
        Ok(BackendPlan {
            id: plan.id,
            week: WeekKey::containing(plan.week_start),
            items: rows.into_iter().map(item_from_row).collect(),
        })
    }
}

fn item_from_row(row: models::PlanItem) -> PlanItem {
    PlanItem {
        id: row.id,
        day: row.day,
        slot: row.meal_slot,
        recipe_id: row.recipe_id,
        recipe: row.recipe.0,
    }
}

#[async_trait]
impl MealPlanBackend for PgMealPlanBackend {
    async fn list_plans(&self, profile: &str) -> Result<Vec<BackendPlan>, BackendError> {
        let rows = plans::list_plans_for_profile(&self.pool, profile).await?;
        let mut out = Vec::with_capacity(rows.len());
        for plan in rows {
            out.push(self.load(plan).await?);
        }
        Ok(out)
    }

    async fn create_plan(&self, profile: &str, week: WeekKey) -> Result<BackendPlan, BackendError> {
        let plan = plans::insert_plan(&self.pool, profile, week.start())
            .await
            .with_context(|| format!("failed to create plan for {profile} week {week}"))?;
        debug!(plan_id = %plan.id, %profile, %week, "plan ready");
        self.load(plan).await
    }

    async fn add_item(&self, plan_id: Uuid, item: &NewPlanItem) -> Result<PlanItem, BackendError> {
        if plans::get_plan(&self.pool, plan_id).await?.is_none() {
            return Err(BackendError::PlanNotFound(plan_id));
        }
        let row = plan_items::upsert_item(
            &self.pool,
            plan_id,
            &plan_items::NewPlanItem {
                day: item.day,
                meal_slot: item.slot,
                recipe_id: &item.recipe_id,
                recipe: &item.recipe,
            },
        )
        .await?;
        Ok(item_from_row(row))
    }

    async fn remove_item(&self, plan_id: Uuid, item_id: Uuid) -> Result<bool, BackendError> {
        let deleted = plan_items::delete_item(&self.pool, plan_id, item_id).await?;
        Ok(deleted > 0)
    }

    async fn fetch_plan(&self, plan_id: Uuid) -> Result<BackendPlan, BackendError> {
        let plan = plans::get_plan(&self.pool, plan_id)
            .await?
            .ok_or(BackendError::PlanNotFound(plan_id))?;
        self.load(plan).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Day, MealSlot, Nutrition, Recipe};
    use chrono::Utc;
    use sqlx::types::Json;

    #[test]
    fn row_conversion_keeps_recipe() {
        let recipe = Recipe {
            id: "r-7".into(),
            title: "Ramen".into(),
            servings: 2,
            cook_time_minutes: 30,
            nutrition: Nutrition::default(),
            grade: Some("B".into()),
        };
        let row = models::PlanItem {
            id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            day: Day::Saturday,
            meal_slot: MealSlot::Dinner,
            recipe_id: "r-7".into(),
            recipe: Json(recipe.clone()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let id = row.id;
        let item = item_from_row(row);
        assert_eq!(item.id, id);
        assert_eq!(item.slot, MealSlot::Dinner);
        assert_eq!(item.recipe, recipe);
    }
}
