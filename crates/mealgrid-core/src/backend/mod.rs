//! The meal plan backend port.
//!
//! A backend stores one [`BackendPlan`] per (profile, week) with at most one
//! [`PlanItem`] per (day, slot). Calls may be slow and fail independently;
//! an authentication failure is reported as
//! [`BackendError::Unauthenticated`] so the caller can fall back to guest
//! behavior.

pub mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::grid::SlotKey;
use crate::week::WeekKey;
use crate::{Day, MealSlot, Recipe};

pub use postgres::PgMealPlanBackend;

// ---------------------------------------------------------------------------
// Plan model
// ---------------------------------------------------------------------------

/// A persisted meal at one (day, slot) of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    pub id: Uuid,
    pub day: Day,
    pub slot: MealSlot,
    pub recipe_id: String,
    pub recipe: Recipe,
}

impl PlanItem {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.day, self.slot)
    }
}

/// Item payload sent to [`MealPlanBackend::add_item`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlanItem {
    pub day: Day,
    pub slot: MealSlot,
    pub recipe_id: String,
    pub recipe: Recipe,
}

impl NewPlanItem {
    pub fn from_recipe(day: Day, slot: MealSlot, recipe: Recipe) -> Self {
        Self {
            day,
            slot,
            recipe_id: recipe.id.clone(),
            recipe,
        }
    }

    /// The item as it would be stored under `id`.
    pub fn into_item(self, id: Uuid) -> PlanItem {
        PlanItem {
            id,
            day: self.day,
            slot: self.slot,
            recipe_id: self.recipe_id,
            recipe: self.recipe,
        }
    }
}

/// A persisted plan for exactly one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendPlan {
    pub id: Uuid,
    pub week: WeekKey,
    /// Items in day, then slot order; keys are unique.
    pub items: Vec<PlanItem>,
}

impl BackendPlan {
    pub fn new(id: Uuid, week: WeekKey) -> Self {
        Self {
            id,
            week,
            items: Vec::new(),
        }
    }

    pub fn item(&self, day: Day, slot: MealSlot) -> Option<&PlanItem> {
        self.items.iter().find(|i| i.day == day && i.slot == slot)
    }

    /// Insert an item, replacing any item with the same key in place.
    pub fn upsert(&mut self, item: PlanItem) {
        match self.items.iter_mut().find(|i| i.key() == item.key()) {
            Some(existing) => *existing = item,
            None => {
                let pos = self.items.partition_point(|i| i.key() < item.key());
                self.items.insert(pos, item);
            }
        }
    }

    /// Remove the item at a key, returning it.
    pub fn remove(&mut self, day: Day, slot: MealSlot) -> Option<PlanItem> {
        let pos = self.items.iter().position(|i| i.day == day && i.slot == slot)?;
        Some(self.items.remove(pos))
    }

    /// Remove an item by id, returning it.
    pub fn remove_id(&mut self, item_id: Uuid) -> Option<PlanItem> {
        let pos = self.items.iter().position(|i| i.id == item_id)?;
        Some(self.items.remove(pos))
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The caller has no valid session; treat as guest from now on.
    #[error("authentication required")]
    Unauthenticated,

    #[error("plan {0} not found")]
    PlanNotFound(Uuid),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BackendError {
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }
}

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

/// Remote store of weekly plans.
///
/// # Object Safety
///
/// The trait is object-safe; the reconciliation layer holds it as
/// `Arc<dyn MealPlanBackend>`.
#[async_trait]
pub trait MealPlanBackend: Send + Sync {
    /// Every plan of a profile, with items.
    async fn list_plans(&self, profile: &str) -> Result<Vec<BackendPlan>, BackendError>;

    /// Create the plan for a week, or return the existing one.
    async fn create_plan(&self, profile: &str, week: WeekKey) -> Result<BackendPlan, BackendError>;

    /// Store an item, replacing any item at the same (day, slot).
    async fn add_item(&self, plan_id: Uuid, item: &NewPlanItem) -> Result<PlanItem, BackendError>;

    /// Delete an item. Returns `false` if it did not exist.
    async fn remove_item(&self, plan_id: Uuid, item_id: Uuid) -> Result<bool, BackendError>;

    /// Re-read one plan with its current items.
    async fn fetch_plan(&self, plan_id: Uuid) -> Result<BackendPlan, BackendError>;
}

// Compile-time assertion: MealPlanBackend must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn MealPlanBackend) {}
};
