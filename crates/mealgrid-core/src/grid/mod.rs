//! In-memory meal grid, the single source of truth for rendering.
//!
//! The store keeps one [`MealPlan`] per week seen this session and tracks
//! which week is displayed. Reads and writes without an explicit week go to
//! the displayed one. All access is synchronous; callers that share the
//! store across tasks wrap it in [`SharedGrid`].

pub mod meal;
pub mod plan;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub use meal::{Grade, Meal};
pub use plan::{MealPlan, SlotKey};

use crate::week::WeekKey;
use crate::{Day, MealSlot};

/// Store shared between the session and in-flight generation tasks.
pub type SharedGrid = Arc<Mutex<MealPlanStateStore>>;

static EMPTY_PLAN: MealPlan = MealPlan::new();

/// Meal grids by week, plus the displayed week.
#[derive(Debug, Clone)]
pub struct MealPlanStateStore {
    weeks: HashMap<WeekKey, MealPlan>,
    displayed: WeekKey,
}

impl MealPlanStateStore {
    /// Create an empty store displaying `week`.
    pub fn new(week: WeekKey) -> Self {
        Self {
            weeks: HashMap::new(),
            displayed: week,
        }
    }

    pub fn shared(week: WeekKey) -> SharedGrid {
        Arc::new(Mutex::new(Self::new(week)))
    }

    pub fn displayed_week(&self) -> WeekKey {
        self.displayed
    }

    /// Change the displayed week without touching any week's contents.
    pub fn show_week(&mut self, week: WeekKey) {
        self.displayed = week;
    }

    /// The displayed week's grid.
    pub fn plan(&self) -> &MealPlan {
        self.week_plan(self.displayed)
    }

    /// The grid of any week; an unseen week is empty.
    pub fn week_plan(&self, week: WeekKey) -> &MealPlan {
        self.weeks.get(&week).unwrap_or(&EMPTY_PLAN)
    }

    /// Whether `week` has any locally held meal.
    pub fn has_local_data(&self, week: WeekKey) -> bool {
        self.weeks.get(&week).is_some_and(|plan| !plan.is_empty())
    }

    pub fn get(&self, day: Day, slot: MealSlot) -> Option<&Meal> {
        self.plan().get(day, slot)
    }

    pub fn get_in(&self, week: WeekKey, day: Day, slot: MealSlot) -> Option<&Meal> {
        self.week_plan(week).get(day, slot)
    }

    /// Replace the meal in a slot of the displayed week.
    pub fn set(&mut self, day: Day, slot: MealSlot, meal: Meal) -> Option<Meal> {
        self.set_in(self.displayed, day, slot, meal)
    }

    /// Replace the meal in a slot of `week`.
    pub fn set_in(&mut self, week: WeekKey, day: Day, slot: MealSlot, meal: Meal) -> Option<Meal> {
        self.weeks.entry(week).or_default().set(day, slot, meal)
    }

    pub fn clear(&mut self, day: Day, slot: MealSlot) -> Option<Meal> {
        self.clear_in(self.displayed, day, slot)
    }

    pub fn clear_in(&mut self, week: WeekKey, day: Day, slot: MealSlot) -> Option<Meal> {
        let plan = self.weeks.get_mut(&week)?;
        let removed = plan.clear(day, slot);
        if plan.is_empty() {
            self.weeks.remove(&week);
        }
        removed
    }

    /// Replace a whole week's grid.
    pub fn replace_week(&mut self, week: WeekKey, plan: MealPlan) {
        if plan.is_empty() {
            self.weeks.remove(&week);
        } else {
            self.weeks.insert(week, plan);
        }
    }

    /// Whether a day of the displayed week has at least one meal.
    pub fn day_has_any_meal(&self, day: Day) -> bool {
        self.plan().day_has_any_meal(day)
    }

    /// Drop every week's data (sign-out).
    pub fn clear_all(&mut self) {
        self.weeks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Nutrition;
    use chrono::NaiveDate;

    fn week(d: u32) -> WeekKey {
        WeekKey::containing(NaiveDate::from_ymd_opt(2026, 10, d).unwrap())
    }

    fn meal(id: &str) -> Meal {
        Meal {
            id: id.into(),
            title: id.into(),
            servings: 1,
            cook_time_minutes: 10,
            nutrition: Nutrition::default(),
            grade: None,
        }
    }

    #[test]
    fn unseen_week_is_empty() {
        let store = MealPlanStateStore::new(week(19));
        assert!(store.plan().is_empty());
        assert!(store.get(Day::Monday, MealSlot::Breakfast).is_none());
        assert!(!store.has_local_data(week(19)));
    }

    #[test]
    fn writes_go_to_displayed_week() {
        let mut store = MealPlanStateStore::new(week(19));
        store.set(Day::Tuesday, MealSlot::Lunch, meal("a"));
        store.show_week(week(26));
        assert!(store.get(Day::Tuesday, MealSlot::Lunch).is_none());
        assert_eq!(store.get_in(week(19), Day::Tuesday, MealSlot::Lunch).unwrap().id, "a");
    }

    #[test]
    fn set_in_other_week_leaves_displayed_alone() {
        let mut store = MealPlanStateStore::new(week(19));
        store.set_in(week(12), Day::Friday, MealSlot::Dinner, meal("late"));
        assert!(store.plan().is_empty());
        assert!(store.has_local_data(week(12)));
    }

    #[test]
    fn day_has_any_meal_tracks_slots() {
        let mut store = MealPlanStateStore::new(week(19));
        assert!(!store.day_has_any_meal(Day::Sunday));
        store.set(Day::Sunday, MealSlot::Breakfast, meal("x"));
        assert!(store.day_has_any_meal(Day::Sunday));
        store.clear(Day::Sunday, MealSlot::Breakfast);
        assert!(!store.day_has_any_meal(Day::Sunday));
        assert!(!store.has_local_data(week(19)));
    }

    #[test]
    fn replace_week_with_empty_plan_clears() {
        let mut store = MealPlanStateStore::new(week(19));
        store.set(Day::Monday, MealSlot::Lunch, meal("a"));
        store.replace_week(week(19), MealPlan::new());
        assert!(store.plan().is_empty());
    }
}
