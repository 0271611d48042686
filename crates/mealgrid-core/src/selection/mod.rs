//! Multi-slot selection for batch actions on the active day.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::backend::BackendPlan;
use crate::grid::SlotKey;
use crate::{Day, MealSlot};

/// Checked slots of the active day.
///
/// Every key in the set belongs to the active day; changing the day
/// empties the set.
#[derive(Debug, Clone)]
pub struct SelectionManager {
    active_day: Day,
    selected: BTreeSet<SlotKey>,
}

impl SelectionManager {
    pub fn new(active_day: Day) -> Self {
        Self {
            active_day,
            selected: BTreeSet::new(),
        }
    }

    pub fn active_day(&self) -> Day {
        self.active_day
    }

    /// Switch the active day. Returns `true` if the day changed, in which
    /// case the selection was cleared.
    pub fn set_active_day(&mut self, day: Day) -> bool {
        if day == self.active_day {
            return false;
        }
        self.active_day = day;
        self.selected.clear();
        true
    }

    /// Flip one slot. Returns whether it is selected afterwards.
    ///
    /// Keys outside the active day are ignored and report `false`.
    pub fn toggle(&mut self, day: Day, slot: MealSlot) -> bool {
        if day != self.active_day {
            tracing::debug!(%day, %slot, active = %self.active_day, "ignoring toggle outside active day");
            return false;
        }
        let key = SlotKey::new(day, slot);
        if self.selected.remove(&key) {
            false
        } else {
            self.selected.insert(key);
            true
        }
    }

    /// Select or deselect every key in `keys` on the active day.
    pub fn bulk_set<I>(&mut self, keys: I, selected: bool)
    where
        I: IntoIterator<Item = SlotKey>,
    {
        for key in keys {
            if key.day != self.active_day {
                continue;
            }
            if selected {
                self.selected.insert(key);
            } else {
                self.selected.remove(&key);
            }
        }
    }

    /// Whether every key of the batch is currently selected.
    ///
    /// An empty batch is never "all selected".
    pub fn all_selected(&self, keys: &[SlotKey]) -> bool {
        !keys.is_empty() && keys.iter().all(|key| self.selected.contains(key))
    }

    /// Select the batch, or deselect it if it is already fully selected.
    pub fn toggle_all(&mut self, keys: &[SlotKey]) {
        let select = !self.all_selected(keys);
        self.bulk_set(keys.iter().copied(), select);
    }

    pub fn is_selected(&self, day: Day, slot: MealSlot) -> bool {
        self.selected.contains(&SlotKey::new(day, slot))
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selected keys in slot order.
    pub fn all(&self) -> Vec<SlotKey> {
        self.selected.iter().copied().collect()
    }

    /// Selected slots of the active day in serving order.
    pub fn slots(&self) -> Vec<MealSlot> {
        self.selected.iter().map(|key| key.slot).collect()
    }

    /// Backend item ids for the selection, for grocery export.
    ///
    /// Selected keys without a persisted item are skipped.
    pub fn item_ids(&self, plan: &BackendPlan) -> Vec<Uuid> {
        self.selected
            .iter()
            .filter_map(|key| plan.item(key.day, key.slot))
            .map(|item| item.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PlanItem;
    use crate::week::WeekKey;
    use crate::{Nutrition, Recipe};
    use chrono::NaiveDate;

    #[test]
    fn toggle_twice_restores_membership() {
        let mut sel = SelectionManager::new(Day::Monday);
        assert!(sel.toggle(Day::Monday, MealSlot::Lunch));
        assert!(sel.is_selected(Day::Monday, MealSlot::Lunch));
        assert!(!sel.toggle(Day::Monday, MealSlot::Lunch));
        assert!(sel.is_empty());

        sel.toggle(Day::Monday, MealSlot::Dinner);
        let before = sel.all();
        sel.toggle(Day::Monday, MealSlot::Breakfast);
        sel.toggle(Day::Monday, MealSlot::Breakfast);
        assert_eq!(sel.all(), before);
    }

    #[test]
    fn changing_day_clears_selection() {
        let mut sel = SelectionManager::new(Day::Monday);
        sel.bulk_set(SlotKey::day(Day::Monday), true);
        assert_eq!(sel.all().len(), 3);

        assert!(sel.set_active_day(Day::Tuesday));
        assert!(sel.is_empty());
        assert_eq!(sel.active_day(), Day::Tuesday);
    }

    #[test]
    fn same_day_keeps_selection() {
        let mut sel = SelectionManager::new(Day::Friday);
        sel.toggle(Day::Friday, MealSlot::Dinner);
        assert!(!sel.set_active_day(Day::Friday));
        assert_eq!(sel.slots(), vec![MealSlot::Dinner]);
    }

    #[test]
    fn toggle_outside_active_day_is_ignored() {
        let mut sel = SelectionManager::new(Day::Monday);
        assert!(!sel.toggle(Day::Sunday, MealSlot::Lunch));
        assert!(sel.is_empty());
    }

    #[test]
    fn toggle_all_selects_then_deselects() {
        let mut sel = SelectionManager::new(Day::Wednesday);
        let keys = SlotKey::day(Day::Wednesday);
        sel.toggle(Day::Wednesday, MealSlot::Lunch);
        assert!(!sel.all_selected(&keys));

        sel.toggle_all(&keys);
        assert!(sel.all_selected(&keys));

        sel.toggle_all(&keys);
        assert!(sel.is_empty());
        assert!(!sel.all_selected(&[]));
    }

    #[test]
    fn item_ids_skip_unpersisted_keys() {
        let week = WeekKey::containing(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        let recipe = Recipe {
            id: "r".into(),
            title: "Soup".into(),
            servings: 1,
            cook_time_minutes: 5,
            nutrition: Nutrition::default(),
            grade: None,
        };
        let item = PlanItem {
            id: Uuid::new_v4(),
            day: Day::Monday,
            slot: MealSlot::Dinner,
            recipe_id: "r".into(),
            recipe,
        };
        let plan = BackendPlan {
            id: Uuid::new_v4(),
            week,
            items: vec![item.clone()],
        };

        let mut sel = SelectionManager::new(Day::Monday);
        sel.bulk_set(SlotKey::day(Day::Monday), true);
        assert_eq!(sel.item_ids(&plan), vec![item.id]);
    }
}
