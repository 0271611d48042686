//! The local week grid: day → slot → meal.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::meal::Meal;
use crate::{Day, MealSlot};

/// One cell of the weekly grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub day: Day,
    pub slot: MealSlot,
}

impl SlotKey {
    pub fn new(day: Day, slot: MealSlot) -> Self {
        Self { day, slot }
    }

    /// The three keys of a day, in slot order.
    pub fn day(day: Day) -> [SlotKey; 3] {
        MealSlot::ALL.map(|slot| Self { day, slot })
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.day, self.slot)
    }
}

/// The meals of one week.
///
/// A missing day and a day with no slots are the same thing; clearing the
/// last slot of a day drops the day entry so the two never diverge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealPlan {
    days: BTreeMap<Day, BTreeMap<MealSlot, Meal>>,
}

impl MealPlan {
    pub const fn new() -> Self {
        Self {
            days: BTreeMap::new(),
        }
    }

    pub fn get(&self, day: Day, slot: MealSlot) -> Option<&Meal> {
        self.days.get(&day).and_then(|slots| slots.get(&slot))
    }

    /// Put `meal` in a slot, returning the meal it replaced.
    pub fn set(&mut self, day: Day, slot: MealSlot, meal: Meal) -> Option<Meal> {
        self.days.entry(day).or_default().insert(slot, meal)
    }

    /// Empty a slot, returning the meal it held.
    pub fn clear(&mut self, day: Day, slot: MealSlot) -> Option<Meal> {
        let slots = self.days.get_mut(&day)?;
        let removed = slots.remove(&slot);
        if slots.is_empty() {
            self.days.remove(&day);
        }
        removed
    }

    pub fn day_has_any_meal(&self, day: Day) -> bool {
        self.days.get(&day).is_some_and(|slots| !slots.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Number of filled slots.
    pub fn len(&self) -> usize {
        self.days.values().map(BTreeMap::len).sum()
    }

    /// Filled slots in day, then slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotKey, &Meal)> {
        self.days.iter().flat_map(|(day, slots)| {
            slots
                .iter()
                .map(move |(slot, meal)| (SlotKey::new(*day, *slot), meal))
        })
    }
}
