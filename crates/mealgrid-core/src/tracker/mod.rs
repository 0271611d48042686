//! Per-slot generation tracking (the "generating set").
//!
//! Each (week, day, slot) key moves through a small state machine:
//!
//! ```text
//! idle -> generating   -> idle
//! idle -> regenerating -> idle
//! ```
//!
//! Entering a non-idle phase hands out a [`GenerationGuard`]; dropping the
//! guard returns the key to idle. Leaving therefore happens exactly once
//! for every dispatch, whether the generator call succeeded, failed or the
//! task panicked.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::grid::SlotKey;
use crate::sync::lock;
use crate::week::WeekKey;
use crate::{Day, MealSlot};

/// Loading phase of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPhase {
    Idle,
    Generating,
    /// Replacing an existing meal. Presentation differs, behavior does not.
    Regenerating,
}

impl SlotPhase {
    pub fn is_busy(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl fmt::Display for SlotPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Generating => "generating",
            Self::Regenerating => "regenerating",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("{key} of week {week} is already {phase}")]
    AlreadyInFlight {
        week: WeekKey,
        key: SlotKey,
        phase: SlotPhase,
    },
    #[error("invalid slot transition: {from} -> {to}")]
    InvalidTransition { from: SlotPhase, to: SlotPhase },
}

type Phases = HashMap<(WeekKey, SlotKey), SlotPhase>;

/// Shared registry of in-flight generation keys.
///
/// Cheap to clone; clones observe the same set.
#[derive(Debug, Clone, Default)]
pub struct GenerationTracker {
    phases: Arc<Mutex<Phases>>,
}

impl GenerationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `from -> to` is an edge of the phase graph.
    pub fn is_valid_transition(from: SlotPhase, to: SlotPhase) -> bool {
        matches!(
            (from, to),
            (SlotPhase::Idle, SlotPhase::Generating)
                | (SlotPhase::Idle, SlotPhase::Regenerating)
                | (SlotPhase::Generating, SlotPhase::Idle)
                | (SlotPhase::Regenerating, SlotPhase::Idle)
        )
    }

    /// Mark a key as in flight.
    ///
    /// Fails with [`TrackerError::AlreadyInFlight`] if the key is not idle;
    /// a slot that is generating cannot be triggered again.
    pub fn begin(
        &self,
        week: WeekKey,
        key: SlotKey,
        phase: SlotPhase,
    ) -> Result<GenerationGuard, TrackerError> {
        let mut phases = lock(&self.phases);
        let current = phases.get(&(week, key)).copied().unwrap_or(SlotPhase::Idle);
        if current.is_busy() {
            return Err(TrackerError::AlreadyInFlight {
                week,
                key,
                phase: current,
            });
        }
        if !Self::is_valid_transition(current, phase) {
            return Err(TrackerError::InvalidTransition { from: current, to: phase });
        }
        phases.insert((week, key), phase);
        Ok(GenerationGuard {
            phases: Arc::clone(&self.phases),
            week,
            key,
        })
    }

    pub fn phase(&self, week: WeekKey, day: Day, slot: MealSlot) -> SlotPhase {
        lock(&self.phases)
            .get(&(week, SlotKey::new(day, slot)))
            .copied()
            .unwrap_or(SlotPhase::Idle)
    }

    pub fn is_generating(&self, week: WeekKey, day: Day, slot: MealSlot) -> bool {
        self.phase(week, day, slot).is_busy()
    }

    /// In-flight keys of a week, in grid order.
    pub fn in_flight(&self, week: WeekKey) -> Vec<(SlotKey, SlotPhase)> {
        let mut keys: Vec<_> = lock(&self.phases)
            .iter()
            .filter(|((w, _), _)| *w == week)
            .map(|((_, key), phase)| (*key, *phase))
            .collect();
        keys.sort_by_key(|(key, _)| *key);
        keys
    }

    pub fn is_idle(&self) -> bool {
        lock(&self.phases).is_empty()
    }
}

/// Holds one key in a busy phase until dropped.
#[must_use = "dropping the guard immediately returns the slot to idle"]
#[derive(Debug)]
pub struct GenerationGuard {
    phases: Arc<Mutex<Phases>>,
    week: WeekKey,
    key: SlotKey,
}

impl GenerationGuard {
    pub fn week(&self) -> WeekKey {
        self.week
    }

    pub fn key(&self) -> SlotKey {
        self.key
    }
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        let removed = lock(&self.phases).remove(&(self.week, self.key));
        if let Some(phase) = removed {
            tracing::debug!(week = %self.week, key = %self.key, %phase, "slot back to idle");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn week() -> WeekKey {
        WeekKey::containing(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
    }

    #[test]
    fn valid_transitions() {
        use SlotPhase::*;
        assert!(GenerationTracker::is_valid_transition(Idle, Generating));
        assert!(GenerationTracker::is_valid_transition(Idle, Regenerating));
        assert!(GenerationTracker::is_valid_transition(Generating, Idle));
        assert!(GenerationTracker::is_valid_transition(Regenerating, Idle));

        assert!(!GenerationTracker::is_valid_transition(Generating, Regenerating));
        assert!(!GenerationTracker::is_valid_transition(Idle, Idle));
    }

    #[test]
    fn guard_drop_returns_to_idle() {
        let tracker = GenerationTracker::new();
        let key = SlotKey::new(Day::Monday, MealSlot::Lunch);
        let guard = tracker.begin(week(), key, SlotPhase::Generating).unwrap();
        assert_eq!(tracker.phase(week(), Day::Monday, MealSlot::Lunch), SlotPhase::Generating);
        assert_eq!(guard.key(), key);

        drop(guard);
        assert_eq!(tracker.phase(week(), Day::Monday, MealSlot::Lunch), SlotPhase::Idle);
        assert!(tracker.is_idle());
    }

    #[test]
    fn busy_key_cannot_begin_again() {
        let tracker = GenerationTracker::new();
        let key = SlotKey::new(Day::Friday, MealSlot::Dinner);
        let _guard = tracker.begin(week(), key, SlotPhase::Regenerating).unwrap();

        let err = tracker.begin(week(), key, SlotPhase::Generating).unwrap_err();
        assert_eq!(
            err,
            TrackerError::AlreadyInFlight {
                week: week(),
                key,
                phase: SlotPhase::Regenerating,
            }
        );
    }

    #[test]
    fn idle_target_is_rejected() {
        let tracker = GenerationTracker::new();
        let key = SlotKey::new(Day::Friday, MealSlot::Dinner);
        assert!(matches!(
            tracker.begin(week(), key, SlotPhase::Idle),
            Err(TrackerError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn weeks_are_tracked_separately() {
        let tracker = GenerationTracker::new();
        let key = SlotKey::new(Day::Monday, MealSlot::Breakfast);
        let _a = tracker.begin(week(), key, SlotPhase::Generating).unwrap();
        let _b = tracker.begin(week().next(), key, SlotPhase::Generating).unwrap();
        assert_eq!(tracker.in_flight(week()).len(), 1);
        assert_eq!(tracker.in_flight(week().next()).len(), 1);
    }

    #[test]
    fn guard_released_on_panic() {
        let tracker = GenerationTracker::new();
        let key = SlotKey::new(Day::Sunday, MealSlot::Lunch);
        let t = tracker.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = t.begin(week(), key, SlotPhase::Generating).unwrap();
            panic!("generator blew up");
        }));
        assert!(result.is_err());
        assert!(!tracker.is_generating(week(), Day::Sunday, MealSlot::Lunch));
    }
}
