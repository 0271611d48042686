//! Concurrent per-slot recipe generation.
//!
//! [`GenerationOrchestrator::generate`] spawns one task per target slot.
//! Each task marks its slot generating, calls the recipe generator, writes
//! the result into the grid of the week it was dispatched for and hands it
//! to the reconciliation layer. Tasks are independent: one failing leaves
//! its slot's previous meal in place and never touches its siblings.
//!
//! The returned [`GenerationBatch`] can be dropped (fire-and-forget) or
//! awaited for per-slot outcomes. There is no batch-level success flag.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::NewPlanItem;
use crate::events::{EventSink, PlannerEvent};
use crate::generator::{GenerationRequest, RecipeGenerator};
use crate::grid::{Meal, SharedGrid, SlotKey};
use crate::reconcile::ReconciliationLayer;
use crate::sync::lock;
use crate::tracker::{GenerationGuard, GenerationTracker, SlotPhase};
use crate::week::WeekKey;
use crate::{Day, MealSlot};

/// How one slot of a batch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    /// The grid holds the new meal. `persisted` is false for guests and
    /// when saving failed.
    Filled { recipe_id: String, persisted: bool },
    /// The generator failed; the slot kept its previous meal.
    Failed { message: String },
    /// The slot was already generating and was not dispatched again.
    Skipped,
    /// The session ended before the result arrived.
    Discarded,
}

impl SlotOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, Self::Filled { .. })
    }
}

/// Handle on the slots dispatched by one `generate` call.
#[derive(Debug)]
pub struct GenerationBatch {
    week: WeekKey,
    dispatched: Vec<(SlotKey, JoinHandle<SlotOutcome>)>,
    skipped: Vec<SlotKey>,
}

impl GenerationBatch {
    pub fn week(&self) -> WeekKey {
        self.week
    }

    /// Keys that were actually dispatched.
    pub fn dispatched(&self) -> Vec<SlotKey> {
        self.dispatched.iter().map(|(key, _)| *key).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.dispatched.is_empty() && self.skipped.is_empty()
    }

    /// Wait for every slot, tolerating failures, and return each slot's
    /// outcome in grid order.
    pub async fn settled(self) -> Vec<(SlotKey, SlotOutcome)> {
        let (keys, handles): (Vec<_>, Vec<_>) = self.dispatched.into_iter().unzip();
        let joined = join_all(handles).await;

        let mut outcomes: Vec<(SlotKey, SlotOutcome)> = keys
            .into_iter()
            .zip(joined)
            .map(|(key, joined)| {
                let outcome = joined.unwrap_or_else(|err| SlotOutcome::Failed {
                    message: format!("generation task aborted: {err}"),
                });
                (key, outcome)
            })
            .collect();
        outcomes.extend(self.skipped.into_iter().map(|key| (key, SlotOutcome::Skipped)));
        outcomes.sort_by_key(|(key, _)| *key);
        outcomes
    }
}

/// Preference text sent for a batch of `slots`.
///
/// Batches of two or more slots get a "for breakfast and lunch" suffix;
/// empty text stays empty.
pub fn batch_preferences(text: &str, slots: &[MealSlot]) -> String {
    let text = text.trim();
    let unique: BTreeSet<MealSlot> = slots.iter().copied().collect();
    if text.is_empty() || unique.len() < 2 {
        return text.to_string();
    }
    let names: Vec<String> = unique.iter().map(ToString::to_string).collect();
    let joined = match names.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{} and {last}", rest.join(", ")),
        _ => names.join(""),
    };
    format!("{text} for {joined}")
}

/// Fires generator calls and applies their results.
#[derive(Clone)]
pub struct GenerationOrchestrator {
    generator: Arc<dyn RecipeGenerator>,
    grid: SharedGrid,
    tracker: GenerationTracker,
    reconcile: Arc<ReconciliationLayer>,
    events: EventSink,
    cancel: CancellationToken,
}

impl std::fmt::Debug for GenerationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationOrchestrator")
            .field("generator", &self.generator.name())
            .finish_non_exhaustive()
    }
}

impl GenerationOrchestrator {
    pub fn new(
        generator: Arc<dyn RecipeGenerator>,
        grid: SharedGrid,
        tracker: GenerationTracker,
        reconcile: Arc<ReconciliationLayer>,
        events: EventSink,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            generator,
            grid,
            tracker,
            reconcile,
            events,
            cancel,
        }
    }

    pub fn tracker(&self) -> &GenerationTracker {
        &self.tracker
    }

    /// Generate meals for `slots` of `day` in `week`, all concurrently.
    ///
    /// Must be called from within a tokio runtime.
    pub fn generate(&self, week: WeekKey, day: Day, slots: &[MealSlot], text: &str) -> GenerationBatch {
        let preferences = batch_preferences(text, slots);
        self.dispatch(week, day, slots, &preferences, SlotPhase::Generating)
    }

    /// Replace the meal in one slot. Identical to a one-slot `generate`
    /// apart from the phase reported while it runs.
    pub fn regenerate(&self, week: WeekKey, day: Day, slot: MealSlot, text: &str) -> GenerationBatch {
        self.dispatch(week, day, &[slot], text.trim(), SlotPhase::Regenerating)
    }

    fn dispatch(
        &self,
        week: WeekKey,
        day: Day,
        slots: &[MealSlot],
        preferences: &str,
        phase: SlotPhase,
    ) -> GenerationBatch {
        let targets: BTreeSet<MealSlot> = slots.iter().copied().collect();
        let mut batch = GenerationBatch {
            week,
            dispatched: Vec::with_capacity(targets.len()),
            skipped: Vec::new(),
        };

        for slot in targets {
            let key = SlotKey::new(day, slot);
            let guard = match self.tracker.begin(week, key, phase) {
                Ok(guard) => guard,
                Err(err) => {
                    debug!(%week, %key, error = %err, "skipping slot");
                    batch.skipped.push(key);
                    continue;
                }
            };
            self.events.emit(PlannerEvent::SlotGenerating {
                week,
                key,
                regenerating: phase == SlotPhase::Regenerating,
            });

            let request = GenerationRequest {
                meal_type: slot,
                preferences: preferences.to_string(),
                day,
            };
            let this = self.clone();
            let handle = tokio::spawn(async move { this.run_slot(guard, request).await });
            batch.dispatched.push((key, handle));
        }

        info!(
            %week,
            %day,
            dispatched = batch.dispatched.len(),
            skipped = batch.skipped.len(),
            generator = self.generator.name(),
            "dispatched generation batch"
        );
        batch
    }

    /// One slot from generator call to persistence. `guard` holds the slot
    /// in its busy phase and is released before the backend write starts.
    async fn run_slot(self, guard: GenerationGuard, request: GenerationRequest) -> SlotOutcome {
        let week = guard.week();
        let key = guard.key();

        let result = tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!(%week, %key, "session ended, abandoning generation");
                return SlotOutcome::Discarded;
            }
            result = self.generator.generate_meal_recipe(&request) => result,
        };

        let recipe = match result {
            Ok(recipe) => recipe,
            Err(err) => {
                drop(guard);
                warn!(%week, %key, error = %err, "meal generation failed");
                self.events.emit(PlannerEvent::GenerationFailed {
                    week,
                    key,
                    message: err.to_string(),
                });
                return SlotOutcome::Failed {
                    message: err.to_string(),
                };
            }
        };

        let item = NewPlanItem::from_recipe(key.day, key.slot, recipe);
        let version = {
            let mut grid = lock(&self.grid);
            // Checked under the grid lock so a sign-out that clears the grid
            // cannot interleave with this write.
            if self.cancel.is_cancelled() {
                debug!(%week, %key, "session ended, discarding generated meal");
                return SlotOutcome::Discarded;
            }
            grid.set_in(week, key.day, key.slot, Meal::from_recipe(&item.recipe));
            self.reconcile.record_put(week, &item)
        };
        drop(guard);

        info!(%week, %key, recipe_id = %item.recipe_id, "meal generated");
        self.events.emit(PlannerEvent::SlotFilled {
            week,
            key,
            recipe_id: item.recipe_id.clone(),
            title: item.recipe.title.clone(),
        });

        let persisted = match self.reconcile.persist_item(week, &item, version).await {
            Ok(saved) => saved.is_some(),
            // Already logged and reported by the reconciliation layer.
            Err(_) => false,
        };
        SlotOutcome::Filled {
            recipe_id: item.recipe_id,
            persisted,
        }
    }
}
