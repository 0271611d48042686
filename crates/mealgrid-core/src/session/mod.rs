//! Per-session planner entry point.
//!
//! A [`PlannerSession`] owns everything one signed-in (or guest) user
//! needs: the week grids, the selection, the generating set and the
//! backend plan cache. Nothing is global; signing out cancels outstanding
//! work and drops all of it.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::MealPlanBackend;
use crate::config::PlannerConfig;
use crate::events::{EventReceiver, EventSink, PlannerEvent};
use crate::generator::RecipeGenerator;
use crate::grid::{Meal, MealPlan, MealPlanStateStore, SharedGrid, SlotKey};
use crate::intent::IntentParser;
use crate::orchestrator::{GenerationBatch, GenerationOrchestrator};
use crate::reconcile::{ReconcileError, ReconciliationLayer, SessionMode};
use crate::selection::SelectionManager;
use crate::sync::lock;
use crate::tracker::{GenerationTracker, SlotPhase};
use crate::week::WeekKey;
use crate::{Day, MealSlot};

/// Where a session saves its plans.
pub enum Persistence {
    /// Local only.
    Guest,
    Backend {
        backend: Arc<dyn MealPlanBackend>,
        profile: String,
    },
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Guest => f.write_str("Guest"),
            Self::Backend { profile, .. } => {
                f.debug_struct("Backend").field("profile", profile).finish_non_exhaustive()
            }
        }
    }
}

/// Outcome of loading a week into the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekLoad {
    pub week: WeekKey,
    /// Whether backend data was merged.
    pub from_backend: bool,
    /// Meals in the week afterwards.
    pub meals: usize,
}

/// One user's planner.
pub struct PlannerSession {
    parser: IntentParser,
    grid: SharedGrid,
    selection: SelectionManager,
    tracker: GenerationTracker,
    reconcile: Arc<ReconciliationLayer>,
    orchestrator: GenerationOrchestrator,
    events: EventSink,
    cancel: CancellationToken,
}

impl std::fmt::Debug for PlannerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannerSession")
            .field("mode", &self.mode())
            .field("week", &self.displayed_week())
            .field("day", &self.active_day())
            .finish_non_exhaustive()
    }
}

impl PlannerSession {
    /// Start a session showing the week and day of `today`.
    ///
    /// Nothing is loaded yet; call [`Self::refresh`] to pull the displayed
    /// week from the backend.
    pub fn start(
        generator: Arc<dyn RecipeGenerator>,
        persistence: Persistence,
        config: PlannerConfig,
        today: NaiveDate,
    ) -> (Self, EventReceiver) {
        let (events, rx) = EventSink::channel();
        let (week, day) = WeekKey::locate(today);

        let reconcile = Arc::new(match persistence {
            Persistence::Guest => ReconciliationLayer::guest(events.clone()),
            Persistence::Backend { backend, profile } => {
                ReconciliationLayer::authenticated(backend, profile, events.clone())
            }
        });
        let grid = MealPlanStateStore::shared(week);
        let tracker = GenerationTracker::new();
        let cancel = CancellationToken::new();
        let orchestrator = GenerationOrchestrator::new(
            generator,
            Arc::clone(&grid),
            tracker.clone(),
            Arc::clone(&reconcile),
            events.clone(),
            cancel.clone(),
        );

        info!(%week, %day, mode = %reconcile.mode(), "planner session started");
        let session = Self {
            parser: IntentParser::new(config.intent),
            grid,
            selection: SelectionManager::new(day),
            tracker,
            reconcile,
            orchestrator,
            events,
            cancel,
        };
        (session, rx)
    }

    // -----------------------------------------------------------------------
    // Read side
    // -----------------------------------------------------------------------

    pub fn mode(&self) -> SessionMode {
        self.reconcile.mode()
    }

    pub fn displayed_week(&self) -> WeekKey {
        lock(&self.grid).displayed_week()
    }

    pub fn active_day(&self) -> Day {
        self.selection.active_day()
    }

    /// Copy of the displayed week's grid.
    pub fn plan(&self) -> MealPlan {
        lock(&self.grid).plan().clone()
    }

    pub fn meal(&self, day: Day, slot: MealSlot) -> Option<Meal> {
        lock(&self.grid).get(day, slot).cloned()
    }

    pub fn day_has_any_meal(&self, day: Day) -> bool {
        lock(&self.grid).day_has_any_meal(day)
    }

    /// Loading phase of a slot in the displayed week.
    pub fn phase(&self, day: Day, slot: MealSlot) -> SlotPhase {
        self.tracker.phase(self.displayed_week(), day, slot)
    }

    pub fn tracker(&self) -> &GenerationTracker {
        &self.tracker
    }

    pub fn reconciliation(&self) -> &ReconciliationLayer {
        &self.reconcile
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    pub fn selection(&self) -> &SelectionManager {
        &self.selection
    }

    pub fn toggle(&mut self, slot: MealSlot) -> bool {
        let day = self.active_day();
        self.selection.toggle(day, slot)
    }

    /// Select every slot of the active day, or clear them if all are
    /// already selected.
    pub fn toggle_all(&mut self) {
        let keys = SlotKey::day(self.active_day());
        self.selection.toggle_all(&keys);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Change the active day; the selection is cleared if it changes.
    pub fn set_active_day(&mut self, day: Day) -> bool {
        self.selection.set_active_day(day)
    }

    // -----------------------------------------------------------------------
    // Generation
    // -----------------------------------------------------------------------

    /// Slots the user's text asks for.
    pub fn parse(&self, text: &str) -> Vec<MealSlot> {
        self.parser.parse_slots(text)
    }

    /// Generate from free text for the active day.
    ///
    /// Selected slots take precedence over the parsed intent. The selection
    /// is cleared once the batch is dispatched.
    pub fn generate_from_text(&mut self, text: &str) -> GenerationBatch {
        let slots = if self.selection.is_empty() {
            self.parser.parse_slots(text)
        } else {
            self.selection.slots()
        };
        let batch = self.generate(&slots, text);
        self.selection.clear();
        batch
    }

    /// Generate specific slots of the active day.
    pub fn generate(&self, slots: &[MealSlot], text: &str) -> GenerationBatch {
        self.orchestrator
            .generate(self.displayed_week(), self.active_day(), slots, text)
    }

    /// Replace the meal in one slot of the displayed week.
    pub fn regenerate(&self, day: Day, slot: MealSlot, text: &str) -> GenerationBatch {
        self.orchestrator
            .regenerate(self.displayed_week(), day, slot, text)
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    /// Empty a slot of the displayed week and delete its backend item.
    ///
    /// The grid changes immediately; a backend failure is reported but not
    /// rolled back. Returns whether a backend item was deleted.
    pub async fn remove_meal(&self, day: Day, slot: MealSlot) -> Result<bool, ReconcileError> {
        let (week, ticket) = {
            let mut grid = lock(&self.grid);
            let week = grid.displayed_week();
            grid.clear_in(week, day, slot);
            (week, self.reconcile.record_remove(week, day, slot))
        };
        self.events.emit(PlannerEvent::SlotRemoved {
            week,
            key: SlotKey::new(day, slot),
        });
        self.reconcile.persist_remove(ticket).await
    }

    // -----------------------------------------------------------------------
    // Weeks
    // -----------------------------------------------------------------------

    /// Display another week and load it.
    ///
    /// Guests see their local copy of the week (empty if never edited).
    /// Authenticated sessions merge the backend plan, or clear the week if
    /// there is none, keeping unsaved local writes either way. On a backend
    /// error the week is shown as held locally and the error returned.
    pub async fn switch_week(&mut self, week: WeekKey) -> Result<WeekLoad, ReconcileError> {
        lock(&self.grid).show_week(week);
        self.selection.clear();
        self.load_week(week).await
    }

    pub async fn next_week(&mut self) -> Result<WeekLoad, ReconcileError> {
        let week = self.displayed_week().next();
        self.switch_week(week).await
    }

    pub async fn previous_week(&mut self) -> Result<WeekLoad, ReconcileError> {
        let week = self.displayed_week().previous();
        self.switch_week(week).await
    }

    /// Re-read the displayed week from the backend.
    pub async fn refresh(&self) -> Result<WeekLoad, ReconcileError> {
        self.load_week(self.displayed_week()).await
    }

    async fn load_week(&self, week: WeekKey) -> Result<WeekLoad, ReconcileError> {
        let snapshot = match self.reconcile.refresh_week(week).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(%week, error = %err, "could not load week, showing local data");
                return Err(err);
            }
        };

        let load = match snapshot {
            Some(snapshot) => {
                let meals = self
                    .reconcile
                    .apply_snapshot(&mut lock(&self.grid), &snapshot);
                WeekLoad {
                    week,
                    from_backend: snapshot.plan.is_some(),
                    meals,
                }
            }
            None => WeekLoad {
                week,
                from_backend: false,
                meals: lock(&self.grid).week_plan(week).len(),
            },
        };
        info!(%week, from_backend = load.from_backend, meals = load.meals, "week loaded");
        self.events.emit(PlannerEvent::WeekLoaded {
            week,
            from_backend: load.from_backend,
            meals: load.meals,
        });
        Ok(load)
    }

    // -----------------------------------------------------------------------
    // Grocery export
    // -----------------------------------------------------------------------

    /// Saved backend item ids of the selected slots.
    ///
    /// Selected slots with no saved item (not generated, still saving, or
    /// guest sessions) are left out.
    pub async fn grocery_item_ids(&self) -> Result<Vec<Uuid>, ReconcileError> {
        let week = self.displayed_week();
        let Some(plan) = self.reconcile.lookup_plan(week).await? else {
            return Ok(Vec::new());
        };
        Ok(self
            .selection
            .item_ids(&plan)
            .into_iter()
            .filter(|id| !self.reconcile.is_unsaved(*id))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// End the session. In-flight generations are abandoned and their
    /// results discarded; all local state is dropped.
    pub fn sign_out(self) {
        self.cancel.cancel();
        lock(&self.grid).clear_all();
        self.reconcile.reset();
        info!("planner session signed out");
    }
}

impl Drop for PlannerSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{GenerationError, GenerationRequest};
    use crate::orchestrator::SlotOutcome;
    use crate::{Nutrition, Recipe};
    use async_trait::async_trait;

    /// Titles recipes after the preferences it was sent.
    struct EchoGenerator;

    #[async_trait]
    impl RecipeGenerator for EchoGenerator {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate_meal_recipe(
            &self,
            request: &GenerationRequest,
        ) -> Result<Recipe, GenerationError> {
            Ok(Recipe {
                id: format!("{}-{}", request.day, request.meal_type),
                title: request.preferences.clone(),
                servings: 1,
                cook_time_minutes: 10,
                nutrition: Nutrition::default(),
                grade: None,
            })
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn guest() -> (PlannerSession, EventReceiver) {
        PlannerSession::start(
            Arc::new(EchoGenerator),
            Persistence::Guest,
            PlannerConfig::default(),
            monday(),
        )
    }

    #[test]
    fn starts_on_today() {
        let (session, _rx) = PlannerSession::start(
            Arc::new(EchoGenerator),
            Persistence::Guest,
            PlannerConfig::default(),
            NaiveDate::from_ymd_opt(2026, 10, 22).unwrap(),
        );
        assert_eq!(session.displayed_week().start(), monday());
        assert_eq!(session.active_day(), Day::Thursday);
        assert_eq!(session.mode(), SessionMode::Guest);
    }

    #[tokio::test]
    async fn text_generation_uses_parsed_intent() {
        let (mut session, _rx) = guest();
        let outcomes = session.generate_from_text("pasta").settled().await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, SlotKey::new(Day::Monday, MealSlot::Lunch));
        assert!(session.meal(Day::Monday, MealSlot::Lunch).is_some());
        assert!(session.day_has_any_meal(Day::Monday));
    }

    #[tokio::test]
    async fn selection_overrides_intent_and_is_cleared() {
        let (mut session, _rx) = guest();
        session.toggle(MealSlot::Breakfast);
        session.toggle(MealSlot::Dinner);

        let outcomes = session.generate_from_text("pasta").settled().await;
        let keys: Vec<MealSlot> = outcomes.iter().map(|(key, _)| key.slot).collect();
        assert_eq!(keys, vec![MealSlot::Breakfast, MealSlot::Dinner]);
        assert!(session.selection().is_empty());
        assert_eq!(
            session.meal(Day::Monday, MealSlot::Dinner).unwrap().title,
            "pasta for breakfast and dinner"
        );
    }

    #[tokio::test]
    async fn remove_meal_clears_slot_and_emits() {
        let (session, mut rx) = guest();
        session.regenerate(Day::Monday, MealSlot::Dinner, "stew").settled().await;
        assert!(session.meal(Day::Monday, MealSlot::Dinner).is_some());

        assert!(!session.remove_meal(Day::Monday, MealSlot::Dinner).await.unwrap());
        assert!(session.meal(Day::Monday, MealSlot::Dinner).is_none());

        let mut saw_removed = false;
        while let Ok(event) = rx.try_recv() {
            saw_removed |= matches!(event, PlannerEvent::SlotRemoved { .. });
        }
        assert!(saw_removed);
    }

    #[tokio::test]
    async fn guest_week_switch_keeps_each_week() {
        let (mut session, _rx) = guest();
        session.generate(&[MealSlot::Lunch], "soup").settled().await;
        let this_week = session.plan();

        let load = session.next_week().await.unwrap();
        assert!(!load.from_backend);
        assert_eq!(load.meals, 0);
        assert!(session.plan().is_empty());

        session.previous_week().await.unwrap();
        assert_eq!(session.plan(), this_week);
    }

    #[tokio::test]
    async fn changing_day_clears_selection() {
        let (mut session, _rx) = guest();
        session.toggle_all();
        assert_eq!(session.selection().all().len(), 3);
        session.set_active_day(Day::Tuesday);
        assert!(session.selection().is_empty());
    }

    #[tokio::test]
    async fn grocery_ids_empty_for_guest() {
        let (mut session, _rx) = guest();
        session.generate(&[MealSlot::Lunch], "soup").settled().await;
        session.toggle(MealSlot::Lunch);
        assert!(session.grocery_item_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sign_out_discards_in_flight_results() {
        struct SlowGenerator;

        #[async_trait]
        impl RecipeGenerator for SlowGenerator {
            fn name(&self) -> &str {
                "slow"
            }

            async fn generate_meal_recipe(
                &self,
                _request: &GenerationRequest,
            ) -> Result<Recipe, GenerationError> {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                Err(GenerationError::Failed("too slow".into()))
            }
        }

        let (mut session, _rx) = PlannerSession::start(
            Arc::new(SlowGenerator),
            Persistence::Guest,
            PlannerConfig::default(),
            monday(),
        );
        let batch = session.generate_from_text("");
        let tracker = session.tracker().clone();
        session.sign_out();

        let outcomes = batch.settled().await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|(_, o)| *o == SlotOutcome::Discarded));
        assert!(tracker.is_idle());
    }
}
