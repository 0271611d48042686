//! Reconciliation between the local grid and the backend plan store.
//!
//! The layer owns a per-session cache of backend plans keyed by week and a
//! write ledger keyed by (week, day, slot). Every local write gets a
//! monotonic version and is mirrored into the cached plan synchronously,
//! under a temporary item id, before any backend call starts. Background
//! refreshes then only take backend data for keys whose last local write
//! was confirmed before the refresh started, so an optimistic meal is never
//! replaced by stale backend content.
//!
//! Guest sessions have no backend. All persistence is a no-op for them and
//! backend absence never clears their grid. An authenticated session that
//! hits [`BackendError::Unauthenticated`] becomes a guest for the rest of
//! its life.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{BackendError, BackendPlan, MealPlanBackend, NewPlanItem, PlanItem};
use crate::events::{EventSink, PlannerEvent};
use crate::grid::{Meal, MealPlan, MealPlanStateStore, SlotKey};
use crate::sync::lock;
use crate::week::WeekKey;
use crate::{Day, MealSlot};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Who the session persists for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    Guest,
    Authenticated { profile: String },
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guest => f.write_str("guest"),
            Self::Authenticated { profile } => write!(f, "profile {profile}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("backend call failed for week {week}: {source}")]
    Backend {
        week: WeekKey,
        #[source]
        source: BackendError,
    },
}

impl ReconcileError {
    pub fn week(&self) -> WeekKey {
        match self {
            Self::Backend { week, .. } => *week,
        }
    }
}

/// Result of re-reading one week from the backend.
///
/// Apply it with [`ReconciliationLayer::apply_snapshot`].
#[derive(Debug, Clone)]
pub struct WeekSnapshot {
    pub week: WeekKey,
    /// `None` when the backend has no plan for the week.
    pub plan: Option<BackendPlan>,
    started: u64,
}

/// A removal recorded locally but not yet applied to the backend.
#[derive(Debug)]
#[must_use = "a recorded removal does nothing until persisted"]
pub struct RemoveTicket {
    week: WeekKey,
    key: SlotKey,
    version: u64,
    /// Cached plan id and the saved item that was cached at the key.
    cached: Option<(Uuid, Option<PlanItem>)>,
}

// ---------------------------------------------------------------------------
// Write ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Put,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteStatus {
    Pending,
    Confirmed,
    /// Sticky until the key is written again.
    Failed,
}

#[derive(Debug, Clone, Copy)]
struct WriteStamp {
    version: u64,
    /// Clock value when the backend answered; 0 while pending.
    settled_at: u64,
    kind: WriteKind,
    status: WriteStatus,
}

#[derive(Debug, Default)]
struct LedgerState {
    plans: HashMap<WeekKey, BackendPlan>,
    /// Fetch start of the backend read each cached plan came from.
    fetched_at: HashMap<WeekKey, u64>,
    clock: u64,
    stamps: HashMap<(WeekKey, SlotKey), WriteStamp>,
    temp_ids: HashSet<Uuid>,
}

impl LedgerState {
    fn stamp(&mut self, week: WeekKey, key: SlotKey, kind: WriteKind) -> u64 {
        self.clock += 1;
        self.stamps.insert(
            (week, key),
            WriteStamp {
                version: self.clock,
                settled_at: 0,
                kind,
                status: WriteStatus::Pending,
            },
        );
        self.clock
    }

    /// Set the status of a write if it is still the latest for its key.
    fn settle(&mut self, week: WeekKey, key: SlotKey, version: u64, status: WriteStatus) -> bool {
        match self.stamps.get_mut(&(week, key)) {
            Some(stamp) if stamp.version == version => {
                self.clock += 1;
                stamp.status = status;
                stamp.settled_at = self.clock;
                true
            }
            _ => false,
        }
    }

    /// Tick the clock for a backend read and return its start.
    fn begin_fetch(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Keys whose local state must win over backend data fetched at `started`.
    ///
    /// Only keys whose write was confirmed before `started` take backend data.
    fn protected(&self, week: WeekKey, started: u64) -> BTreeSet<SlotKey> {
        self.stamps
            .iter()
            .filter(|((w, _), stamp)| {
                *w == week && (stamp.status != WriteStatus::Confirmed || stamp.settled_at > started)
            })
            .map(|((_, key), _)| *key)
            .collect()
    }

    /// Whether the cached plan of `week` comes from a read started after `started`.
    fn has_newer_fetch(&self, week: WeekKey, started: u64) -> bool {
        self.plans.contains_key(&week) && self.fetched_at.get(&week).is_some_and(|at| *at > started)
    }

    /// Cache a fetched plan, keeping the cached copy of protected keys.
    ///
    /// A read overtaken by a later one leaves the cache alone and returns
    /// the cached plan.
    fn store_fetched(&mut self, week: WeekKey, mut fetched: BackendPlan, started: u64) -> BackendPlan {
        if self.has_newer_fetch(week, started) {
            return self.plans.get(&week).cloned().unwrap_or(fetched);
        }
        let protected = self.protected(week, started);
        let cached = self.plans.get(&week);
        for key in &protected {
            match cached.and_then(|plan| plan.item(key.day, key.slot)) {
                Some(item) => fetched.upsert(item.clone()),
                None if cached.is_some() || self.is_removal(week, *key) => {
                    fetched.remove(key.day, key.slot);
                }
                None => {}
            }
        }
        self.plans.insert(week, fetched.clone());
        self.fetched_at.insert(week, started);
        fetched
    }

    fn is_removal(&self, week: WeekKey, key: SlotKey) -> bool {
        self.stamps
            .get(&(week, key))
            .is_some_and(|stamp| stamp.kind == WriteKind::Remove)
    }

    fn upsert_temp(&mut self, week: WeekKey, item: &NewPlanItem) {
        let Some(plan) = self.plans.get_mut(&week) else {
            return;
        };
        if plan
            .item(item.day, item.slot)
            .is_some_and(|existing| existing.recipe_id == item.recipe_id)
        {
            return;
        }
        let temp_id = Uuid::new_v4();
        self.temp_ids.insert(temp_id);
        plan.upsert(item.clone().into_item(temp_id));
    }
}

// ---------------------------------------------------------------------------
// Layer
// ---------------------------------------------------------------------------

enum Connection {
    Guest,
    Authenticated {
        profile: String,
        backend: Arc<dyn MealPlanBackend>,
    },
}

/// Mediates between optimistic local edits and the backend plan store.
pub struct ReconciliationLayer {
    connection: Mutex<Connection>,
    state: Mutex<LedgerState>,
    /// Per-week lookup-or-create locks so one week never gets two plans.
    ensure_locks: Mutex<HashMap<WeekKey, Arc<AsyncMutex<()>>>>,
    events: EventSink,
}

impl fmt::Debug for ReconciliationLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconciliationLayer")
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

impl ReconciliationLayer {
    /// A layer that persists nothing.
    pub fn guest(events: EventSink) -> Self {
        Self::with_connection(Connection::Guest, events)
    }

    /// A layer persisting to `backend` on behalf of `profile`.
    pub fn authenticated(
        backend: Arc<dyn MealPlanBackend>,
        profile: impl Into<String>,
        events: EventSink,
    ) -> Self {
        Self::with_connection(
            Connection::Authenticated {
                profile: profile.into(),
                backend,
            },
            events,
        )
    }

    fn with_connection(connection: Connection, events: EventSink) -> Self {
        Self {
            connection: Mutex::new(connection),
            state: Mutex::new(LedgerState::default()),
            ensure_locks: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn mode(&self) -> SessionMode {
        match &*lock(&self.connection) {
            Connection::Guest => SessionMode::Guest,
            Connection::Authenticated { profile, .. } => SessionMode::Authenticated {
                profile: profile.clone(),
            },
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(*lock(&self.connection), Connection::Guest)
    }

    fn connection(&self) -> Option<(String, Arc<dyn MealPlanBackend>)> {
        match &*lock(&self.connection) {
            Connection::Guest => None,
            Connection::Authenticated { profile, backend } => {
                Some((profile.clone(), Arc::clone(backend)))
            }
        }
    }

    /// Drop the backend for the rest of the session. Idempotent.
    pub fn enter_guest_mode(&self) {
        let mut connection = lock(&self.connection);
        if matches!(*connection, Connection::Guest) {
            return;
        }
        *connection = Connection::Guest;
        drop(connection);
        warn!("backend requires authentication, continuing as guest");
        self.events.emit(PlannerEvent::GuestModeEntered);
    }

    fn backend_error(&self, week: WeekKey, source: BackendError) -> ReconcileError {
        if source.is_unauthenticated() {
            self.enter_guest_mode();
        }
        ReconcileError::Backend { week, source }
    }

    // -----------------------------------------------------------------------
    // Plan lookup
    // -----------------------------------------------------------------------

    /// The cached backend plan of a week, if one has been loaded.
    pub fn cached_plan(&self, week: WeekKey) -> Option<BackendPlan> {
        lock(&self.state).plans.get(&week).cloned()
    }

    /// Read a week's plan from the backend without caching it.
    async fn fetch_week(
        &self,
        backend: &dyn MealPlanBackend,
        profile: &str,
        week: WeekKey,
    ) -> Result<Option<BackendPlan>, BackendError> {
        let cached_id = lock(&self.state).plans.get(&week).map(|plan| plan.id);
        if let Some(plan_id) = cached_id {
            match backend.fetch_plan(plan_id).await {
                Ok(plan) => return Ok(Some(plan)),
                Err(BackendError::PlanNotFound(_)) => {
                    debug!(%week, %plan_id, "cached plan vanished from backend");
                    let mut state = lock(&self.state);
                    if state.plans.get(&week).is_some_and(|p| p.id == plan_id) {
                        state.plans.remove(&week);
                        state.fetched_at.remove(&week);
                    }
                }
                Err(err) => return Err(err),
            }
        }
        let plans = backend.list_plans(profile).await?;
        Ok(plans.into_iter().find(|plan| plan.week == week))
    }

    /// The week's plan, from cache or backend, without creating one.
    ///
    /// Guests always get `None`.
    pub async fn lookup_plan(&self, week: WeekKey) -> Result<Option<BackendPlan>, ReconcileError> {
        if self.is_guest() {
            return Ok(None);
        }
        if let Some(plan) = self.cached_plan(week) {
            return Ok(Some(plan));
        }
        let Some((profile, backend)) = self.connection() else {
            return Ok(None);
        };
        let started = lock(&self.state).begin_fetch();
        let fetched = self
            .fetch_week(backend.as_ref(), &profile, week)
            .await
            .map_err(|err| self.backend_error(week, err))?;
        Ok(fetched.map(|plan| lock(&self.state).store_fetched(week, plan, started)))
    }

    /// The week's plan, created on the backend if it does not exist yet.
    ///
    /// Concurrent callers for the same week share one lookup-or-create, so
    /// a week never ends up with two plans. Other weeks are not held up.
    /// Guests get `None`.
    pub async fn ensure_plan(&self, week: WeekKey) -> Result<Option<BackendPlan>, ReconcileError> {
        if self.is_guest() {
            return Ok(None);
        }
        if let Some(plan) = self.cached_plan(week) {
            return Ok(Some(plan));
        }

        let week_lock = Arc::clone(lock(&self.ensure_locks).entry(week).or_default());
        let _single_flight = week_lock.lock().await;
        if let Some(plan) = self.cached_plan(week) {
            return Ok(Some(plan));
        }
        let Some((profile, backend)) = self.connection() else {
            return Ok(None);
        };

        let started = lock(&self.state).begin_fetch();
        let existing = self
            .fetch_week(backend.as_ref(), &profile, week)
            .await
            .map_err(|err| self.backend_error(week, err))?;
        let plan = match existing {
            Some(plan) => plan,
            None => {
                let plan = backend
                    .create_plan(&profile, week)
                    .await
                    .map_err(|err| self.backend_error(week, err))?;
                info!(%week, plan_id = %plan.id, %profile, "created backend plan");
                plan
            }
        };
        Ok(Some(lock(&self.state).store_fetched(week, plan, started)))
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Record a local write of `item` and mirror it into the cached plan.
    ///
    /// Call this in the same critical section as the grid write. The
    /// returned version is handed to [`Self::persist_item`].
    pub fn record_put(&self, week: WeekKey, item: &NewPlanItem) -> u64 {
        let mut state = lock(&self.state);
        let version = state.stamp(week, SlotKey::new(item.day, item.slot), WriteKind::Put);
        state.upsert_temp(week, item);
        version
    }

    /// Save a recorded write to the backend.
    ///
    /// Returns the stored item, or `None` when nothing is persisted (guest
    /// sessions, or a session that just lost authentication). On failure
    /// the local meal stays and the key stays protected from refreshes.
    pub async fn persist_item(
        &self,
        week: WeekKey,
        item: &NewPlanItem,
        version: u64,
    ) -> Result<Option<PlanItem>, ReconcileError> {
        let key = SlotKey::new(item.day, item.slot);
        match self.try_persist(week, item, version).await {
            Ok(Some(saved)) => Ok(Some(saved)),
            Ok(None) => {
                lock(&self.state).settle(week, key, version, WriteStatus::Confirmed);
                Ok(None)
            }
            Err(err) => {
                lock(&self.state).settle(week, key, version, WriteStatus::Failed);
                if self.is_guest() {
                    return Ok(None);
                }
                warn!(%week, %key, error = %err, "failed to persist meal, keeping local copy");
                self.events.emit(PlannerEvent::PersistFailed {
                    week,
                    key,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn try_persist(
        &self,
        week: WeekKey,
        item: &NewPlanItem,
        version: u64,
    ) -> Result<Option<PlanItem>, ReconcileError> {
        let key = SlotKey::new(item.day, item.slot);
        let Some(plan) = self.ensure_plan(week).await? else {
            return Ok(None);
        };
        let Some((_, backend)) = self.connection() else {
            return Ok(None);
        };

        {
            let mut state = lock(&self.state);
            if state.stamps.get(&(week, key)).is_some_and(|s| s.version == version) {
                state.upsert_temp(week, item);
            }
        }

        let saved = backend
            .add_item(plan.id, item)
            .await
            .map_err(|err| self.backend_error(week, err))?;

        let superseded_by_remove = {
            let mut guard = lock(&self.state);
            let state = &mut *guard;
            if state.settle(week, key, version, WriteStatus::Confirmed) {
                if let Some(cached) = state.plans.get_mut(&week) {
                    if let Some(old) = cached.item(key.day, key.slot) {
                        state.temp_ids.remove(&old.id);
                    }
                    cached.upsert(saved.clone());
                }
                false
            } else {
                state.is_removal(week, key)
            }
        };

        if superseded_by_remove {
            debug!(%week, %key, item_id = %saved.id, "meal removed while saving, deleting saved item");
            if let Err(err) = backend.remove_item(plan.id, saved.id).await {
                warn!(%week, %key, error = %err, "failed to delete superseded item");
            }
        } else {
            debug!(%week, %key, item_id = %saved.id, recipe_id = %saved.recipe_id, "meal persisted");
        }
        Ok(Some(saved))
    }

    /// Delete the backend item at a key, if there is one.
    ///
    /// The cached plan drops the key immediately. Returns whether a backend
    /// item was deleted; guests always get `false`.
    pub async fn remove_item(&self, week: WeekKey, day: Day, slot: MealSlot) -> Result<bool, ReconcileError> {
        let ticket = self.record_remove(week, day, slot);
        self.persist_remove(ticket).await
    }

    /// Record a local removal and drop the key from the cached plan.
    ///
    /// Call this in the same critical section as the grid clear, then pass
    /// the ticket to [`Self::persist_remove`].
    pub fn record_remove(&self, week: WeekKey, day: Day, slot: MealSlot) -> RemoveTicket {
        let key = SlotKey::new(day, slot);
        let mut state = lock(&self.state);
        let version = state.stamp(week, key, WriteKind::Remove);
        let plan_id = state.plans.get(&week).map(|plan| plan.id);
        let removed = state.plans.get_mut(&week).and_then(|plan| plan.remove(day, slot));
        let removed = removed.filter(|item| !state.temp_ids.remove(&item.id));
        RemoveTicket {
            week,
            key,
            version,
            cached: plan_id.map(|id| (id, removed)),
        }
    }

    /// Apply a recorded removal to the backend.
    pub async fn persist_remove(&self, ticket: RemoveTicket) -> Result<bool, ReconcileError> {
        let RemoveTicket {
            week,
            key,
            version,
            cached,
        } = ticket;
        match self.try_remove(week, key, cached).await {
            Ok(deleted) => {
                lock(&self.state).settle(week, key, version, WriteStatus::Confirmed);
                Ok(deleted)
            }
            Err(err) => {
                lock(&self.state).settle(week, key, version, WriteStatus::Failed);
                if self.is_guest() {
                    return Ok(false);
                }
                warn!(%week, %key, error = %err, "failed to remove meal from backend");
                self.events.emit(PlannerEvent::PersistFailed {
                    week,
                    key,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Whether `item_id` is a placeholder for an item not yet saved.
    pub fn is_unsaved(&self, item_id: Uuid) -> bool {
        lock(&self.state).temp_ids.contains(&item_id)
    }

    async fn try_remove(
        &self,
        week: WeekKey,
        key: SlotKey,
        cached: Option<(Uuid, Option<PlanItem>)>,
    ) -> Result<bool, ReconcileError> {
        let Some((profile, backend)) = self.connection() else {
            return Ok(false);
        };

        let target = match cached {
            Some((plan_id, Some(item))) => Some((plan_id, item.id)),
            // Not cached, or cached under a temporary id: ask the backend.
            _ => self
                .fetch_week(backend.as_ref(), &profile, week)
                .await
                .map_err(|err| self.backend_error(week, err))?
                .and_then(|plan| plan.item(key.day, key.slot).map(|item| (plan.id, item.id))),
        };

        let Some((plan_id, item_id)) = target else {
            debug!(%week, %key, "no backend item to remove");
            return Ok(false);
        };
        let deleted = backend
            .remove_item(plan_id, item_id)
            .await
            .map_err(|err| self.backend_error(week, err))?;
        info!(%week, %key, %item_id, deleted, "removed backend item");
        Ok(deleted)
    }

    // -----------------------------------------------------------------------
    // Reads into the grid
    // -----------------------------------------------------------------------

    /// One grid meal per populated key of a backend plan.
    pub fn merge_backend_into_local(plan: &BackendPlan) -> MealPlan {
        let mut local = MealPlan::new();
        for item in &plan.items {
            local.set(item.day, item.slot, Meal::from_recipe(&item.recipe));
        }
        local
    }

    /// Re-read a week from the backend.
    ///
    /// Returns `None` for guests: their grid is never replaced by backend
    /// state.
    pub async fn refresh_week(&self, week: WeekKey) -> Result<Option<WeekSnapshot>, ReconcileError> {
        let Some((profile, backend)) = self.connection() else {
            return Ok(None);
        };
        let started = lock(&self.state).begin_fetch();
        let fetched = self
            .fetch_week(backend.as_ref(), &profile, week)
            .await
            .map_err(|err| self.backend_error(week, err))?;

        if self.is_guest() {
            return Ok(None);
        }
        let plan = {
            let mut state = lock(&self.state);
            if state.has_newer_fetch(week, started) {
                debug!(%week, "a later refresh already landed, keeping its plan");
                state.plans.get(&week).cloned()
            } else {
                fetched.map(|plan| state.store_fetched(week, plan, started))
            }
        };
        debug!(%week, found = plan.is_some(), "refreshed week from backend");
        Ok(Some(WeekSnapshot { week, plan, started }))
    }

    /// Write a snapshot into the grid, keeping every key with a local write
    /// that is pending, failed or newer than the snapshot.
    ///
    /// Returns the number of meals the week holds afterwards.
    pub fn apply_snapshot(&self, grid: &mut MealPlanStateStore, snapshot: &WeekSnapshot) -> usize {
        let week = snapshot.week;
        let protected = lock(&self.state).protected(week, snapshot.started);

        let mut merged = snapshot
            .plan
            .as_ref()
            .map(Self::merge_backend_into_local)
            .unwrap_or_default();
        for key in &protected {
            match grid.get_in(week, key.day, key.slot) {
                Some(meal) => {
                    merged.set(key.day, key.slot, meal.clone());
                }
                None => {
                    merged.clear(key.day, key.slot);
                }
            }
        }
        if !protected.is_empty() {
            debug!(%week, kept = protected.len(), "kept local meals over backend data");
        }
        let meals = merged.len();
        grid.replace_week(week, merged);
        meals
    }

    /// Forget every cached plan and write record.
    pub fn reset(&self) {
        *lock(&self.state) = LedgerState::default();
    }
}
