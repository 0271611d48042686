//! Shared test utilities for mealgrid integration tests.
//!
//! - A PostgreSQL instance shared across the tests of one binary, with one
//!   database per test. `MEALGRID_TEST_PG_URL` points the tests at an
//!   existing server; otherwise a container is started through
//!   testcontainers. When neither is available the Postgres tests skip.
//! - [`InMemoryBackend`]: a [`MealPlanBackend`] with failure injection.
//! - [`ScriptedGenerator`]: a [`RecipeGenerator`] with per-slot outcomes and
//!   delays, for completion-order tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use testcontainers::ContainerAsync;
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use mealgrid_core::backend::{BackendError, BackendPlan, MealPlanBackend, NewPlanItem, PlanItem};
use mealgrid_core::generator::{GenerationError, GenerationRequest, RecipeGenerator};
use mealgrid_core::week::WeekKey;
use mealgrid_core::{Day, MealSlot, Nutrition, Recipe};
use mealgrid_db::pool;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ===========================================================================
// Shared PostgreSQL
// ===========================================================================

/// Shared server state: base URL and optional container handle (kept alive).
struct SharedPg {
    base_url: String,
    /// Held to keep the container alive. `None` when using an external URL.
    _container: Option<ContainerAsync<Postgres>>,
}

static SHARED_PG: OnceCell<Option<SharedPg>> = OnceCell::const_new();

async fn init_shared_pg() -> Option<SharedPg> {
    if let Ok(url) = std::env::var("MEALGRID_TEST_PG_URL") {
        return Some(SharedPg {
            base_url: url.trim_end_matches('/').to_string(),
            _container: None,
        });
    }

    let container = match Postgres::default().with_tag("18").start().await {
        Ok(container) => container,
        Err(e) => {
            eprintln!("PostgreSQL container unavailable, skipping database tests: {e}");
            return None;
        }
    };
    let host = container.get_host().await.ok()?;
    let port = container.get_host_port_ipv4(5432).await.ok()?;

    Some(SharedPg {
        base_url: format!("postgresql://postgres:postgres@{host}:{port}"),
        _container: Some(container),
    })
}

/// Base URL of the shared server (no database name), if one is reachable.
pub async fn pg_url() -> Option<&'static str> {
    SHARED_PG
        .get_or_init(init_shared_pg)
        .await
        .as_ref()
        .map(|shared| shared.base_url.as_str())
}

/// Create a temporary database with migrations applied.
///
/// Returns `None` when no PostgreSQL is available; callers return early
/// so the test counts as skipped. Call [`drop_test_db`] with the returned
/// name when done.
pub async fn try_create_test_db() -> Option<(PgPool, String)> {
    let base_url = pg_url().await?;

    let db_name = format!("mealgrid_test_{}", Uuid::new_v4().simple());
    let maint_pool = connect(base_url, "postgres", 1).await;
    maint_pool
        .execute(format!("CREATE DATABASE {db_name}").as_str())
        .await
        .unwrap_or_else(|e| panic!("failed to create temp database {db_name}: {e}"));
    maint_pool.close().await;

    let temp_pool = connect(base_url, &db_name, 5).await;
    pool::run_migrations(&temp_pool)
        .await
        .expect("migrations should succeed");

    Some((temp_pool, db_name))
}

/// Drop a temporary database, disconnecting its sessions first. Safe to
/// call twice.
pub async fn drop_test_db(db_name: &str) {
    let Some(base_url) = pg_url().await else {
        return;
    };
    let maint_pool = connect(base_url, "postgres", 1).await;

    let _ = sqlx::query(
        "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
         WHERE datname = $1 AND pid <> pg_backend_pid()",
    )
    .bind(db_name)
    .execute(&maint_pool)
    .await;
    let _ = maint_pool
        .execute(format!("DROP DATABASE IF EXISTS {db_name}").as_str())
        .await;
    maint_pool.close().await;
}

async fn connect(base_url: &str, db_name: &str, max_connections: u32) -> PgPool {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&format!("{base_url}/{db_name}"))
        .await
        .unwrap_or_else(|e| panic!("failed to connect to test database {db_name}: {e}"))
}

// ===========================================================================
// Recipes
// ===========================================================================

/// A small recipe with the given id.
pub fn recipe(id: &str) -> Recipe {
    Recipe {
        id: id.to_string(),
        title: format!("Recipe {id}"),
        servings: 2,
        cook_time_minutes: 20,
        nutrition: Nutrition {
            calories: 450,
            protein_g: 20.0,
            carbs_g: 50.0,
            fat_g: 15.0,
        },
        grade: Some("B".to_string()),
    }
}

// ===========================================================================
// In-memory backend
// ===========================================================================

#[derive(Debug, Default)]
struct BackendState {
    plans: HashMap<Uuid, (String, BackendPlan)>,
    signed_out: bool,
    failing_adds: usize,
    failing_lists: usize,
    add_delay: Option<Duration>,
    fetch_delay: Option<Duration>,
    create_delays: HashMap<WeekKey, Duration>,
    create_calls: usize,
    add_calls: usize,
}

/// [`MealPlanBackend`] held in memory.
///
/// Failures can be injected per operation, and [`Self::sign_out`] makes
/// every later call fail as unauthenticated.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<BackendState>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call fail with [`BackendError::Unauthenticated`].
    pub fn sign_out(&self) {
        lock(&self.state).signed_out = true;
    }

    /// Fail the next `n` `add_item` calls.
    pub fn fail_next_adds(&self, n: usize) {
        lock(&self.state).failing_adds = n;
    }

    /// Fail the next `n` `list_plans` calls.
    pub fn fail_next_lists(&self, n: usize) {
        lock(&self.state).failing_lists = n;
    }

    /// Delay every `add_item` call.
    pub fn delay_adds(&self, delay: Duration) {
        lock(&self.state).add_delay = Some(delay);
    }

    /// Delay every `fetch_plan` call after it has read the plan, so the
    /// caller gets data as of the start of the call.
    pub fn delay_fetches(&self, delay: Duration) {
        lock(&self.state).fetch_delay = Some(delay);
    }

    /// Delay `create_plan` calls for one week.
    pub fn delay_creates(&self, week: WeekKey, delay: Duration) {
        lock(&self.state).create_delays.insert(week, delay);
    }

    pub fn create_calls(&self) -> usize {
        lock(&self.state).create_calls
    }

    pub fn add_calls(&self) -> usize {
        lock(&self.state).add_calls
    }

    /// The stored plan of a profile's week.
    pub fn plan_for(&self, profile: &str, week: WeekKey) -> Option<BackendPlan> {
        lock(&self.state)
            .plans
            .values()
            .find(|(owner, plan)| owner == profile && plan.week == week)
            .map(|(_, plan)| plan.clone())
    }

    /// Store an item directly, as another device would.
    pub fn put_item(&self, profile: &str, week: WeekKey, day: Day, slot: MealSlot, recipe: Recipe) -> PlanItem {
        let mut state = lock(&self.state);
        let existing = state
            .plans
            .iter()
            .find(|(_, (owner, plan))| owner == profile && plan.week == week)
            .map(|(id, _)| *id);
        let plan_id = existing.unwrap_or_else(|| {
            let id = Uuid::new_v4();
            state
                .plans
                .insert(id, (profile.to_string(), BackendPlan::new(id, week)));
            id
        });
        let item = NewPlanItem::from_recipe(day, slot, recipe).into_item(Uuid::new_v4());
        if let Some((_, plan)) = state.plans.get_mut(&plan_id) {
            plan.upsert(item.clone());
        }
        item
    }

    fn check_auth(state: &BackendState) -> Result<(), BackendError> {
        if state.signed_out {
            Err(BackendError::Unauthenticated)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MealPlanBackend for InMemoryBackend {
    async fn list_plans(&self, profile: &str) -> Result<Vec<BackendPlan>, BackendError> {
        let mut state = lock(&self.state);
        Self::check_auth(&state)?;
        if state.failing_lists > 0 {
            state.failing_lists -= 1;
            return Err(anyhow::anyhow!("injected list failure").into());
        }
        let mut plans: Vec<BackendPlan> = state
            .plans
            .values()
            .filter(|(owner, _)| owner == profile)
            .map(|(_, plan)| plan.clone())
            .collect();
        plans.sort_by_key(|plan| std::cmp::Reverse(plan.week));
        Ok(plans)
    }

    async fn create_plan(&self, profile: &str, week: WeekKey) -> Result<BackendPlan, BackendError> {
        let delay = lock(&self.state).create_delays.get(&week).copied();
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            // Yield so concurrent callers can interleave here.
            None => tokio::task::yield_now().await,
        }
        let mut state = lock(&self.state);
        Self::check_auth(&state)?;
        state.create_calls += 1;
        if let Some((_, plan)) = state
            .plans
            .values()
            .find(|(owner, plan)| owner == profile && plan.week == week)
        {
            return Ok(plan.clone());
        }
        let plan = BackendPlan::new(Uuid::new_v4(), week);
        state
            .plans
            .insert(plan.id, (profile.to_string(), plan.clone()));
        Ok(plan)
    }

    async fn add_item(&self, plan_id: Uuid, item: &NewPlanItem) -> Result<PlanItem, BackendError> {
        let delay = {
            let mut state = lock(&self.state);
            Self::check_auth(&state)?;
            state.add_calls += 1;
            if state.failing_adds > 0 {
                state.failing_adds -= 1;
                return Err(anyhow::anyhow!("injected add failure").into());
            }
            state.add_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock(&self.state);
        let (_, plan) = state
            .plans
            .get_mut(&plan_id)
            .ok_or(BackendError::PlanNotFound(plan_id))?;
        let id = plan
            .item(item.day, item.slot)
            .map(|existing| existing.id)
            .unwrap_or_else(Uuid::new_v4);
        let saved = item.clone().into_item(id);
        plan.upsert(saved.clone());
        Ok(saved)
    }

    async fn remove_item(&self, plan_id: Uuid, item_id: Uuid) -> Result<bool, BackendError> {
        let mut state = lock(&self.state);
        Self::check_auth(&state)?;
        let (_, plan) = state
            .plans
            .get_mut(&plan_id)
            .ok_or(BackendError::PlanNotFound(plan_id))?;
        Ok(plan.remove_id(item_id).is_some())
    }

    async fn fetch_plan(&self, plan_id: Uuid) -> Result<BackendPlan, BackendError> {
        let (plan, delay) = {
            let state = lock(&self.state);
            Self::check_auth(&state)?;
            let plan = state
                .plans
                .get(&plan_id)
                .map(|(_, plan)| plan.clone())
                .ok_or(BackendError::PlanNotFound(plan_id))?;
            (plan, state.fetch_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(plan)
    }
}

// ===========================================================================
// Scripted generator
// ===========================================================================

/// What a [`ScriptedGenerator`] does for one slot.
#[derive(Debug, Clone)]
pub enum Step {
    Succeed { recipe_id: String, delay: Duration },
    Fail { message: String, delay: Duration },
}

/// [`RecipeGenerator`] whose behavior is fixed per meal slot.
///
/// Unscripted slots succeed immediately with recipe id `{day}-{slot}`.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    steps: HashMap<MealSlot, Step>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeed(mut self, slot: MealSlot, recipe_id: &str, delay: Duration) -> Self {
        self.steps.insert(
            slot,
            Step::Succeed {
                recipe_id: recipe_id.to_string(),
                delay,
            },
        );
        self
    }

    pub fn fail(mut self, slot: MealSlot, message: &str, delay: Duration) -> Self {
        self.steps.insert(
            slot,
            Step::Fail {
                message: message.to_string(),
                delay,
            },
        );
        self
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl RecipeGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_meal_recipe(
        &self,
        request: &GenerationRequest,
    ) -> Result<Recipe, GenerationError> {
        lock(&self.requests).push(request.clone());
        let step = self.steps.get(&request.meal_type).cloned().unwrap_or_else(|| Step::Succeed {
            recipe_id: format!("{}-{}", request.day, request.meal_type),
            delay: Duration::ZERO,
        });
        match step {
            Step::Succeed { recipe_id, delay } => {
                tokio::time::sleep(delay).await;
                Ok(recipe(&recipe_id))
            }
            Step::Fail { message, delay } => {
                tokio::time::sleep(delay).await;
                Err(GenerationError::Failed(message))
            }
        }
    }
}
