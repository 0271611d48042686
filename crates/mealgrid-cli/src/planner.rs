//! Building a [`PlannerSession`] from resolved configuration.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use mealgrid_core::Recipe;
use mealgrid_core::backend::{MealPlanBackend, PgMealPlanBackend};
use mealgrid_core::config::PlannerConfig;
use mealgrid_core::events::{EventReceiver, PlannerEvent};
use mealgrid_core::generator::{
    CommandGenerator, GenerationError, GenerationRequest, RecipeGenerator,
};
use mealgrid_core::session::{Persistence, PlannerSession};
use mealgrid_db::pool;

use crate::config::MealgridConfig;

/// Stands in when no generator command is configured. Read-only commands
/// never call it.
struct MissingGenerator;

#[async_trait]
impl RecipeGenerator for MissingGenerator {
    fn name(&self) -> &str {
        "none"
    }

    async fn generate_meal_recipe(
        &self,
        _request: &GenerationRequest,
    ) -> Result<Recipe, GenerationError> {
        Err(GenerationError::Failed(
            "no generator configured; set MEALGRID_GENERATOR or pass --generator".to_string(),
        ))
    }
}

pub fn generator_for(config: &MealgridConfig) -> Arc<dyn RecipeGenerator> {
    match &config.generator {
        Some(section) => Arc::new(
            CommandGenerator::new(section.command.clone()).with_args(section.args.clone()),
        ),
        None => Arc::new(MissingGenerator),
    }
}

/// A session plus the pool it persists through (none for guests).
pub struct Planner {
    pub session: PlannerSession,
    pub events: EventReceiver,
    pool: Option<PgPool>,
}

impl Planner {
    /// Open a session for today. Connects to the database only when a
    /// profile is configured.
    pub async fn open(config: &MealgridConfig) -> Result<Self> {
        let (persistence, pool) = match &config.profile {
            Some(profile) => {
                let db_pool = pool::create_pool(&config.db_config).await?;
                let backend: Arc<dyn MealPlanBackend> =
                    Arc::new(PgMealPlanBackend::new(db_pool.clone()));
                let persistence = Persistence::Backend {
                    backend,
                    profile: profile.clone(),
                };
                (persistence, Some(db_pool))
            }
            None => (Persistence::Guest, None),
        };
        Ok(Self::new(
            generator_for(config),
            persistence,
            config.planner,
            pool,
        ))
    }

    pub fn new(
        generator: Arc<dyn RecipeGenerator>,
        persistence: Persistence,
        planner: PlannerConfig,
        pool: Option<PgPool>,
    ) -> Self {
        let today = chrono::Local::now().date_naive();
        let (session, events) = PlannerSession::start(generator, persistence, planner, today);
        Self {
            session,
            events,
            pool,
        }
    }

    /// Print problems reported on the event channel since the last call.
    pub fn report_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                PlannerEvent::PersistFailed { key, message, .. } => {
                    eprintln!("warning: {key} was not saved: {message}");
                }
                PlannerEvent::GuestModeEntered => {
                    eprintln!("warning: not signed in, changes are kept locally only");
                }
                _ => {}
            }
        }
    }

    pub async fn close(self) {
        let Self { session, pool, .. } = self;
        session.sign_out();
        if let Some(db_pool) = pool {
            db_pool.close().await;
        }
    }
}
