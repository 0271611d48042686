//! Weekly meal plan orchestration engine.
//!
//! Drives concurrent per-slot recipe generation over a day × meal-slot grid,
//! keeps the grid as the local source of truth, and reconciles it with a
//! slower backend plan store (or with nothing at all for guest sessions).
//!
//! # Architecture
//!
//! ```text
//! text / clicks
//!     |
//!     v
//! intent::IntentParser   selection::SelectionManager
//!     \                       /
//!      v                     v
//!     session::PlannerSession ----------------------> events (side channel)
//!          |
//!          v
//!     orchestrator::GenerationOrchestrator --spawn per slot--> RecipeGenerator
//!          |                 |
//!          |       tracker::GenerationTracker (idle -> generating -> idle)
//!          v
//!     grid::MealPlanStateStore  <---merge---  reconcile::ReconciliationLayer
//!                                                   |
//!                                                   v
//!                                            backend::MealPlanBackend
//! ```

pub mod backend;
pub mod config;
pub mod events;
pub mod generator;
pub mod grid;
pub mod intent;
pub mod orchestrator;
pub mod reconcile;
pub mod selection;
pub mod session;
pub mod tracker;
pub mod week;

mod sync;

pub use mealgrid_db::models::{Day, MealSlot, Nutrition, Recipe};
