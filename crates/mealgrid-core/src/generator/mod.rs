//! The recipe generator port.
//!
//! Generation is an opaque async call that may fail; failure is a normal
//! outcome the orchestrator records per slot. Concrete generators
//! implement [`RecipeGenerator`] and are shared as
//! `Arc<dyn RecipeGenerator>`.

pub mod command;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Day, MealSlot, Recipe};

pub use command::CommandGenerator;

/// Input of one generator call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub meal_type: MealSlot,
    /// Free-text preferences, possibly with a slot suffix for batches.
    pub preferences: String,
    pub day: Day,
}

/// Why a generator call produced no recipe.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The generator answered but declined or errored.
    #[error("generator failed: {0}")]
    Failed(String),

    #[error("failed to launch generator command {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("generator I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("generator exited with {status}: {stderr}")]
    ExitStatus { status: String, stderr: String },

    #[error("generator returned an invalid recipe: {0}")]
    InvalidRecipe(#[from] serde_json::Error),
}

/// Produces one recipe per request.
///
/// # Object Safety
///
/// The trait is object-safe so generators can be swapped at runtime behind
/// `Arc<dyn RecipeGenerator>`.
#[async_trait]
pub trait RecipeGenerator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn generate_meal_recipe(
        &self,
        request: &GenerationRequest,
    ) -> Result<Recipe, GenerationError>;
}

// Compile-time assertion: RecipeGenerator must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn RecipeGenerator) {}
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Nutrition;

    /// Echoes the request back as a recipe.
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
            if request.preferences == "fail" {
                return Err(GenerationError::Failed("asked to fail".into()));
            }
            Ok(Recipe {
                id: format!("{}-{}", request.day, request.meal_type),
                title: request.preferences.clone(),
                servings: 1,
                cook_time_minutes: 0,
                nutrition: Nutrition::default(),
                grade: None,
            })
        }
    }

    #[tokio::test]
    async fn generator_is_object_safe() {
        let generator: Box<dyn RecipeGenerator> = Box::new(EchoGenerator);
        assert_eq!(generator.name(), "echo");

        let request = GenerationRequest {
            meal_type: MealSlot::Dinner,
            preferences: "curry".into(),
            day: Day::Thursday,
        };
        let recipe = generator.generate_meal_recipe(&request).await.unwrap();
        assert_eq!(recipe.id, "thursday-dinner");

        let failing = GenerationRequest {
            preferences: "fail".into(),
            ..request
        };
        assert!(generator.generate_meal_recipe(&failing).await.is_err());
    }

    #[test]
    fn request_serializes_camel_case() {
        let request = GenerationRequest {
            meal_type: MealSlot::Breakfast,
            preferences: "eggs".into(),
            day: Day::Monday,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"mealType": "breakfast", "preferences": "eggs", "day": "monday"})
        );
    }
}
