//! Generator backed by an external command.
//!
//! The command receives the [`GenerationRequest`] as a JSON document on
//! stdin and must print one recipe JSON document on stdout. A non-zero exit
//! status is a generation failure; stderr is carried in the error.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{GenerationError, GenerationRequest, RecipeGenerator};
use crate::Recipe;

/// Runs `program args...` once per request.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl RecipeGenerator for CommandGenerator {
    fn name(&self) -> &str {
        &self.program
    }

    async fn generate_meal_recipe(
        &self,
        request: &GenerationRequest,
    ) -> Result<Recipe, GenerationError> {
        let payload = serde_json::to_vec(request)?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| GenerationError::Spawn {
            command: self.program.clone(),
            source,
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        debug!(
            command = %self.program,
            status = %output.status,
            stdout_bytes = output.stdout.len(),
            "generator command finished"
        );

        if !output.status.success() {
            return Err(GenerationError::ExitStatus {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let recipe: Recipe = serde_json::from_slice(&output.stdout)?;
        Ok(recipe)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::{Day, MealSlot};

    fn request() -> GenerationRequest {
        GenerationRequest {
            meal_type: MealSlot::Lunch,
            preferences: "lentil soup".into(),
            day: Day::Tuesday,
        }
    }

    fn shell(script: &str) -> CommandGenerator {
        CommandGenerator::new("sh").with_args(["-c", script])
    }

    #[tokio::test]
    async fn parses_recipe_from_stdout() {
        let generator = shell(
            r#"cat > /dev/null; echo '{"id":"r-42","title":"Lentil soup","servings":4,"cookTimeMinutes":35,"grade":"A"}'"#,
        );
        let recipe = generator.generate_meal_recipe(&request()).await.unwrap();
        assert_eq!(recipe.id, "r-42");
        assert_eq!(recipe.servings, 4);
        assert_eq!(recipe.cook_time_minutes, 35);
        assert_eq!(recipe.grade.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn request_is_written_to_stdin() {
        // Echo the mealType field back as the recipe id.
        let generator = shell(
            r#"input=$(cat); case "$input" in *'"mealType":"lunch"'*) id=got-lunch;; *) id=other;; esac; echo "{\"id\":\"$id\",\"title\":\"t\"}""#,
        );
        let recipe = generator.generate_meal_recipe(&request()).await.unwrap();
        assert_eq!(recipe.id, "got-lunch");
    }

    #[tokio::test]
    async fn non_zero_exit_is_failure() {
        let generator = shell("cat > /dev/null; echo 'quota exceeded' >&2; exit 3");
        let err = generator.generate_meal_recipe(&request()).await.unwrap_err();
        match err {
            GenerationError::ExitStatus { stderr, .. } => assert_eq!(stderr, "quota exceeded"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn garbage_output_is_invalid_recipe() {
        let generator = shell("cat > /dev/null; echo not-json");
        let err = generator.generate_meal_recipe(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::InvalidRecipe(_)));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let generator = CommandGenerator::new("/nonexistent/mealgrid-generator");
        let err = generator.generate_meal_recipe(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Spawn { .. }));
    }
}
