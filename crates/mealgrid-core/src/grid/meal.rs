//! The `Meal` value object shown in a grid slot.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Nutrition, Recipe};

/// Letter grade a generator assigns to a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        };
        f.write_str(s)
    }
}

impl FromStr for Grade {
    type Err = GradeParseError;

    /// Accepts `A`..`F` in either case; `+`/`-` modifiers are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let letter = s.trim().trim_end_matches(['+', '-']);
        match letter.to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            "E" | "F" => Ok(Self::F),
            _ => Err(GradeParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Grade`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid grade: {0:?}")]
pub struct GradeParseError(pub String);

/// A generated meal occupying one slot of the grid.
///
/// Meals are never edited in place; a slot changes only by replacing its
/// meal wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    /// Recipe identifier assigned by the generator.
    pub id: String,
    pub title: String,
    pub servings: u32,
    pub cook_time_minutes: u32,
    pub nutrition: Nutrition,
    pub grade: Option<Grade>,
}

impl Meal {
    /// Build the grid meal for a generated or persisted recipe.
    ///
    /// An unrecognised grade string is dropped rather than failing the meal.
    pub fn from_recipe(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id.clone(),
            title: recipe.title.clone(),
            servings: recipe.servings,
            cook_time_minutes: recipe.cook_time_minutes,
            nutrition: recipe.nutrition,
            grade: recipe.grade.as_deref().and_then(|g| g.parse().ok()),
        }
    }
}
