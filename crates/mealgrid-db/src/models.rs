use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Day of the week a meal is planned for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    /// All days, Monday first.
    pub const ALL: [Day; 7] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
        Self::Sunday,
    ];

    /// Zero-based offset from Monday.
    pub fn offset(self) -> u32 {
        match self {
            Self::Monday => 0,
            Self::Tuesday => 1,
            Self::Wednesday => 2,
            Self::Thursday => 3,
            Self::Friday => 4,
            Self::Saturday => 5,
            Self::Sunday => 6,
        }
    }

    pub fn from_weekday(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => Self::Monday,
            Weekday::Tue => Self::Tuesday,
            Weekday::Wed => Self::Wednesday,
            Weekday::Thu => Self::Thursday,
            Weekday::Fri => Self::Friday,
            Weekday::Sat => Self::Saturday,
            Weekday::Sun => Self::Sunday,
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
            Self::Sunday => "sunday",
        };
        f.write_str(s)
    }
}

impl FromStr for Day {
    type Err = DayParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monday" | "mon" => Ok(Self::Monday),
            "tuesday" | "tue" => Ok(Self::Tuesday),
            "wednesday" | "wed" => Ok(Self::Wednesday),
            "thursday" | "thu" => Ok(Self::Thursday),
            "friday" | "fri" => Ok(Self::Friday),
            "saturday" | "sat" => Ok(Self::Saturday),
            "sunday" | "sun" => Ok(Self::Sunday),
            _ => Err(DayParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Day`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid day: {0:?}")]
pub struct DayParseError(pub String);

// ---------------------------------------------------------------------------

/// One of the three fixed meal slots of a day, in serving order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealSlot {
    /// All slots in serving order.
    pub const ALL: [MealSlot; 3] = [Self::Breakfast, Self::Lunch, Self::Dinner];
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
        };
        f.write_str(s)
    }
}

impl FromStr for MealSlot {
    type Err = MealSlotParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "breakfast" => Ok(Self::Breakfast),
            "lunch" => Ok(Self::Lunch),
            "dinner" => Ok(Self::Dinner),
            _ => Err(MealSlotParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`MealSlot`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid meal slot: {0:?} (expected breakfast, lunch, or dinner)")]
pub struct MealSlotParseError(pub String);

// ---------------------------------------------------------------------------
// Recipe content (stored as JSONB on plan items)
// ---------------------------------------------------------------------------

/// Per-serving nutrition summary of a recipe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Nutrition {
    pub calories: u32,
    pub protein_g: f32,
    pub carbs_g: f32,
    pub fat_g: f32,
}

/// A generated recipe as returned by the recipe generator and embedded in
/// persisted plan items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    /// Generator-assigned recipe identifier.
    pub id: String,
    pub title: String,
    #[serde(default = "default_servings")]
    pub servings: u32,
    #[serde(default)]
    pub cook_time_minutes: u32,
    #[serde(default)]
    pub nutrition: Nutrition,
    /// Letter grade (`A`..`F`) assigned by the generator, if any.
    #[serde(default)]
    pub grade: Option<String>,
}

fn default_servings() -> u32 {
    1
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A persisted weekly plan. One per (profile, week_start).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    pub profile: String,
    /// Monday of the planned week.
    pub week_start: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// A persisted meal at one (day, meal_slot) of a plan.
#[derive(Debug, Clone, FromRow)]
pub struct PlanItem {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub day: Day,
    pub meal_slot: MealSlot,
    pub recipe_id: String,
    pub recipe: Json<Recipe>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_display_and_parse() {
        for day in Day::ALL {
            let parsed: Day = day.to_string().parse().unwrap();
            assert_eq!(parsed, day);
        }
        assert_eq!("Wed".parse::<Day>().unwrap(), Day::Wednesday);
        assert!("someday".parse::<Day>().is_err());
    }

    #[test]
    fn day_offsets_follow_week_order() {
        let offsets: Vec<u32> = Day::ALL.iter().map(|d| d.offset()).collect();
        assert_eq!(offsets, vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(Day::from_weekday(Weekday::Sun), Day::Sunday);
    }

    #[test]
    fn meal_slot_parse_is_case_insensitive() {
        assert_eq!("DINNER".parse::<MealSlot>().unwrap(), MealSlot::Dinner);
        let err = "supper".parse::<MealSlot>().unwrap_err();
        assert!(err.to_string().contains("supper"));
    }

    #[test]
    fn recipe_defaults_for_sparse_json() {
        let recipe: Recipe =
            serde_json::from_str(r#"{"id": "r-1", "title": "Oat bowl"}"#).unwrap();
        assert_eq!(recipe.servings, 1);
        assert_eq!(recipe.cook_time_minutes, 0);
        assert_eq!(recipe.nutrition, Nutrition::default());
        assert!(recipe.grade.is_none());
    }

    #[test]
    fn recipe_reads_camel_case_fields() {
        let recipe: Recipe = serde_json::from_str(
            r#"{"id": "r-2", "title": "Dal", "servings": 4, "cookTimeMinutes": 35,
                "nutrition": {"calories": 510, "proteinG": 21.5, "carbsG": 70.0, "fatG": 12.0},
                "grade": "A"}"#,
        )
        .unwrap();
        assert_eq!(recipe.cook_time_minutes, 35);
        assert_eq!(recipe.nutrition.calories, 510);
        assert_eq!(recipe.grade.as_deref(), Some("A"));
    }
}
