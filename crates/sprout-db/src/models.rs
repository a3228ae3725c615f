use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which kind of plan a request produces, and therefore which table it
/// replaces rows in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Meal,
    Workout,
}

impl PlanKind {
    pub const ALL: [PlanKind; 2] = [Self::Meal, Self::Workout];

    /// Table holding rows of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Meal => "meals",
            Self::Workout => "workouts",
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Meal => "meal",
            Self::Workout => "workout",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanKind {
    type Err = PlanKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meal" | "meals" => Ok(Self::Meal),
            "workout" | "workouts" => Ok(Self::Workout),
            other => Err(PlanKindParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`PlanKind`] string.
#[derive(Debug, Clone)]
pub struct PlanKindParseError(pub String);

impl fmt::Display for PlanKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid plan kind: {:?} (expected meal or workout)", self.0)
    }
}

impl std::error::Error for PlanKindParseError {}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A row in the `meals` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MealRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_date: NaiveDate,
    pub meal_type: String,
    pub name: String,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub serving_size: Option<String>,
    pub recipe: String,
    pub ingredients: Vec<String>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    /// Order of the meal within its day.
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// Column values for a new `meals` row. Ids and timestamps are generated by
/// the database.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewMeal {
    pub meal_type: String,
    pub name: String,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub serving_size: Option<String>,
    pub recipe: String,
    pub ingredients: Vec<String>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub position: i32,
}

/// A row in the `workouts` table: one per user per day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WorkoutRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_date: NaiveDate,
    pub workout_type: String,
    pub total_sets: i32,
    pub total_reps: i32,
    pub duration_minutes: i32,
    pub calories_burned: i32,
    /// JSON array of the day's exercises.
    pub exercises: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Column values for a new `workouts` row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWorkout {
    pub workout_type: String,
    pub total_sets: i32,
    pub total_reps: i32,
    pub duration_minutes: i32,
    pub calories_burned: i32,
    pub exercises: serde_json::Value,
}
