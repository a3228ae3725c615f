//! [`PlanStore`] backed by the `meals` and `workouts` tables.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sprout_db::models::{NewMeal, NewWorkout, PlanKind};
use sprout_db::queries::{meals, workouts};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{PlanRecord, PlanStore};
use crate::pipeline::{NormalizedMeal, WorkoutDay};

/// Writes plans through `sprout_db::queries`.
#[derive(Debug, Clone)]
pub struct PgPlanStore {
    pool: PgPool,
}

impl PgPlanStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn new_meal(position: usize, meal: &NormalizedMeal) -> Result<NewMeal> {
    Ok(NewMeal {
        meal_type: meal.meal_type.clone(),
        name: meal.name.clone(),
        calories: meal.calories,
        protein: meal.protein,
        carbs: meal.carbs,
        fat: meal.fat,
        serving_size: meal.serving_size.clone(),
        recipe: meal.recipe.clone(),
        ingredients: meal.ingredients.clone(),
        tags: meal.tags.clone(),
        notes: meal.notes.clone(),
        position: i32::try_from(position).context("meal position out of range")?,
    })
}

fn new_workout(day: &WorkoutDay) -> Result<NewWorkout> {
    let exercises =
        serde_json::to_value(&day.exercises).context("failed to serialize exercise list")?;
    Ok(NewWorkout {
        workout_type: day.workout_type.clone(),
        total_sets: day.aggregate.total_sets,
        total_reps: day.aggregate.total_reps,
        duration_minutes: day.aggregate.duration_minutes,
        calories_burned: day.aggregate.calories_burned,
        exercises,
    })
}

#[async_trait]
impl PlanStore for PgPlanStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn delete_day(&self, kind: PlanKind, user_id: Uuid, date: NaiveDate) -> Result<u64> {
        let removed = match kind {
            PlanKind::Meal => meals::delete_meals_for_day(&self.pool, user_id, date).await?,
            PlanKind::Workout => {
                workouts::delete_workouts_for_day(&self.pool, user_id, date).await?
            }
        };
        debug!(%kind, %user_id, %date, removed, "deleted day");
        Ok(removed)
    }

    async fn insert(&self, user_id: Uuid, date: NaiveDate, record: &PlanRecord<'_>) -> Result<()> {
        match *record {
            PlanRecord::Meal { position, meal } => {
                let row = new_meal(position, meal)?;
                meals::insert_meal(&self.pool, user_id, date, &row).await?;
            }
            PlanRecord::Workout(day) => {
                let row = new_workout(day)?;
                workouts::insert_workout(&self.pool, user_id, date, &row).await?;
            }
        }
        Ok(())
    }
}
