//! Database query functions for the `workouts` table.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{NewWorkout, WorkoutRow};

/// Insert the workout for `(user_id, plan_date)`. Returns the stored row.
pub async fn insert_workout(
    pool: &PgPool,
    user_id: Uuid,
    plan_date: NaiveDate,
    workout: &NewWorkout,
) -> Result<WorkoutRow> {
    let row = sqlx::query_as::<_, WorkoutRow>(
        "INSERT INTO workouts (user_id, plan_date, workout_type, total_sets, total_reps, \
                               duration_minutes, calories_burned, exercises) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING *",
    )
    .bind(user_id)
    .bind(plan_date)
    .bind(&workout.workout_type)
    .bind(workout.total_sets)
    .bind(workout.total_reps)
    .bind(workout.duration_minutes)
    .bind(workout.calories_burned)
    .bind(&workout.exercises)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert workout for {plan_date}"))?;

    Ok(row)
}

/// Delete the workouts for `(user_id, plan_date)`. Returns the number of rows
/// removed.
pub async fn delete_workouts_for_day(
    pool: &PgPool,
    user_id: Uuid,
    plan_date: NaiveDate,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM workouts WHERE user_id = $1 AND plan_date = $2")
        .bind(user_id)
        .bind(plan_date)
        .execute(pool)
        .await
        .with_context(|| format!("failed to delete workouts for {plan_date}"))?;

    Ok(result.rows_affected())
}

/// List workouts for an inclusive date range, oldest first.
pub async fn list_workouts_in_range(
    pool: &PgPool,
    user_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<WorkoutRow>> {
    let rows = sqlx::query_as::<_, WorkoutRow>(
        "SELECT * FROM workouts \
         WHERE user_id = $1 AND plan_date BETWEEN $2 AND $3 \
         ORDER BY plan_date ASC, created_at ASC",
    )
    .bind(user_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
    .context("failed to list workouts")?;

    Ok(rows)
}

/// Count workout rows for one user, across all dates.
pub async fn count_workouts_for_user(pool: &PgPool, user_id: Uuid) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM workouts WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("failed to count workouts")?;

    Ok(row.0)
}
