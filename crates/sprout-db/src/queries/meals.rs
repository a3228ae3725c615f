//! Database query functions for the `meals` table.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{MealRow, NewMeal};

/// Insert one meal for `(user_id, plan_date)`. Returns the stored row.
pub async fn insert_meal(
    pool: &PgPool,
    user_id: Uuid,
    plan_date: NaiveDate,
    meal: &NewMeal,
) -> Result<MealRow> {
    let row = sqlx::query_as::<_, MealRow>(
        "INSERT INTO meals (user_id, plan_date, meal_type, name, calories, protein, carbs, fat, \
                            serving_size, recipe, ingredients, tags, notes, position) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         RETURNING *",
    )
    .bind(user_id)
    .bind(plan_date)
    .bind(&meal.meal_type)
    .bind(&meal.name)
    .bind(meal.calories)
    .bind(meal.protein)
    .bind(meal.carbs)
    .bind(meal.fat)
    .bind(&meal.serving_size)
    .bind(&meal.recipe)
    .bind(&meal.ingredients)
    .bind(&meal.tags)
    .bind(&meal.notes)
    .bind(meal.position)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert meal {:?} for {plan_date}", meal.name))?;

    Ok(row)
}

/// Delete every meal for `(user_id, plan_date)`. Returns the number of rows
/// removed.
pub async fn delete_meals_for_day(
    pool: &PgPool,
    user_id: Uuid,
    plan_date: NaiveDate,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM meals WHERE user_id = $1 AND plan_date = $2")
        .bind(user_id)
        .bind(plan_date)
        .execute(pool)
        .await
        .with_context(|| format!("failed to delete meals for {plan_date}"))?;

    Ok(result.rows_affected())
}

/// List meals for one day in plan order.
pub async fn list_meals_for_day(
    pool: &PgPool,
    user_id: Uuid,
    plan_date: NaiveDate,
) -> Result<Vec<MealRow>> {
    list_meals_in_range(pool, user_id, plan_date, plan_date).await
}

/// List meals for an inclusive date range, ordered by date then position.
pub async fn list_meals_in_range(
    pool: &PgPool,
    user_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<MealRow>> {
    let rows = sqlx::query_as::<_, MealRow>(
        "SELECT * FROM meals \
         WHERE user_id = $1 AND plan_date BETWEEN $2 AND $3 \
         ORDER BY plan_date ASC, position ASC, created_at ASC",
    )
    .bind(user_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
    .context("failed to list meals")?;

    Ok(rows)
}
