//! Handler for `sprout show`: print stored meals or workouts for a window.

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use sprout_core::pipeline::PlanWindow;
use sprout_db::models::{MealRow, PlanKind, WorkoutRow};
use sprout_db::queries::{meals, workouts};

pub async fn run_show(pool: &PgPool, kind: PlanKind, user_id: Uuid, window: PlanWindow) -> Result<()> {
    let targets = window.targets();
    let (Some(from), Some(to)) = (targets.first(), targets.last()) else {
        return Ok(());
    };

    match kind {
        PlanKind::Meal => {
            let rows = meals::list_meals_in_range(pool, user_id, from, to).await?;
            if rows.is_empty() {
                println!("No meals stored for {from}..{to}.");
            } else {
                print_meals(&rows);
            }
        }
        PlanKind::Workout => {
            let rows = workouts::list_workouts_in_range(pool, user_id, from, to).await?;
            if rows.is_empty() {
                println!("No workouts stored for {from}..{to}.");
            } else {
                print_workouts(&rows);
            }
        }
    }
    Ok(())
}

fn print_meals(rows: &[MealRow]) {
    let type_w = rows.iter().map(|m| m.meal_type.len()).max().unwrap_or(4).max(4);
    let name_w = rows.iter().map(|m| m.name.len()).max().unwrap_or(4).max(4);

    println!(
        "{:<10}  {:<type_w$}  {:<name_w$}  {:>6}  {:>7}  {:>5}  {:>4}",
        "DATE", "TYPE", "NAME", "KCAL", "PROTEIN", "CARBS", "FAT",
    );
    for m in rows {
        println!(
            "{:<10}  {:<type_w$}  {:<name_w$}  {:>6}  {:>7}  {:>5}  {:>4}",
            m.plan_date,
            m.meal_type,
            m.name,
            amount(m.calories),
            amount(m.protein),
            amount(m.carbs),
            amount(m.fat),
        );
    }
}

fn print_workouts(rows: &[WorkoutRow]) {
    let type_w = rows.iter().map(|w| w.workout_type.len()).max().unwrap_or(4).max(4);

    println!(
        "{:<10}  {:<type_w$}  {:>4}  {:>4}  {:>3}  {:>5}  EXERCISES",
        "DATE", "TYPE", "SETS", "REPS", "MIN", "KCAL",
    );
    for w in rows {
        println!(
            "{:<10}  {:<type_w$}  {:>4}  {:>4}  {:>3}  {:>5}  {}",
            w.plan_date,
            w.workout_type,
            w.total_sets,
            w.total_reps,
            w.duration_minutes,
            w.calories_burned,
            exercise_names(&w.exercises),
        );
    }
}

/// Whole numbers print without decimals; absent values print as `-`.
pub(crate) fn amount(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{v:.0}"),
        Some(v) => format!("{v:.1}"),
        None => "-".to_string(),
    }
}

/// Comma-separated exercise names from the stored exercise list.
pub(crate) fn exercise_names(exercises: &serde_json::Value) -> String {
    let names: Vec<&str> = exercises
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|e| e.get("name").and_then(|n| n.as_str()))
                .filter(|n| !n.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(", ")
    }
}
