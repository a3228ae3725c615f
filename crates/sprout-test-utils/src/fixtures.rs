//! Canned generator responses shaped like real model output: prose around
//! the payload, code fences, inconsistent keys.

use chrono::{Duration, NaiveDate};
use serde_json::{Value, json};
use sprout_db::models::NewMeal;

const MEAL_SLOTS: [&str; 4] = ["breakfast", "lunch", "dinner", "snack"];

pub const MEALS_PER_DAY: usize = MEAL_SLOTS.len();

/// One meal object for `day` (0-based) and `slot`, with a nested nutrition
/// breakdown whose calories are decorated text.
pub fn meal(day: usize, slot: usize) -> Value {
    let meal_type = MEAL_SLOTS[slot % MEAL_SLOTS.len()];
    json!({
        "meal_type": meal_type,
        "name": format!("Day {} {}", day + 1, meal_type),
        "nutrition_breakdown": {
            "calories": format!("{} kcal", 300 + day * 10 + slot),
            "protein": 20 + slot,
            "carbs": "45g",
            "fat": "12 g"
        },
        "serving_size": "1 plate",
        "recipe": "Combine and serve.",
        "ingredients": ["oats", "milk"]
    })
}

/// The row [`meal`] normalizes to, for writing straight to the `meals`
/// table.
pub fn stored_meal(day: usize, slot: usize) -> NewMeal {
    let meal_type = MEAL_SLOTS[slot % MEAL_SLOTS.len()];
    NewMeal {
        meal_type: meal_type.to_string(),
        name: format!("Day {} {}", day + 1, meal_type),
        calories: Some((300 + day * 10 + slot) as f64),
        protein: Some((20 + slot) as f64),
        carbs: Some(45.0),
        fat: Some(12.0),
        serving_size: Some("1 plate".to_string()),
        recipe: "Combine and serve.".to_string(),
        ingredients: vec!["oats".to_string(), "milk".to_string()],
        tags: Vec::new(),
        notes: None,
        position: slot as i32,
    }
}

/// Four meals for one day.
pub fn day_of_meals(day: usize) -> Vec<Value> {
    (0..MEAL_SLOTS.len()).map(|slot| meal(day, slot)).collect()
}

/// Seven consecutive ISO dates starting at `start`.
pub fn week_dates(start: NaiveDate) -> Vec<String> {
    (0..7)
        .map(|i| (start + Duration::days(i)).format("%Y-%m-%d").to_string())
        .collect()
}

/// Single-day meal response: a fenced JSON array inside chatty prose.
pub fn single_day_meals_response() -> String {
    let body = serde_json::to_string_pretty(&day_of_meals(0)).unwrap_or_default();
    format!(
        "Here is your meal plan for today!\n\n```json\n{body}\n```\n\nEnjoy, and stay hydrated."
    )
}

/// Single-day meal response with the usual generator mistakes: single
/// quotes, bare keys, trailing commas, no fence.
pub fn malformed_single_day_meals_response() -> String {
    "Sure! [\n\
       {meal_type: 'breakfast', name: 'Oatmeal', nutrition_breakdown: {calories: '350 kcal', protein: 12,},},\n\
       {meal_type: 'lunch', name: 'Chicken salad', calories: 520,},\n\
       {'meal_type': 'dinner', 'name': 'Salmon', 'calories': '610'},\n\
       {meal_type: 'snack', name: \"Greek yogurt\", calories: 150,},\n\
     ]\nLet me know if you need changes."
        .to_string()
}

/// Weekly meal response keyed by the exact ISO dates of the week, in
/// reverse key order.
pub fn weekly_meals_by_date_response(start: NaiveDate) -> String {
    let dates = week_dates(start);
    let mut entries = Vec::new();
    for (day, date) in dates.iter().enumerate().rev() {
        let meals = serde_json::to_string(&day_of_meals(day)).unwrap_or_default();
        entries.push(format!("  \"{date}\": {meals}"));
    }
    format!(
        "Your week is ready.\n```json\n{{\n{}\n}}\n```",
        entries.join(",\n")
    )
}

/// Weekly meal response keyed by day labels rather than dates.
pub fn weekly_meals_by_label_response() -> String {
    let entries: Vec<String> = (0..7)
        .map(|day| {
            let meals = serde_json::to_string(&day_of_meals(day)).unwrap_or_default();
            format!("\"Day{}\": {meals}", day + 1)
        })
        .collect();
    format!("Weekly plan below:\n{{{}}}\nThanks!", entries.join(", "))
}

/// Weekly meal response as one flat array of 28 meals.
pub fn weekly_meals_flat_response() -> String {
    let meals: Vec<Value> = (0..7).flat_map(day_of_meals).collect();
    format!(
        "```json\n{}\n```",
        serde_json::to_string(&meals).unwrap_or_default()
    )
}

/// Weekly workout response keyed by ISO dates; the last day is a rest day.
pub fn weekly_workouts_by_date_response(start: NaiveDate) -> String {
    let dates = week_dates(start);
    let mut plan = serde_json::Map::new();
    for (day, date) in dates.iter().enumerate() {
        let exercises = if day == 6 {
            json!([])
        } else {
            json!([
                {"workout_type": "strength", "name": "Squat", "sets": "3", "reps": 10, "duration": "15 min", "calories_burned": 120, "rest": "90s"},
                {"workout_type": "strength", "name": "Push-up", "sets": 3, "reps": "12", "duration": 0, "notes": "slow tempo"}
            ])
        };
        plan.insert(date.clone(), exercises);
    }
    format!(
        "```json\n{}\n```",
        serde_json::to_string_pretty(&Value::Object(plan)).unwrap_or_default()
    )
}
