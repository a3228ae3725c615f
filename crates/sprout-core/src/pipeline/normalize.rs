//! Field normalization: raw day buckets into typed meals and workout days.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sprout_db::models::PlanKind;
use tracing::warn;

use super::field::{FieldResolver, RawNumber, render_text};
use super::repair::json_kind;
use super::shape::DayBucket;
use crate::config::{PipelineConfig, WorkoutPolicy};

// ---------------------------------------------------------------------------
// Field sources
// ---------------------------------------------------------------------------

const MEAL_TYPE: FieldResolver = FieldResolver::new(&[&["meal_type"], &["type"], &["meal"]]);
const MEAL_NAME: FieldResolver =
    FieldResolver::new(&[&["name"], &["meal_name"], &["title"], &["dish"]]);
const CALORIES: FieldResolver = FieldResolver::new(&[
    &["nutrition_breakdown", "calories"],
    &["nutrition", "calories"],
    &["calories"],
]);
const PROTEIN: FieldResolver = FieldResolver::new(&[
    &["nutrition_breakdown", "protein"],
    &["nutrition", "protein"],
    &["protein"],
]);
const CARBS: FieldResolver = FieldResolver::new(&[
    &["nutrition_breakdown", "carbs"],
    &["nutrition_breakdown", "carbohydrates"],
    &["nutrition", "carbs"],
    &["nutrition", "carbohydrates"],
    &["carbs"],
    &["carbohydrates"],
]);
const FAT: FieldResolver =
    FieldResolver::new(&[&["nutrition_breakdown", "fat"], &["nutrition", "fat"], &["fat"]]);
const RECIPE: FieldResolver =
    FieldResolver::new(&[&["recipe"], &["instructions"], &["preparation"]]);
const SERVING_SIZE: FieldResolver = FieldResolver::new(&[&["serving_size"], &["serving"]]);
const INGREDIENTS: FieldResolver = FieldResolver::new(&[&["ingredients"]]);
const TAGS: FieldResolver = FieldResolver::new(&[&["tags"]]);
const NOTES: FieldResolver = FieldResolver::new(&[&["notes"]]);

const WORKOUT_TYPE: FieldResolver =
    FieldResolver::new(&[&["workout_type"], &["type"], &["category"]]);
const EXERCISE_NAME: FieldResolver = FieldResolver::new(&[&["name"], &["exercise"], &["title"]]);
const SETS: FieldResolver = FieldResolver::new(&[&["sets"]]);
const REPS: FieldResolver = FieldResolver::new(&[&["reps"]]);
const DURATION: FieldResolver = FieldResolver::new(&[&["duration_minutes"], &["duration"]]);
const BURNED: FieldResolver = FieldResolver::new(&[&["calories_burned"], &["calories"]]);
const REST: FieldResolver = FieldResolver::new(&[&["rest"]]);

const INGREDIENT_QUANTITY: FieldResolver = FieldResolver::new(&[&["quantity"], &["amount"]]);
const INGREDIENT_NAME: FieldResolver =
    FieldResolver::new(&[&["name"], &["item"], &["ingredient"]]);

const REST_DAY_TYPE: &str = "rest";
const GENERAL_TYPE: &str = "general";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One meal, every numeric field finite or absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedMeal {
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
}

/// One exercise as stored in the workout's exercise list.
///
/// `sets` and `reps` keep the generator's value as given (`"8-12"`,
/// `"10 each side"`); only the day totals read them as numbers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedExercise {
    pub workout_type: String,
    pub name: String,
    pub sets: Option<Value>,
    pub reps: Option<Value>,
    pub duration_minutes: Option<f64>,
    pub calories_burned: Option<f64>,
    pub rest: Option<String>,
    pub notes: Option<String>,
}

/// Per-day workout totals with policy defaults applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayAggregate {
    pub total_sets: i32,
    pub total_reps: i32,
    pub duration_minutes: i32,
    pub calories_burned: i32,
}

impl DayAggregate {
    /// Totals for `exercises` under `policy`.
    ///
    /// Sets and reps count absent values as zero. Each exercise without a
    /// positive duration or burn is credited the policy default; a day whose
    /// duration still sums to zero gets the rest-day duration.
    pub fn compute(exercises: &[NormalizedExercise], policy: &WorkoutPolicy) -> Self {
        let default_minutes = f64::from(policy.default_exercise_minutes);
        let default_calories = f64::from(policy.default_exercise_calories);

        let sets: f64 = exercises.iter().map(|e| count(e.sets.as_ref())).sum();
        let reps: f64 = exercises.iter().map(|e| count(e.reps.as_ref())).sum();
        let duration: f64 = exercises
            .iter()
            .map(|e| positive_or(e.duration_minutes, default_minutes))
            .sum();
        let calories: f64 = exercises
            .iter()
            .map(|e| positive_or(e.calories_burned, default_calories))
            .sum();

        let duration = if duration == 0.0 {
            f64::from(policy.rest_day_minutes)
        } else {
            duration
        };

        Self {
            total_sets: to_i32(sets),
            total_reps: to_i32(reps),
            duration_minutes: to_i32(duration),
            calories_burned: to_i32(calories),
        }
    }
}

/// A stored set or rep value as a number; anything that does not coerce
/// counts as zero.
fn count(value: Option<&Value>) -> f64 {
    RawNumber::from_value(value).coerce().unwrap_or(0.0)
}

fn positive_or(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| *v > 0.0).unwrap_or(default)
}

/// Round to the nearest integer; the cast saturates at the `i32` bounds.
fn to_i32(value: f64) -> i32 {
    value.round() as i32
}

/// A normalized workout day: one stored row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutDay {
    pub workout_type: String,
    pub exercises: Vec<NormalizedExercise>,
    pub aggregate: DayAggregate,
}

impl WorkoutDay {
    pub fn is_rest_day(&self) -> bool {
        self.exercises.is_empty()
    }
}

/// Normalized content of one date.
#[derive(Debug, Clone, PartialEq)]
pub enum DayContent {
    Meals(Vec<NormalizedMeal>),
    Workout(WorkoutDay),
}

/// A date and its normalized content, ready to commit.
#[derive(Debug, Clone, PartialEq)]
pub struct DayPlan {
    pub date: NaiveDate,
    pub content: DayContent,
}

impl DayPlan {
    pub fn kind(&self) -> PlanKind {
        match self.content {
            DayContent::Meals(_) => PlanKind::Meal,
            DayContent::Workout(_) => PlanKind::Workout,
        }
    }

    /// Rows this day writes: one per meal, or one for the workout day.
    pub fn record_count(&self) -> usize {
        match &self.content {
            DayContent::Meals(meals) => meals.len(),
            DayContent::Workout(_) => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalize one bucket for `kind`.
pub fn normalize_bucket(kind: PlanKind, bucket: &DayBucket, config: &PipelineConfig) -> DayPlan {
    let content = match kind {
        PlanKind::Meal => DayContent::Meals(normalize_meals(&bucket.items)),
        PlanKind::Workout => {
            DayContent::Workout(normalize_workout_day(&bucket.items, &config.workout))
        }
    };
    DayPlan {
        date: bucket.date,
        content,
    }
}

/// Normalize meal items in order. Non-object items are skipped.
pub fn normalize_meals(items: &[Value]) -> Vec<NormalizedMeal> {
    objects(items).map(normalize_meal).collect()
}

fn normalize_meal(item: &Value) -> NormalizedMeal {
    let name = MEAL_NAME.text(item).unwrap_or_default();
    let meal_type = MEAL_TYPE
        .text(item)
        .map(|t| t.to_lowercase())
        .or_else(|| meal_type_from_name(&name))
        .unwrap_or_default();

    NormalizedMeal {
        meal_type,
        calories: CALORIES.number(item),
        protein: PROTEIN.number(item),
        carbs: CARBS.number(item),
        fat: FAT.number(item),
        serving_size: SERVING_SIZE.text(item),
        recipe: RECIPE.text(item).unwrap_or_default(),
        ingredients: INGREDIENTS
            .resolve(item)
            .map(ingredient_list)
            .unwrap_or_default(),
        tags: TAGS.resolve(item).map(text_list).unwrap_or_default(),
        notes: NOTES.text(item),
        name,
    }
}

/// First segment of the display name split on `:` or `-`, so
/// `"Lunch - Salad"` is `lunch` and a bare `"Oatmeal"` is `oatmeal`.
fn meal_type_from_name(name: &str) -> Option<String> {
    let prefix = name.split([':', '-']).next()?.trim();
    (!prefix.is_empty()).then(|| prefix.to_lowercase())
}

/// Strings, `{quantity, name}` objects, or one comma-separated string.
fn ingredient_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(entries) => entries
            .iter()
            .filter_map(|entry| match entry {
                Value::Object(_) => {
                    let name = INGREDIENT_NAME.text(entry)?;
                    Some(match INGREDIENT_QUANTITY.text(entry) {
                        Some(quantity) => format!("{quantity} {name}"),
                        None => name,
                    })
                }
                other => render_text(other),
            })
            .collect(),
        other => text_list(other),
    }
}

/// An array of scalars, or one comma-separated string.
fn text_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(entries) => entries.iter().filter_map(render_text).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Normalize one day's exercises and compute its totals.
pub fn normalize_workout_day(items: &[Value], policy: &WorkoutPolicy) -> WorkoutDay {
    let exercises: Vec<NormalizedExercise> = objects(items).map(normalize_exercise).collect();

    let workout_type = if exercises.is_empty() {
        REST_DAY_TYPE.to_string()
    } else {
        exercises
            .iter()
            .map(|e| e.workout_type.as_str())
            .find(|t| !t.is_empty())
            .unwrap_or(GENERAL_TYPE)
            .to_string()
    };

    let aggregate = if exercises.is_empty() {
        DayAggregate {
            total_sets: 0,
            total_reps: 0,
            duration_minutes: to_i32(f64::from(policy.rest_day_minutes)),
            calories_burned: 0,
        }
    } else {
        DayAggregate::compute(&exercises, policy)
    };

    WorkoutDay {
        workout_type,
        exercises,
        aggregate,
    }
}

fn normalize_exercise(item: &Value) -> NormalizedExercise {
    NormalizedExercise {
        workout_type: WORKOUT_TYPE
            .text(item)
            .map(|t| t.to_lowercase())
            .unwrap_or_default(),
        name: EXERCISE_NAME.text(item).unwrap_or_default(),
        sets: SETS.resolve(item).cloned(),
        reps: REPS.resolve(item).cloned(),
        duration_minutes: DURATION.number(item),
        calories_burned: BURNED.number(item),
        rest: REST.text(item),
        notes: NOTES.text(item),
    }
}

fn objects(items: &[Value]) -> impl Iterator<Item = &Value> {
    items.iter().enumerate().filter_map(|(index, item)| {
        if item.is_object() {
            Some(item)
        } else {
            warn!(index, found = json_kind(item), "skipping non-object plan item");
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn policy() -> WorkoutPolicy {
        WorkoutPolicy::default()
    }

    // -- meals --

    #[test]
    fn four_meals_with_nested_calories() {
        let items = vec![
            json!({"meal_type": "Breakfast", "name": "Oats", "nutrition_breakdown": {"calories": "420 cal"}}),
            json!({"meal_type": "lunch", "name": "Wrap", "calories": 510}),
            json!({"meal_type": "dinner", "name": "Stew", "calories": "650 kcal"}),
            json!({"meal_type": "snack", "name": "Apple"}),
        ];
        let meals = normalize_meals(&items);
        assert_eq!(meals.len(), 4);
        assert_eq!(meals[0].calories, Some(420.0));
        assert_eq!(meals[0].meal_type, "breakfast");
        assert_eq!(meals[2].calories, Some(650.0));
        assert_eq!(meals[3].calories, None);
    }

    #[test]
    fn unparseable_nutrient_is_absent_not_zero() {
        let meals = normalize_meals(&[json!({"name": "Mystery", "protein": "N/A"})]);
        assert_eq!(meals[0].protein, None);
    }

    #[test]
    fn meal_fields_fall_back_through_aliases() {
        let item = json!({
            "type": "Dinner",
            "dish": "Curry",
            "nutrition": {"carbohydrates": "55 g", "fat": 12},
            "instructions": "Simmer.",
        });
        let meal = &normalize_meals(&[item])[0];
        assert_eq!(meal.meal_type, "dinner");
        assert_eq!(meal.name, "Curry");
        assert_eq!(meal.carbs, Some(55.0));
        assert_eq!(meal.fat, Some(12.0));
        assert_eq!(meal.recipe, "Simmer.");
    }

    #[test]
    fn meal_type_from_name_prefix() {
        let meals = normalize_meals(&[
            json!({"name": "Breakfast: Oatmeal"}),
            json!({"name": "Lunch - Salad"}),
            json!({"name": "Oatmeal"}),
            json!({}),
        ]);
        assert_eq!(meals[0].meal_type, "breakfast");
        assert_eq!(meals[1].meal_type, "lunch");
        assert_eq!(meals[2].meal_type, "oatmeal");
        assert_eq!(meals[3].meal_type, "");
        assert_eq!(meals[3].name, "");
        assert_eq!(meals[3].recipe, "");
    }

    #[test]
    fn ingredient_shapes() {
        let meals = normalize_meals(&[
            json!({"ingredients": ["oats", " milk "]}),
            json!({"ingredients": [{"quantity": "1 cup", "name": "rice"}, {"item": "salt"}]}),
            json!({"ingredients": "eggs, spinach,  , feta"}),
        ]);
        assert_eq!(meals[0].ingredients, ["oats", "milk"]);
        assert_eq!(meals[1].ingredients, ["1 cup rice", "salt"]);
        assert_eq!(meals[2].ingredients, ["eggs", "spinach", "feta"]);
    }

    #[test]
    fn metadata_passes_through() {
        let meal = &normalize_meals(&[json!({
            "name": "Toast",
            "serving_size": 2,
            "tags": "vegetarian, quick",
            "notes": " crunchy ",
        })])[0];
        assert_eq!(meal.serving_size.as_deref(), Some("2"));
        assert_eq!(meal.tags, ["vegetarian", "quick"]);
        assert_eq!(meal.notes.as_deref(), Some("crunchy"));
    }

    #[test]
    fn non_object_items_are_skipped() {
        let meals = normalize_meals(&[json!("breakfast"), json!({"name": "Eggs"}), json!(3)]);
        assert_eq!(meals.len(), 1);
        assert_eq!(meals[0].name, "Eggs");
    }

    // -- workouts --

    #[test]
    fn aggregate_defaults_zero_duration_per_exercise() {
        let day = normalize_workout_day(
            &[
                json!({"sets": "3", "duration": "0"}),
                json!({"sets": "x", "duration": "15"}),
            ],
            &policy(),
        );
        assert_eq!(day.aggregate.total_sets, 3);
        assert_eq!(day.aggregate.duration_minutes, 25);
        assert_eq!(day.aggregate.calories_burned, 100);
        assert_eq!(day.aggregate.total_reps, 0);
        assert_eq!(day.exercises[1].sets, Some(json!("x")));
    }

    #[test]
    fn meal_type_uses_whole_name_without_separator() {
        let meals = normalize_meals(&[
            json!({"name": "  Greek Yogurt "}),
            json!({"name": ": Toast"}),
            json!({"meal_type": " ", "name": "Snack-Plate"}),
        ]);
        assert_eq!(meals[0].meal_type, "greek yogurt");
        assert_eq!(meals[1].meal_type, "");
        assert_eq!(meals[2].meal_type, "snack");
    }

    #[test]
    fn rep_ranges_are_stored_as_given() {
        let day = normalize_workout_day(
            &[
                json!({"name": "Squat", "sets": 3, "reps": "8-12"}),
                json!({"name": "Side plank", "sets": "2", "reps": "10 each side"}),
            ],
            &policy(),
        );
        assert_eq!(day.exercises[0].reps, Some(json!("8-12")));
        assert_eq!(day.exercises[1].sets, Some(json!("2")));

        let stored = serde_json::to_value(&day.exercises).unwrap();
        assert_eq!(stored[0]["sets"], 3);
        assert_eq!(stored[0]["reps"], "8-12");
        assert_eq!(stored[1]["reps"], "10 each side");

        // Only the totals read the values as numbers.
        assert_eq!(day.aggregate.total_sets, 5);
        assert_eq!(day.aggregate.total_reps, 10);
    }

    #[test]
    fn empty_day_is_rest_day() {
        let day = normalize_workout_day(&[], &policy());
        assert!(day.is_rest_day());
        assert_eq!(day.workout_type, "rest");
        assert_eq!(
            day.aggregate,
            DayAggregate {
                total_sets: 0,
                total_reps: 0,
                duration_minutes: 60,
                calories_burned: 0,
            }
        );
    }

    #[test]
    fn workout_type_is_first_non_empty() {
        let day = normalize_workout_day(
            &[json!({"name": "Walk"}), json!({"category": "Cardio"})],
            &policy(),
        );
        assert_eq!(day.workout_type, "cardio");

        let day = normalize_workout_day(&[json!({"name": "Walk"})], &policy());
        assert_eq!(day.workout_type, "general");
    }

    #[test]
    fn exercise_fields_and_sums() {
        let day = normalize_workout_day(
            &[
                json!({"exercise": "Squat", "sets": 3, "reps": "10", "duration_minutes": "12 min", "calories_burned": "120 kcal", "rest": "90s"}),
                json!({"title": "Plank", "sets": 2, "reps": 1, "duration": 5, "calories": 30}),
            ],
            &policy(),
        );
        assert_eq!(day.exercises[0].name, "Squat");
        assert_eq!(day.exercises[0].rest.as_deref(), Some("90s"));
        assert_eq!(day.exercises[1].name, "Plank");
        assert_eq!(day.aggregate.total_sets, 5);
        assert_eq!(day.aggregate.total_reps, 11);
        assert_eq!(day.aggregate.duration_minutes, 17);
        assert_eq!(day.aggregate.calories_burned, 150);
    }

    #[test]
    fn policy_defaults_are_configurable() {
        let policy = WorkoutPolicy {
            default_exercise_minutes: 5,
            rest_day_minutes: 30,
            default_exercise_calories: 20,
        };
        let day = normalize_workout_day(&[json!({"name": "Stretch"})], &policy);
        assert_eq!(day.aggregate.duration_minutes, 5);
        assert_eq!(day.aggregate.calories_burned, 20);
        assert_eq!(
            normalize_workout_day(&[], &policy).aggregate.duration_minutes,
            30
        );
    }

    #[test]
    fn zero_default_minutes_falls_back_to_rest_day_minutes() {
        let policy = WorkoutPolicy {
            default_exercise_minutes: 0,
            ..WorkoutPolicy::default()
        };
        let day = normalize_workout_day(&[json!({"name": "Breathe"})], &policy);
        assert_eq!(day.aggregate.duration_minutes, 60);
    }

    #[test]
    fn bucket_dispatches_on_kind() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let bucket = DayBucket {
            date,
            items: vec![json!({"name": "Row"})],
        };
        let cfg = PipelineConfig::default();

        let meals = normalize_bucket(PlanKind::Meal, &bucket, &cfg);
        assert_eq!(meals.kind(), PlanKind::Meal);
        assert_eq!(meals.record_count(), 1);

        let workout = normalize_bucket(PlanKind::Workout, &bucket, &cfg);
        assert_eq!(workout.kind(), PlanKind::Workout);
        assert_eq!(workout.date, date);
        assert_eq!(workout.record_count(), 1);
    }
}
