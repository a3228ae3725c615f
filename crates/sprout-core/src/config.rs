//! Pipeline tuning knobs, read from the `[pipeline]` section of the config
//! file. Every field has a default, so an empty section is valid.

use serde::{Deserialize, Serialize};
use sprout_db::models::PlanKind;

/// Per-domain limits and workout defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Meals kept per day; also the chunk size for flat weekly meal arrays.
    pub meals_per_day: usize,
    /// Exercises kept per day; also the chunk size for flat weekly workout
    /// arrays.
    pub exercises_per_day: usize,
    pub workout: WorkoutPolicy,
}

impl PipelineConfig {
    /// Items kept per day for `kind`. Never zero.
    pub fn per_day(&self, kind: PlanKind) -> usize {
        let n = match kind {
            PlanKind::Meal => self.meals_per_day,
            PlanKind::Workout => self.exercises_per_day,
        };
        n.max(1)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            meals_per_day: 4,
            exercises_per_day: 4,
            workout: WorkoutPolicy::default(),
        }
    }
}

/// Defaults used when a workout day's totals are missing or non-positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkoutPolicy {
    /// Minutes credited to an exercise with no positive duration.
    pub default_exercise_minutes: u32,
    /// Day duration when the summed duration is zero (rest days).
    pub rest_day_minutes: u32,
    /// Calories credited to an exercise with no positive burn.
    pub default_exercise_calories: u32,
}

impl Default for WorkoutPolicy {
    fn default() -> Self {
        Self {
            default_exercise_minutes: 10,
            rest_day_minutes: 60,
            default_exercise_calories: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.per_day(PlanKind::Meal), 4);
        assert_eq!(cfg.per_day(PlanKind::Workout), 4);
        assert_eq!(cfg.workout.default_exercise_minutes, 10);
        assert_eq!(cfg.workout.rest_day_minutes, 60);
        assert_eq!(cfg.workout.default_exercise_calories, 50);
    }

    #[test]
    fn per_day_is_never_zero() {
        let cfg = PipelineConfig {
            meals_per_day: 0,
            ..PipelineConfig::default()
        };
        assert_eq!(cfg.per_day(PlanKind::Meal), 1);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{"meals_per_day": 3, "workout": {"rest_day_minutes": 45}}"#)
                .unwrap();
        assert_eq!(cfg.meals_per_day, 3);
        assert_eq!(cfg.exercises_per_day, 4);
        assert_eq!(cfg.workout.rest_day_minutes, 45);
        assert_eq!(cfg.workout.default_exercise_minutes, 10);
    }
}
