//! Query functions, one module per table.

pub mod meals;
pub mod workouts;
