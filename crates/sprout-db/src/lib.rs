//! Postgres persistence for generated meal and workout plans.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
