//! Plan extraction and normalization for generated meal and workout plans.
//!
//! Generator text goes in, calendar-aligned records come out:
//!
//! ```text
//! Completion --raw text--> pipeline::extract --candidates--> pipeline::repair
//!     --Value--> pipeline::shape --DayBucket per date--> pipeline::normalize
//!     --DayPlan per date--> pipeline::commit --> PlanStore
//! ```

pub mod completion;
pub mod config;
pub mod pipeline;
pub mod store;
