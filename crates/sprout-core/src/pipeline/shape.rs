//! Shape resolution: map a parsed plan onto the requested calendar dates.
//!
//! Single-day plans must be an array. Multi-day plans are resolved by the
//! first matching tier:
//!
//! 1. an object keyed exactly by the target ISO dates,
//! 2. any other object, keys assigned to dates by position,
//! 3. a flat array, split into per-day chunks.
//!
//! Every target date gets exactly one bucket, truncated to the per-day cap
//! and never padded.

use chrono::{Duration, NaiveDate};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::extract::ExtractMode;
use super::repair::json_kind;

const ISO_DATE: &str = "%Y-%m-%d";

/// The dates a request covers, in calendar order without duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDates(Vec<NaiveDate>);

impl TargetDates {
    pub fn single(date: NaiveDate) -> Self {
        Self(vec![date])
    }

    /// Seven consecutive days starting at `start`.
    pub fn week_starting(start: NaiveDate) -> Self {
        Self((0..7).map(|i| start + Duration::days(i)).collect())
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<NaiveDate> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<NaiveDate> {
        self.0.last().copied()
    }
}

/// Raw, unnormalized items assigned to one date.
#[derive(Debug, Clone, PartialEq)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub items: Vec<Value>,
}

/// Which rule produced the buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Single,
    ExactDates,
    Positional,
    Chunked,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Single => "single day",
            Self::ExactDates => "date keys",
            Self::Positional => "positional keys",
            Self::Chunked => "flat array",
        };
        f.write_str(s)
    }
}

/// Buckets for every target date, in calendar order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPlan {
    pub resolution: Resolution,
    pub buckets: Vec<DayBucket>,
}

/// The parsed value does not have the shape the request needs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("expected a JSON array of items for a single-day plan, got a JSON {found}")]
    ExpectedArray { found: &'static str },

    #[error("expected a JSON object or array for a multi-day plan, got a JSON {found}")]
    ExpectedCollection { found: &'static str },

    #[error("no target dates to resolve the plan against")]
    NoTargetDates,
}

/// Resolve `value` against `targets` for the given mode.
///
/// `Single` uses the first target date; `Multi` uses all of them.
pub fn resolve(
    value: Value,
    mode: ExtractMode,
    targets: &TargetDates,
    per_day: usize,
) -> Result<ResolvedPlan, ShapeError> {
    match mode {
        ExtractMode::Single => {
            let date = targets.first().ok_or(ShapeError::NoTargetDates)?;
            resolve_single(value, date, per_day)
        }
        ExtractMode::Multi => resolve_weekly(value, targets, per_day),
    }
}

/// A single-day plan: the array itself is the day's items.
pub fn resolve_single(
    value: Value,
    date: NaiveDate,
    per_day: usize,
) -> Result<ResolvedPlan, ShapeError> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(ShapeError::ExpectedArray {
                found: json_kind(&other),
            });
        }
    };
    Ok(ResolvedPlan {
        resolution: Resolution::Single,
        buckets: vec![bucket(date, items, per_day)],
    })
}

/// A multi-day plan, resolved by date keys, then key position, then chunking.
pub fn resolve_weekly(
    value: Value,
    targets: &TargetDates,
    per_day: usize,
) -> Result<ResolvedPlan, ShapeError> {
    if targets.is_empty() {
        return Err(ShapeError::NoTargetDates);
    }
    let per_day = per_day.max(1);

    let resolved = match value {
        Value::Object(map) => {
            let iso: Vec<String> = targets
                .dates()
                .iter()
                .map(|d| d.format(ISO_DATE).to_string())
                .collect();
            let exact = !map.is_empty() && map.keys().all(|k| iso.iter().any(|d| d == k.trim()));

            if exact {
                let mut by_key: Vec<(String, Value)> = map.into_iter().collect();
                let buckets = targets
                    .dates()
                    .iter()
                    .zip(&iso)
                    .map(|(date, key)| {
                        let items = by_key
                            .iter()
                            .position(|(k, _)| k.trim() == key)
                            .map(|pos| by_key.swap_remove(pos).1)
                            .map(|v| into_items(v, *date))
                            .unwrap_or_default();
                        bucket(*date, items, per_day)
                    })
                    .collect();
                ResolvedPlan {
                    resolution: Resolution::ExactDates,
                    buckets,
                }
            } else {
                let extra = map.len().saturating_sub(targets.len());
                if extra > 0 {
                    warn!(extra, "plan has more day keys than target dates; ignoring the rest");
                }
                let mut values = map.into_iter().map(|(_, v)| v);
                let buckets = targets
                    .dates()
                    .iter()
                    .map(|date| {
                        let items = values
                            .next()
                            .map(|v| into_items(v, *date))
                            .unwrap_or_default();
                        bucket(*date, items, per_day)
                    })
                    .collect();
                ResolvedPlan {
                    resolution: Resolution::Positional,
                    buckets,
                }
            }
        }
        Value::Array(items) => {
            let chunks = items.len().div_ceil(per_day);
            if chunks > targets.len() {
                warn!(
                    items = items.len(),
                    per_day, "flat plan has more items than the target dates hold; ignoring the rest"
                );
            }
            let mut items = items.into_iter();
            let buckets = targets
                .dates()
                .iter()
                .map(|date| bucket(*date, items.by_ref().take(per_day).collect(), per_day))
                .collect();
            ResolvedPlan {
                resolution: Resolution::Chunked,
                buckets,
            }
        }
        other => {
            return Err(ShapeError::ExpectedCollection {
                found: json_kind(&other),
            });
        }
    };

    debug!(tier = %resolved.resolution, days = resolved.buckets.len(), "plan shape resolved");
    Ok(resolved)
}

/// A day's value as an item list; anything but an array is an empty day.
fn into_items(value: Value, date: NaiveDate) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => {
            warn!(%date, found = json_kind(&other), "day value is not an array; treating as empty");
            Vec::new()
        }
    }
}

fn bucket(date: NaiveDate, mut items: Vec<Value>, per_day: usize) -> DayBucket {
    if items.len() > per_day {
        debug!(%date, dropped = items.len() - per_day, "truncating day to per-day cap");
        items.truncate(per_day);
    }
    DayBucket { date, items }
}
