use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::GroupRow;
use crate::value::ScalarValue;

/// A declarative aggregation request: an aggregation kind plus the field
/// path it applies to. Pure data: nothing happens until a dataset plans
/// and executes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Aggregation {
    /// Count leaf occurrences at `path`, or whole documents when `path` is
    /// absent.
    Count { path: Option<String> },
    /// Map each observed leaf value to its occurrence count.
    CountValues { path: String },
    /// Distinct leaf values in ascending order.
    Distinct { path: String },
    /// (min, max) over numeric or datetime leaves.
    Bounds { path: String },
    /// Sum over numeric leaves.
    Sum { path: String },
}

impl Aggregation {
    /// Count the whole document collection.
    pub fn count() -> Self {
        Aggregation::Count { path: None }
    }

    /// Count non-null leaf occurrences at `path` (lists flatten: one
    /// contribution per element).
    pub fn count_field(path: impl Into<String>) -> Self {
        Aggregation::Count {
            path: Some(path.into()),
        }
    }

    pub fn count_values(path: impl Into<String>) -> Self {
        Aggregation::CountValues { path: path.into() }
    }

    pub fn distinct(path: impl Into<String>) -> Self {
        Aggregation::Distinct { path: path.into() }
    }

    pub fn bounds(path: impl Into<String>) -> Self {
        Aggregation::Bounds { path: path.into() }
    }

    pub fn sum(path: impl Into<String>) -> Self {
        Aggregation::Sum { path: path.into() }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            Aggregation::Count { path } => path.as_deref(),
            Aggregation::CountValues { path }
            | Aggregation::Distinct { path }
            | Aggregation::Bounds { path }
            | Aggregation::Sum { path } => Some(path),
        }
    }

    /// Decode the engine's raw grouped rows into this aggregation's declared
    /// result shape. Empty row sets produce the documented defaults; rows
    /// that do not match the expected shape are ignored.
    pub(crate) fn decode(&self, rows: Vec<GroupRow>) -> AggregationResult {
        match self {
            Aggregation::Count { .. } => {
                let tally = rows
                    .first()
                    .and_then(|row| row.value.as_u64())
                    .unwrap_or(0);
                AggregationResult::Count(tally)
            }
            Aggregation::CountValues { .. } => {
                let mut counts = BTreeMap::new();
                for row in rows {
                    if let Some(n) = row.value.as_u64() {
                        counts.insert(row.key, n);
                    }
                }
                AggregationResult::CountValues(counts)
            }
            Aggregation::Distinct { .. } => {
                let mut values: Vec<ScalarValue> =
                    rows.into_iter().map(|row| row.key).collect();
                values.sort();
                values.dedup();
                AggregationResult::Distinct(values)
            }
            Aggregation::Bounds { .. } => {
                let mut min = None;
                let mut max = None;
                for GroupRow { key, value } in rows {
                    match key {
                        ScalarValue::String(k) if k == "min" => min = Some(value),
                        ScalarValue::String(k) if k == "max" => max = Some(value),
                        _ => {}
                    }
                }
                AggregationResult::Bounds(min, max)
            }
            Aggregation::Sum { .. } => {
                let total = rows
                    .into_iter()
                    .next()
                    .map(|row| row.value)
                    .unwrap_or(ScalarValue::Integer(0));
                AggregationResult::Sum(total)
            }
        }
    }
}

/// One aggregation's typed outcome, shaped per its request variant.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationResult {
    Count(u64),
    CountValues(BTreeMap<ScalarValue, u64>),
    Distinct(Vec<ScalarValue>),
    Bounds(Option<ScalarValue>, Option<ScalarValue>),
    Sum(ScalarValue),
}

impl AggregationResult {
    pub fn as_count(&self) -> Option<u64> {
        match self {
            AggregationResult::Count(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_count_values(&self) -> Option<&BTreeMap<ScalarValue, u64>> {
        match self {
            AggregationResult::CountValues(counts) => Some(counts),
            _ => None,
        }
    }

    pub fn as_distinct(&self) -> Option<&[ScalarValue]> {
        match self {
            AggregationResult::Distinct(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_bounds(&self) -> Option<(Option<&ScalarValue>, Option<&ScalarValue>)> {
        match self {
            AggregationResult::Bounds(min, max) => Some((min.as_ref(), max.as_ref())),
            _ => None,
        }
    }

    pub fn as_sum(&self) -> Option<&ScalarValue> {
        match self {
            AggregationResult::Sum(total) => Some(total),
            _ => None,
        }
    }
}
