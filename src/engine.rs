use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::frames;
use crate::plan::{Pipeline, ReduceOp, Source, Stage};
use crate::value::{narrow_number, ScalarValue};

/// One raw grouped output row: a group key and its reduced value. What the
/// keys and values mean depends on the pipeline's Reduce stage.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub key: ScalarValue,
    pub value: ScalarValue,
}

impl GroupRow {
    fn new(key: ScalarValue, value: ScalarValue) -> Self {
        Self { key, value }
    }
}

/// The backing execution contract. The planner emits pipelines as plain
/// data so any engine honoring stage semantics is interchangeable; engine
/// failures propagate to callers verbatim, without retries.
pub trait ExecutionEngine {
    fn execute(&self, dataset: &Dataset, pipeline: &Pipeline) -> Result<Vec<GroupRow>>;
}

/// In-memory reference engine.
///
/// Executes one sample at a time: the source document is expanded through
/// the unwind stages, filtered, and folded straight into running reducer
/// state. Only a single sample's expansion is ever resident, so unwinding
/// nested lists or long frame sequences never materializes the full row
/// set.
#[derive(Debug, Default)]
pub struct MemoryEngine;

impl ExecutionEngine for MemoryEngine {
    fn execute(&self, dataset: &Dataset, pipeline: &Pipeline) -> Result<Vec<GroupRow>> {
        let shape = PipelineShape::parse(pipeline)?;
        let mut state = ReduceState::new(shape.reduce);

        for sample in dataset.samples() {
            let body = match shape.source {
                Source::Samples => sample.body().clone(),
                Source::FrameSequence => frames::expand(sample),
            };
            let mut rows = vec![body];
            for unwind_path in &shape.unwinds {
                rows = unwind(rows, unwind_path);
                if rows.is_empty() {
                    break;
                }
            }
            for row in rows {
                if let Some(filter_path) = shape.filter {
                    if field_at(&row, filter_path).is_null() {
                        continue;
                    }
                }
                state.observe(&row);
            }
        }

        let rows = state.finish();
        debug!(rows = rows.len(), "executed aggregation pipeline");
        Ok(rows)
    }
}

/// The stage layout a well-formed pipeline must follow: SelectCollection,
/// then unwinds, then at most one non-null filter, then exactly one
/// terminal Reduce.
struct PipelineShape<'a> {
    source: Source,
    unwinds: Vec<&'a str>,
    filter: Option<&'a str>,
    reduce: &'a ReduceOp,
}

impl<'a> PipelineShape<'a> {
    fn parse(pipeline: &'a Pipeline) -> Result<Self> {
        let invalid = |msg: &str| Error::InvalidPipeline(msg.to_string());

        let mut stages = pipeline.stages.iter();
        let Some(Stage::SelectCollection { source }) = stages.next() else {
            return Err(invalid("pipeline must begin with SelectCollection"));
        };

        let mut unwinds = Vec::new();
        let mut filter = None;
        let mut reduce = None;
        for stage in stages {
            if reduce.is_some() {
                return Err(invalid("Reduce must be the terminal stage"));
            }
            match stage {
                Stage::SelectCollection { .. } => {
                    return Err(invalid("SelectCollection may only appear first"));
                }
                Stage::Unwind { path } => {
                    if filter.is_some() {
                        return Err(invalid("Unwind may not follow FilterNonNull"));
                    }
                    unwinds.push(path.as_str());
                }
                Stage::FilterNonNull { path } => {
                    if filter.replace(path.as_str()).is_some() {
                        return Err(invalid("duplicate FilterNonNull stage"));
                    }
                }
                Stage::Reduce(op) => reduce = Some(op),
            }
        }
        let Some(reduce) = reduce else {
            return Err(invalid("pipeline has no Reduce stage"));
        };

        Ok(Self {
            source: *source,
            unwinds,
            filter,
            reduce,
        })
    }
}

/// Read the value at a dotted path, Null when any hop is missing or
/// non-object.
fn field_at(doc: &Value, path: &str) -> Value {
    let mut current = doc;
    for part in path.split('.') {
        match current {
            Value::Object(map) => match map.get(part) {
                Some(v) => current = v,
                None => return Value::Null,
            },
            _ => return Value::Null,
        }
    }
    current.clone()
}

fn write_field(doc: &mut Value, path: &str, value: Value) {
    let parts: Vec<&str> = path.split('.').collect();
    let mut current = doc;
    for (i, part) in parts.iter().enumerate() {
        let Value::Object(map) = current else {
            return;
        };
        if i == parts.len() - 1 {
            map.insert(part.to_string(), value);
            return;
        }
        match map.get_mut(*part) {
            Some(next) => current = next,
            None => return,
        }
    }
}

/// Flatten the list at `path` across a row set: one output row per element,
/// with the element written back at `path` so the rest of the document
/// (identity included) rides along. Null, missing, and empty lists drop
/// the row; a non-list value passes through as its own single contribution.
fn unwind(rows: Vec<Value>, path: &str) -> Vec<Value> {
    let mut out = Vec::new();
    for row in rows {
        match field_at(&row, path) {
            Value::Array(items) => {
                for item in items {
                    let mut next = row.clone();
                    write_field(&mut next, path, item);
                    out.push(next);
                }
            }
            Value::Null => {}
            _ => out.push(row),
        }
    }
    out
}

/// Running reducer state, updated one row at a time.
enum ReduceState<'a> {
    Count(u64),
    CountValues {
        path: &'a str,
        counts: BTreeMap<ScalarValue, u64>,
    },
    Distinct {
        path: &'a str,
        values: BTreeSet<ScalarValue>,
    },
    Bounds {
        path: &'a str,
        min: Option<ScalarValue>,
        max: Option<ScalarValue>,
    },
    Sum {
        path: &'a str,
        total: f64,
    },
}

impl<'a> ReduceState<'a> {
    fn new(op: &'a ReduceOp) -> Self {
        match op {
            ReduceOp::Count => ReduceState::Count(0),
            ReduceOp::CountValues { path } => ReduceState::CountValues {
                path,
                counts: BTreeMap::new(),
            },
            ReduceOp::Distinct { path } => ReduceState::Distinct {
                path,
                values: BTreeSet::new(),
            },
            ReduceOp::Bounds { path } => ReduceState::Bounds {
                path,
                min: None,
                max: None,
            },
            ReduceOp::Sum { path } => ReduceState::Sum { path, total: 0.0 },
        }
    }

    fn observe(&mut self, row: &Value) {
        match self {
            ReduceState::Count(n) => *n += 1,
            ReduceState::CountValues { path, counts } => {
                let key = ScalarValue::from_json(&field_at(row, path));
                if !key.is_null() {
                    *counts.entry(key).or_insert(0) += 1;
                }
            }
            ReduceState::Distinct { path, values } => {
                let key = ScalarValue::from_json(&field_at(row, path));
                if !key.is_null() {
                    values.insert(key);
                }
            }
            ReduceState::Bounds { path, min, max } => {
                let leaf = ScalarValue::from_json(&field_at(row, path));
                if leaf.is_null() {
                    return;
                }
                if min.as_ref().is_none_or(|m| leaf < *m) {
                    *min = Some(leaf.clone());
                }
                if max.as_ref().is_none_or(|m| leaf > *m) {
                    *max = Some(leaf);
                }
            }
            ReduceState::Sum { path, total } => {
                if let Some(n) = ScalarValue::from_json(&field_at(row, path)).as_f64() {
                    *total += n;
                }
            }
        }
    }

    fn finish(self) -> Vec<GroupRow> {
        match self {
            ReduceState::Count(n) => vec![GroupRow::new(
                ScalarValue::Null,
                ScalarValue::Integer(n as i64),
            )],
            ReduceState::CountValues { counts, .. } => counts
                .into_iter()
                .map(|(key, n)| GroupRow::new(key, ScalarValue::Integer(n as i64)))
                .collect(),
            ReduceState::Distinct { values, .. } => values
                .into_iter()
                .map(|key| GroupRow::new(key, ScalarValue::Null))
                .collect(),
            ReduceState::Bounds { min, max, .. } => match (min, max) {
                (Some(min), Some(max)) => vec![
                    GroupRow::new(ScalarValue::String("min".into()), min),
                    GroupRow::new(ScalarValue::String("max".into()), max),
                ],
                _ => Vec::new(),
            },
            ReduceState::Sum { total, .. } => {
                vec![GroupRow::new(ScalarValue::Null, narrow_number(total))]
            }
        }
    }
}
