use serde_json::Value;
use tracing::debug;

use crate::aggregation::{Aggregation, AggregationResult};
use crate::engine::{ExecutionEngine, MemoryEngine};
use crate::error::{Error, Result};
use crate::frames::FRAMES_FIELD;
use crate::plan::Pipeline;
use crate::sample::{Sample, SampleId};
use crate::schema::{FieldType, MediaType, Schema};

/// An in-memory collection of samples plus the schema describing them.
///
/// Owns the data and the schema for the duration of a session; each
/// aggregation call reads both and holds no state afterwards. Field types
/// may be declared up front or inferred as samples arrive.
pub struct Dataset {
    schema: Schema,
    samples: Vec<Sample>,
    next_id: SampleId,
}

impl Dataset {
    pub fn new(media_type: MediaType) -> Self {
        Self {
            schema: Schema::new(media_type),
            samples: Vec::new(),
            next_id: 1,
        }
    }

    pub fn image() -> Self {
        Self::new(MediaType::Image)
    }

    pub fn sequence() -> Self {
        Self::new(MediaType::Sequence)
    }

    /// The schema-provider contract: queryable synchronously, before any
    /// planning happens.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Declare a sample field up front.
    pub fn add_field(&mut self, name: impl Into<String>, field_type: FieldType) {
        self.schema.add_field(name, field_type);
    }

    /// Declare a frame field up front. Only sequence datasets have frames.
    pub fn add_frame_field(
        &mut self,
        name: impl Into<String>,
        field_type: FieldType,
    ) -> Result<()> {
        let name = name.into();
        if self.schema.media_type() != MediaType::Sequence {
            return Err(Error::UnsupportedMediaType {
                path: format!("{FRAMES_FIELD}.{name}"),
            });
        }
        self.schema.add_frame_field(name, field_type);
        Ok(())
    }

    /// Add a sample, assigning its id and growing the schema from any
    /// previously unseen fields.
    pub fn add_sample(&mut self, mut sample: Sample) -> Result<SampleId> {
        if !sample.data.is_object() {
            return Err(Error::NotAnObject);
        }
        if !sample.frames.is_empty() && self.schema.media_type() != MediaType::Sequence {
            return Err(Error::UnsupportedMediaType {
                path: FRAMES_FIELD.to_string(),
            });
        }

        let id = self.next_id;
        self.next_id += 1;
        sample.set("id", Value::Number(id.into()));

        if let Some(fields) = sample.data.as_object() {
            for (name, value) in fields {
                if name != "id" {
                    self.schema.observe(name, value);
                }
            }
        }
        for frame in sample.frames.values() {
            if let Some(fields) = frame.as_object() {
                for (name, value) in fields {
                    self.schema.observe_frame(name, value);
                }
            }
        }

        self.samples.push(sample);
        Ok(id)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Run one aggregation with the built-in reference engine.
    pub fn aggregate(&self, agg: &Aggregation) -> Result<AggregationResult> {
        let pipeline = Pipeline::compile(agg, &self.schema)?;
        let rows = MemoryEngine.execute(self, &pipeline)?;
        Ok(agg.decode(rows))
    }

    /// Run a batch of aggregations; results come back in request order.
    pub fn aggregate_all(&self, aggs: &[Aggregation]) -> Result<Vec<AggregationResult>> {
        self.aggregate_with(&MemoryEngine, aggs)
    }

    /// Run a batch against any execution engine. Every pipeline compiles
    /// before any executes: a single failing request fails the whole batch
    /// with zero engine work done.
    pub fn aggregate_with<E: ExecutionEngine>(
        &self,
        engine: &E,
        aggs: &[Aggregation],
    ) -> Result<Vec<AggregationResult>> {
        let pipelines = aggs
            .iter()
            .map(|agg| Pipeline::compile(agg, &self.schema))
            .collect::<Result<Vec<_>>>()?;

        debug!(batch = aggs.len(), "executing aggregation batch");
        aggs.iter()
            .zip(&pipelines)
            .map(|(agg, pipeline)| Ok(agg.decode(engine.execute(self, pipeline)?)))
            .collect()
    }
}
