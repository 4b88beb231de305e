pub mod aggregation;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod frames;
pub mod path;
pub mod plan;
pub mod sample;
pub mod schema;
pub mod value;

pub use aggregation::{Aggregation, AggregationResult};
pub use dataset::Dataset;
pub use engine::{ExecutionEngine, GroupRow, MemoryEngine};
pub use error::{Error, Result};
pub use path::{ResolvedPath, ResolvedSegment, SegmentKind};
pub use plan::{Pipeline, ReduceOp, Source, Stage};
pub use sample::{Sample, SampleId};
pub use schema::{FieldType, MediaType, Schema};
pub use value::ScalarValue;
