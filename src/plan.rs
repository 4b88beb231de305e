use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregation::Aggregation;
use crate::error::{Error, Result};
use crate::path::{self, ResolvedPath, SegmentKind};
use crate::schema::{FieldType, Schema};

/// Which physical collection a pipeline reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Samples,
    /// The flattened per-frame sub-collection of a sequence dataset.
    FrameSequence,
}

/// Kind-specific terminal reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReduceOp {
    Count,
    CountValues { path: String },
    Distinct { path: String },
    Bounds { path: String },
    Sum { path: String },
}

/// One engine-agnostic pipeline stage. Stages are plain serializable data:
/// any engine honoring their semantics can execute a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    SelectCollection { source: Source },
    /// Flatten the list at `path`, one row per element, element written
    /// back at `path`. Rows where `path` is null, missing, or an empty
    /// list are dropped.
    Unwind { path: String },
    /// Drop rows whose value at `path` is null or missing.
    FilterNonNull { path: String },
    Reduce(ReduceOp),
}

/// An ordered, engine-agnostic stage list compiled from one aggregation
/// request. Unwinds appear in resolved order and compose sequentially, so
/// row expansion can stream; document identity survives every unwind
/// because rows carry their whole originating document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// Compile an aggregation request against a schema.
    ///
    /// All resolution and type-compatibility errors surface here,
    /// synchronously, before any engine is involved.
    pub fn compile(agg: &Aggregation, schema: &Schema) -> Result<Pipeline> {
        let Some(raw_path) = agg.path() else {
            // pathless Count bypasses resolution: count whole documents
            return Ok(Pipeline {
                stages: vec![
                    Stage::SelectCollection {
                        source: Source::Samples,
                    },
                    Stage::Reduce(ReduceOp::Count),
                ],
            });
        };

        let resolved = path::resolve(raw_path, schema)?;
        check_compatibility(agg, &resolved)?;

        let source = if resolved.is_frame_scoped() {
            Source::FrameSequence
        } else {
            Source::Samples
        };
        let mut stages = vec![Stage::SelectCollection { source }];

        let leaf_path = push_unwinds(&resolved, &mut stages);

        // the bare frame sequence is the one leaf that can never be null
        let bare_frames =
            resolved.segments.len() == 1 && resolved.is_frame_scoped();
        if !bare_frames {
            stages.push(Stage::FilterNonNull {
                path: leaf_path.clone(),
            });
        }

        let op = match agg {
            Aggregation::Count { .. } => ReduceOp::Count,
            Aggregation::CountValues { .. } => ReduceOp::CountValues { path: leaf_path },
            Aggregation::Distinct { .. } => ReduceOp::Distinct { path: leaf_path },
            Aggregation::Bounds { .. } => ReduceOp::Bounds { path: leaf_path },
            Aggregation::Sum { .. } => ReduceOp::Sum { path: leaf_path },
        };
        stages.push(Stage::Reduce(op));

        debug!(path = raw_path, stages = stages.len(), "compiled aggregation pipeline");
        Ok(Pipeline { stages })
    }
}

/// Emit one Unwind stage per ListUnwind/FramesUnwind segment, in resolved
/// order, and return the full dotted leaf path.
///
/// A ListUnwind and the EmbeddedHop that follows it for the same
/// document-list field share one path part; repeated ListUnwinds for
/// nested lists re-unwind the same part.
fn push_unwinds(resolved: &ResolvedPath, stages: &mut Vec<Stage>) -> String {
    let segments = &resolved.segments;
    let mut prefix: Vec<&str> = Vec::new();
    let mut i = 0;

    while i < segments.len() {
        let seg = &segments[i];
        match seg.kind {
            SegmentKind::FramesUnwind => {
                prefix.push(&seg.name);
                stages.push(Stage::Unwind {
                    path: prefix.join("."),
                });
            }
            SegmentKind::ListUnwind => {
                prefix.push(&seg.name);
                stages.push(Stage::Unwind {
                    path: prefix.join("."),
                });
                while let Some(next) = segments.get(i + 1) {
                    if next.kind == SegmentKind::ListUnwind && next.name == seg.name {
                        stages.push(Stage::Unwind {
                            path: prefix.join("."),
                        });
                        i += 1;
                    } else {
                        break;
                    }
                }
                if let Some(next) = segments.get(i + 1) {
                    if next.kind == SegmentKind::EmbeddedHop && next.name == seg.name {
                        i += 1; // paired hop, same path part
                    }
                }
            }
            SegmentKind::EmbeddedHop | SegmentKind::Field => {
                prefix.push(&seg.name);
            }
        }
        i += 1;
    }

    prefix.join(".")
}

fn check_compatibility(agg: &Aggregation, resolved: &ResolvedPath) -> Result<()> {
    let leaf = &resolved.leaf;
    let expected = match agg {
        Aggregation::Count { .. } => return Ok(()),
        Aggregation::CountValues { .. } | Aggregation::Distinct { .. } => {
            if leaf.is_scalar() {
                return Ok(());
            }
            "a scalar leaf"
        }
        Aggregation::Bounds { .. } => {
            if leaf.is_numeric() || *leaf == FieldType::DateTime {
                return Ok(());
            }
            "a numeric or datetime leaf"
        }
        Aggregation::Sum { .. } => {
            if leaf.is_numeric() {
                return Ok(());
            }
            "a numeric leaf"
        }
    };
    Err(Error::TypeMismatch {
        path: resolved.path.clone(),
        expected,
        actual: leaf.name().to_string(),
    })
}
