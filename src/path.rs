use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::frames::FRAMES_FIELD;
use crate::schema::{FieldType, MediaType, Schema};

/// What a resolved path segment does during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentKind {
    /// Terminal scalar field.
    Field,
    /// Descend into an embedded document's field set.
    EmbeddedHop,
    /// Flatten a list-valued context, one row per element.
    ListUnwind,
    /// Flatten the frame sequence, one row per frame.
    FramesUnwind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSegment {
    pub name: String,
    pub kind: SegmentKind,
}

impl ResolvedSegment {
    fn new(name: &str, kind: SegmentKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

/// A fully resolved path: the ordered traversal steps plus the leaf type
/// the path terminates at. Consumed by the planner, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    pub path: String,
    pub segments: Vec<ResolvedSegment>,
    pub leaf: FieldType,
}

impl ResolvedPath {
    pub fn is_frame_scoped(&self) -> bool {
        self.segments
            .first()
            .is_some_and(|s| s.kind == SegmentKind::FramesUnwind)
    }
}

/// Resolve a dotted field path against a schema.
///
/// Walks segments left to right tracking the current type context. The
/// literal first segment `frames` flattens the frame sequence and switches
/// the context to the frame field set; it is only legal on sequence
/// datasets. All errors here surface before any pipeline is built.
pub fn resolve(path: &str, schema: &Schema) -> Result<ResolvedPath> {
    let mut segments: Vec<ResolvedSegment> = Vec::new();
    let mut context: Option<&BTreeMap<String, FieldType>> = Some(schema.fields());
    let mut leaf: Option<FieldType> = None;

    if path.is_empty() {
        return Err(Error::FieldNotFound {
            path: path.to_string(),
            field: String::new(),
        });
    }

    for (i, part) in path.split('.').enumerate() {
        if i == 0 && part == FRAMES_FIELD {
            if schema.media_type() != MediaType::Sequence {
                return Err(Error::UnsupportedMediaType {
                    path: path.to_string(),
                });
            }
            segments.push(ResolvedSegment::new(part, SegmentKind::FramesUnwind));
            context = Some(schema.frame_fields());
            leaf = Some(FieldType::Document(schema.frame_fields().clone()));
            continue;
        }

        let not_found = || Error::FieldNotFound {
            path: path.to_string(),
            field: part.to_string(),
        };
        let fields = context.ok_or_else(not_found)?;
        let field_type = fields.get(part).ok_or_else(not_found)?;

        match field_type {
            FieldType::Document(sub) => {
                segments.push(ResolvedSegment::new(part, SegmentKind::EmbeddedHop));
                context = Some(sub);
                leaf = Some(field_type.clone());
            }
            FieldType::DocumentList(sub) => {
                segments.push(ResolvedSegment::new(part, SegmentKind::ListUnwind));
                segments.push(ResolvedSegment::new(part, SegmentKind::EmbeddedHop));
                context = Some(sub);
                leaf = Some(FieldType::Document(sub.clone()));
            }
            FieldType::List(elem) => {
                segments.push(ResolvedSegment::new(part, SegmentKind::ListUnwind));
                let mut elem = elem.as_ref();
                // nested lists flatten level by level at the same path part
                while let FieldType::List(inner) = elem {
                    segments.push(ResolvedSegment::new(part, SegmentKind::ListUnwind));
                    elem = inner;
                }
                match elem {
                    FieldType::Document(sub) => {
                        segments.push(ResolvedSegment::new(part, SegmentKind::EmbeddedHop));
                        context = Some(sub);
                        leaf = Some(elem.clone());
                    }
                    FieldType::DocumentList(sub) => {
                        segments.push(ResolvedSegment::new(part, SegmentKind::ListUnwind));
                        segments.push(ResolvedSegment::new(part, SegmentKind::EmbeddedHop));
                        context = Some(sub);
                        leaf = Some(FieldType::Document(sub.clone()));
                    }
                    scalar => {
                        context = None;
                        leaf = Some(scalar.clone());
                    }
                }
            }
            scalar => {
                segments.push(ResolvedSegment::new(part, SegmentKind::Field));
                context = None;
                leaf = Some(scalar.clone());
            }
        }
    }

    let leaf = leaf.ok_or_else(|| Error::FieldNotFound {
        path: path.to_string(),
        field: path.to_string(),
    })?;

    Ok(ResolvedPath {
        path: path.to_string(),
        segments,
        leaf,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detections_schema() -> Schema {
        let mut schema = Schema::new(MediaType::Image);
        let mut det = BTreeMap::new();
        det.insert("label".to_string(), FieldType::Str);
        det.insert("confidence".to_string(), FieldType::Float);
        schema.add_field("detection", FieldType::Document(det.clone()));
        let mut outer = BTreeMap::new();
        outer.insert("detections".to_string(), FieldType::DocumentList(det));
        schema.add_field("detections", FieldType::Document(outer));
        schema.add_field("numbers", FieldType::List(Box::new(FieldType::Int)));
        schema
    }

    fn kinds(resolved: &ResolvedPath) -> Vec<SegmentKind> {
        resolved.segments.iter().map(|s| s.kind).collect()
    }

    #[test]
    fn scalar_field() {
        let mut schema = Schema::new(MediaType::Image);
        schema.add_field("number", FieldType::Int);
        let r = resolve("number", &schema).unwrap();
        assert_eq!(kinds(&r), vec![SegmentKind::Field]);
        assert_eq!(r.leaf, FieldType::Int);
    }

    #[test]
    fn scalar_list_gets_single_unwind() {
        let r = resolve("numbers", &detections_schema()).unwrap();
        assert_eq!(kinds(&r), vec![SegmentKind::ListUnwind]);
        assert_eq!(r.leaf, FieldType::Int);
    }

    #[test]
    fn embedded_document_hop() {
        let r = resolve("detection.label", &detections_schema()).unwrap();
        assert_eq!(kinds(&r), vec![SegmentKind::EmbeddedHop, SegmentKind::Field]);
        assert_eq!(r.leaf, FieldType::Str);
    }

    #[test]
    fn document_list_unwinds_then_hops() {
        let r = resolve("detections.detections.confidence", &detections_schema()).unwrap();
        assert_eq!(
            kinds(&r),
            vec![
                SegmentKind::EmbeddedHop,
                SegmentKind::ListUnwind,
                SegmentKind::EmbeddedHop,
                SegmentKind::Field,
            ]
        );
        assert_eq!(r.leaf, FieldType::Float);
    }

    #[test]
    fn frames_prefix_on_sequence() {
        let mut schema = Schema::new(MediaType::Sequence);
        schema.add_frame_field("number", FieldType::Int);
        let r = resolve("frames.number", &schema).unwrap();
        assert_eq!(kinds(&r), vec![SegmentKind::FramesUnwind, SegmentKind::Field]);
        assert!(r.is_frame_scoped());
    }

    #[test]
    fn bare_frames_resolves_to_document_leaf() {
        let schema = Schema::new(MediaType::Sequence);
        let r = resolve("frames", &schema).unwrap();
        assert_eq!(kinds(&r), vec![SegmentKind::FramesUnwind]);
        assert!(matches!(r.leaf, FieldType::Document(_)));
    }

    #[test]
    fn frames_prefix_on_image_fails() {
        let schema = Schema::new(MediaType::Image);
        let err = resolve("frames.number", &schema).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMediaType { .. }));
    }

    #[test]
    fn unknown_field_fails() {
        let schema = Schema::new(MediaType::Image);
        let err = resolve("missing", &schema).unwrap_err();
        let Error::FieldNotFound { field, .. } = err else {
            panic!("expected FieldNotFound");
        };
        assert_eq!(field, "missing");
    }

    #[test]
    fn descending_through_scalar_fails() {
        let mut schema = Schema::new(MediaType::Image);
        schema.add_field("number", FieldType::Int);
        let err = resolve("number.nested", &schema).unwrap_err();
        assert!(matches!(err, Error::FieldNotFound { .. }));
    }

    #[test]
    fn nested_list_of_lists() {
        let mut schema = Schema::new(MediaType::Image);
        schema.add_field(
            "matrix",
            FieldType::List(Box::new(FieldType::List(Box::new(FieldType::Int)))),
        );
        let r = resolve("matrix", &schema).unwrap();
        assert_eq!(kinds(&r), vec![SegmentKind::ListUnwind, SegmentKind::ListUnwind]);
        assert_eq!(r.leaf, FieldType::Int);
    }

    #[test]
    fn frames_is_not_a_sample_field() {
        // even a sample field literally named "frames" does not shadow the
        // reserved prefix
        let mut schema = Schema::new(MediaType::Image);
        schema.add_field("frames", FieldType::Int);
        assert!(matches!(
            resolve("frames", &schema),
            Err(Error::UnsupportedMediaType { .. })
        ));
    }
}
