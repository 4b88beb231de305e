use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::ScalarValue;

/// Dataset-level media flag: single-document samples vs. ordered
/// frame-sequence samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    Image,
    Sequence,
}

/// Closed type descriptor for one field. Embedded documents and
/// embedded-document lists carry their own field sets, so a whole schema is
/// a finite tree and every path-resolution decision is a static match on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    Bool,
    Int,
    Float,
    DateTime,
    Str,
    List(Box<FieldType>),
    Document(BTreeMap<String, FieldType>),
    DocumentList(BTreeMap<String, FieldType>),
}

impl FieldType {
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            FieldType::Bool | FieldType::Int | FieldType::Float | FieldType::DateTime | FieldType::Str
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Float)
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::DateTime => "datetime",
            FieldType::Str => "string",
            FieldType::List(_) => "list",
            FieldType::Document(_) => "embedded document",
            FieldType::DocumentList(_) => "embedded document list",
        }
    }

    /// Infer a descriptor from an observed value. Nulls and empty lists
    /// carry no type evidence and infer nothing; such fields must be
    /// declared explicitly before they can be aggregated.
    pub(crate) fn infer(value: &Value) -> Option<FieldType> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(FieldType::Bool),
            Value::Number(n) => {
                if n.as_i64().is_some() || n.as_u64().is_some() {
                    Some(FieldType::Int)
                } else {
                    Some(FieldType::Float)
                }
            }
            Value::String(s) => match ScalarValue::parse_string(s) {
                ScalarValue::DateTime(_) => Some(FieldType::DateTime),
                _ => Some(FieldType::Str),
            },
            Value::Array(items) => {
                let mut elem: Option<FieldType> = None;
                for item in items {
                    if let Some(t) = FieldType::infer(item) {
                        match &mut elem {
                            Some(existing) => existing.merge(&t),
                            None => elem = Some(t),
                        }
                    }
                }
                match elem? {
                    FieldType::Document(fields) => Some(FieldType::DocumentList(fields)),
                    other => Some(FieldType::List(Box::new(other))),
                }
            }
            Value::Object(map) => {
                let mut fields = BTreeMap::new();
                for (name, v) in map {
                    if let Some(t) = FieldType::infer(v) {
                        fields.insert(name.clone(), t);
                    }
                }
                Some(FieldType::Document(fields))
            }
        }
    }

    /// Widen this descriptor to also cover `other`. Mixed Int/Float widens
    /// to Float; document field sets take the union; conflicting kinds keep
    /// the first observation.
    pub(crate) fn merge(&mut self, other: &FieldType) {
        if matches!(self, FieldType::Int) && matches!(other, FieldType::Float) {
            *self = FieldType::Float;
            return;
        }
        match (self, other) {
            (FieldType::List(a), FieldType::List(b)) => a.merge(b),
            (FieldType::Document(a), FieldType::Document(b))
            | (FieldType::DocumentList(a), FieldType::DocumentList(b)) => {
                for (name, t) in b {
                    match a.get_mut(name) {
                        Some(existing) => existing.merge(t),
                        None => {
                            a.insert(name.clone(), t.clone());
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// Field type tree for one dataset: top-level sample fields, frame fields
/// (sequence datasets only), and the media type.
///
/// Every dataset starts with the built-in `id` and `tags` fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    media_type: MediaType,
    fields: BTreeMap<String, FieldType>,
    frame_fields: BTreeMap<String, FieldType>,
}

impl Schema {
    pub fn new(media_type: MediaType) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("id".to_string(), FieldType::Int);
        fields.insert("tags".to_string(), FieldType::List(Box::new(FieldType::Str)));
        Self {
            media_type,
            fields,
            frame_fields: BTreeMap::new(),
        }
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldType> {
        &self.fields
    }

    pub fn frame_fields(&self) -> &BTreeMap<String, FieldType> {
        &self.frame_fields
    }

    pub fn add_field(&mut self, name: impl Into<String>, field_type: FieldType) {
        self.fields.insert(name.into(), field_type);
    }

    pub fn add_frame_field(&mut self, name: impl Into<String>, field_type: FieldType) {
        self.frame_fields.insert(name.into(), field_type);
    }

    /// Record an observed sample-field value, inferring and widening the
    /// descriptor as needed.
    pub(crate) fn observe(&mut self, name: &str, value: &Value) {
        observe_into(&mut self.fields, name, value);
    }

    pub(crate) fn observe_frame(&mut self, name: &str, value: &Value) {
        observe_into(&mut self.frame_fields, name, value);
    }
}

fn observe_into(fields: &mut BTreeMap<String, FieldType>, name: &str, value: &Value) {
    let Some(inferred) = FieldType::infer(value) else {
        return;
    };
    match fields.get_mut(name) {
        Some(existing) => existing.merge(&inferred),
        None => {
            fields.insert(name.to_string(), inferred);
        }
    }
}
