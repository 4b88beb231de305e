use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub type SampleId = u64;

/// A schema-flexible document: a JSON-object body plus, on sequence
/// datasets, an ordered map of 1-based frame index to frame body.
///
/// The `tags` field is always present (an ordered string list, duplicates
/// allowed). The `id` field is assigned when the sample joins a dataset.
#[derive(Debug, Clone)]
pub struct Sample {
    pub(crate) data: Value,
    pub(crate) frames: BTreeMap<u32, Value>,
}

impl Default for Sample {
    fn default() -> Self {
        Self::new()
    }
}

impl Sample {
    pub fn new() -> Self {
        let mut map = Map::new();
        map.insert("tags".to_string(), Value::Array(Vec::new()));
        Self {
            data: Value::Object(map),
            frames: BTreeMap::new(),
        }
    }

    /// Build a sample from a prepared JSON object body.
    pub fn with_fields(data: Value) -> Result<Self> {
        let Value::Object(mut map) = data else {
            return Err(Error::NotAnObject);
        };
        map.entry("tags".to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        Ok(Self {
            data: Value::Object(map),
            frames: BTreeMap::new(),
        })
    }

    pub fn body(&self) -> &Value {
        &self.data
    }

    /// Set a top-level field.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        if let Value::Object(map) = &mut self.data {
            map.insert(field.into(), value);
        }
    }

    /// Access a nested field using dot notation: "detection.label"
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.data;
        for part in path.split('.') {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn push_tag(&mut self, tag: impl Into<String>) {
        if let Some(Value::Array(tags)) = self
            .data
            .as_object_mut()
            .and_then(|m| m.get_mut("tags"))
        {
            tags.push(Value::String(tag.into()));
        }
    }

    pub fn tags(&self) -> Vec<&str> {
        match self.get("tags") {
            Some(Value::Array(tags)) => tags.iter().filter_map(|t| t.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    /// Replace the frame body at `index`. Frame indices are 1-based.
    pub fn set_frame(&mut self, index: u32, fields: Value) -> Result<()> {
        if index == 0 {
            return Err(Error::InvalidFrameIndex(0));
        }
        if !fields.is_object() {
            return Err(Error::NotAnObject);
        }
        self.frames.insert(index, fields);
        Ok(())
    }

    /// Set one field on the frame at `index`, creating the frame if absent.
    pub fn set_frame_field(
        &mut self,
        index: u32,
        field: impl Into<String>,
        value: Value,
    ) -> Result<()> {
        if index == 0 {
            return Err(Error::InvalidFrameIndex(0));
        }
        let frame = self
            .frames
            .entry(index)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = frame {
            map.insert(field.into(), value);
        }
        Ok(())
    }

    /// Frames in ascending index order.
    pub fn frames(&self) -> &BTreeMap<u32, Value> {
        &self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_sample_has_empty_tags() {
        let s = Sample::new();
        assert_eq!(s.get("tags"), Some(&json!([])));
    }

    #[test]
    fn nested_dot_get() {
        let mut s = Sample::new();
        s.set("detection", json!({"label": "cat", "confidence": 0.9}));
        assert_eq!(s.get("detection.label"), Some(&json!("cat")));
        assert_eq!(s.get("detection.missing"), None);
    }

    #[test]
    fn tags_keep_order_and_duplicates() {
        let mut s = Sample::new();
        s.push_tag("b");
        s.push_tag("a");
        s.push_tag("b");
        assert_eq!(s.tags(), vec!["b", "a", "b"]);
    }

    #[test]
    fn non_object_body_rejected() {
        assert!(matches!(
            Sample::with_fields(json!([1, 2])),
            Err(Error::NotAnObject)
        ));
    }

    #[test]
    fn frame_index_zero_rejected() {
        let mut s = Sample::new();
        assert!(matches!(
            s.set_frame_field(0, "value", json!(1)),
            Err(Error::InvalidFrameIndex(0))
        ));
    }

    #[test]
    fn frames_iterate_ascending() {
        let mut s = Sample::new();
        s.set_frame_field(3, "n", json!(3)).unwrap();
        s.set_frame_field(1, "n", json!(1)).unwrap();
        s.set_frame_field(2, "n", json!(2)).unwrap();
        let order: Vec<u32> = s.frames().keys().copied().collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn frame_fields_accumulate() {
        let mut s = Sample::new();
        s.set_frame_field(1, "number", json!(0)).unwrap();
        s.set_frame_field(1, "numbers", json!([0, 1])).unwrap();
        assert_eq!(s.frames()[&1], json!({"number": 0, "numbers": [0, 1]}));
    }
}
