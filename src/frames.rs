use serde_json::Value;

use crate::sample::Sample;

/// Reserved first path segment addressing the frame sequence.
pub const FRAMES_FIELD: &str = "frames";

/// Expose a sample's frame map as a virtual embedded-document list: the
/// sample body with a `frames` array of frame bodies in ascending index
/// order. Frame-scoped paths are then planned exactly like plain
/// document-list paths.
pub(crate) fn expand(sample: &Sample) -> Value {
    let mut body = sample.data.clone();
    let frames: Vec<Value> = sample.frames.values().cloned().collect();
    if let Value::Object(map) = &mut body {
        map.insert(FRAMES_FIELD.to_string(), Value::Array(frames));
    }
    body
}
