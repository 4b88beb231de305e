use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde_json::Value as JsonValue;

/// Scalar leaf value with type-aware total ordering.
///
/// Group keys, distinct values, and min/max bounds all flow through this
/// type, so one ordering rules them all: Null < Boolean < numbers (Integer
/// and Float interleaved numerically) < DateTime < String. Dates are stored
/// as i64 millisecond timestamps so bound comparisons stay integer-fast.
#[derive(Debug, Clone)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    DateTime(i64), // millis since epoch
    String(String),
}

impl Eq for ScalarValue {}

impl PartialEq for ScalarValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Hash for ScalarValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ScalarValue::Null => {}
            ScalarValue::Boolean(b) => b.hash(state),
            ScalarValue::Integer(i) => i.hash(state),
            ScalarValue::Float(f) => f.to_bits().hash(state),
            ScalarValue::DateTime(ms) => ms.hash(state),
            ScalarValue::String(s) => s.hash(state),
        }
    }
}

impl PartialOrd for ScalarValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScalarValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use ScalarValue::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,

            (Boolean(a), Boolean(b)) => a.cmp(b),
            (Boolean(_), _) => Ordering::Less,
            (_, Boolean(_)) => Ordering::Greater,

            (Integer(a), Integer(b)) => a.cmp(b),
            (Integer(a), Float(b)) => (*a as f64).total_cmp(b),
            (Float(a), Integer(b)) => a.total_cmp(&(*b as f64)),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Integer(_) | Float(_), _) => Ordering::Less,
            (_, Integer(_) | Float(_)) => Ordering::Greater,

            (DateTime(a), DateTime(b)) => a.cmp(b),
            (DateTime(_), _) => Ordering::Less,
            (_, DateTime(_)) => Ordering::Greater,

            (String(a), String(b)) => a.cmp(b),
        }
    }
}

impl ScalarValue {
    /// Convert a JSON leaf to a ScalarValue. Strings are probed for ISO 8601
    /// date formats and promoted to DateTime so that date-valued fields sort
    /// chronologically rather than lexicographically. Arrays and objects
    /// (which only reach here through untyped engines) collapse to their
    /// serialized form.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => ScalarValue::Null,
            JsonValue::Bool(b) => ScalarValue::Boolean(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ScalarValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    ScalarValue::Float(f)
                } else {
                    ScalarValue::Null
                }
            }
            JsonValue::String(s) => Self::parse_string(s),
            other => ScalarValue::String(other.to_string()),
        }
    }

    /// Classify a string, promoting date-shaped content to DateTime.
    /// The fast path rejects anything not starting with "YYYY-MM" before any
    /// real parsing happens.
    pub fn parse_string(s: &str) -> Self {
        let b = s.as_bytes();
        if b.len() < 10
            || !b[0].is_ascii_digit()
            || !b[1].is_ascii_digit()
            || !b[2].is_ascii_digit()
            || !b[3].is_ascii_digit()
            || b[4] != b'-'
            || !b[5].is_ascii_digit()
            || !b[6].is_ascii_digit()
        {
            return ScalarValue::String(s.to_string());
        }

        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
            return ScalarValue::DateTime(dt.timestamp_millis());
        }
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
            return ScalarValue::DateTime(dt.and_utc().timestamp_millis());
        }
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return ScalarValue::DateTime(dt.and_utc().timestamp_millis());
        }
        if let Ok(d) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            if let Some(dt) = d.and_hms_opt(0, 0, 0) {
                return ScalarValue::DateTime(dt.and_utc().timestamp_millis());
            }
        }
        ScalarValue::String(s.to_string())
    }

    /// Render back to JSON. DateTimes come back as RFC 3339 strings.
    pub fn to_json(&self) -> JsonValue {
        match self {
            ScalarValue::Null => JsonValue::Null,
            ScalarValue::Boolean(b) => JsonValue::Bool(*b),
            ScalarValue::Integer(i) => JsonValue::Number((*i).into()),
            ScalarValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            ScalarValue::DateTime(ms) => {
                let secs = ms / 1000;
                let nsecs = ((ms % 1000).unsigned_abs() as u32) * 1_000_000;
                if let Some(dt) = chrono::DateTime::from_timestamp(secs, nsecs) {
                    JsonValue::String(dt.to_rfc3339())
                } else {
                    JsonValue::Number((*ms).into())
                }
            }
            ScalarValue::String(s) => JsonValue::String(s.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Integer(i) => Some(*i as f64),
            ScalarValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ScalarValue::Integer(i) if *i >= 0 => Some(*i as u64),
            _ => None,
        }
    }
}

/// Collapse a float accumulator to Integer when it is exactly integral, so
/// sums over integer fields stay integers.
pub(crate) fn narrow_number(n: f64) -> ScalarValue {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        ScalarValue::Integer(n as i64)
    } else {
        ScalarValue::Float(n)
    }
}
