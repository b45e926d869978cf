//! Loosely typed cell values
//!
//! Embedded database cells and JSON dump fields arrive with no declared
//! schema. `RawValue` carries them unchanged until a heuristic decides what
//! they mean.

use serde::{Deserialize, Serialize};

/// A single untyped value read from an untrusted source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl RawValue {
    /// Convert a JSON value. Arrays and objects have no scalar meaning and
    /// become `Null`.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => RawValue::Null,
            serde_json::Value::Bool(b) => RawValue::Integer(i64::from(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    RawValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    RawValue::Real(f)
                } else {
                    RawValue::Null
                }
            }
            serde_json::Value::String(s) => RawValue::Text(s.clone()),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => RawValue::Null,
        }
    }

    /// True when the value is neither null nor an empty string
    pub fn is_present(&self) -> bool {
        match self {
            RawValue::Null => false,
            RawValue::Text(s) => !s.is_empty(),
            RawValue::Blob(b) => !b.is_empty(),
            RawValue::Integer(_) | RawValue::Real(_) => true,
        }
    }

    /// Textual rendering of scalar values; blobs and nulls have none
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Null | RawValue::Blob(_) => None,
            RawValue::Integer(i) => Some(i.to_string()),
            RawValue::Real(f) => Some(f.to_string()),
            RawValue::Text(s) => Some(s.clone()),
        }
    }

    /// Integer interpretation: integers, integral reals and digit strings
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RawValue::Integer(i) => Some(*i),
            RawValue::Real(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            RawValue::Text(s) => {
                let s = s.trim();
                let digits = s.strip_prefix('-').unwrap_or(s);
                if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                    s.parse().ok()
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Integer(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(RawValue::from_json(&json!(null)), RawValue::Null);
        assert_eq!(RawValue::from_json(&json!(42)), RawValue::Integer(42));
        assert_eq!(RawValue::from_json(&json!(1.5)), RawValue::Real(1.5));
        assert_eq!(RawValue::from_json(&json!("x")), RawValue::Text("x".into()));
        assert_eq!(RawValue::from_json(&json!(true)), RawValue::Integer(1));
        assert_eq!(RawValue::from_json(&json!([1, 2])), RawValue::Null);
    }

    #[test]
    fn test_presence() {
        assert!(!RawValue::Null.is_present());
        assert!(!RawValue::Text(String::new()).is_present());
        assert!(RawValue::Integer(0).is_present());
        assert!(RawValue::Text("0".into()).is_present());
    }

    #[test]
    fn test_as_integer() {
        assert_eq!(RawValue::Text(" 45 ".into()).as_integer(), Some(45));
        assert_eq!(RawValue::Text("-3".into()).as_integer(), Some(-3));
        assert_eq!(RawValue::Text("4.5".into()).as_integer(), None);
        assert_eq!(RawValue::Real(12.0).as_integer(), Some(12));
        assert_eq!(RawValue::Real(12.5).as_integer(), None);
        assert_eq!(RawValue::Blob(vec![1]).as_integer(), None);
    }
}
