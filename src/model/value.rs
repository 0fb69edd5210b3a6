//! Loosely typed field values as they appear in a record's key/value block.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The key/value block of one record. Ordered so two bags compare and
/// render deterministically.
pub type FieldBag = BTreeMap<String, FieldValue>;

/// A single frontmatter-style value.
///
/// Deserializes untagged, so a record block can be read straight from
/// JSON (or anything serde can turn into JSON-shaped data).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

// ============================================================================
// Type checking
// ============================================================================

impl FieldValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Int(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::String(_) => "string",
            FieldValue::List(_) => "list",
            FieldValue::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool { matches!(self, FieldValue::Null) }

    /// Null, a blank string, or an empty list.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::String(s) => s.trim().is_empty(),
            FieldValue::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Frontmatter truthiness: `true`, `"yes"`, `"true"` and non-zero integers.
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Bool(b) => *b,
            FieldValue::Int(i) => *i != 0,
            FieldValue::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "y" | "1"),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            FieldValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            FieldValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, FieldValue>> {
        match self {
            FieldValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Scalar rendering used when a date or id was written as a number.
    pub fn to_text(&self) -> Option<String> {
        match self {
            FieldValue::String(s) => Some(s.clone()),
            FieldValue::Int(i) => Some(i.to_string()),
            FieldValue::Float(f) => Some(f.to_string()),
            FieldValue::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// Build a field bag from a JSON object.
pub fn bag_from_json(value: serde_json::Value) -> crate::Result<FieldBag> {
    Ok(serde_json::from_value(value)?)
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<bool> for FieldValue { fn from(v: bool) -> Self { FieldValue::Bool(v) } }
impl From<i64> for FieldValue { fn from(v: i64) -> Self { FieldValue::Int(v) } }
impl From<u32> for FieldValue { fn from(v: u32) -> Self { FieldValue::Int(v as i64) } }
impl From<String> for FieldValue { fn from(v: String) -> Self { FieldValue::String(v) } }
impl From<&str> for FieldValue { fn from(v: &str) -> Self { FieldValue::String(v.to_owned()) } }
impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(v: Vec<T>) -> Self { FieldValue::List(v.into_iter().map(Into::into).collect()) }
}
impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self { v.map(Into::into).unwrap_or(FieldValue::Null) }
}
impl From<BTreeMap<String, FieldValue>> for FieldValue {
    fn from(v: BTreeMap<String, FieldValue>) -> Self { FieldValue::Map(v) }
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::String(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            FieldValue::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            FieldValue::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
