//! Person / organization node in the family graph.

use serde::{Deserialize, Serialize};

use super::{EntityKind, FuzzyDate, Sex};

/// Stable record identifier (the `cr_id` of a record).
///
/// Opaque, globally unique, assigned once and never reused.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self { Self(s) }
}

impl std::borrow::Borrow<str> for RecordId {
    fn borrow(&self) -> &str { &self.0 }
}

/// Dense index of a node inside one graph snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node in the family graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonNode {
    pub id: NodeId,
    pub record: RecordId,
    pub name: Option<String>,
    pub kind: EntityKind,
    pub sex: Sex,
    pub birth: Option<FuzzyDate>,
    pub death: Option<FuzzyDate>,
    pub is_root: bool,
    /// False for ids only seen as the target of someone else's link.
    pub observed: bool,
}

impl PersonNode {
    /// Placeholder for an id referenced before (or without) its record.
    pub fn unobserved(id: NodeId, record: RecordId) -> Self {
        Self {
            id,
            record,
            name: None,
            kind: EntityKind::Person,
            sex: Sex::Unknown,
            birth: None,
            death: None,
            is_root: false,
            observed: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name for display, falling back to the identifier.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.record.as_str())
    }
}
