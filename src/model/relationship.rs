//! Relationship (edge) in the family graph.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{CustomMeta, NodeId, ParentRole, SpouseMeta};

/// Opaque edge identifier, dense within one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// Edge type. Parent edges point parent → child.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EdgeKind {
    Parent(ParentRole),
    Spouse,
    Sibling,
    Custom(String),
}

impl EdgeKind {
    pub fn role(&self) -> Option<ParentRole> {
        match self {
            EdgeKind::Parent(role) => Some(*role),
            _ => None,
        }
    }

    pub fn is_parent(&self) -> bool {
        matches!(self, EdgeKind::Parent(_))
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeKind::Parent(role) => write!(f, "parent({role})"),
            EdgeKind::Spouse => f.write_str("spouse"),
            EdgeKind::Sibling => f.write_str("sibling"),
            EdgeKind::Custom(t) => write!(f, "custom({t})"),
        }
    }
}

/// Per-kind edge attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "attrs", rename_all = "snake_case")]
pub enum EdgeAttrs {
    #[default]
    None,
    Spouse(SpouseMeta),
    Custom(CustomMeta),
}

/// Identity of an edge: at most one edge per `(source, kind, target)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    pub source: NodeId,
    pub kind: EdgeKind,
    pub target: NodeId,
}

/// A directed, typed edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
    pub attrs: EdgeAttrs,
    /// Records that asserted this edge.
    pub declared_by: SmallVec<[NodeId; 2]>,
}

impl Edge {
    pub fn key(&self) -> EdgeKey {
        EdgeKey { source: self.source, kind: self.kind.clone(), target: self.target }
    }

    /// The "other" end of the edge from the given node.
    pub fn other_node(&self, from: NodeId) -> Option<NodeId> {
        if from == self.source { Some(self.target) }
        else if from == self.target { Some(self.source) }
        else { None }
    }

    pub fn is_declared_by(&self, node: NodeId) -> bool {
        self.declared_by.contains(&node)
    }

    pub fn spouse_meta(&self) -> Option<&SpouseMeta> {
        match &self.attrs {
            EdgeAttrs::Spouse(meta) => Some(meta),
            _ => None,
        }
    }
}
