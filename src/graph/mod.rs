//! # Graph Model
//!
//! An immutable-once-published snapshot of the family graph: nodes keyed
//! by record id, typed directed edges, and adjacency lists in insertion
//! order. Snapshots are built from fact sets (see [`build`]) and never
//! edited after the engine publishes them; a change produces a new one.
//!
//! Parent edges point parent → child and carry their role-class, so the
//! same edge shape serves "biological only" and "all roles" traversals.
//! Spouse, sibling and custom edges are stored in both directions.

pub mod build;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use smallvec::smallvec;

use crate::model::*;

// ============================================================================
// Filters
// ============================================================================

/// Which parent role-classes a traversal follows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleFilter {
    #[default]
    All,
    Biological,
    Only(Vec<ParentRole>),
}

impl RoleFilter {
    pub fn allows(&self, role: ParentRole) -> bool {
        match self {
            RoleFilter::All => true,
            RoleFilter::Biological => role == ParentRole::Biological,
            RoleFilter::Only(roles) => roles.contains(&role),
        }
    }
}

/// Edge selection for [`GraphSnapshot::neighbors`].
#[derive(Debug, Clone)]
pub struct EdgeFilter {
    /// `None` skips parent edges entirely.
    pub parents: Option<RoleFilter>,
    pub spouse: bool,
    pub sibling: bool,
    pub custom: bool,
    pub direction: Direction,
}

impl EdgeFilter {
    pub fn all() -> Self {
        Self { parents: Some(RoleFilter::All), spouse: true, sibling: true, custom: true, direction: Direction::Both }
    }

    /// Parent edges only, both directions.
    pub fn parents(roles: RoleFilter) -> Self {
        Self { parents: Some(roles), spouse: false, sibling: false, custom: false, direction: Direction::Both }
    }

    pub fn spouses() -> Self {
        Self { parents: None, spouse: true, sibling: false, custom: false, direction: Direction::Outgoing }
    }

    pub fn siblings() -> Self {
        Self { parents: None, spouse: false, sibling: true, custom: false, direction: Direction::Outgoing }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn accepts(&self, kind: &EdgeKind) -> bool {
        match kind {
            EdgeKind::Parent(role) => self.parents.as_ref().is_some_and(|f| f.allows(*role)),
            EdgeKind::Spouse => self.spouse,
            EdgeKind::Sibling => self.sibling,
            EdgeKind::Custom(_) => self.custom,
        }
    }
}

/// One entry of a neighbor listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor<'g> {
    pub node: NodeId,
    pub edge: &'g Edge,
    /// `Outgoing` when the queried node is the edge's source.
    pub direction: Direction,
}

// ============================================================================
// Insert outcomes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsert {
    Inserted(EdgeId),
    /// Same `(source, kind, target)` already present; provenance merged.
    Coalesced(EdgeId),
    RejectedSelfLoop,
}

impl EdgeInsert {
    pub fn edge(self) -> Option<EdgeId> {
        match self {
            EdgeInsert::Inserted(id) | EdgeInsert::Coalesced(id) => Some(id),
            EdgeInsert::RejectedSelfLoop => None,
        }
    }
}

/// A self-loop that was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedEdge {
    pub node: NodeId,
    pub kind: EdgeKind,
    pub declared_by: NodeId,
}

/// The same record asserting the same edge more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateDeclaration {
    pub edge: EdgeId,
    pub declared_by: NodeId,
}

/// An unresolved parent slot (unknown-but-exists or not researched).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    pub role: ParentRole,
    pub side: ParentSide,
    pub slot: ParentSlot,
}

// ============================================================================
// GraphSnapshot
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    version: u64,
    nodes: Vec<PersonNode>,
    index: HashMap<RecordId, NodeId>,
    edges: Vec<Edge>,
    edge_index: HashMap<EdgeKey, EdgeId>,
    outgoing: Vec<Vec<EdgeId>>,
    incoming: Vec<Vec<EdgeId>>,
    placeholders: HashMap<NodeId, Vec<Placeholder>>,
    rejected: Vec<RejectedEdge>,
    duplicates: Vec<DuplicateDeclaration>,
    warnings: Vec<ParseWarning>,
}

impl GraphSnapshot {
    pub fn new(version: u64) -> Self {
        Self { version, ..Self::default() }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Id of `record`, adding an unobserved placeholder if it is new.
    pub fn ensure_node(&mut self, record: &RecordId) -> NodeId {
        if let Some(id) = self.index.get(record) {
            return *id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(PersonNode::unobserved(id, record.clone()));
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        self.index.insert(record.clone(), id);
        id
    }

    /// Create or update the node for a parsed record and mark it observed.
    pub fn upsert_node(&mut self, facts: &RelationshipFacts) -> NodeId {
        let id = self.ensure_node(&facts.id);
        let node = &mut self.nodes[id.0 as usize];
        node.name = facts.name.clone();
        node.kind = facts.kind;
        node.sex = facts.sex;
        node.birth = facts.birth.clone();
        node.death = facts.death.clone();
        node.is_root = facts.is_root;
        node.observed = true;
        id
    }

    pub fn find_node(&self, record: &str) -> Option<&PersonNode> {
        self.index.get(record).map(|id| &self.nodes[id.0 as usize])
    }

    pub fn node_id(&self, record: &str) -> Option<NodeId> {
        self.index.get(record).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&PersonNode> {
        self.nodes.get(id.0 as usize)
    }

    /// Record id of a node. Panics on an id from another snapshot.
    pub fn record(&self, id: NodeId) -> &RecordId {
        &self.nodes[id.0 as usize].record
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PersonNode> {
        self.nodes.iter()
    }

    pub fn add_placeholder(&mut self, node: NodeId, placeholder: Placeholder) {
        let list = self.placeholders.entry(node).or_default();
        if !list.contains(&placeholder) {
            list.push(placeholder);
        }
    }

    pub fn placeholders(&self, node: NodeId) -> &[Placeholder] {
        self.placeholders.get(&node).map(Vec::as_slice).unwrap_or_default()
    }

    // ========================================================================
    // Edges
    // ========================================================================

    /// Insert a typed edge declared by `declared_by`.
    ///
    /// Identical triples coalesce: provenance is unioned, and metadata
    /// declared by the edge's own source overrides what a target-side
    /// declaration supplied. Self-loops are refused and remembered.
    pub fn upsert_edge(
        &mut self,
        source: NodeId,
        kind: EdgeKind,
        target: NodeId,
        attrs: EdgeAttrs,
        declared_by: NodeId,
    ) -> EdgeInsert {
        if source == target {
            self.rejected.push(RejectedEdge { node: source, kind, declared_by });
            return EdgeInsert::RejectedSelfLoop;
        }

        let key = EdgeKey { source, kind, target };
        if let Some(&id) = self.edge_index.get(&key) {
            let edge = &mut self.edges[id.0 as usize];
            if edge.is_declared_by(declared_by) {
                self.duplicates.push(DuplicateDeclaration { edge: id, declared_by });
            } else {
                edge.declared_by.push(declared_by);
            }
            edge.attrs = merge_attrs(&edge.attrs, &attrs, declared_by == source);
            return EdgeInsert::Coalesced(id);
        }

        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge {
            id,
            source,
            target,
            kind: key.kind.clone(),
            attrs,
            declared_by: smallvec![declared_by],
        });
        self.outgoing[source.0 as usize].push(id);
        self.incoming[target.0 as usize].push(id);
        self.edge_index.insert(key, id);
        EdgeInsert::Inserted(id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0 as usize)
    }

    pub fn find_edge(&self, source: NodeId, kind: &EdgeKind, target: NodeId) -> Option<&Edge> {
        let key = EdgeKey { source, kind: kind.clone(), target };
        self.edge_index.get(&key).map(|id| &self.edges[id.0 as usize])
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Refused self-loops, in the order they were seen.
    pub fn rejected(&self) -> &[RejectedEdge] {
        &self.rejected
    }

    pub fn duplicates(&self) -> &[DuplicateDeclaration] {
        &self.duplicates
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    // ========================================================================
    // Adjacency
    // ========================================================================

    /// Edges touching `node` that pass `filter`: outgoing first, then
    /// incoming, each in insertion order.
    pub fn neighbors(&self, node: NodeId, filter: &EdgeFilter) -> Vec<Neighbor<'_>> {
        let mut out = Vec::new();
        let Some(outgoing) = self.outgoing.get(node.0 as usize) else { return out };
        if matches!(filter.direction, Direction::Outgoing | Direction::Both) {
            for id in outgoing {
                let edge = &self.edges[id.0 as usize];
                if filter.accepts(&edge.kind) {
                    out.push(Neighbor { node: edge.target, edge, direction: Direction::Outgoing });
                }
            }
        }
        if matches!(filter.direction, Direction::Incoming | Direction::Both) {
            for id in &self.incoming[node.0 as usize] {
                let edge = &self.edges[id.0 as usize];
                if filter.accepts(&edge.kind) {
                    out.push(Neighbor { node: edge.source, edge, direction: Direction::Incoming });
                }
            }
        }
        out
    }

    /// Parents of `node` in role registration order, then insertion order.
    pub fn parents(&self, node: NodeId, roles: &RoleFilter) -> Vec<(NodeId, ParentRole)> {
        self.role_adjacent(self.incoming.get(node.0 as usize), roles, |e| e.source)
    }

    /// Children of `node` in role registration order, then insertion order.
    pub fn children(&self, node: NodeId, roles: &RoleFilter) -> Vec<(NodeId, ParentRole)> {
        self.role_adjacent(self.outgoing.get(node.0 as usize), roles, |e| e.target)
    }

    /// Children reached through one role-class only.
    pub fn children_in_role(&self, node: NodeId, role: ParentRole) -> impl Iterator<Item = NodeId> + '_ {
        self.outgoing
            .get(node.0 as usize)
            .into_iter()
            .flatten()
            .map(|id| &self.edges[id.0 as usize])
            .filter(move |e| e.kind == EdgeKind::Parent(role))
            .map(|e| e.target)
    }

    fn role_adjacent(
        &self,
        ids: Option<&Vec<EdgeId>>,
        roles: &RoleFilter,
        other: impl Fn(&Edge) -> NodeId,
    ) -> Vec<(NodeId, ParentRole)> {
        let mut out: Vec<(NodeId, ParentRole)> = ids
            .into_iter()
            .flatten()
            .map(|id| &self.edges[id.0 as usize])
            .filter_map(|e| e.kind.role().filter(|r| roles.allows(*r)).map(|r| (other(e), r)))
            .collect();
        // Stable: insertion order survives within a role.
        out.sort_by_key(|(_, role)| *role);
        out
    }

    /// True when the node has any data for a role: a parent edge or a placeholder.
    pub fn has_parent_data(&self, node: NodeId, role: ParentRole) -> bool {
        !self.parents(node, &RoleFilter::Only(vec![role])).is_empty()
            || self.placeholders(node).iter().any(|p| p.role == role)
    }
}

fn merge_attrs(existing: &EdgeAttrs, new: &EdgeAttrs, new_wins: bool) -> EdgeAttrs {
    match (existing, new) {
        (EdgeAttrs::Spouse(old), EdgeAttrs::Spouse(new)) => EdgeAttrs::Spouse(if new_wins {
            old.overlay(new)
        } else {
            new.overlay(old)
        }),
        (EdgeAttrs::Custom(old), EdgeAttrs::Custom(new)) => EdgeAttrs::Custom(if new_wins {
            old.overlay(new)
        } else {
            new.overlay(old)
        }),
        (EdgeAttrs::None, other) => other.clone(),
        (kept, _) => kept.clone(),
    }
}
