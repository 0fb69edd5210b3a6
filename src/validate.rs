//! # Relationship Validator
//!
//! A read-only pass over a [`GraphSnapshot`] producing typed findings.
//! Nothing here mutates the graph or the store; each finding names the
//! record and field to open to fix it.
//!
//! Cycle detection runs an iterative depth-first search per role-class
//! with three colours. Only an edge back to a node still on the current
//! path (grey) is a cycle. Reaching a finished (black) node again is the
//! ordinary diamond of pedigree collapse.

use hashbrown::HashSet;
use serde::Serialize;
use tracing::{debug, info};

use crate::adapter::schema;
use crate::cancel::CancellationToken;
use crate::graph::{EdgeFilter, GraphSnapshot};
use crate::model::*;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// One structural problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "finding", rename_all = "snake_case")]
pub enum Finding {
    /// Someone is their own ancestor within one role-class. `path` starts
    /// and ends at the same record.
    Cycle { role: ParentRole, path: Vec<RecordId> },
    /// A record links to an id that has no record.
    DanglingReference { from: RecordId, to: RecordId, kind: EdgeKind, field: &'static str },
    /// The same record declares the same relationship more than once.
    DuplicateEdge { from: RecordId, to: RecordId, kind: EdgeKind, declared_by: RecordId, field: &'static str },
    /// One side declares a relationship the other side does not.
    MissingReciprocal { from: RecordId, to: RecordId, kind: EdgeKind, expected_on: RecordId, field: &'static str },
    /// Siblings are documented but nothing is recorded about the parents.
    UnknownParentWithoutPlaceholder { node: RecordId, field: &'static str },
    SelfRelationship { node: RecordId, kind: EdgeKind, field: &'static str },
}

impl Finding {
    pub fn severity(&self) -> Severity {
        match self {
            Finding::Cycle { .. } | Finding::SelfRelationship { .. } => Severity::Error,
            _ => Severity::Warning,
        }
    }

    /// The record to open to fix this.
    pub fn record(&self) -> &RecordId {
        match self {
            Finding::Cycle { path, .. } => &path[0],
            Finding::DanglingReference { from, .. } => from,
            Finding::DuplicateEdge { declared_by, .. } => declared_by,
            Finding::MissingReciprocal { expected_on, .. } => expected_on,
            Finding::UnknownParentWithoutPlaceholder { node, .. } => node,
            Finding::SelfRelationship { node, .. } => node,
        }
    }

    pub fn field(&self) -> Option<&'static str> {
        match self {
            Finding::Cycle { .. } => None,
            Finding::DanglingReference { field, .. }
            | Finding::DuplicateEdge { field, .. }
            | Finding::MissingReciprocal { field, .. }
            | Finding::UnknownParentWithoutPlaceholder { field, .. }
            | Finding::SelfRelationship { field, .. } => Some(field),
        }
    }
}

/// Run every check. Cancellation is checked once per node per pass.
pub fn validate(g: &GraphSnapshot, cancel: &CancellationToken) -> Result<Vec<Finding>> {
    let mut out = Vec::new();
    self_relationships(g, &mut out);
    dangling(g, &mut out);
    duplicates(g, &mut out);
    missing_reciprocals(g, &mut out);
    unknown_parents(g, cancel, &mut out)?;
    for role in ParentRole::ALL {
        cycles(g, role, cancel, &mut out)?;
    }
    info!(version = g.version(), findings = out.len(), "validated graph");
    Ok(out)
}

// ============================================================================
// Field hints
// ============================================================================

/// Field on `holder` that declares an edge of `kind`. For parent edges
/// `as_child` says which end `holder` is.
fn field_on(g: &GraphSnapshot, kind: &EdgeKind, as_child: bool, other: NodeId) -> &'static str {
    match kind {
        EdgeKind::Parent(role) if as_child => {
            let side = match g.node(other).map(|n| n.sex) {
                Some(Sex::Male) => ParentSide::Father,
                Some(Sex::Female) => ParentSide::Mother,
                _ => ParentSide::Unspecified,
            };
            schema::role_fields(*role).slot_field(side)
        }
        EdgeKind::Parent(role) => schema::role_fields(*role).children,
        EdgeKind::Spouse => schema::SPOUSES,
        EdgeKind::Sibling => schema::SIBLINGS,
        EdgeKind::Custom(_) => schema::RELATIONSHIPS,
    }
}

fn observed(g: &GraphSnapshot, id: NodeId) -> bool {
    g.node(id).is_some_and(|n| n.observed)
}

// ============================================================================
// Checks
// ============================================================================

fn self_relationships(g: &GraphSnapshot, out: &mut Vec<Finding>) {
    for r in g.rejected() {
        out.push(Finding::SelfRelationship {
            node: g.record(r.node).clone(),
            kind: r.kind.clone(),
            field: field_on(g, &r.kind, true, r.node),
        });
    }
}

fn dangling(g: &GraphSnapshot, out: &mut Vec<Finding>) {
    for e in g.edges() {
        // Paired kinds are reported once, on the declarer's outgoing edge.
        let (from, to) = match (observed(g, e.source), observed(g, e.target)) {
            (true, false) => (e.source, e.target),
            (false, true) if e.kind.is_parent() => (e.target, e.source),
            _ => continue,
        };
        out.push(Finding::DanglingReference {
            from: g.record(from).clone(),
            to: g.record(to).clone(),
            kind: e.kind.clone(),
            field: field_on(g, &e.kind, from == e.target, to),
        });
    }
}

fn duplicates(g: &GraphSnapshot, out: &mut Vec<Finding>) {
    let mut seen = HashSet::new();
    for d in g.duplicates() {
        let Some(e) = g.edge(d.edge) else { continue };
        if !e.kind.is_parent() && e.source != d.declared_by {
            continue;
        }
        if !seen.insert((d.edge, d.declared_by)) {
            continue;
        }
        let as_child = d.declared_by == e.target;
        let other = if as_child { e.source } else { e.target };
        out.push(Finding::DuplicateEdge {
            from: g.record(e.source).clone(),
            to: g.record(e.target).clone(),
            kind: e.kind.clone(),
            declared_by: g.record(d.declared_by).clone(),
            field: field_on(g, &e.kind, as_child, other),
        });
    }
}

fn missing_reciprocals(g: &GraphSnapshot, out: &mut Vec<Finding>) {
    for e in g.edges() {
        if !observed(g, e.source) || !observed(g, e.target) {
            continue;
        }
        let (from, expected_on) = if e.kind.is_parent() {
            match (e.is_declared_by(e.source), e.is_declared_by(e.target)) {
                (true, false) => (e.source, e.target),
                (false, true) => (e.target, e.source),
                _ => continue,
            }
        } else {
            if !e.is_declared_by(e.source) || e.is_declared_by(e.target) {
                continue;
            }
            // Only kinds stored as a pair can be reciprocated.
            let back = EdgeFilter::all().with_direction(Direction::Outgoing);
            let paired = g
                .neighbors(e.target, &back)
                .iter()
                .any(|n| n.node == e.source && !n.edge.kind.is_parent() && n.edge.is_declared_by(e.source));
            if !paired {
                continue;
            }
            (e.source, e.target)
        };
        let as_child = expected_on == e.target;
        out.push(Finding::MissingReciprocal {
            from: g.record(from).clone(),
            to: g.record(expected_on).clone(),
            kind: e.kind.clone(),
            expected_on: g.record(expected_on).clone(),
            field: field_on(g, &e.kind, as_child, from),
        });
    }
}

fn unknown_parents(g: &GraphSnapshot, cancel: &CancellationToken, out: &mut Vec<Finding>) -> Result<()> {
    for node in g.nodes().filter(|n| n.observed) {
        cancel.check()?;
        let has_siblings = g
            .neighbors(node.id, &EdgeFilter::siblings())
            .iter()
            .any(|n| n.edge.is_declared_by(node.id));
        if has_siblings && !g.has_parent_data(node.id, ParentRole::Biological) {
            out.push(Finding::UnknownParentWithoutPlaceholder {
                node: node.record.clone(),
                field: schema::role_fields(ParentRole::Biological).list,
            });
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Colour {
    White,
    Grey,
    Black,
}

struct Frame {
    node: NodeId,
    children: Vec<NodeId>,
    next: usize,
}

fn cycles(g: &GraphSnapshot, role: ParentRole, cancel: &CancellationToken, out: &mut Vec<Finding>) -> Result<()> {
    let n = g.node_count();
    let mut colour = vec![Colour::White; n];
    let frame = |node: NodeId| Frame { node, children: g.children_in_role(node, role).collect(), next: 0 };

    for start in 0..n {
        if colour[start] != Colour::White {
            continue;
        }
        cancel.check()?;
        let start = NodeId(start as u32);
        colour[start.0 as usize] = Colour::Grey;
        let mut stack = vec![frame(start)];

        while let Some(top) = stack.last_mut() {
            if top.next < top.children.len() {
                let child = top.children[top.next];
                top.next += 1;
                match colour[child.0 as usize] {
                    Colour::White => {
                        colour[child.0 as usize] = Colour::Grey;
                        stack.push(frame(child));
                    }
                    Colour::Grey => {
                        let from = stack.iter().position(|f| f.node == child).unwrap_or(0);
                        let mut path: Vec<RecordId> = stack[from..].iter().map(|f| g.record(f.node).clone()).collect();
                        path.push(g.record(child).clone());
                        debug!(role = %role, len = path.len() - 1, "ancestry cycle");
                        out.push(Finding::Cycle { role, path });
                    }
                    Colour::Black => {}
                }
            } else {
                colour[top.node.0 as usize] = Colour::Black;
                stack.pop();
            }
        }
    }
    Ok(())
}
