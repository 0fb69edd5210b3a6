//! # Relationship Calculator
//!
//! "How is B related to A?" over one graph snapshot.
//!
//! The graph is walked as an undirected multigraph with typed steps
//! (`Up`, `Down`, `Sibling`, `Spouse`). Breadth-first search runs layer
//! by layer, so the first layer that reaches the target holds every
//! shortest path. Within that layer the path with fewer spouse steps
//! wins; remaining ties go to the first discovery, where a node's steps
//! are tried as up (role registration order, then edge insertion), down,
//! sibling, spouse. Visited nodes are never re-entered, so ancestry
//! cycles cannot loop the search.
//!
//! The search always starts from the lexicographically smaller id and
//! the path is reversed when needed, so `(a, b)` and `(b, a)` describe
//! the same path with inverted roles.

pub mod classify;
pub mod naming;

use std::collections::BTreeSet;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::{EdgeFilter, GraphSnapshot, RoleFilter};
use crate::model::*;
use crate::{Error, Result};

pub use classify::{Classified, Kinship, classify};

/// Traversal settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculatorConfig {
    /// Parent role-classes walked as up/down steps.
    pub roles: RoleFilter,
    pub include_spouses: bool,
    /// Walk explicit sibling edges (useful when parents are unrecorded).
    pub include_siblings: bool,
    /// Longest path considered; `None` searches the whole component.
    pub max_depth: Option<usize>,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self { roles: RoleFilter::All, include_spouses: true, include_siblings: true, max_depth: None }
    }
}

/// A computed relationship: what `to` is to `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipResult {
    pub from: RecordId,
    pub to: RecordId,
    pub kinship: Kinship,
    /// Sex-neutral term.
    pub label: String,
    /// Term using `to`'s recorded sex.
    pub gendered_label: String,
    pub path: RelationshipPath,
    /// Generations up to the pivot and down from it (0 when not a blood shape).
    pub up: u32,
    pub down: u32,
    /// Parents shared by the two people either side of the pivot. One
    /// shared parent, with a different second parent on each side, makes
    /// the relation half.
    pub shared_parents: Vec<RecordId>,
}

impl RelationshipResult {
    /// Number of edges walked.
    pub fn distance(&self) -> usize {
        self.path.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "relation", rename_all = "snake_case")]
pub enum Relation {
    Related(RelationshipResult),
    NotRelated,
}

impl Relation {
    pub fn result(&self) -> Option<&RelationshipResult> {
        match self {
            Relation::Related(r) => Some(r),
            Relation::NotRelated => None,
        }
    }

    pub fn is_related(&self) -> bool {
        matches!(self, Relation::Related(_))
    }
}

// ============================================================================
// Calculator
// ============================================================================

pub struct Calculator<'g> {
    graph: &'g GraphSnapshot,
    config: &'g CalculatorConfig,
}

#[derive(Debug, Clone, Copy)]
struct Visit {
    depth: usize,
    spouses: usize,
    via: Option<(NodeId, Step)>,
}

impl<'g> Calculator<'g> {
    pub fn new(graph: &'g GraphSnapshot, config: &'g CalculatorConfig) -> Self {
        Self { graph, config }
    }

    /// Relationship of `b` to `a`. Unknown ids are [`Error::NotFound`].
    pub fn relationship_between(&self, a: &str, b: &str) -> Result<Relation> {
        let na = self.graph.node_id(a).ok_or_else(|| Error::NotFound(a.to_owned()))?;
        let nb = self.graph.node_id(b).ok_or_else(|| Error::NotFound(b.to_owned()))?;

        let path = if a <= b {
            self.shortest_path(na, nb)
        } else {
            self.shortest_path(nb, na).map(|p| p.reversed())
        };
        let Some(path) = path else {
            debug!(a, b, "not related");
            return Ok(Relation::NotRelated);
        };

        let moves: Vec<Step> = path.moves().collect();
        let Classified { mut kinship, pivot, up, down } = classify(&moves);
        let mut shared_parents = Vec::new();
        if let Some((left, right)) = pivot {
            let (shared, half) = self.shared_parents(&path.steps[left].node, &path.steps[right].node);
            if half {
                kinship.mark_half();
            }
            shared_parents = shared;
        }

        let sex = self.graph.node(nb).map(|n| n.sex).unwrap_or_default();
        debug!(a, b, distance = path.len(), kinship = %kinship.label(), "related");
        Ok(Relation::Related(RelationshipResult {
            from: RecordId::new(a),
            to: RecordId::new(b),
            label: kinship.label(),
            gendered_label: kinship.gendered_label(sex),
            kinship,
            path,
            up,
            down,
            shared_parents,
        }))
    }

    /// Steps out of `node` in tie-break order.
    fn steps(&self, node: NodeId) -> Vec<(Step, NodeId)> {
        let g = self.graph;
        let mut out: Vec<(Step, NodeId)> = g
            .parents(node, &self.config.roles)
            .into_iter()
            .map(|(p, role)| (Step::Up(role), p))
            .collect();
        out.extend(g.children(node, &self.config.roles).into_iter().map(|(c, role)| (Step::Down(role), c)));
        if self.config.include_siblings {
            out.extend(g.neighbors(node, &EdgeFilter::siblings()).into_iter().map(|n| (Step::Sibling, n.node)));
        }
        if self.config.include_spouses {
            out.extend(g.neighbors(node, &EdgeFilter::spouses()).into_iter().map(|n| (Step::Spouse, n.node)));
        }
        out
    }

    fn shortest_path(&self, from: NodeId, to: NodeId) -> Option<RelationshipPath> {
        let mut visits: HashMap<NodeId, Visit> = HashMap::new();
        visits.insert(from, Visit { depth: 0, spouses: 0, via: None });
        let mut frontier = vec![from];
        let mut depth = 0;

        while !frontier.is_empty() && !visits.contains_key(&to) {
            if self.config.max_depth.is_some_and(|max| depth >= max) {
                break;
            }
            let mut next = Vec::new();
            for &node in &frontier {
                let spouses = visits[&node].spouses;
                for (step, other) in self.steps(node) {
                    let candidate = Visit {
                        depth: depth + 1,
                        spouses: spouses + usize::from(step.is_spouse()),
                        via: Some((node, step)),
                    };
                    match visits.get_mut(&other) {
                        None => {
                            visits.insert(other, candidate);
                            next.push(other);
                        }
                        // Same layer, fewer marriages: take it.
                        Some(seen) if seen.depth == depth + 1 && candidate.spouses < seen.spouses => {
                            *seen = candidate;
                        }
                        Some(_) => {}
                    }
                }
            }
            frontier = next;
            depth += 1;
        }

        let mut rev = Vec::new();
        let mut at = to;
        visits.get(&to)?;
        while let Some((prev, step)) = visits[&at].via {
            rev.push((step, at));
            at = prev;
        }
        let mut path = RelationshipPath::single(self.graph.record(from).clone());
        for (step, node) in rev.into_iter().rev() {
            path.append(step, self.graph.record(node).clone());
        }
        Some(path)
    }

    /// Parents the two share, and whether that makes them half kin:
    /// exactly one in common and each has another recorded parent.
    fn shared_parents(&self, left: &RecordId, right: &RecordId) -> (Vec<RecordId>, bool) {
        let parents = |id: &RecordId| -> BTreeSet<RecordId> {
            self.graph
                .node_id(id.as_str())
                .map(|n| {
                    self.graph
                        .parents(n, &self.config.roles)
                        .into_iter()
                        .map(|(p, _)| self.graph.record(p).clone())
                        .collect()
                })
                .unwrap_or_default()
        };
        let (l, r) = (parents(left), parents(right));
        let shared: Vec<RecordId> = l.intersection(&r).cloned().collect();
        let half = shared.len() == 1 && l.len() > 1 && r.len() > 1;
        (shared, half)
    }
}

/// Shorthand for a one-off query.
pub fn relationship_between(graph: &GraphSnapshot, config: &CalculatorConfig, a: &str, b: &str) -> Result<Relation> {
    Calculator::new(graph, config).relationship_between(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use pretty_assertions::assert_eq;

    fn graph(records: Vec<RelationshipFacts>) -> GraphSnapshot {
        GraphSnapshot::from_facts(&records, &TypeRegistry::builtin(), 1, &CancellationToken::new()).unwrap()
    }

    fn person(id: &str, parents: &[&str]) -> RelationshipFacts {
        let mut f = RelationshipFacts::new(id);
        for p in parents {
            f = f.with_fact(RelationshipFact::parent(ParentRole::Biological, ParentSide::Unspecified, *p));
        }
        f
    }

    fn related(g: &GraphSnapshot, a: &str, b: &str) -> RelationshipResult {
        match relationship_between(g, &CalculatorConfig::default(), a, b).unwrap() {
            Relation::Related(r) => r,
            Relation::NotRelated => panic!("{a} and {b} should be related"),
        }
    }

    #[test]
    fn test_parent() {
        let g = graph(vec![person("a", &["f"]), RelationshipFacts::new("f").with_sex(Sex::Male)]);
        let r = related(&g, "a", "f");
        assert_eq!(r.label, "parent");
        assert_eq!(r.gendered_label, "father");
        assert_eq!(r.distance(), 1);
        assert_eq!(related(&g, "f", "a").label, "child");
    }

    #[test]
    fn test_half_and_full_siblings() {
        let g = graph(vec![
            person("a", &["p", "m1"]),
            person("b", &["p", "m2"]),
            person("c", &["p", "m1"]),
        ]);
        let r = related(&g, "a", "b");
        assert_eq!(r.kinship, Kinship::Sibling { half: true });
        assert_eq!(r.shared_parents, vec![RecordId::new("p")]);
        assert_eq!(related(&g, "a", "c").kinship, Kinship::Sibling { half: false });
    }

    #[test]
    fn test_fewer_spouse_steps_win_ties() {
        // b is two steps from a either as m's spouse (found first) or as
        // f's child; the blood path replaces the marriage path.
        let g = graph(vec![
            person("a", &["m", "f"]),
            RelationshipFacts::new("m").with_fact(RelationshipFact::spouse("b", SpouseMeta::default())),
            person("b", &["f", "b_mum"]),
        ]);
        let r = related(&g, "a", "b");
        assert_eq!(r.path.spouse_steps(), 0);
        assert_eq!(r.kinship, Kinship::Sibling { half: true });
    }

    #[test]
    fn test_symmetric_paths() {
        let g = graph(vec![
            person("p1", &["g"]),
            person("p2", &["g"]),
            person("a", &["p1"]),
            person("b", &["p2"]),
            person("c", &["b"]),
        ]);
        let ab = related(&g, "a", "c");
        let ba = related(&g, "c", "a");
        assert_eq!(ab.path, ba.path.reversed());
        assert_eq!(ab.kinship, ba.kinship.inverse());
        assert_eq!(ab.label, "first cousin once removed");
    }

    #[test]
    fn test_step_and_in_law() {
        let g = graph(vec![
            RelationshipFacts::new("mum")
                .with_fact(RelationshipFact::spouse("stepdad", SpouseMeta::default())),
            RelationshipFacts::new("stepdad").with_sex(Sex::Male),
            person("kid", &["mum"]),
            RelationshipFacts::new("kid_spouse").with_fact(RelationshipFact::spouse("kid", SpouseMeta::default())),
        ]);
        let r = related(&g, "kid", "stepdad");
        assert_eq!(r.gendered_label, "stepfather");
        assert_eq!(related(&g, "kid_spouse", "mum").label, "parent-in-law");
    }

    #[test]
    fn test_not_related_and_depth_limit() {
        let g = graph(vec![person("a", &["p"]), person("b", &["p"]), RelationshipFacts::new("z")]);
        let config = CalculatorConfig::default();
        assert_eq!(relationship_between(&g, &config, "a", "z").unwrap(), Relation::NotRelated);

        let shallow = CalculatorConfig { max_depth: Some(1), ..CalculatorConfig::default() };
        assert_eq!(relationship_between(&g, &shallow, "a", "b").unwrap(), Relation::NotRelated);
        assert!(relationship_between(&g, &config, "a", "nobody").is_err());
    }

    #[test]
    fn test_role_filter() {
        let g = graph(vec![
            RelationshipFacts::new("kid")
                .with_fact(RelationshipFact::parent(ParentRole::Adoptive, ParentSide::Mother, "am")),
            RelationshipFacts::new("am").with_sex(Sex::Female),
        ]);
        assert_eq!(related(&g, "kid", "am").gendered_label, "adoptive mother");

        let biological = CalculatorConfig { roles: RoleFilter::Biological, ..CalculatorConfig::default() };
        assert_eq!(relationship_between(&g, &biological, "kid", "am").unwrap(), Relation::NotRelated);
    }

    #[test]
    fn test_cycle_terminates() {
        let g = graph(vec![person("a", &["b"]), person("b", &["a"]), RelationshipFacts::new("z")]);
        assert_eq!(
            relationship_between(&g, &CalculatorConfig::default(), "a", "z").unwrap(),
            Relation::NotRelated
        );
    }
}
