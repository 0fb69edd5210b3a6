//! Snapshot construction from fact sets.

use tracing::debug;

use crate::cancel::CancellationToken;
use crate::model::*;
use crate::Result;

use super::{GraphSnapshot, Placeholder};

impl GraphSnapshot {
    /// Build a snapshot from parsed records.
    ///
    /// Every record is observed first so node data does not depend on
    /// the order links are met. Checks `cancel` once per record; a
    /// cancelled build returns [`Error::Cancelled`](crate::Error::Cancelled).
    pub fn from_facts<'a>(
        records: impl IntoIterator<Item = &'a RelationshipFacts>,
        registry: &TypeRegistry,
        version: u64,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let records: Vec<&RelationshipFacts> = records.into_iter().collect();
        let mut g = GraphSnapshot::new(version);
        for facts in &records {
            cancel.check()?;
            g.upsert_node(facts);
        }
        for facts in &records {
            cancel.check()?;
            g.add_facts(facts, registry);
        }
        debug!(version, nodes = g.node_count(), edges = g.edge_count(), "built graph snapshot");
        Ok(g)
    }

    /// Add the edges one record declares. The record's own node must
    /// already exist (see [`upsert_node`](Self::upsert_node)).
    pub fn add_facts(&mut self, facts: &RelationshipFacts, registry: &TypeRegistry) {
        let me = self.ensure_node(&facts.id);
        self.warnings.extend(facts.warnings.iter().cloned());

        for fact in &facts.facts {
            match fact {
                RelationshipFact::Parent { role, slot: ParentSlot::Known(parent), .. } => {
                    let p = self.ensure_node(parent);
                    self.upsert_edge(p, EdgeKind::Parent(*role), me, EdgeAttrs::None, me);
                }
                RelationshipFact::Parent { role, side, slot } => {
                    self.add_placeholder(me, Placeholder { role: *role, side: *side, slot: slot.clone() });
                }
                RelationshipFact::Child { role, child } => {
                    let c = self.ensure_node(child);
                    self.upsert_edge(me, EdgeKind::Parent(*role), c, EdgeAttrs::None, me);
                }
                RelationshipFact::Spouse { spouse, meta } => {
                    let s = self.ensure_node(spouse);
                    if self.upsert_edge(me, EdgeKind::Spouse, s, EdgeAttrs::Spouse(meta.clone()), me).edge().is_some() {
                        self.upsert_edge(s, EdgeKind::Spouse, me, EdgeAttrs::Spouse(meta.clone()), me);
                    }
                }
                RelationshipFact::Sibling { sibling } => {
                    let s = self.ensure_node(sibling);
                    if self.upsert_edge(me, EdgeKind::Sibling, s, EdgeAttrs::None, me).edge().is_some() {
                        self.upsert_edge(s, EdgeKind::Sibling, me, EdgeAttrs::None, me);
                    }
                }
                RelationshipFact::Custom { type_id, target, meta } => {
                    let t = self.ensure_node(target);
                    let attrs = EdgeAttrs::Custom(meta.clone());
                    let inserted = self.upsert_edge(me, EdgeKind::Custom(type_id.clone()), t, attrs.clone(), me);
                    // Unknown types get no implied inverse.
                    if let (Some(_), Some(inverse)) = (inserted.edge(), registry.inverse_of(type_id)) {
                        self.upsert_edge(t, EdgeKind::Custom(inverse.to_owned()), me, attrs, me);
                    }
                }
            }
        }
    }
}
