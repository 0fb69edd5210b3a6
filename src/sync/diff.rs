//! Set difference between two fact states of one record.

use std::collections::BTreeMap;

use crate::model::*;

/// Facts of one record keyed by identity; first declaration wins.
pub type FactMap = BTreeMap<FactKey, RelationshipFact>;

pub fn fact_map(facts: &RelationshipFacts) -> FactMap {
    let mut map = FactMap::new();
    for fact in &facts.facts {
        map.entry(fact.key()).or_insert_with(|| fact.clone());
    }
    map
}

/// What changed between two states.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactDiff {
    pub added: Vec<RelationshipFact>,
    pub removed: Vec<RelationshipFact>,
    /// `(before, after)`: same key, metadata differs.
    pub changed: Vec<(RelationshipFact, RelationshipFact)>,
}

impl FactDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

pub fn diff(before: &FactMap, after: &FactMap) -> FactDiff {
    let mut out = FactDiff::default();
    for (key, fact) in after {
        match before.get(key) {
            None => out.added.push(fact.clone()),
            Some(old) if old.metadata_differs(fact) => out.changed.push((old.clone(), fact.clone())),
            Some(_) => {}
        }
    }
    for (key, fact) in before {
        if !after.contains_key(key) {
            out.removed.push(fact.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(facts: Vec<RelationshipFact>) -> FactMap {
        let mut f = RelationshipFacts::new("a");
        f.facts = facts;
        fact_map(&f)
    }

    #[test]
    fn test_diff() {
        let married = SpouseMeta { marriage: FuzzyDate::parse("1900"), ..SpouseMeta::default() };
        let before = map(vec![
            RelationshipFact::sibling("b"),
            RelationshipFact::spouse("s", SpouseMeta::default()),
            RelationshipFact::parent(ParentRole::Biological, ParentSide::Father, "f"),
        ]);
        let after = map(vec![
            RelationshipFact::spouse("s", married.clone()),
            RelationshipFact::parent(ParentRole::Biological, ParentSide::Unspecified, "f"),
            RelationshipFact::child(ParentRole::Step, "k"),
        ]);

        let d = diff(&before, &after);
        assert_eq!(d.added, vec![RelationshipFact::child(ParentRole::Step, "k")]);
        assert_eq!(d.removed, vec![RelationshipFact::sibling("b")]);
        assert_eq!(d.changed.len(), 1);
        assert_eq!(d.changed[0].1, RelationshipFact::spouse("s", married));
        assert!(diff(&after, &after).is_empty());
    }
}
