//! Validator findings over loaded records.

use std::sync::Arc;

use kinship_graph::*;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

async fn findings(records: Vec<Value>) -> Vec<Finding> {
    let store = Arc::new(MemoryStore::from_json(records).unwrap());
    let graph = FamilyGraph::open(store, EngineConfig::default()).await.unwrap();
    graph.validate(&CancellationToken::new()).unwrap()
}

#[tokio::test]
async fn test_consistent_family_is_clean() {
    let found = findings(vec![
        json!({"cr_id": "kid", "father": "[[dad]]", "mother": "[[mum]]", "siblings": ["[[sis]]"]}),
        json!({"cr_id": "sis", "father": "[[dad]]", "mother": "[[mum]]", "siblings": ["[[kid]]"]}),
        json!({"cr_id": "dad", "sex": "male", "children": ["[[kid]]", "[[sis]]"], "spouses": ["[[mum]]"]}),
        json!({"cr_id": "mum", "sex": "female", "children": ["[[kid]]", "[[sis]]"], "spouses": ["[[dad]]"]}),
    ])
    .await;
    assert_eq!(found, vec![]);
}

#[tokio::test]
async fn test_ancestor_loop_is_an_error() {
    let found = findings(vec![
        json!({"cr_id": "a", "parents": ["[[b]]"], "children": ["[[b]]"]}),
        json!({"cr_id": "b", "parents": ["[[a]]"], "children": ["[[a]]"]}),
    ])
    .await;

    let cycles: Vec<&Finding> = found.iter().filter(|f| matches!(f, Finding::Cycle { .. })).collect();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].severity(), Severity::Error);
    let Finding::Cycle { role, path } = cycles[0] else { unreachable!() };
    assert_eq!(*role, ParentRole::Biological);
    assert_eq!(path.first(), path.last());
    assert_eq!(path.len(), 3);
}

#[tokio::test]
async fn test_pedigree_collapse_is_not_a_cycle() {
    // Cousins marry; their child descends from g twice.
    let found = findings(vec![
        json!({"cr_id": "g", "children": ["[[p1]]", "[[p2]]"]}),
        json!({"cr_id": "p1", "parents": ["[[g]]"], "children": ["[[x]]"]}),
        json!({"cr_id": "p2", "parents": ["[[g]]"], "children": ["[[y]]"]}),
        json!({"cr_id": "x", "parents": ["[[p1]]"], "children": ["[[z]]"]}),
        json!({"cr_id": "y", "parents": ["[[p2]]"], "children": ["[[z]]"]}),
        json!({"cr_id": "z", "parents": ["[[x]]", "[[y]]"]}),
    ])
    .await;
    assert!(found.iter().all(|f| !matches!(f, Finding::Cycle { .. })), "{found:?}");
}

#[tokio::test]
async fn test_findings_name_record_and_field() {
    let found = findings(vec![
        json!({"cr_id": "kid", "father": "[[dad]]", "spouses": ["[[ghost]]"]}),
        json!({"cr_id": "dad", "sex": "male"}),
    ])
    .await;

    let missing = found
        .iter()
        .find(|f| matches!(f, Finding::MissingReciprocal { .. }))
        .expect("missing reciprocal");
    assert_eq!(missing.record().as_str(), "dad");
    assert_eq!(missing.field(), Some("children"));

    let dangling = found
        .iter()
        .find(|f| matches!(f, Finding::DanglingReference { .. }))
        .expect("dangling reference");
    assert_eq!(dangling.record().as_str(), "kid");
    assert_eq!(dangling.field(), Some("spouses"));
    assert_eq!(dangling.severity(), Severity::Warning);
}

#[tokio::test]
async fn test_siblings_without_parent_data() {
    let found = findings(vec![
        json!({"cr_id": "a", "siblings": ["[[b]]"]}),
        json!({"cr_id": "b", "siblings": ["[[a]]"], "father": "unknown"}),
    ])
    .await;
    assert_eq!(
        found,
        vec![Finding::UnknownParentWithoutPlaceholder { node: "a".into(), field: "parents" }]
    );
}

#[tokio::test]
async fn test_self_reference_from_bulk_load() {
    let store = Arc::new(MemoryStore::new());
    let graph = FamilyGraph::new(store, EngineConfig::default()).unwrap();
    let cancel = CancellationToken::new();
    graph
        .load_facts([RelationshipFacts::new("narcissus").with_fact(RelationshipFact::spouse("narcissus", SpouseMeta::default()))], &cancel)
        .unwrap();

    let found = graph.validate(&cancel).unwrap();
    assert_eq!(found.len(), 1);
    assert!(matches!(&found[0], Finding::SelfRelationship { kind: EdgeKind::Spouse, .. }));
    assert_eq!(found[0].severity(), Severity::Error);
}

#[tokio::test]
async fn test_findings_serialize_with_tag() {
    let found = findings(vec![json!({"cr_id": "a", "spouses": ["[[nobody]]"]})]).await;
    let value = serde_json::to_value(&found).unwrap();
    assert_eq!(value[0]["finding"], "dangling_reference");
    assert_eq!(value[0]["from"], "a");
}
