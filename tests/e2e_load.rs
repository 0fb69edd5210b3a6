//! Loading, snapshot publication and export.

use std::sync::Arc;

use kinship_graph::export::{export_cypher_dump, export_json};
use kinship_graph::model::WarningKind;
use kinship_graph::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn store() -> Arc<MemoryStore> {
    Arc::new(
        MemoryStore::from_json([
            json!({"cr_id": "kid", "name": "Kit", "father": "[[dad]]", "mother": "unknown", "siblings": 42}),
            json!({"cr_id": "dad", "name": "Dan", "sex": "male", "born": "abt 1890", "children": ["[[kid]]"]}),
            json!({"cr_id": "   ", "name": "No identifier"}),
        ])
        .unwrap(),
    )
}

#[tokio::test]
async fn test_bad_record_does_not_stop_loading() {
    let graph = FamilyGraph::open(store(), EngineConfig::default()).await.unwrap();
    let snapshot = graph.snapshot();

    assert_eq!(snapshot.node_count(), 2);
    assert_eq!(snapshot.edge_count(), 1);
    assert!(graph.facts("kid").is_some());

    // The malformed field is a warning; the rest of the record loaded.
    let warnings = snapshot.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field, "siblings");
    assert!(matches!(warnings[0].kind, WarningKind::UnexpectedShape { .. }));

    let kid = snapshot.node_id("kid").unwrap();
    assert_eq!(snapshot.placeholders(kid).len(), 1);
    assert_eq!(snapshot.placeholders(kid)[0].slot, ParentSlot::UnknownButExists);
}

#[tokio::test]
async fn test_cancelled_load_publishes_nothing() {
    let graph = FamilyGraph::new(store(), EngineConfig::default()).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert!(matches!(graph.load(&cancel).await, Err(Error::Cancelled)));
    assert_eq!(graph.snapshot().version(), 0);
    assert_eq!(graph.snapshot().node_count(), 0);
}

#[tokio::test]
async fn test_each_rebuild_publishes_newer_version() {
    let graph = FamilyGraph::open(store(), EngineConfig::default()).await.unwrap();
    let before = graph.snapshot();

    let cancel = CancellationToken::new();
    let after = graph
        .load_facts(
            [RelationshipFacts::new("gran").with_fact(RelationshipFact::child(ParentRole::Biological, "dad"))],
            &cancel,
        )
        .unwrap();

    assert!(after.version() > before.version());
    assert_eq!(graph.snapshot().version(), after.version());
    // Readers holding the old snapshot still see the old graph.
    assert!(before.node_id("gran").is_none());
    match graph.relationship_between("kid", "gran").unwrap() {
        Relation::Related(r) => assert_eq!(r.label, "grandparent"),
        Relation::NotRelated => panic!("kid should reach gran"),
    }

    // A full load goes back to what the store holds.
    graph.load(&cancel).await.unwrap();
    assert!(graph.snapshot().node_id("gran").is_none());
}

#[tokio::test]
async fn test_snapshot_exports() {
    let graph = FamilyGraph::open(store(), EngineConfig::default()).await.unwrap();
    let snapshot = graph.snapshot();

    let value = export_json(&snapshot).unwrap();
    assert_eq!(value["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(value["edges"][0]["source"], "dad");
    assert_eq!(value["edges"][0]["declared_by"], json!(["dad", "kid"]));

    let mut buf = Vec::new();
    export_cypher_dump(&snapshot, &mut buf).unwrap();
    let dump = String::from_utf8(buf).unwrap();
    assert!(dump.contains("CREATE (:Person {cr_id: 'dad', name: 'Dan', sex: 'male', born: 'abt 1890'});"));
    assert!(dump.contains("MATCH (a {cr_id: 'dad'}), (b {cr_id: 'kid'}) CREATE (a)-[:PARENT_OF {role: 'biological'}]->(b);"));
}
