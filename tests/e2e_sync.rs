//! Reciprocal synchronization driven through the engine handle.

use std::sync::Arc;

use kinship_graph::model::{FactKey, bag_from_json};
use kinship_graph::*;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

async fn open(records: Vec<Value>) -> FamilyGraph<MemoryStore> {
    let store = Arc::new(MemoryStore::from_json(records).unwrap());
    FamilyGraph::open(store, EngineConfig::default()).await.unwrap()
}

/// Replace a record the way a user edit would and return the event.
fn edit(graph: &FamilyGraph<MemoryStore>, value: Value) -> ChangeEvent {
    let bag = bag_from_json(value).unwrap();
    let id = bag["cr_id"].as_str().unwrap().to_owned();
    graph.store().put(id, bag)
}

fn spouse_meta(graph: &FamilyGraph<MemoryStore>, on: &str, spouse: &str) -> SpouseMeta {
    match graph.facts(on).unwrap().find(&FactKey::Spouse(spouse.into())) {
        Some(RelationshipFact::Spouse { meta, .. }) => meta.clone(),
        other => panic!("{on} has no spouse fact for {spouse}: {other:?}"),
    }
}

#[tokio::test]
async fn test_added_spouse_is_mirrored_with_metadata() {
    let graph = open(vec![json!({"cr_id": "a", "sex": "female"}), json!({"cr_id": "b", "sex": "male"})]).await;

    let event = edit(&graph, json!({
        "cr_id": "a",
        "sex": "female",
        "spouses": [{"id": "[[b]]", "marriage_date": "1923-06-02", "location": "Bath"}],
    }));
    let report = graph.handle_change(&event).await.unwrap();

    assert_eq!(report.writes.len(), 1);
    assert_eq!(report.writes[0].target.as_str(), "b");
    let meta = spouse_meta(&graph, "b", "a");
    assert_eq!(meta, spouse_meta(&graph, "a", "b"));
    assert_eq!(meta.marriage.unwrap().text, "1923-06-02");
    assert_eq!(meta.location.as_deref(), Some("Bath"));

    // The published snapshot sees one coalesced spouse pair.
    let snapshot = graph.snapshot();
    let a = snapshot.node_id("a").unwrap();
    let spouses = snapshot.neighbors(a, &EdgeFilter::spouses());
    assert_eq!(spouses.len(), 1);
}

#[tokio::test]
async fn test_consistent_pair_needs_no_writes() {
    let graph = open(vec![
        json!({"cr_id": "kid", "father": "[[dad]]"}),
        json!({"cr_id": "dad", "sex": "male", "children": ["[[kid]]"]}),
    ])
    .await;

    assert!(graph.reconcile(&"kid".into()).await.unwrap().is_noop());
    assert!(graph.reconcile(&"dad".into()).await.unwrap().is_noop());
    assert_eq!(graph.store().write_count(), 0);
}

#[tokio::test]
async fn test_echoed_writes_settle() {
    let graph = open(vec![json!({"cr_id": "a"}), json!({"cr_id": "b"}), json!({"cr_id": "c"})]).await;
    let event = edit(&graph, json!({"cr_id": "a", "siblings": ["[[b]]", "[[c]]"]}));
    graph.store().drain_changes();
    graph.handle_change(&event).await.unwrap();

    // Replay what the store saw, as a file watcher would.
    let echoes = graph.store().drain_changes();
    assert_eq!(echoes.len(), 2);
    for echo in &echoes {
        assert!(graph.handle_change(echo).await.unwrap().is_noop());
    }
    assert_eq!(graph.store().write_count(), 2);
}

#[tokio::test]
async fn test_added_child_parses_back_as_parent() {
    let graph = open(vec![json!({"cr_id": "mum", "sex": "female"}), json!({"cr_id": "kid"})]).await;
    let event = edit(&graph, json!({"cr_id": "mum", "sex": "female", "adopted_children": ["[[kid]]"]}));
    graph.handle_change(&event).await.unwrap();

    let kid = graph.facts("kid").unwrap();
    assert_eq!(
        kid.parent_slot(ParentRole::Adoptive, ParentSide::Mother),
        ParentSlot::Known("mum".into())
    );
    assert!(graph.store().get("kid").unwrap().contains_key("adoptive_mother"));
}

#[tokio::test]
async fn test_unwritable_target_does_not_block_others() {
    let graph = open(vec![json!({"cr_id": "a"}), json!({"cr_id": "b"}), json!({"cr_id": "c"})]).await;
    graph.store().set_read_only("b", true);

    let event = edit(&graph, json!({"cr_id": "a", "spouses": ["[[b]]"], "siblings": ["[[c]]"]}));
    let report = graph.handle_change(&event).await.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].target.as_str(), "b");
    assert_eq!(report.failures[0].field, "spouses");
    assert!(graph.facts("c").unwrap().contains(&FactKey::Sibling("a".into())));

    // The unsynchronized pair is visible to the validator.
    let findings = graph.validate(&CancellationToken::new()).unwrap();
    assert!(findings.iter().any(|f| matches!(f, Finding::MissingReciprocal { .. })));
}

#[tokio::test]
async fn test_metadata_conflict_resolved_by_last_edit() {
    let graph = open(vec![
        json!({"cr_id": "a", "spouses": [{"id": "[[b]]", "marriage_date": "1900"}]}),
        json!({"cr_id": "b", "spouses": [{"id": "[[a]]", "marriage_date": "1901"}]}),
    ])
    .await;

    let previous = graph.store().get("a").unwrap();
    let current = bag_from_json(json!({"cr_id": "a", "spouses": [{"id": "[[b]]", "marriage_date": "1905"}]})).unwrap();
    graph.store().put("a", current.clone());
    let report = graph.handle_change(&ChangeEvent::updated("a", previous, current)).await.unwrap();

    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].fields, vec!["marriage_date"]);
    assert_eq!(report.conflicts[0].winner.as_str(), "a");
    assert_eq!(spouse_meta(&graph, "b", "a").marriage.unwrap().text, "1905");
}

#[tokio::test]
async fn test_removed_spouse_leaves_both_ends() {
    let graph = open(vec![json!({"cr_id": "a"}), json!({"cr_id": "b"})]).await;
    let add = edit(&graph, json!({"cr_id": "a", "spouses": ["[[b]]"]}));
    graph.handle_change(&add).await.unwrap();
    assert!(graph.facts("b").unwrap().contains(&FactKey::Spouse("a".into())));

    let remove = edit(&graph, json!({"cr_id": "a"}));
    graph.handle_change(&remove).await.unwrap();
    assert!(!graph.facts("b").unwrap().contains(&FactKey::Spouse("a".into())));
    let snapshot = graph.snapshot();
    assert!(snapshot.neighbors(snapshot.node_id("b").unwrap(), &EdgeFilter::spouses()).is_empty());
}

#[tokio::test]
async fn test_removal_of_hand_written_pair() {
    let graph = open(vec![
        json!({"cr_id": "kid", "father": "[[dad]]"}),
        json!({"cr_id": "dad", "sex": "male", "children": ["[[kid]]"]}),
    ])
    .await;

    let remove = edit(&graph, json!({"cr_id": "kid"}));
    let report = graph.handle_change(&remove).await.unwrap();

    assert!(report.retained.is_empty());
    assert_eq!(report.writes.len(), 1);
    assert!(!graph.store().get("dad").unwrap().contains_key("children"));
    assert_eq!(graph.relationship_between("kid", "dad").unwrap(), Relation::NotRelated);
    let findings = graph.validate(&CancellationToken::new()).unwrap();
    assert!(findings.iter().all(|f| !matches!(f, Finding::MissingReciprocal { .. })), "{findings:?}");
}

#[tokio::test]
async fn test_removal_after_reopening() {
    let store = Arc::new(MemoryStore::from_json([json!({"cr_id": "a"}), json!({"cr_id": "b"})]).unwrap());
    let first = FamilyGraph::open(store.clone(), EngineConfig::default()).await.unwrap();
    let add = edit(&first, json!({"cr_id": "a", "spouses": ["[[b]]"]}));
    first.handle_change(&add).await.unwrap();
    assert!(store.get("b").unwrap().contains_key("spouses"));
    drop(first);

    let graph = FamilyGraph::open(store.clone(), EngineConfig::default()).await.unwrap();
    let remove = edit(&graph, json!({"cr_id": "a"}));
    graph.handle_change(&remove).await.unwrap();

    assert!(!store.get("b").unwrap().contains_key("spouses"));
    assert_eq!(graph.relationship_between("a", "b").unwrap(), Relation::NotRelated);
}

#[tokio::test]
async fn test_later_edit_on_other_end_wins() {
    let graph = open(vec![
        json!({"cr_id": "a", "spouses": [{"id": "[[b]]", "marriage_date": "1899"}]}),
        json!({"cr_id": "b", "spouses": [{"id": "[[a]]", "marriage_date": "1899"}]}),
    ])
    .await;

    // a is edited, then b; the events are handled in that order.
    let from_a = edit(&graph, json!({"cr_id": "a", "spouses": [{"id": "[[b]]", "marriage_date": "1900"}]}));
    let from_b = edit(&graph, json!({"cr_id": "b", "spouses": [{"id": "[[a]]", "marriage_date": "1901"}]}));

    let ra = graph.handle_change(&from_a).await.unwrap();
    assert!(ra.writes.is_empty());
    assert_eq!(ra.conflicts.len(), 1);
    assert_eq!(ra.conflicts[0].fields, vec!["marriage_date"]);
    assert_eq!(ra.conflicts[0].winner.as_str(), "b");

    let rb = graph.handle_change(&from_b).await.unwrap();
    assert_eq!(rb.writes.len(), 1);
    assert_eq!(rb.writes[0].target.as_str(), "a");
    assert_eq!(rb.conflicts[0].winner.as_str(), "b");

    assert_eq!(spouse_meta(&graph, "a", "b").marriage.unwrap().text, "1901");
    assert_eq!(spouse_meta(&graph, "b", "a").marriage.unwrap().text, "1901");
}

#[tokio::test]
async fn test_concurrent_edits_converge() {
    let graph = open(vec![json!({"cr_id": "a"}), json!({"cr_id": "b"}), json!({"cr_id": "c"})]).await;
    let from_a = edit(&graph, json!({"cr_id": "a", "siblings": ["[[c]]"]}));
    let from_b = edit(&graph, json!({"cr_id": "b", "siblings": ["[[c]]"]}));

    let (ra, rb) = tokio::join!(graph.handle_change(&from_a), graph.handle_change(&from_b));
    assert!(ra.unwrap().failures.is_empty());
    assert!(rb.unwrap().failures.is_empty());

    let c = graph.store().get("c").unwrap();
    let mut siblings: Vec<String> = c["siblings"]
        .as_list()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str().map(str::to_owned))
        .collect();
    siblings.sort();
    assert_eq!(siblings, vec!["[[a]]", "[[b]]"]);
}
