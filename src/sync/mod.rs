//! # Bidirectional Synchronizer
//!
//! Keeps both endpoints of every relationship in agreement. Given a
//! record's before/after state it works out which facts the user added,
//! removed or re-dated, and writes the matching reciprocal facts onto
//! the other records.
//!
//! ## Self-origin
//!
//! Every write the synchronizer makes is remembered as "the relationship
//! state I left this record in". When the store later reports that write
//! back as a change, the record's state matches the remembered one, the
//! diff is empty, and nothing further is written. If the user edited the
//! record in between, only the edit shows up in the diff. Notifications
//! are never muted.
//!
//! ## Removal
//!
//! Removing a fact removes its reciprocal when the target holds it as a
//! plain mirror of what was removed. The decision is made from the
//! store alone, so it survives restarts and covers pairs the user wrote
//! by hand. A reciprocal carrying metadata of the target's own is left
//! alone and reported as retained.
//!
//! ## Ordering
//!
//! Metadata is settled last-write-wins per sub-field. The synchronizer
//! remembers each record's relationship state as it last saw it. When
//! an edit arrives for one endpoint while the other endpoint has moved
//! a sub-field away from that state, the other endpoint's edit is the
//! later one: its value stays, and its own change event mirrors it back.
//!
//! ## Atomicity
//!
//! All updates for one target are applied to its parsed facts, rendered,
//! parsed back and checked before a single write. A target that fails
//! the check, or whose write fails, gets nothing and is reported; other
//! targets proceed.

pub mod diff;
pub mod locks;
pub mod reciprocal;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use hashbrown::HashMap;
use tracing::{debug, info, warn};

use crate::adapter::{RecordAdapter, schema};
use crate::model::*;
use crate::storage::{ChangeEvent, RecordStore, merge_fields};
use crate::Result;

use self::diff::{FactDiff, FactMap, diff, fact_map};
use self::locks::LockTable;
use self::reciprocal::{Applied, FieldConflict, NoReciprocal, Update, Winner, apply, reciprocal};

// ============================================================================
// Report types
// ============================================================================

/// One committed write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncWrite {
    pub target: RecordId,
    pub inserted: Vec<FactKey>,
    pub updated: Vec<FactKey>,
    pub removed: Vec<FactKey>,
}

/// Sub-fields both endpoints set differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConflict {
    pub source: RecordId,
    pub target: RecordId,
    pub key: FactKey,
    pub fields: Vec<&'static str>,
    /// Endpoint whose values were kept.
    pub winner: RecordId,
}

/// A target that could not be updated. Nothing was written to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub source: RecordId,
    pub target: RecordId,
    /// Field on the target that should have carried the reciprocal.
    pub field: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The target record does not exist in the store.
    MissingTarget,
    /// Custom type with no registered inverse.
    UnknownType(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub target: RecordId,
    pub reason: SkipReason,
}

/// A reciprocal kept on removal because the target carries its own
/// metadata on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retained {
    pub target: RecordId,
    pub key: FactKey,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncReport {
    pub source: RecordId,
    pub writes: Vec<SyncWrite>,
    pub conflicts: Vec<SyncConflict>,
    pub failures: Vec<SyncFailure>,
    pub skipped: Vec<Skipped>,
    pub retained: Vec<Retained>,
}

impl SyncReport {
    fn new(source: RecordId) -> Self {
        Self { source, ..Self::default() }
    }

    pub fn is_noop(&self) -> bool {
        self.writes.is_empty() && self.failures.is_empty()
    }

    /// Records whose relationship fields were rewritten.
    pub fn touched(&self) -> impl Iterator<Item = &RecordId> {
        self.writes.iter().map(|w| &w.target)
    }
}

// ============================================================================
// Synchronizer
// ============================================================================

enum Trigger<'a> {
    Change(&'a ChangeEvent),
    Reconcile(&'a RecordId),
}

impl Trigger<'_> {
    fn id(&self) -> &RecordId {
        match self {
            Trigger::Change(event) => &event.id,
            Trigger::Reconcile(id) => id,
        }
    }
}

pub struct Synchronizer<S: RecordStore> {
    store: Arc<S>,
    adapter: RecordAdapter,
    locks: LockTable,
    /// Relationship state of each record as last written here.
    written: parking_lot::Mutex<HashMap<RecordId, FactMap>>,
    /// Relationship state of each record as last read, loaded or written.
    seen: parking_lot::Mutex<HashMap<RecordId, FactMap>>,
}

impl<S: RecordStore> Synchronizer<S> {
    pub fn new(store: Arc<S>, adapter: RecordAdapter) -> Self {
        Self {
            store,
            adapter,
            locks: LockTable::new(),
            written: parking_lot::Mutex::new(HashMap::new()),
            seen: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Remember records read outside a pass, such as by a full load.
    pub fn observed<'a>(&self, records: impl IntoIterator<Item = &'a RelationshipFacts>) {
        let mut seen = self.seen.lock();
        for facts in records {
            seen.insert(facts.id.clone(), fact_map(facts));
        }
    }

    /// React to one observed change.
    ///
    /// The record's current state is re-read from the store, so an event
    /// that was overtaken by a later write is judged against what is
    /// actually there.
    pub async fn on_change(&self, event: &ChangeEvent) -> Result<SyncReport> {
        self.pass(Trigger::Change(event)).await
    }

    /// Ensure every reciprocal of a record's current facts exists.
    ///
    /// Treats all facts as newly added. Used after bulk imports and to
    /// repair missing reciprocals the validator found.
    pub async fn reconcile(&self, id: &RecordId) -> Result<SyncReport> {
        self.pass(Trigger::Reconcile(id)).await
    }

    /// One locked pass: the source and every target it touches are held
    /// for the whole pass, acquired in id order. If the plan made under
    /// the locks needs a record outside the held set, the locks are
    /// released, the set grows, and the pass starts over.
    async fn pass(&self, trigger: Trigger<'_>) -> Result<SyncReport> {
        let source = trigger.id().clone();
        let mut scope = BTreeSet::from([source.clone()]);
        loop {
            let guards = self.locks.lock_many(&scope).await;
            let (current, delta) = self.observe(&trigger).await?;
            self.seen.lock().insert(source.clone(), fact_map(&current));

            let mut report = SyncReport::new(source.clone());
            let updates = self.plan(&current, &delta, &mut report);
            if !updates.keys().all(|t| scope.contains(t)) {
                scope.extend(updates.into_keys());
                drop(guards);
                continue;
            }

            if let Trigger::Change(_) = trigger {
                self.written.lock().remove(&source);
            }
            if delta.is_empty() {
                drop(guards);
                self.locks.prune();
                debug!(record = %source, "no relationship change");
                return Ok(report);
            }

            self.flush(&source, updates, &mut report).await;
            drop(guards);
            self.locks.prune();
            info!(
                record = %source,
                added = delta.added.len(),
                removed = delta.removed.len(),
                changed = delta.changed.len(),
                writes = report.writes.len(),
                failures = report.failures.len(),
                "synchronized record"
            );
            return Ok(report);
        }
    }

    /// Current facts of the trigger's record and what changed in them.
    async fn observe(&self, trigger: &Trigger<'_>) -> Result<(RelationshipFacts, FactDiff)> {
        match trigger {
            Trigger::Change(event) => {
                let bag = match self.store.read(&event.id).await? {
                    Some(bag) => bag,
                    None => event.current.clone(),
                };
                let current = self.adapter.parse(&bag)?;
                let previous = match &event.previous {
                    Some(previous) => Some(fact_map(&self.adapter.parse(previous)?)),
                    None => None,
                };
                // Our last write is the baseline for its own echo and for
                // edits made on top of it. An event that predates the
                // write is judged against its own previous state.
                let remembered = self.written.lock().get(&event.id).cloned();
                let baseline = match remembered {
                    Some(map)
                        if previous.as_ref() == Some(&map)
                            || fact_map(&self.adapter.parse(&event.current)?) == map =>
                    {
                        map
                    }
                    _ => previous.unwrap_or_default(),
                };
                let delta = diff(&baseline, &fact_map(&current));
                Ok((current, delta))
            }
            Trigger::Reconcile(id) => {
                let bag = self
                    .store
                    .read(id)
                    .await?
                    .ok_or_else(|| crate::Error::NotFound(id.to_string()))?;
                let current = self.adapter.parse(&bag)?;
                let delta = FactDiff {
                    added: fact_map(&current).into_values().collect(),
                    ..FactDiff::default()
                };
                Ok((current, delta))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Planning
    // ------------------------------------------------------------------------

    fn plan(&self, current: &RelationshipFacts, delta: &FactDiff, report: &mut SyncReport) -> BTreeMap<RecordId, Vec<Update>> {
        let mut updates = BTreeMap::new();
        for fact in &delta.added {
            self.plan_ensure(current, fact, None, &mut updates, report);
        }
        for (before, fact) in &delta.changed {
            self.plan_ensure(current, fact, Some(before), &mut updates, report);
        }
        for fact in &delta.removed {
            self.plan_remove(current, fact, &mut updates);
        }
        updates
    }

    fn plan_ensure(
        &self,
        source: &RelationshipFacts,
        fact: &RelationshipFact,
        before: Option<&RelationshipFact>,
        updates: &mut BTreeMap<RecordId, Vec<Update>>,
        report: &mut SyncReport,
    ) {
        match reciprocal(source, fact, self.adapter.registry()) {
            Ok(r) => updates.entry(r.target).or_default().push(Update::Ensure {
                fact: r.fact,
                before: before.cloned(),
            }),
            Err(NoReciprocal::Placeholder) => {}
            Err(NoReciprocal::UnknownType(t)) => {
                if let Some(target) = fact.target() {
                    report.skipped.push(Skipped { target: target.clone(), reason: SkipReason::UnknownType(t) });
                }
            }
        }
    }

    /// The reciprocal of a removed fact, as the target would hold it if
    /// it only mirrors the source.
    fn plan_remove(
        &self,
        source: &RelationshipFacts,
        fact: &RelationshipFact,
        updates: &mut BTreeMap<RecordId, Vec<Update>>,
    ) {
        if let Ok(r) = reciprocal(source, fact, self.adapter.registry()) {
            updates.entry(r.target).or_default().push(Update::Remove { fact: r.fact });
        }
    }

    // ------------------------------------------------------------------------
    // Writing
    // ------------------------------------------------------------------------

    /// Write each target in turn. Callers hold every target's lock.
    async fn flush(&self, source: &RecordId, updates: BTreeMap<RecordId, Vec<Update>>, report: &mut SyncReport) {
        for (target, list) in updates {
            if let Err(failure) = self.write_target(source, &target, &list, report).await {
                warn!(source = %failure.source, target = %failure.target, field = failure.field, "{}", failure.reason);
                report.failures.push(failure);
            }
        }
    }

    /// Apply, render, verify and write all updates for one target.
    async fn write_target(
        &self,
        source: &RecordId,
        target: &RecordId,
        list: &[Update],
        report: &mut SyncReport,
    ) -> std::result::Result<(), SyncFailure> {
        let field = list.first().map(update_field).unwrap_or(schema::RELATIONSHIPS);
        let fail = |reason: String| SyncFailure {
            source: source.clone(),
            target: target.clone(),
            field,
            reason,
        };

        let bag = match self.store.read(target).await {
            Ok(Some(bag)) => bag,
            Ok(None) => {
                report.skipped.push(Skipped { target: target.clone(), reason: SkipReason::MissingTarget });
                return Ok(());
            }
            Err(e) => return Err(fail(e.to_string())),
        };
        let mut facts = self.adapter.parse(&bag).map_err(|e| fail(e.to_string()))?;
        let seen = self.seen.lock().get(target).cloned().unwrap_or_default();

        let mut done = SyncWrite { target: target.clone(), ..SyncWrite::default() };
        let mut overridden = Vec::new();
        for update in list {
            let key = update.key();
            match apply(&mut facts, update, seen.get(&key)) {
                Applied::Inserted => done.inserted.push(key),
                Applied::Removed => done.removed.push(key),
                Applied::Retained => report.retained.push(Retained { target: target.clone(), key }),
                Applied::Merged { changed, conflicts } => {
                    let (won, kept): (Vec<FieldConflict>, Vec<FieldConflict>) =
                        conflicts.into_iter().partition(|c| c.winner == Winner::Source);
                    if !kept.is_empty() {
                        let conflict = SyncConflict {
                            source: source.clone(),
                            target: target.clone(),
                            key: key.clone(),
                            fields: kept.iter().map(|c| c.field).collect(),
                            winner: target.clone(),
                        };
                        warn!(source = %source, target = %target, fields = ?conflict.fields, "conflicting metadata; target edit is newer");
                        report.conflicts.push(conflict);
                    }
                    if !won.is_empty() {
                        overridden.push(SyncConflict {
                            source: source.clone(),
                            target: target.clone(),
                            key: key.clone(),
                            fields: won.iter().map(|c| c.field).collect(),
                            winner: source.clone(),
                        });
                    }
                    if changed {
                        done.updated.push(key);
                    }
                }
                Applied::Unchanged => {}
            }
        }
        if done.inserted.is_empty() && done.updated.is_empty() && done.removed.is_empty() {
            return Ok(());
        }

        let fields = self.adapter.render(&facts);
        let mut preview = bag.clone();
        merge_fields(&mut preview, fields.clone());
        let reparsed = self.adapter.parse(&preview).map_err(|e| fail(e.to_string()))?;
        for update in list {
            let ok = match update {
                Update::Ensure { .. } if !done.inserted.contains(&update.key()) && !done.updated.contains(&update.key()) => true,
                Update::Ensure { .. } => match (reparsed.find(&update.key()), facts.find(&update.key())) {
                    (Some(got), Some(want)) => !got.metadata_differs(want),
                    _ => false,
                },
                Update::Remove { .. } => !done.removed.contains(&update.key()) || !reparsed.contains(&update.key()),
            };
            if !ok {
                let field = update_field(update);
                return Err(SyncFailure {
                    source: source.clone(),
                    target: target.clone(),
                    field,
                    reason: format!("{target}: {field} does not parse back after rendering"),
                });
            }
        }

        self.store.write(target, fields).await.map_err(|e| fail(e.to_string()))?;
        debug!(
            source = %source,
            target = %target,
            inserted = done.inserted.len(),
            updated = done.updated.len(),
            removed = done.removed.len(),
            "wrote reciprocals"
        );

        for c in &overridden {
            warn!(source = %c.source, target = %c.target, fields = ?c.fields, "conflicting metadata; triggering edit wins");
        }
        report.conflicts.extend(overridden);

        let state = fact_map(&reparsed);
        self.seen.lock().insert(target.clone(), state.clone());
        self.written.lock().insert(target.clone(), state);
        report.writes.push(done);
        Ok(())
    }
}

fn update_field(update: &Update) -> &'static str {
    schema::field_for(update.fact())
}
