//! In-memory record store.
//!
//! The reference implementation of `RecordStore`: a map of field bags
//! behind a RwLock, plus a change log so tests can replay every write
//! back into the engine the way a file watcher would.
//!
//! ## Limitations
//!
//! - **No persistence**: everything is lost on drop.
//! - **Read-only marking** is the only failure mode; it exists to
//!   exercise sync failure paths.
//!
//! Use this store for:
//! - Testing the synchronizer and the engine end to end
//! - Embedding the engine when records live in memory anyway

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::model::*;
use crate::{Error, Result};
use super::{ChangeEvent, RecordStore, merge_fields};

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory record storage. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    records: RwLock<BTreeMap<RecordId, FieldBag>>,
    read_only: RwLock<BTreeSet<RecordId>>,
    /// Every applied write or put, oldest first.
    changes: RwLock<Vec<ChangeEvent>>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from JSON record blocks, each with a `cr_id`.
    pub fn from_json(records: impl IntoIterator<Item = serde_json::Value>) -> Result<Self> {
        let store = Self::new();
        for value in records {
            let bag = bag_from_json(value)?;
            let id = bag
                .get(crate::adapter::schema::ID)
                .and_then(FieldValue::to_text)
                .ok_or(Error::MissingIdentifier)?;
            store.inner.records.write().insert(RecordId::new(id), bag);
        }
        Ok(store)
    }

    /// Create or fully replace a record, as a user edit would.
    /// Returns the change event the edit produces.
    pub fn put(&self, id: impl Into<RecordId>, bag: FieldBag) -> ChangeEvent {
        let id = id.into();
        let previous = self.inner.records.write().insert(id.clone(), bag.clone());
        let event = ChangeEvent { id, previous, current: bag };
        self.inner.changes.write().push(event.clone());
        event
    }

    /// Synchronous snapshot of one record.
    pub fn get(&self, id: &str) -> Option<FieldBag> {
        self.inner.records.read().get(id).cloned()
    }

    /// Make writes to `id` fail with a store error.
    pub fn set_read_only(&self, id: impl Into<RecordId>, read_only: bool) {
        let id = id.into();
        let mut set = self.inner.read_only.write();
        if read_only {
            set.insert(id);
        } else {
            set.remove(&id);
        }
    }

    /// Take the change log accumulated so far.
    pub fn drain_changes(&self) -> Vec<ChangeEvent> {
        std::mem::take(&mut *self.inner.changes.write())
    }

    /// Number of successful `write` calls (puts not included).
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(Ordering::Relaxed)
    }
}

// ============================================================================
// RecordStore impl
// ============================================================================

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list(&self) -> Result<Vec<(RecordId, FieldBag)>> {
        Ok(self
            .inner
            .records
            .read()
            .iter()
            .map(|(id, bag)| (id.clone(), bag.clone()))
            .collect())
    }

    async fn read(&self, id: &RecordId) -> Result<Option<FieldBag>> {
        Ok(self.inner.records.read().get(id).cloned())
    }

    async fn write(&self, id: &RecordId, fields: FieldBag) -> Result<()> {
        if self.inner.read_only.read().contains(id) {
            return Err(Error::Store(format!("record {id} is read-only")));
        }

        let event = {
            let mut records = self.inner.records.write();
            let record = records.get_mut(id).ok_or_else(|| Error::NotFound(id.to_string()))?;
            let previous = record.clone();
            merge_fields(record, fields);
            ChangeEvent { id: id.clone(), previous: Some(previous), current: record.clone() }
        };

        self.inner.changes.write().push(event);
        self.inner.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.inner.records.read().len())
    }
}
