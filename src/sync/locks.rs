//! Per-record write serialization.

use std::collections::BTreeSet;
use std::sync::Arc;

use hashbrown::HashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::RecordId;

/// One async mutex per record id. Writes to the same record queue up;
/// writes to different records never contend.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: parking_lot::Mutex<HashMap<RecordId, Arc<Mutex<()>>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`. Released on drop.
    pub async fn lock(&self, id: &RecordId) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.locks.lock();
            locks.entry(id.clone()).or_default().clone()
        };
        mutex.lock_owned().await
    }

    /// Lock several records. Acquired in id order so two callers with
    /// overlapping sets cannot deadlock.
    pub async fn lock_many(&self, ids: &BTreeSet<RecordId>) -> Vec<OwnedMutexGuard<()>> {
        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.lock(id).await);
        }
        guards
    }

    /// Forget mutexes nobody holds or waits on.
    pub fn prune(&self) {
        self.locks.lock().retain(|_, m| Arc::strong_count(m) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
