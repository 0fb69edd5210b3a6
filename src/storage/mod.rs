//! # Record Store Trait
//!
//! The contract between the engine and whatever holds the records (a
//! vault of notes, a database, a test fixture). The engine only ever
//! needs three things from it: enumerate, read one, and replace the
//! relationship-bearing fields of one.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory, for testing and embedding |

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::Result;

pub use memory::MemoryStore;

// ============================================================================
// Change notifications
// ============================================================================

/// One observed write to a record: `(identifier, previous, current)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: RecordId,
    /// `None` for a newly created record.
    pub previous: Option<FieldBag>,
    pub current: FieldBag,
}

impl ChangeEvent {
    pub fn created(id: impl Into<RecordId>, current: FieldBag) -> Self {
        Self { id: id.into(), previous: None, current }
    }

    pub fn updated(id: impl Into<RecordId>, previous: FieldBag, current: FieldBag) -> Self {
        Self { id: id.into(), previous: Some(previous), current }
    }
}

// ============================================================================
// RecordStore Trait
// ============================================================================

/// The durable side of the engine.
///
/// Writes carry the relationship fields only. A store replaces exactly
/// the keys it is given, removes keys given as null, and leaves every
/// other field of the record untouched.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Every record that has a stable identifier.
    async fn list(&self) -> Result<Vec<(RecordId, FieldBag)>>;

    /// One record. `Ok(None)` if it does not exist.
    async fn read(&self, id: &RecordId) -> Result<Option<FieldBag>>;

    /// Replace relationship fields of an existing record.
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) for an unknown
    /// id; stores never create records on write.
    async fn write(&self, id: &RecordId, fields: FieldBag) -> Result<()>;

    /// Number of records. Default: counts [`list`](Self::list).
    async fn count(&self) -> Result<usize> {
        Ok(self.list().await?.len())
    }
}

/// Apply a relationship-field write onto a full record.
pub fn merge_fields(record: &mut FieldBag, fields: FieldBag) {
    for (key, value) in fields {
        if value.is_null() {
            record.remove(&key);
        } else {
            record.insert(key, value);
        }
    }
}
