//! # kinship-graph: Family Relationship Graph
//!
//! A relationship graph derived from a decentralized collection of person
//! records. Each record states its own relatives; the engine keeps both
//! ends of every relationship in agreement as records are edited
//! independently, reports structural problems, and answers "how are A
//! and B related?" in genealogical terms.
//!
//! ## Design Principles
//!
//! 1. **Typed facts at the edge**: the adapter turns loose field bags into
//!    [`RelationshipFacts`] once; nothing downstream reads raw fields
//! 2. **Trait-first storage**: [`RecordStore`] is the contract with whatever holds the records
//! 3. **Snapshots, not mutation**: a [`GraphSnapshot`] is rebuilt and swapped, never edited in place
//! 4. **Self-origin tagging**: the synchronizer recognises its own writes by content,
//!    so change notifications are never muted
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kinship_graph::{EngineConfig, FamilyGraph, MemoryStore, Relation};
//! use serde_json::json;
//!
//! # async fn example() -> kinship_graph::Result<()> {
//! let store = Arc::new(MemoryStore::from_json([
//!     json!({"cr_id": "ada", "name": "Ada", "father": "[[byron]]"}),
//!     json!({"cr_id": "byron", "name": "George", "sex": "male"}),
//! ])?);
//! let graph = FamilyGraph::open(store.clone(), EngineConfig::default()).await?;
//!
//! // Write the missing `children` link onto byron.
//! graph.reconcile(&"ada".into()).await?;
//!
//! if let Relation::Related(r) = graph.relationship_between("ada", "byron")? {
//!     println!("{} ({} step)", r.gendered_label, r.distance());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Components
//!
//! | Component | Module | Role |
//! |-----------|--------|------|
//! | Record Adapter | [`adapter`] | field bag ⇄ typed facts |
//! | Graph Model | [`graph`] | versioned snapshot, adjacency by role-class |
//! | Synchronizer | [`sync`] | reciprocal writes on change |
//! | Validator | [`validate`] | cycles, dangling links, missing reciprocals |
//! | Calculator | [`kinship`] | shortest path and kinship term |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod adapter;
pub mod graph;
pub mod storage;
pub mod sync;
pub mod validate;
pub mod kinship;
pub mod cancel;
pub mod config;
pub mod export;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{info, warn};

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Direction, Edge, EdgeAttrs, EdgeId, EdgeKind, FieldBag, FieldValue, FuzzyDate, NodeId, ParentRole,
    ParentSide, ParentSlot, PersonNode, RecordId, RelationshipFact, RelationshipFacts, RelationshipPath, Sex,
    SpouseMeta, Step, TypeRegistry,
};

// ============================================================================
// Re-exports: Components
// ============================================================================

pub use adapter::RecordAdapter;
pub use cancel::CancellationToken;
pub use config::EngineConfig;
pub use graph::{EdgeFilter, GraphSnapshot, RoleFilter};
pub use kinship::{Calculator, CalculatorConfig, Kinship, Relation, RelationshipResult};
pub use storage::{ChangeEvent, MemoryStore, RecordStore};
pub use sync::{SyncReport, Synchronizer};
pub use validate::{Finding, Severity};

// ============================================================================
// Top-level engine handle
// ============================================================================

/// The primary entry point. Wraps a record store, keeps the parsed fact
/// sets of every record, and publishes graph snapshots.
///
/// Readers take an `Arc` of the current snapshot and keep it as long as
/// they like; a rebuild computes a new snapshot and swaps it in whole.
pub struct FamilyGraph<S: RecordStore> {
    store: Arc<S>,
    adapter: RecordAdapter,
    config: EngineConfig,
    sync: Synchronizer<S>,
    facts: RwLock<BTreeMap<RecordId, RelationshipFacts>>,
    snapshot: RwLock<Arc<GraphSnapshot>>,
    version: AtomicU64,
}

impl<S: RecordStore> FamilyGraph<S> {
    /// Create an empty engine over `store`. Call [`load`](Self::load) to read it.
    pub fn new(store: Arc<S>, config: EngineConfig) -> Result<Self> {
        let adapter = config.adapter()?;
        Ok(Self {
            sync: Synchronizer::new(store.clone(), adapter.clone()),
            store,
            adapter,
            config,
            facts: RwLock::new(BTreeMap::new()),
            snapshot: RwLock::new(Arc::new(GraphSnapshot::new(0))),
            version: AtomicU64::new(0),
        })
    }

    /// Create an engine and load every record.
    pub async fn open(store: Arc<S>, config: EngineConfig) -> Result<Self> {
        let graph = Self::new(store, config)?;
        graph.load(&CancellationToken::new()).await?;
        Ok(graph)
    }

    /// Re-read every record from the store and rebuild.
    ///
    /// A record that fails to parse is left out and logged; the rest load.
    /// Facts added with [`load_facts`](Self::load_facts) are replaced by
    /// the store's content.
    pub async fn load(&self, cancel: &CancellationToken) -> Result<Arc<GraphSnapshot>> {
        let mut parsed = BTreeMap::new();
        for (id, bag) in self.store.list().await? {
            cancel.check()?;
            match self.adapter.parse(&bag) {
                Ok(facts) => {
                    parsed.insert(facts.id.clone(), facts);
                }
                Err(e) => warn!(record = %id, error = %e, "record skipped"),
            }
        }
        info!(records = parsed.len(), "loaded records");
        self.sync.observed(parsed.values());
        *self.facts.write() = parsed;
        self.rebuild(cancel)
    }

    /// Bulk load pre-normalized facts, bypassing the adapter. Entries
    /// replace any cached facts with the same id.
    pub fn load_facts(
        &self,
        batch: impl IntoIterator<Item = RelationshipFacts>,
        cancel: &CancellationToken,
    ) -> Result<Arc<GraphSnapshot>> {
        {
            let mut facts = self.facts.write();
            for f in batch {
                facts.insert(f.id.clone(), f);
            }
        }
        self.rebuild(cancel)
    }

    /// Build a snapshot from the cached facts and publish it.
    ///
    /// A cancelled build publishes nothing. If a newer rebuild finished
    /// first, this one is discarded and the newer snapshot returned.
    pub fn rebuild(&self, cancel: &CancellationToken) -> Result<Arc<GraphSnapshot>> {
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        let records: Vec<RelationshipFacts> = self.facts.read().values().cloned().collect();
        let next = Arc::new(GraphSnapshot::from_facts(&records, self.adapter.registry(), version, cancel)?);

        let mut current = self.snapshot.write();
        if current.version() > version {
            return Ok(current.clone());
        }
        *current = next.clone();
        info!(version, nodes = next.node_count(), edges = next.edge_count(), "published snapshot");
        Ok(next)
    }

    /// The current published snapshot.
    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        self.snapshot.read().clone()
    }

    /// Synchronize reciprocals for one change, refresh every record the
    /// pass touched, and publish a new snapshot.
    pub async fn handle_change(&self, event: &ChangeEvent) -> Result<SyncReport> {
        let report = self.sync.on_change(event).await?;
        self.refresh(&report).await?;
        Ok(report)
    }

    /// Write any reciprocal a record's current facts are missing.
    pub async fn reconcile(&self, id: &RecordId) -> Result<SyncReport> {
        let report = self.sync.reconcile(id).await?;
        self.refresh(&report).await?;
        Ok(report)
    }

    async fn refresh(&self, report: &SyncReport) -> Result<()> {
        let ids: Vec<RecordId> = std::iter::once(&report.source).chain(report.touched()).cloned().collect();
        for id in ids {
            let Some(bag) = self.store.read(&id).await? else {
                self.facts.write().remove(&id);
                continue;
            };
            match self.adapter.parse(&bag) {
                Ok(f) => {
                    self.facts.write().insert(id, f);
                }
                Err(e) => warn!(record = %id, error = %e, "kept previous facts"),
            }
        }
        self.rebuild(&CancellationToken::new())?;
        Ok(())
    }

    /// Run the validator over the current snapshot.
    pub fn validate(&self, cancel: &CancellationToken) -> Result<Vec<Finding>> {
        validate::validate(&self.snapshot(), cancel)
    }

    /// What `b` is to `a`, using the configured calculator settings.
    pub fn relationship_between(&self, a: &str, b: &str) -> Result<Relation> {
        let snapshot = self.snapshot();
        Calculator::new(&snapshot, &self.config.calculator).relationship_between(a, b)
    }

    /// Cached facts of one record.
    pub fn facts(&self, id: &str) -> Option<RelationshipFacts> {
        self.facts.read().get(id).cloned()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Record has no stable identifier (cr_id)")]
    MissingIdentifier,

    #[error("Store error: {0}")]
    Store(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
