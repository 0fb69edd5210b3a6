//! # Family Graph Model
//!
//! Plain DTOs shared by every component: record values, typed facts,
//! nodes, edges and relationship paths.
//!
//! Design rule: this module is pure data. No I/O, no state, no async.

pub mod node;
pub mod relationship;
pub mod path;
pub mod value;
pub mod date;
pub mod facts;
pub mod types;

pub use node::{NodeId, PersonNode, RecordId};
pub use relationship::{Direction, Edge, EdgeAttrs, EdgeId, EdgeKey, EdgeKind};
pub use path::{PathStep, RelationshipPath, Step};
pub use value::{FieldBag, FieldValue, bag_from_json};
pub use date::{DatePrecision, FuzzyDate};
pub use facts::{
    CustomMeta, EntityKind, FactKey, ParentRole, ParentSide, ParentSlot, ParseWarning,
    RelationshipFact, RelationshipFacts, Sex, SpouseMeta, SpouseStatus, WarningKind,
};
pub use types::{RelationshipTypeDef, TypeRegistry};
