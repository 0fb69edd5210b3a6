//! Typed relationship facts: the closed set of statements a record can
//! make about its relatives. Produced once at the adapter boundary; every
//! downstream component works on these, never on raw field bags.

use serde::{Deserialize, Serialize};

use super::{FuzzyDate, RecordId};

// ============================================================================
// Enumerations
// ============================================================================

/// Role-class of a parent-child edge, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentRole {
    Biological,
    Adoptive,
    Step,
    Foster,
    Guardian,
}

impl ParentRole {
    pub const ALL: [ParentRole; 5] = [
        ParentRole::Biological,
        ParentRole::Adoptive,
        ParentRole::Step,
        ParentRole::Foster,
        ParentRole::Guardian,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParentRole::Biological => "biological",
            ParentRole::Adoptive => "adoptive",
            ParentRole::Step => "step",
            ParentRole::Foster => "foster",
            ParentRole::Guardian => "guardian",
        }
    }
}

impl std::fmt::Display for ParentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which slot of a role a parent occupies on the child's record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentSide {
    Father,
    Mother,
    /// Ungendered list field (`parents`, `guardians`, ...).
    Unspecified,
}

/// Normalized state of one parent slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParentSlot {
    Known(RecordId),
    /// The parent is known to exist but is unidentified.
    UnknownButExists,
    /// No data yet, or explicitly flagged as still being researched.
    NotResearched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Sex {
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "m" | "male" | "man" => Sex::Male,
            "f" | "female" | "woman" => Sex::Female,
            _ => Sex::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[default]
    Person,
    Organization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpouseStatus {
    Current,
    Divorced,
    Widowed,
    Separated,
}

impl SpouseStatus {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "current" | "married" => Some(SpouseStatus::Current),
            "divorced" => Some(SpouseStatus::Divorced),
            "widowed" => Some(SpouseStatus::Widowed),
            "separated" => Some(SpouseStatus::Separated),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpouseStatus::Current => "current",
            SpouseStatus::Divorced => "divorced",
            SpouseStatus::Widowed => "widowed",
            SpouseStatus::Separated => "separated",
        }
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Temporal metadata on one side of a marriage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpouseMeta {
    pub marriage: Option<FuzzyDate>,
    pub divorce: Option<FuzzyDate>,
    pub status: Option<SpouseStatus>,
    /// Marriage order (1 = first marriage).
    pub order: Option<u32>,
    pub location: Option<String>,
}

impl SpouseMeta {
    pub fn is_empty(&self) -> bool {
        *self == SpouseMeta::default()
    }

    /// Names of sub-fields set in both and holding different values.
    pub fn conflicts_with(&self, other: &SpouseMeta) -> Vec<&'static str> {
        let mut out = Vec::new();
        if differs(&self.marriage, &other.marriage) { out.push("marriage_date"); }
        if differs(&self.divorce, &other.divorce) { out.push("divorce_date"); }
        if differs(&self.status, &other.status) { out.push("status"); }
        if differs(&self.order, &other.order) { out.push("order"); }
        if differs(&self.location, &other.location) { out.push("location"); }
        out
    }

    /// Sub-fields set in `newer` replace ours; unset ones keep ours.
    pub fn overlay(&self, newer: &SpouseMeta) -> SpouseMeta {
        SpouseMeta {
            marriage: newer.marriage.clone().or_else(|| self.marriage.clone()),
            divorce: newer.divorce.clone().or_else(|| self.divorce.clone()),
            status: newer.status.or(self.status),
            order: newer.order.or(self.order),
            location: newer.location.clone().or_else(|| self.location.clone()),
        }
    }
}

/// Metadata on a custom typed relationship.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CustomMeta {
    pub from: Option<FuzzyDate>,
    pub to: Option<FuzzyDate>,
    pub notes: Option<String>,
}

impl CustomMeta {
    pub fn conflicts_with(&self, other: &CustomMeta) -> Vec<&'static str> {
        let mut out = Vec::new();
        if differs(&self.from, &other.from) { out.push("from"); }
        if differs(&self.to, &other.to) { out.push("to"); }
        if differs(&self.notes, &other.notes) { out.push("notes"); }
        out
    }

    pub fn overlay(&self, newer: &CustomMeta) -> CustomMeta {
        CustomMeta {
            from: newer.from.clone().or_else(|| self.from.clone()),
            to: newer.to.clone().or_else(|| self.to.clone()),
            notes: newer.notes.clone().or_else(|| self.notes.clone()),
        }
    }
}

fn differs<T: PartialEq>(a: &Option<T>, b: &Option<T>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x != y)
}

// ============================================================================
// Facts
// ============================================================================

/// One relationship statement made by a record about another entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "fact", rename_all = "snake_case")]
pub enum RelationshipFact {
    /// "My `side` parent in role `role` is `slot`" (declared on the child).
    Parent { role: ParentRole, side: ParentSide, slot: ParentSlot },
    /// "`child` is my child in role `role`" (declared on the parent).
    Child { role: ParentRole, child: RecordId },
    Spouse { spouse: RecordId, meta: SpouseMeta },
    Sibling { sibling: RecordId },
    Custom { type_id: String, target: RecordId, meta: CustomMeta },
}

/// Identity of a fact for diffing: metadata and slot placement excluded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FactKey {
    Parent { role: ParentRole, parent: RecordId },
    Placeholder { role: ParentRole, side: ParentSide },
    Child { role: ParentRole, child: RecordId },
    Spouse(RecordId),
    Sibling(RecordId),
    Custom { type_id: String, target: RecordId },
}

impl RelationshipFact {
    pub fn parent(role: ParentRole, side: ParentSide, parent: impl Into<RecordId>) -> Self {
        RelationshipFact::Parent { role, side, slot: ParentSlot::Known(parent.into()) }
    }

    pub fn child(role: ParentRole, child: impl Into<RecordId>) -> Self {
        RelationshipFact::Child { role, child: child.into() }
    }

    pub fn spouse(spouse: impl Into<RecordId>, meta: SpouseMeta) -> Self {
        RelationshipFact::Spouse { spouse: spouse.into(), meta }
    }

    pub fn sibling(sibling: impl Into<RecordId>) -> Self {
        RelationshipFact::Sibling { sibling: sibling.into() }
    }

    pub fn custom(type_id: impl Into<String>, target: impl Into<RecordId>, meta: CustomMeta) -> Self {
        RelationshipFact::Custom { type_id: type_id.into(), target: target.into(), meta }
    }

    pub fn key(&self) -> FactKey {
        match self {
            RelationshipFact::Parent { role, side, slot } => match slot {
                ParentSlot::Known(id) => FactKey::Parent { role: *role, parent: id.clone() },
                _ => FactKey::Placeholder { role: *role, side: *side },
            },
            RelationshipFact::Child { role, child } => FactKey::Child { role: *role, child: child.clone() },
            RelationshipFact::Spouse { spouse, .. } => FactKey::Spouse(spouse.clone()),
            RelationshipFact::Sibling { sibling } => FactKey::Sibling(sibling.clone()),
            RelationshipFact::Custom { type_id, target, .. } => FactKey::Custom {
                type_id: type_id.clone(),
                target: target.clone(),
            },
        }
    }

    /// The other entity this fact points at, if it names one.
    pub fn target(&self) -> Option<&RecordId> {
        match self {
            RelationshipFact::Parent { slot: ParentSlot::Known(id), .. } => Some(id),
            RelationshipFact::Parent { .. } => None,
            RelationshipFact::Child { child, .. } => Some(child),
            RelationshipFact::Spouse { spouse, .. } => Some(spouse),
            RelationshipFact::Sibling { sibling } => Some(sibling),
            RelationshipFact::Custom { target, .. } => Some(target),
        }
    }

    /// Same key, but metadata that a reciprocal must mirror differs.
    pub fn metadata_differs(&self, other: &RelationshipFact) -> bool {
        match (self, other) {
            (RelationshipFact::Spouse { meta: a, .. }, RelationshipFact::Spouse { meta: b, .. }) => a != b,
            (RelationshipFact::Custom { meta: a, .. }, RelationshipFact::Custom { meta: b, .. }) => a != b,
            _ => false,
        }
    }
}

// ============================================================================
// Warnings
// ============================================================================

/// What went wrong with one field. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum WarningKind {
    #[error("broken link syntax: {0}")]
    BrokenLink(String),
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("expected {expected}, found {found}")]
    UnexpectedShape { expected: String, found: String },
    #[error("unknown relationship type: {0}")]
    UnknownRelationshipType(String),
    #[error("entry has no target")]
    MissingTarget,
    #[error("record links to itself")]
    SelfReference,
}

/// A recoverable problem found while parsing one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub record: RecordId,
    pub field: String,
    pub kind: WarningKind,
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}: {}", self.record, self.field, self.kind)
    }
}

// ============================================================================
// Fact set for one record
// ============================================================================

/// Everything the adapter learned from one record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RelationshipFacts {
    pub id: RecordId,
    pub name: Option<String>,
    pub kind: EntityKind,
    pub sex: Sex,
    pub birth: Option<FuzzyDate>,
    pub death: Option<FuzzyDate>,
    pub is_root: bool,
    pub facts: Vec<RelationshipFact>,
    pub warnings: Vec<ParseWarning>,
}

impl RelationshipFacts {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self { id: id.into(), ..Self::default() }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_sex(mut self, sex: Sex) -> Self {
        self.sex = sex;
        self
    }

    pub fn with_fact(mut self, fact: RelationshipFact) -> Self {
        self.facts.push(fact);
        self
    }

    pub fn find(&self, key: &FactKey) -> Option<&RelationshipFact> {
        self.facts.iter().find(|f| &f.key() == key)
    }

    pub fn contains(&self, key: &FactKey) -> bool {
        self.find(key).is_some()
    }

    /// Slot state for one parent position; absence reads as not researched.
    pub fn parent_slot(&self, role: ParentRole, side: ParentSide) -> ParentSlot {
        self.facts
            .iter()
            .find_map(|f| match f {
                RelationshipFact::Parent { role: r, side: s, slot } if *r == role && *s == side => Some(slot.clone()),
                _ => None,
            })
            .unwrap_or(ParentSlot::NotResearched)
    }

    /// Known parents in a role, slot order.
    pub fn known_parents(&self, role: ParentRole) -> impl Iterator<Item = &RecordId> {
        self.facts.iter().filter_map(move |f| match f {
            RelationshipFact::Parent { role: r, slot: ParentSlot::Known(id), .. } if *r == role => Some(id),
            _ => None,
        })
    }

    /// The relationship facts with duplicate keys removed (first wins).
    pub fn distinct_facts(&self) -> Vec<&RelationshipFact> {
        let mut seen = hashbrown::HashSet::new();
        self.facts.iter().filter(|f| seen.insert(f.key())).collect()
    }
}
