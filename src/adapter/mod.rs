//! # Record Adapter
//!
//! Converts one record's field bag into [`RelationshipFacts`] and back.
//!
//! Parsing is forgiving: a malformed entry becomes a [`ParseWarning`]
//! attached to the fact set and the rest of the record still loads. The
//! only hard failure is a record without a stable identifier.
//!
//! Accepted shapes:
//!
//! | Field | Shapes |
//! |-------|--------|
//! | parent slots (`father`, `mother`, ...) | link, `unknown` sentinel, blank, one-element list |
//! | lists (`parents`, `children`, `siblings`, ...) | link or list of links |
//! | `spouse` (legacy) | link or list of links |
//! | `spouses` | list of links or `{id, marriage_date, divorce_date, status, order, location}` |
//! | `relationships` | list of `{type, target, from, to, notes}` |

pub mod link;
pub mod render;
pub mod schema;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::model::*;
use crate::{Error, Result};

use self::link::parse_link;
use self::schema::RoleFields;

pub use self::render::render;

/// Default spellings of the "parent exists but is unidentified" sentinel.
pub const DEFAULT_UNKNOWN_SENTINELS: &[&str] = &["unknown", "?", "[[unknown]]"];

/// Parses records against a relationship type registry.
#[derive(Debug, Clone)]
pub struct RecordAdapter {
    registry: Arc<TypeRegistry>,
    sentinels: Vec<String>,
}

impl Default for RecordAdapter {
    fn default() -> Self {
        Self::new(Arc::new(TypeRegistry::builtin()))
    }
}

impl RecordAdapter {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            sentinels: DEFAULT_UNKNOWN_SENTINELS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_sentinels(mut self, sentinels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.sentinels = sentinels.into_iter().map(|s| s.into().to_ascii_lowercase()).collect();
        self
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Parse one record.
    pub fn parse(&self, bag: &FieldBag) -> Result<RelationshipFacts> {
        let id = bag
            .get(schema::ID)
            .and_then(FieldValue::to_text)
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .ok_or(Error::MissingIdentifier)?;

        let mut cx = ParseCx {
            adapter: self,
            bag,
            out: RelationshipFacts::new(id),
        };
        cx.node_fields();
        for rf in &schema::ROLE_FIELDS {
            cx.role(rf);
        }
        cx.spouses();
        cx.links(schema::SIBLINGS, |id| RelationshipFact::Sibling { sibling: id });
        cx.custom_relationships();
        cx.drop_self_references();

        let out = cx.out;
        for w in &out.warnings {
            warn!(record = %w.record, field = %w.field, "{}", w.kind);
        }
        debug!(record = %out.id, facts = out.facts.len(), warnings = out.warnings.len(), "parsed record");
        Ok(out)
    }

    /// Canonical relationship fields for a fact set.
    pub fn render(&self, facts: &RelationshipFacts) -> FieldBag {
        render(facts)
    }

    fn is_sentinel(&self, text: &str) -> bool {
        let t = text.trim().to_ascii_lowercase();
        self.sentinels.iter().any(|s| *s == t)
    }
}

// ============================================================================
// Parse context
// ============================================================================

struct ParseCx<'a> {
    adapter: &'a RecordAdapter,
    bag: &'a FieldBag,
    out: RelationshipFacts,
}

impl ParseCx<'_> {
    fn warn(&mut self, field: &str, kind: WarningKind) {
        self.out.warnings.push(ParseWarning {
            record: self.out.id.clone(),
            field: field.to_owned(),
            kind,
        });
    }

    fn shape(&mut self, field: &str, expected: &str, found: &FieldValue) {
        self.warn(field, WarningKind::UnexpectedShape {
            expected: expected.to_owned(),
            found: found.type_name().to_owned(),
        });
    }

    fn first_text(&self, fields: &[&str]) -> Option<(String, String)> {
        fields.iter().find_map(|f| {
            let text = self.bag.get(*f)?.to_text()?;
            (!text.trim().is_empty()).then(|| (f.to_string(), text))
        })
    }

    fn date(&mut self, field: &str, text: &str) -> Option<FuzzyDate> {
        let date = FuzzyDate::parse(text);
        if date.is_none() {
            self.warn(field, WarningKind::InvalidDate(text.to_owned()));
        }
        date
    }

    fn node_fields(&mut self) {
        self.out.name = self.bag.get(schema::NAME).and_then(FieldValue::to_text);
        self.out.kind = match self.bag.get(schema::TYPE).and_then(FieldValue::as_str) {
            Some(t) if matches!(t.trim().to_ascii_lowercase().as_str(), "organization" | "organisation" | "org") => {
                EntityKind::Organization
            }
            _ => EntityKind::Person,
        };
        self.out.sex = self.first_text(schema::SEX).map(|(_, s)| Sex::parse(&s)).unwrap_or_default();
        if let Some((field, text)) = self.first_text(schema::BORN) {
            self.out.birth = self.date(&field, &text);
        }
        if let Some((field, text)) = self.first_text(schema::DIED) {
            self.out.death = self.date(&field, &text);
        }
        self.out.is_root = self.bag.get(schema::ROOT).is_some_and(FieldValue::is_truthy);
    }

    fn researching(&self, field: &str) -> bool {
        let flag = self.bag.get(&format!("{field}{}", schema::RESEARCHING_SUFFIX));
        if flag.is_some_and(FieldValue::is_truthy) {
            return true;
        }
        match self.bag.get(schema::RESEARCHING) {
            Some(FieldValue::List(items)) => items.iter().any(|v| v.as_str() == Some(field)),
            Some(FieldValue::String(s)) => s.split(',').any(|f| f.trim() == field),
            _ => false,
        }
    }

    /// Classify one slot entry: sentinel, link, or broken.
    fn slot_entry(&mut self, field: &str, text: &str) -> Option<ParentSlot> {
        if self.adapter.is_sentinel(text) {
            return Some(ParentSlot::UnknownButExists);
        }
        match parse_link(text) {
            Ok(Some(id)) => Some(ParentSlot::Known(id)),
            Ok(None) => Some(ParentSlot::NotResearched),
            Err(kind) => {
                self.warn(field, kind);
                None
            }
        }
    }

    fn push_parent(&mut self, role: ParentRole, side: ParentSide, slot: ParentSlot) {
        self.out.facts.push(RelationshipFact::Parent { role, side, slot });
    }

    fn parent_slot(&mut self, field: &'static str, role: ParentRole, side: ParentSide) {
        let bag = self.bag;
        let researching = self.researching(field);
        let slot = match bag.get(field) {
            // Null is a cleared key, same as absent.
            None | Some(FieldValue::Null) => researching.then_some(ParentSlot::NotResearched),
            Some(v) if v.is_blank() => Some(ParentSlot::NotResearched),
            Some(FieldValue::String(s)) => self.slot_entry(field, s),
            Some(FieldValue::List(items)) if items.len() == 1 => match items[0].as_str() {
                Some(s) => self.slot_entry(field, s),
                None => {
                    self.shape(field, "link", &items[0]);
                    None
                }
            },
            Some(other) => {
                self.shape(field, "single link", other);
                None
            }
        };
        if let Some(slot) = slot {
            self.push_parent(role, side, slot);
        }
    }

    fn role(&mut self, rf: &RoleFields) {
        if let Some(f) = rf.father {
            self.parent_slot(f, rf.role, ParentSide::Father);
        }
        if let Some(f) = rf.mother {
            self.parent_slot(f, rf.role, ParentSide::Mother);
        }

        let list = rf.list;
        let researching = self.researching(list);
        let entries = self.texts(list);
        if entries.is_empty() && (researching || self.bag.get(list).is_some_and(|v| !v.is_null() && v.is_blank())) {
            self.push_parent(rf.role, ParentSide::Unspecified, ParentSlot::NotResearched);
        }
        for text in entries {
            match self.slot_entry(list, &text) {
                Some(ParentSlot::NotResearched) | None => {}
                Some(slot) => self.push_parent(rf.role, ParentSide::Unspecified, slot),
            }
        }

        let role = rf.role;
        self.links(rf.children, |child| RelationshipFact::Child { role, child });
    }

    /// String entries of a link-or-list field; other shapes are warned about.
    fn texts(&mut self, field: &str) -> Vec<String> {
        let bag = self.bag;
        let Some(value) = bag.get(field) else { return Vec::new() };
        match value {
            v if v.is_blank() => Vec::new(),
            FieldValue::String(s) => vec![s.clone()],
            FieldValue::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_str() {
                        Some(s) if s.trim().is_empty() => {}
                        Some(s) => out.push(s.to_owned()),
                        None if item.is_null() => {}
                        None => self.shape(field, "link", item),
                    }
                }
                out
            }
            other => {
                self.shape(field, "link or list of links", other);
                Vec::new()
            }
        }
    }

    fn links(&mut self, field: &str, make: impl Fn(RecordId) -> RelationshipFact) {
        for text in self.texts(field) {
            match parse_link(&text) {
                Ok(Some(id)) => self.out.facts.push(make(id)),
                Ok(None) => {}
                Err(kind) => self.warn(field, kind),
            }
        }
    }

    // ------------------------------------------------------------------------
    // Spouses
    // ------------------------------------------------------------------------

    fn spouses(&mut self) {
        let bag = self.bag;
        let mut found: Vec<(RecordId, SpouseMeta)> = Vec::new();

        match bag.get(schema::SPOUSES) {
            None | Some(FieldValue::Null) => {}
            Some(FieldValue::List(items)) => {
                for item in items {
                    if let Some(entry) = self.spouse_entry(schema::SPOUSES, item) {
                        found.push(entry);
                    }
                }
            }
            Some(single) => {
                if let Some(entry) = self.spouse_entry(schema::SPOUSES, single) {
                    found.push(entry);
                }
            }
        }

        // Legacy `spouse`: same fact shape; a spouse already listed under
        // `spouses` is the same marriage, not a second declaration.
        let legacy: Vec<(RecordId, SpouseMeta)> = match bag.get(schema::SPOUSE_LEGACY) {
            None | Some(FieldValue::Null) => Vec::new(),
            Some(FieldValue::List(items)) => items
                .iter()
                .filter_map(|item| self.spouse_entry(schema::SPOUSE_LEGACY, item))
                .collect(),
            Some(single) => self.spouse_entry(schema::SPOUSE_LEGACY, single).into_iter().collect(),
        };
        for (id, meta) in legacy {
            match found.iter_mut().find(|(existing, _)| *existing == id) {
                Some((_, existing)) => *existing = meta.overlay(existing),
                None => found.push((id, meta)),
            }
        }

        for (spouse, meta) in found {
            self.out.facts.push(RelationshipFact::Spouse { spouse, meta });
        }
    }

    fn spouse_entry(&mut self, field: &str, value: &FieldValue) -> Option<(RecordId, SpouseMeta)> {
        match value {
            FieldValue::String(s) => match parse_link(s) {
                Ok(Some(id)) => Some((id, SpouseMeta::default())),
                Ok(None) => None,
                Err(kind) => {
                    self.warn(field, kind);
                    None
                }
            },
            FieldValue::Map(map) => self.spouse_object(field, map),
            FieldValue::Null => None,
            other => {
                self.shape(field, "link or spouse object", other);
                None
            }
        }
    }

    fn spouse_object(&mut self, field: &str, map: &BTreeMap<String, FieldValue>) -> Option<(RecordId, SpouseMeta)> {
        let id = self.object_target(field, map, &["id", "target", "link", "spouse"])?;
        let mut meta = SpouseMeta::default();

        if let Some(text) = text_of(map, &["marriage_date", "married"]) {
            meta.marriage = self.date(field, &text);
        }
        if let Some(text) = text_of(map, &["divorce_date", "divorced"]) {
            meta.divorce = self.date(field, &text);
        }
        if let Some(text) = text_of(map, &["status"]) {
            meta.status = SpouseStatus::parse(&text);
            if meta.status.is_none() {
                self.warn(field, WarningKind::UnexpectedShape {
                    expected: "current|divorced|widowed|separated".into(),
                    found: text,
                });
            }
        }
        if let Some(v) = map.get("order") {
            meta.order = v.as_int().and_then(|i| u32::try_from(i).ok());
            if meta.order.is_none() && !v.is_null() {
                self.shape(field, "positive integer order", v);
            }
        }
        meta.location = text_of(map, &["location", "place"]);
        Some((id, meta))
    }

    fn object_target(&mut self, field: &str, map: &BTreeMap<String, FieldValue>, keys: &[&str]) -> Option<RecordId> {
        let Some(text) = text_of(map, keys) else {
            self.warn(field, WarningKind::MissingTarget);
            return None;
        };
        match parse_link(&text) {
            Ok(Some(id)) => Some(id),
            Ok(None) => {
                self.warn(field, WarningKind::MissingTarget);
                None
            }
            Err(kind) => {
                self.warn(field, kind);
                None
            }
        }
    }

    // ------------------------------------------------------------------------
    // Custom typed relationships
    // ------------------------------------------------------------------------

    fn custom_relationships(&mut self) {
        let field = schema::RELATIONSHIPS;
        let bag = self.bag;
        let items: &[FieldValue] = match bag.get(field) {
            None | Some(FieldValue::Null) => return,
            Some(FieldValue::List(items)) => items,
            Some(single @ FieldValue::Map(_)) => std::slice::from_ref(single),
            Some(other) => {
                self.shape(field, "list of relationship objects", other);
                return;
            }
        };

        for item in items {
            let Some(map) = item.as_map() else {
                self.shape(field, "relationship object", item);
                continue;
            };
            let Some(type_id) = text_of(map, &["type"]).map(|t| t.trim().to_ascii_lowercase()) else {
                self.warn(field, WarningKind::UnexpectedShape {
                    expected: "relationship type".into(),
                    found: "nothing".into(),
                });
                continue;
            };
            let Some(target) = self.object_target(field, map, &["target", "id", "link"]) else { continue };
            if !self.adapter.registry.contains(&type_id) {
                self.warn(field, WarningKind::UnknownRelationshipType(type_id.clone()));
            }

            let mut meta = CustomMeta::default();
            if let Some(text) = text_of(map, &["from"]) {
                meta.from = self.date(field, &text);
            }
            if let Some(text) = text_of(map, &["to"]) {
                meta.to = self.date(field, &text);
            }
            meta.notes = text_of(map, &["notes"]);
            self.out.facts.push(RelationshipFact::Custom { type_id, target, meta });
        }
    }

    fn drop_self_references(&mut self) {
        let id = self.out.id.clone();
        let mut dropped = Vec::new();
        self.out.facts.retain(|f| {
            let own = f.target() == Some(&id);
            if own {
                dropped.push(schema::field_for(f));
            }
            !own
        });
        for field in dropped {
            self.warn(field, WarningKind::SelfReference);
        }
    }
}

fn text_of(map: &BTreeMap<String, FieldValue>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| map.get(*k).and_then(FieldValue::to_text))
        .filter(|s| !s.trim().is_empty())
}
