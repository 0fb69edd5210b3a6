//! Inverse of parsing: a fact set back to canonical relationship fields.
//!
//! The output holds every relationship-bearing key, with cleared ones as
//! null, so a store can replace exactly those keys and leave the rest of
//! the record alone. Legacy shapes are migrated (`spouse` → `spouses`).

use std::collections::BTreeMap;

use crate::model::*;

use super::link::format_link;
use super::schema::{self, RESEARCHING_SUFFIX};

const UNKNOWN: &str = "unknown";

/// Render the relationship fields of `facts`.
pub fn render(facts: &RelationshipFacts) -> FieldBag {
    let mut bag: FieldBag = schema::relationship_fields()
        .into_iter()
        .map(|k| (k, FieldValue::Null))
        .collect();
    let mut lists: BTreeMap<&'static str, Vec<FieldValue>> = BTreeMap::new();

    for fact in facts.distinct_facts() {
        match fact {
            RelationshipFact::Parent { role, side, slot } => {
                let rf = schema::role_fields(*role);
                let single = match side {
                    ParentSide::Father => rf.father,
                    ParentSide::Mother => rf.mother,
                    ParentSide::Unspecified => None,
                };
                match single {
                    Some(field) if bag.get(field).is_some_and(FieldValue::is_null) => match slot {
                        ParentSlot::Known(id) => {
                            bag.insert(field.to_owned(), format_link(id).into());
                        }
                        ParentSlot::UnknownButExists => {
                            bag.insert(field.to_owned(), UNKNOWN.into());
                        }
                        ParentSlot::NotResearched => {
                            bag.insert(format!("{field}{RESEARCHING_SUFFIX}"), true.into());
                        }
                    },
                    // Ungendered, or a second value for an occupied slot.
                    _ => match slot {
                        ParentSlot::Known(id) => lists.entry(rf.list).or_default().push(format_link(id).into()),
                        ParentSlot::UnknownButExists => lists.entry(rf.list).or_default().push(UNKNOWN.into()),
                        ParentSlot::NotResearched => {
                            bag.insert(format!("{}{RESEARCHING_SUFFIX}", rf.list), true.into());
                        }
                    },
                }
            }
            RelationshipFact::Child { role, child } => {
                let field = schema::role_fields(*role).children;
                lists.entry(field).or_default().push(format_link(child).into());
            }
            RelationshipFact::Spouse { spouse, meta } => {
                lists.entry(schema::SPOUSES).or_default().push(spouse_value(spouse, meta));
            }
            RelationshipFact::Sibling { sibling } => {
                lists.entry(schema::SIBLINGS).or_default().push(format_link(sibling).into());
            }
            RelationshipFact::Custom { type_id, target, meta } => {
                lists.entry(schema::RELATIONSHIPS).or_default().push(custom_value(type_id, target, meta));
            }
        }
    }

    for (field, values) in lists {
        // A researching flag on a list that now has entries is stale.
        if values.iter().any(|v| v.as_str() != Some(UNKNOWN)) {
            bag.insert(format!("{field}{RESEARCHING_SUFFIX}"), FieldValue::Null);
        }
        bag.insert(field.to_owned(), FieldValue::List(values));
    }
    bag.retain(|k, _| schema::is_relationship_field(k));
    bag
}

fn spouse_value(spouse: &RecordId, meta: &SpouseMeta) -> FieldValue {
    if meta.is_empty() {
        return format_link(spouse).into();
    }
    let mut map = BTreeMap::new();
    map.insert("id".to_owned(), format_link(spouse).into());
    if let Some(d) = &meta.marriage {
        map.insert("marriage_date".to_owned(), d.text.clone().into());
    }
    if let Some(d) = &meta.divorce {
        map.insert("divorce_date".to_owned(), d.text.clone().into());
    }
    if let Some(s) = meta.status {
        map.insert("status".to_owned(), s.as_str().into());
    }
    if let Some(o) = meta.order {
        map.insert("order".to_owned(), o.into());
    }
    if let Some(l) = &meta.location {
        map.insert("location".to_owned(), l.clone().into());
    }
    FieldValue::Map(map)
}

fn custom_value(type_id: &str, target: &RecordId, meta: &CustomMeta) -> FieldValue {
    let mut map = BTreeMap::new();
    map.insert("type".to_owned(), type_id.into());
    map.insert("target".to_owned(), format_link(target).into());
    if let Some(d) = &meta.from {
        map.insert("from".to_owned(), d.text.clone().into());
    }
    if let Some(d) = &meta.to {
        map.insert("to".to_owned(), d.text.clone().into());
    }
    if let Some(n) = &meta.notes {
        map.insert("notes".to_owned(), n.clone().into());
    }
    FieldValue::Map(map)
}
