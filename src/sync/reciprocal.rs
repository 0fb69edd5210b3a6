//! Reciprocal facts and how they are applied to a target record.
//!
//! | Fact on source | Reciprocal on target |
//! |----------------|----------------------|
//! | `Parent(role)` → P | `Child(role)` on P |
//! | `Child(role)` → C | `Parent(role)` on C, side from the source's sex |
//! | `Spouse` → S | `Spouse` on S, same metadata |
//! | `Sibling` → S | `Sibling` on S |
//! | `Custom(t)` → T | `Custom(inverse(t))` on T, same metadata |

use crate::model::*;

/// Where a reciprocal goes and what it says.
#[derive(Debug, Clone, PartialEq)]
pub struct Reciprocal {
    pub target: RecordId,
    pub fact: RelationshipFact,
}

/// Why a fact has no reciprocal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoReciprocal {
    /// Placeholders name nobody.
    Placeholder,
    UnknownType(String),
}

/// The reciprocal of `fact` declared on `source`.
pub fn reciprocal(
    source: &RelationshipFacts,
    fact: &RelationshipFact,
    registry: &TypeRegistry,
) -> Result<Reciprocal, NoReciprocal> {
    let me = source.id.clone();
    let (target, fact) = match fact {
        RelationshipFact::Parent { role, slot: ParentSlot::Known(parent), .. } => {
            (parent.clone(), RelationshipFact::child(*role, me))
        }
        RelationshipFact::Parent { .. } => return Err(NoReciprocal::Placeholder),
        RelationshipFact::Child { role, child } => {
            let side = match source.sex {
                Sex::Male => ParentSide::Father,
                Sex::Female => ParentSide::Mother,
                Sex::Unknown => ParentSide::Unspecified,
            };
            (child.clone(), RelationshipFact::parent(*role, side, me))
        }
        RelationshipFact::Spouse { spouse, meta } => (spouse.clone(), RelationshipFact::spouse(me, meta.clone())),
        RelationshipFact::Sibling { sibling } => (sibling.clone(), RelationshipFact::sibling(me)),
        RelationshipFact::Custom { type_id, target, meta } => {
            let inverse = registry
                .inverse_of(type_id)
                .ok_or_else(|| NoReciprocal::UnknownType(type_id.clone()))?;
            (target.clone(), RelationshipFact::custom(inverse, me, meta.clone()))
        }
    };
    Ok(Reciprocal { target, fact })
}

// ============================================================================
// Applying to a target
// ============================================================================

/// One pending change to a target record.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Make sure `fact` holds. `before` is the source's previous version
    /// of the fact when only its metadata changed.
    Ensure { fact: RelationshipFact, before: Option<RelationshipFact> },
    /// Drop `fact` from the target, provided the target holds it as a
    /// plain mirror and not with metadata of its own.
    Remove { fact: RelationshipFact },
}

impl Update {
    pub fn key(&self) -> FactKey {
        match self {
            Update::Ensure { fact, .. } | Update::Remove { fact } => fact.key(),
        }
    }

    pub fn fact(&self) -> &RelationshipFact {
        match self {
            Update::Ensure { fact, .. } | Update::Remove { fact } => fact,
        }
    }
}

/// Which endpoint's value a contested sub-field ended up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    /// The triggering edit overwrote the target.
    Source,
    /// The target edited the sub-field after it was last seen; its
    /// value stays and its own change event carries it back.
    Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldConflict {
    pub field: &'static str,
    pub winner: Winner,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Inserted,
    /// Existing fact's metadata merged. `changed` is false when every
    /// differing sub-field was kept as the target had it.
    Merged { changed: bool, conflicts: Vec<FieldConflict> },
    Removed,
    /// The target declares the fact with metadata of its own.
    Retained,
    Unchanged,
}

/// Apply one update to a target's fact set.
///
/// `seen` is the target's version of the fact as the synchronizer last
/// observed it, if ever. A sub-field that moved away from it since is a
/// pending edit on the target and is not overwritten.
pub fn apply(target: &mut RelationshipFacts, update: &Update, seen: Option<&RelationshipFact>) -> Applied {
    match update {
        Update::Remove { fact } => {
            let key = fact.key();
            match target.find(&key).map(|held| held.metadata_differs(fact)) {
                None => Applied::Unchanged,
                Some(true) => Applied::Retained,
                Some(false) => {
                    target.facts.retain(|f| f.key() != key);
                    Applied::Removed
                }
            }
        }
        Update::Ensure { fact, before } => {
            let key = fact.key();
            let Some(pos) = target.facts.iter().position(|f| f.key() == key) else {
                // An identified parent replaces the placeholder in its slot.
                if let RelationshipFact::Parent { role, side, slot: ParentSlot::Known(_) } = fact {
                    let slot_key = FactKey::Placeholder { role: *role, side: *side };
                    target.facts.retain(|f| f.key() != slot_key);
                }
                target.facts.push(fact.clone());
                return Applied::Inserted;
            };
            let mut conflicts = Vec::new();
            let existing = &mut target.facts[pos];
            let changed = match (existing, fact) {
                (RelationshipFact::Spouse { meta: have, .. }, RelationshipFact::Spouse { meta: want, .. }) => {
                    let old = match before {
                        Some(RelationshipFact::Spouse { meta, .. }) => meta.clone(),
                        _ => SpouseMeta::default(),
                    };
                    let seen = match seen {
                        Some(RelationshipFact::Spouse { meta, .. }) => Some(meta),
                        _ => None,
                    };
                    mirror_spouse(have, seen, &old, want, &mut conflicts)
                }
                (RelationshipFact::Custom { meta: have, .. }, RelationshipFact::Custom { meta: want, .. }) => {
                    let old = match before {
                        Some(RelationshipFact::Custom { meta, .. }) => meta.clone(),
                        _ => CustomMeta::default(),
                    };
                    let seen = match seen {
                        Some(RelationshipFact::Custom { meta, .. }) => Some(meta),
                        _ => None,
                    };
                    mirror_custom(have, seen, &old, want, &mut conflicts)
                }
                _ => false,
            };
            if changed || !conflicts.is_empty() {
                Applied::Merged { changed, conflicts }
            } else {
                Applied::Unchanged
            }
        }
    }
}

/// Copy every sub-field the source changed (`old` → `new`) onto the
/// target. A target value that differs from what was last seen there
/// is newer than this edit and stays. Otherwise the source's edit wins,
/// and a differing non-empty target value is reported.
macro_rules! mirror {
    ($have:expr, $seen:expr, $old:expr, $new:expr, $conflicts:expr, $($field:ident => $name:literal),+ $(,)?) => {{
        let mut changed = false;
        $(
            if $old.$field != $new.$field && $have.$field != $new.$field {
                if $seen.is_some_and(|s| s.$field != $have.$field) {
                    $conflicts.push(FieldConflict { field: $name, winner: Winner::Target });
                } else {
                    if $have.$field.is_some() && $new.$field.is_some() {
                        $conflicts.push(FieldConflict { field: $name, winner: Winner::Source });
                    }
                    $have.$field = $new.$field.clone();
                    changed = true;
                }
            }
        )+
        changed
    }};
}

fn mirror_spouse(
    have: &mut SpouseMeta,
    seen: Option<&SpouseMeta>,
    old: &SpouseMeta,
    new: &SpouseMeta,
    conflicts: &mut Vec<FieldConflict>,
) -> bool {
    mirror!(have, seen, old, new, conflicts,
        marriage => "marriage_date",
        divorce => "divorce_date",
        status => "status",
        order => "order",
        location => "location",
    )
}

fn mirror_custom(
    have: &mut CustomMeta,
    seen: Option<&CustomMeta>,
    old: &CustomMeta,
    new: &CustomMeta,
    conflicts: &mut Vec<FieldConflict>,
) -> bool {
    mirror!(have, seen, old, new, conflicts,
        from => "from",
        to => "to",
        notes => "notes",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reciprocal_table() {
        let registry = TypeRegistry::builtin();
        let dad = RelationshipFacts::new("dad").with_sex(Sex::Male);

        let r = reciprocal(&dad, &RelationshipFact::child(ParentRole::Adoptive, "kid"), &registry).unwrap();
        assert_eq!(r.target.as_str(), "kid");
        assert_eq!(r.fact, RelationshipFact::parent(ParentRole::Adoptive, ParentSide::Father, "dad"));

        let r = reciprocal(&dad, &RelationshipFact::custom("mentor", "pupil", CustomMeta::default()), &registry).unwrap();
        assert_eq!(r.fact, RelationshipFact::custom("disciple", "dad", CustomMeta::default()));

        let r = reciprocal(&dad, &RelationshipFact::custom("friend", "pal", CustomMeta::default()), &registry).unwrap();
        assert_eq!(r.fact.key(), FactKey::Custom { type_id: "friend".into(), target: "dad".into() });

        assert_eq!(
            reciprocal(&dad, &RelationshipFact::custom("nemesis", "x", CustomMeta::default()), &registry),
            Err(NoReciprocal::UnknownType("nemesis".into()))
        );
    }

    #[test]
    fn test_known_parent_replaces_placeholder() {
        let mut kid = RelationshipFacts::new("kid").with_fact(RelationshipFact::Parent {
            role: ParentRole::Biological,
            side: ParentSide::Father,
            slot: ParentSlot::UnknownButExists,
        });
        let update = Update::Ensure {
            fact: RelationshipFact::parent(ParentRole::Biological, ParentSide::Father, "dad"),
            before: None,
        };
        assert_eq!(apply(&mut kid, &update, None), Applied::Inserted);
        assert_eq!(kid.facts.len(), 1);
        assert_eq!(apply(&mut kid, &update, None), Applied::Unchanged);
    }

    #[test]
    fn test_metadata_last_write_wins() {
        let mut b = RelationshipFacts::new("b").with_fact(RelationshipFact::spouse("a", SpouseMeta {
            marriage: FuzzyDate::parse("1900"),
            location: Some("York".into()),
            ..SpouseMeta::default()
        }));
        let incoming = RelationshipFact::spouse("a", SpouseMeta {
            marriage: FuzzyDate::parse("1901"),
            ..SpouseMeta::default()
        });

        let applied = apply(&mut b, &Update::Ensure { fact: incoming, before: None }, None);
        assert_eq!(applied, Applied::Merged {
            changed: true,
            conflicts: vec![FieldConflict { field: "marriage_date", winner: Winner::Source }],
        });
        let RelationshipFact::Spouse { meta, .. } = &b.facts[0] else { panic!("expected spouse") };
        assert_eq!(meta.marriage, FuzzyDate::parse("1901"));
        // Existence and untouched sub-fields are kept.
        assert_eq!(meta.location.as_deref(), Some("York"));
    }

    #[test]
    fn test_cleared_subfield_is_mirrored() {
        let dated = SpouseMeta { divorce: FuzzyDate::parse("1920"), ..SpouseMeta::default() };
        let mut b = RelationshipFacts::new("b").with_fact(RelationshipFact::spouse("a", dated.clone()));
        let update = Update::Ensure {
            fact: RelationshipFact::spouse("a", SpouseMeta::default()),
            before: Some(RelationshipFact::spouse("b", dated)),
        };
        assert_eq!(apply(&mut b, &update, None), Applied::Merged { changed: true, conflicts: vec![] });
        assert_eq!(b.facts[0], RelationshipFact::spouse("a", SpouseMeta::default()));
    }

    #[test]
    fn test_target_edit_since_last_seen_is_kept() {
        let married = |year: &str| SpouseMeta { marriage: FuzzyDate::parse(year), ..SpouseMeta::default() };
        let seen = RelationshipFact::spouse("a", married("1899"));
        let mut b = RelationshipFacts::new("b").with_fact(RelationshipFact::spouse("a", married("1901")));
        let update = Update::Ensure {
            fact: RelationshipFact::spouse("a", married("1900")),
            before: Some(RelationshipFact::spouse("b", married("1899"))),
        };

        let applied = apply(&mut b, &update, Some(&seen));
        assert_eq!(applied, Applied::Merged {
            changed: false,
            conflicts: vec![FieldConflict { field: "marriage_date", winner: Winner::Target }],
        });
        assert_eq!(b.facts[0], RelationshipFact::spouse("a", married("1901")));

        // Once the target's value is the one last seen, the edit applies.
        let seen = RelationshipFact::spouse("a", married("1901"));
        assert!(matches!(apply(&mut b, &update, Some(&seen)), Applied::Merged { changed: true, .. }));
        assert_eq!(b.facts[0], RelationshipFact::spouse("a", married("1900")));
    }

    #[test]
    fn test_remove_keeps_reciprocal_with_own_metadata() {
        let dated = SpouseMeta { marriage: FuzzyDate::parse("1910"), ..SpouseMeta::default() };
        let mut c = RelationshipFacts::new("c")
            .with_fact(RelationshipFact::spouse("a", dated))
            .with_fact(RelationshipFact::sibling("a"));

        let spouse = Update::Remove { fact: RelationshipFact::spouse("a", SpouseMeta::default()) };
        assert_eq!(apply(&mut c, &spouse, None), Applied::Retained);
        let sibling = Update::Remove { fact: RelationshipFact::sibling("a") };
        assert_eq!(apply(&mut c, &sibling, None), Applied::Removed);
        assert_eq!(apply(&mut c, &sibling, None), Applied::Unchanged);
        assert_eq!(c.facts.len(), 1);
    }
}
