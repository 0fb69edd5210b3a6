//! Field names of the record schema.
//!
//! Parent relationships follow one pattern per role-class: an optional
//! gendered pair of single-link fields, an ungendered list, and the
//! parent-side list of children.

use crate::model::{ParentRole, ParentSide, RelationshipFact};

pub const ID: &str = "cr_id";
pub const NAME: &str = "name";
pub const TYPE: &str = "cr_type";
pub const SEX: &[&str] = &["sex", "gender"];
pub const BORN: &[&str] = &["born", "birth_date"];
pub const DIED: &[&str] = &["died", "death_date"];
pub const ROOT: &str = "root";

pub const SPOUSE_LEGACY: &str = "spouse";
pub const SPOUSES: &str = "spouses";
pub const SIBLINGS: &str = "siblings";
pub const RELATIONSHIPS: &str = "relationships";
/// List of field names still being researched.
pub const RESEARCHING: &str = "researching";
pub const RESEARCHING_SUFFIX: &str = "_researching";

/// Field names used by one parent role-class.
#[derive(Debug, Clone, Copy)]
pub struct RoleFields {
    pub role: ParentRole,
    pub father: Option<&'static str>,
    pub mother: Option<&'static str>,
    pub list: &'static str,
    pub children: &'static str,
}

impl RoleFields {
    /// Field holding a given side of this role.
    pub fn slot_field(&self, side: ParentSide) -> &'static str {
        match side {
            ParentSide::Father => self.father.unwrap_or(self.list),
            ParentSide::Mother => self.mother.unwrap_or(self.list),
            ParentSide::Unspecified => self.list,
        }
    }

    fn fields(&self) -> impl Iterator<Item = &'static str> {
        [self.father, self.mother, Some(self.list), Some(self.children)].into_iter().flatten()
    }
}

pub static ROLE_FIELDS: [RoleFields; 5] = [
    RoleFields {
        role: ParentRole::Biological,
        father: Some("father"),
        mother: Some("mother"),
        list: "parents",
        children: "children",
    },
    RoleFields {
        role: ParentRole::Adoptive,
        father: Some("adoptive_father"),
        mother: Some("adoptive_mother"),
        list: "adoptive_parents",
        children: "adopted_children",
    },
    RoleFields {
        role: ParentRole::Step,
        father: Some("stepfather"),
        mother: Some("stepmother"),
        list: "step_parents",
        children: "stepchildren",
    },
    RoleFields {
        role: ParentRole::Foster,
        father: Some("foster_father"),
        mother: Some("foster_mother"),
        list: "foster_parents",
        children: "foster_children",
    },
    RoleFields {
        role: ParentRole::Guardian,
        father: None,
        mother: None,
        list: "guardians",
        children: "wards",
    },
];

pub fn role_fields(role: ParentRole) -> &'static RoleFields {
    &ROLE_FIELDS[ParentRole::ALL.iter().position(|r| *r == role).unwrap_or(0)]
}

/// Every key a relationship write replaces, researching flags included.
pub fn relationship_fields() -> Vec<String> {
    let mut out = Vec::new();
    for rf in &ROLE_FIELDS {
        for field in rf.fields() {
            out.push(field.to_owned());
            if field != rf.children {
                out.push(format!("{field}{RESEARCHING_SUFFIX}"));
            }
        }
    }
    for field in [SPOUSE_LEGACY, SPOUSES, SIBLINGS, RELATIONSHIPS] {
        out.push(field.to_owned());
    }
    out
}

pub fn is_relationship_field(key: &str) -> bool {
    relationship_fields().iter().any(|f| f == key)
}

/// The field a fact is written to (and the one to look at when fixing it).
pub fn field_for(fact: &RelationshipFact) -> &'static str {
    match fact {
        RelationshipFact::Parent { role, side, .. } => role_fields(*role).slot_field(*side),
        RelationshipFact::Child { role, .. } => role_fields(*role).children,
        RelationshipFact::Spouse { .. } => SPOUSES,
        RelationshipFact::Sibling { .. } => SIBLINGS,
        RelationshipFact::Custom { .. } => RELATIONSHIPS,
    }
}
