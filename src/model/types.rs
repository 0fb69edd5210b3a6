//! Registry of custom relationship types.
//!
//! A definition is either symmetric (`friend`) or asymmetric with a named
//! inverse (`mentor` ↔ `disciple`). The synchronizer asks the registry
//! which fact a target record must carry to mirror one it was given.
//!
//! Type ids are matched case-insensitively: definitions and lookups are
//! folded to lowercase, the same way the adapter reads a record's `type`.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One custom relationship type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipTypeDef {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub symmetric: bool,
    /// Required when `symmetric` is false.
    #[serde(default)]
    pub inverse: Option<String>,
}

impl RelationshipTypeDef {
    pub fn symmetric(id: &str, label: &str) -> Self {
        Self { id: id.into(), label: label.into(), symmetric: true, inverse: None }
    }

    pub fn asymmetric(id: &str, label: &str, inverse: &str) -> Self {
        Self { id: id.into(), label: label.into(), symmetric: false, inverse: Some(inverse.into()) }
    }
}

/// Lookup table of relationship type definitions, in registration order.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    defs: Vec<RelationshipTypeDef>,
    index: HashMap<String, usize>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The types every installation knows about.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        let defs = [
            RelationshipTypeDef::asymmetric("mentor", "Mentor", "disciple"),
            RelationshipTypeDef::asymmetric("disciple", "Disciple", "mentor"),
            RelationshipTypeDef::asymmetric("godparent", "Godparent", "godchild"),
            RelationshipTypeDef::asymmetric("godchild", "Godchild", "godparent"),
            RelationshipTypeDef::asymmetric("employer", "Employer", "employee"),
            RelationshipTypeDef::asymmetric("employee", "Employee", "employer"),
            RelationshipTypeDef::asymmetric("master", "Master", "apprentice"),
            RelationshipTypeDef::asymmetric("apprentice", "Apprentice", "master"),
            RelationshipTypeDef::asymmetric("member_of", "Member of", "has_member"),
            RelationshipTypeDef::asymmetric("has_member", "Has member", "member_of"),
            RelationshipTypeDef::symmetric("friend", "Friend"),
            RelationshipTypeDef::symmetric("neighbor", "Neighbor"),
            RelationshipTypeDef::symmetric("business_partner", "Business partner"),
        ];
        for def in defs {
            registry.insert(def);
        }
        registry
    }

    /// Register (or replace) a definition.
    pub fn register(&mut self, def: RelationshipTypeDef) -> Result<()> {
        if def.id.trim().is_empty() {
            return Err(Error::Config("relationship type with empty id".into()));
        }
        if !def.symmetric && def.inverse.as_deref().is_none_or(|i| i.trim().is_empty()) {
            return Err(Error::Config(format!(
                "asymmetric relationship type '{}' must name its inverse",
                def.id
            )));
        }
        self.insert(def);
        Ok(())
    }

    fn insert(&mut self, mut def: RelationshipTypeDef) {
        def.id = fold(&def.id);
        def.inverse = def.inverse.as_deref().map(fold);
        match self.index.get(&def.id) {
            Some(&i) => self.defs[i] = def,
            None => {
                self.index.insert(def.id.clone(), self.defs.len());
                self.defs.push(def);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&RelationshipTypeDef> {
        self.index.get(fold(id).as_str()).map(|&i| &self.defs[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// The type a reciprocal fact must carry. Symmetric types are their own inverse.
    pub fn inverse_of(&self, id: &str) -> Option<&str> {
        let def = self.get(id)?;
        if def.symmetric { Some(&def.id) } else { def.inverse.as_deref() }
    }

    /// Asymmetric inverse pairs whose other half was never registered.
    pub fn unpaired(&self) -> Vec<&str> {
        self.defs
            .iter()
            .filter(|d| !d.symmetric)
            .filter(|d| d.inverse.as_deref().is_some_and(|inv| !self.contains(inv)))
            .map(|d| d.id.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RelationshipTypeDef> {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

fn fold(id: &str) -> String {
    id.trim().to_ascii_lowercase()
}
