//! Engine configuration.
//!
//! ```json
//! {
//!   "calculator": { "roles": "biological", "include_spouses": false },
//!   "unknown_sentinels": ["unknown", "?"],
//!   "relationship_types": [
//!     { "id": "patron", "label": "Patron", "inverse": "client" },
//!     { "id": "client", "label": "Client", "inverse": "patron" }
//!   ]
//! }
//! ```
//!
//! Every key is optional; missing keys take their defaults.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::adapter::{DEFAULT_UNKNOWN_SENTINELS, RecordAdapter};
use crate::kinship::CalculatorConfig;
use crate::model::{RelationshipTypeDef, TypeRegistry};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub calculator: CalculatorConfig,
    /// Spellings of "this parent exists but is unidentified", matched
    /// case-insensitively.
    pub unknown_sentinels: Vec<String>,
    /// Merged over the built-in types; an id already present replaces it.
    pub relationship_types: Vec<RelationshipTypeDef>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            calculator: CalculatorConfig::default(),
            unknown_sentinels: DEFAULT_UNKNOWN_SENTINELS.iter().map(|s| s.to_string()).collect(),
            relationship_types: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Built-in types plus the configured ones. Rejects malformed
    /// definitions and asymmetric types whose inverse is never defined.
    pub fn registry(&self) -> Result<TypeRegistry> {
        let mut registry = TypeRegistry::builtin();
        for def in &self.relationship_types {
            registry.register(def.clone())?;
        }
        if let Some(id) = registry.unpaired().first() {
            return Err(Error::Config(format!("relationship type '{id}' names an inverse that is not defined")));
        }
        Ok(registry)
    }

    pub fn adapter(&self) -> Result<RecordAdapter> {
        Ok(RecordAdapter::new(Arc::new(self.registry()?)).with_sentinels(self.unknown_sentinels.iter().cloned()))
    }
}
