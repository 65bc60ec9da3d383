//! Allocation ledger
//!
//! Records the highest confirmed ordinal ever issued per type so an ordinal
//! is never handed out twice, even after the document that held it has been
//! deleted outside the store.
//!
//! ```toml
//! [high_water]
//! REQ = 12
//! SACC = 4
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifact_type::ArtifactType;
use crate::error::{Result, StoreError};
use crate::id::ArtifactId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationLedger {
    /// Last allocation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Highest ordinal issued, keyed by type prefix
    #[serde(default)]
    pub high_water: BTreeMap<String, u32>,
}

impl AllocationLedger {
    /// Load from disk; a missing file is an empty ledger
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| StoreError::Ledger(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| StoreError::Ledger(e.to_string()))
    }

    /// Highest ordinal recorded for a type, 0 if none
    pub fn mark(&self, artifact_type: ArtifactType) -> u32 {
        self.high_water.get(artifact_type.as_str()).copied().unwrap_or(0)
    }

    /// Raise the mark for the id's type if needed
    pub fn record(&mut self, id: &ArtifactId) {
        if id.is_provisional() {
            return;
        }
        let mark = self.high_water.entry(id.artifact_type.as_str().to_string()).or_insert(0);
        if id.number() > *mark {
            *mark = id.number();
        }
        self.updated_at = Some(Utc::now());
    }
}
