//! Compilation manifest for audit.
//!
//! A session emits a manifest after compiling; it lists every unit the
//! structural cache holds, with the digest of the key that produced it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::Hash256;
use crate::id::UnitId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestId(pub Uuid);

/// One compiled unit as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitEntry {
    pub id: UnitId,
    pub name: String,
    pub role: String,
    pub key_digest: Hash256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileManifest {
    pub id: ManifestId,

    /// Compiler version string for provenance.
    pub compiler_version: String,

    pub units: Vec<UnitEntry>,

    /// Stable hash over the unit entries (ordered by unit id).
    pub units_digest: Option<Hash256>,

    pub cache_hits: u64,
    pub cache_misses: u64,

    /// Milliseconds since Unix epoch (UTC).
    pub started_ms: u64,
    pub finished_ms: u64,
}

impl CompileManifest {
    pub fn new(started_ms: u64) -> Self {
        Self {
            id: ManifestId(Uuid::new_v4()),
            compiler_version: crate::VERSION.to_string(),
            units: vec![],
            units_digest: None,
            cache_hits: 0,
            cache_misses: 0,
            started_ms,
            finished_ms: started_ms,
        }
    }

    pub fn finish(
        mut self,
        finished_ms: u64,
        mut units: Vec<UnitEntry>,
        hits: u64,
        misses: u64,
    ) -> Result<Self, crate::error::Error> {
        units.sort_by_key(|u| u.id);
        self.units_digest = Some(crate::hash::hash_serde(&units)?);
        self.units = units;
        self.cache_hits = hits;
        self.cache_misses = misses;
        self.finished_ms = finished_ms;
        Ok(self)
    }
}
