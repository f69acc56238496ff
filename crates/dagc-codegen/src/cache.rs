//! Structural cache: at most one compiled unit per distinct key.
//!
//! Lookups take the read lock; generation runs with no lock held; the
//! write lock is taken only to store, and the first stored unit wins, so
//! racing callers all end up with the same `Arc`. Failed generations store
//! nothing. Unit ids are issued at store time, so a discarded duplicate
//! never consumes one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, trace};

use dagc_core::error::{Error, Result};
use dagc_core::id::UnitId;
use dagc_core::manifest::UnitEntry;

use crate::key::CacheKey;
use crate::unit::{CompiledUnit, UnitDraft};

/// Cache observability counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub units: usize,
}

#[derive(Debug)]
pub struct UnitCache {
    enabled: bool,
    prefix: String,
    units: RwLock<HashMap<CacheKey, Arc<CompiledUnit>>>,
    /// Units generated while caching is disabled.
    uncached: Mutex<Vec<Arc<CompiledUnit>>>,
    next_id: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl UnitCache {
    pub fn new(enabled: bool, prefix: impl Into<String>) -> Self {
        Self {
            enabled,
            prefix: prefix.into(),
            units: RwLock::new(HashMap::new()),
            uncached: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The unit stored for `key`, or the one `generate` produces.
    ///
    /// `label` names the unit (`<prefix>_<label>_<digest>`).
    pub fn get_or_generate<F>(&self, key: CacheKey, label: &str, generate: F) -> Result<Arc<CompiledUnit>>
    where
        F: FnOnce() -> Result<UnitDraft>,
    {
        if !self.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
            let unit = Arc::new(self.seal(&key, label, generate()?)?);
            self.uncached
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(Arc::clone(&unit));
            return Ok(unit);
        }

        if let Some(hit) = self.read()?.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(unit = %hit.name, "structural cache hit");
            return Ok(Arc::clone(hit));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let draft = generate()?;
        let digest = key.digest()?;

        let mut units = self
            .units
            .write()
            .map_err(|_| Error::Invariant("unit cache lock poisoned".into()))?;
        let stored = units.entry(key).or_insert_with(|| {
            let id = UnitId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
            let name = self.name(label, &digest.short(12));
            Arc::new(draft.seal(id, name, digest))
        });
        debug!(unit = %stored.name, role = %stored.role, "stored compiled unit");
        Ok(Arc::clone(stored))
    }

    pub fn stats(&self) -> CacheStats {
        let units = match self.read() {
            Ok(u) => u.len(),
            Err(_) => 0,
        } + self
            .uncached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            units,
        }
    }

    /// Manifest entries for every unit issued so far, by id.
    pub fn entries(&self) -> Result<Vec<UnitEntry>> {
        let mut out: Vec<UnitEntry> = self.read()?.values().map(|u| u.entry()).collect();
        out.extend(
            self.uncached
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .map(|u| u.entry()),
        );
        out.sort_by_key(|e| e.id);
        Ok(out)
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<CacheKey, Arc<CompiledUnit>>>> {
        self.units
            .read()
            .map_err(|_| Error::Invariant("unit cache lock poisoned".into()))
    }

    fn seal(&self, key: &CacheKey, label: &str, draft: UnitDraft) -> Result<CompiledUnit> {
        let digest = key.digest()?;
        let id = UnitId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        Ok(draft.seal(id, self.name(label, &digest.short(12)), digest))
    }

    fn name(&self, label: &str, digest: &str) -> String {
        format!("{}_{}_{}", self.prefix, label, digest)
    }
}
