//! In-memory backend for tests and local runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::backend::{Backend, Batch};
use crate::error::{Result, StoreError};
use crate::schema::all_column_families;

type Family = BTreeMap<Vec<u8>, Vec<u8>>;

/// A `BTreeMap` per column family behind one lock.
pub struct MemoryBackend {
    families: RwLock<HashMap<&'static str, Family>>,
    available: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create an empty backend with every column family.
    #[must_use]
    pub fn new() -> Self {
        let families = all_column_families()
            .into_iter()
            .map(|name| (name, Family::new()))
            .collect();
        Self {
            families: RwLock::new(families),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: while unavailable every operation fails with
    /// `StoreError::Database`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Database("backend unavailable".into()))
        }
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Database("memory backend lock poisoned".into())
}

fn unknown_family(name: &str) -> StoreError {
    StoreError::Database(format!("column family not found: {name}"))
}

impl Backend for MemoryBackend {
    fn get(&self, cf: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_available()?;
        let families = self.families.read().map_err(poisoned)?;
        let family = families.get(cf).ok_or_else(|| unknown_family(cf))?;
        Ok(family.get(key).cloned())
    }

    fn scan_prefix(&self, cf: &str, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.check_available()?;
        let families = self.families.read().map_err(poisoned)?;
        let family = families.get(cf).ok_or_else(|| unknown_family(cf))?;
        Ok(family
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn write(&self, batch: Batch) -> Result<()> {
        self.check_available()?;
        let mut families = self.families.write().map_err(poisoned)?;
        let ops = batch.into_ops();
        if let Some(op) = ops.iter().find(|op| !families.contains_key(op.cf)) {
            return Err(unknown_family(op.cf));
        }
        for op in ops {
            if let Some(family) = families.get_mut(op.cf) {
                family.insert(op.key, op.value);
            }
        }
        Ok(())
    }
}
