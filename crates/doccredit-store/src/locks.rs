//! Striped mutexes serializing read-modify-write sequences.
//!
//! Lock order: a session lock, when taken, is always acquired before a user
//! lock. The two live in separate tables so a session and a user hashing to
//! the same stripe never contend on one mutex.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Result, StoreError};

/// Default number of stripes per table.
pub const DEFAULT_STRIPES: usize = 64;

/// A fixed table of mutexes indexed by key hash.
pub struct StripedLocks {
    stripes: Vec<Mutex<()>>,
}

impl StripedLocks {
    /// Create a table with `count` stripes (at least one).
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            stripes: (0..count.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Block until the stripe for `key` is held.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if a previous holder panicked.
    pub fn lock(&self, key: &[u8]) -> Result<MutexGuard<'_, ()>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        #[allow(clippy::cast_possible_truncation)]
        let index = (hasher.finish() as usize) % self.stripes.len();
        self.stripes[index]
            .lock()
            .map_err(|_| StoreError::Database("ledger lock poisoned".into()))
    }
}

impl Default for StripedLocks {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPES)
    }
}
