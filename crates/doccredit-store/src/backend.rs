//! Key/value backend abstraction.
//!
//! The ledger logic lives in [`crate::LedgerStore`]; backends only need
//! point reads, prefix scans and atomic batch writes.

use crate::error::Result;

/// One put in a [`Batch`].
#[derive(Debug, Clone)]
pub struct BatchOp {
    /// Column family.
    pub cf: &'static str,
    /// Key.
    pub key: Vec<u8>,
    /// Value.
    pub value: Vec<u8>,
}

/// A set of puts applied all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    /// Queue a put.
    pub fn put(&mut self, cf: &'static str, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp { cf, key, value });
    }

    /// Whether nothing has been queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Consume the batch.
    #[must_use]
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Storage primitives a ledger backend must provide.
pub trait Backend: Send + Sync {
    /// Read one value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, cf: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Read every entry whose key starts with `prefix`, in key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn scan_prefix(&self, cf: &str, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Apply every put in `batch` atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; nothing is applied in that case.
    fn write(&self, batch: Batch) -> Result<()>;
}
