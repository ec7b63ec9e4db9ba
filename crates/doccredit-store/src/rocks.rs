//! `RocksDB` backend.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use crate::backend::{Backend, Batch};
use crate::error::{Result, StoreError};
use crate::schema::all_column_families;

/// RocksDB-backed key/value storage with one column family per table.
pub struct RocksBackend {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksBackend {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }
}

impl Backend for RocksBackend {
    fn get(&self, cf: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let handle = self.cf(cf)?;
        self.db
            .get_cf(&handle, key)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn scan_prefix(&self, cf: &str, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let handle = self.cf(cf)?;
        let iter = self
            .db
            .iterator_cf(&handle, IteratorMode::From(prefix, Direction::Forward));

        let mut rows = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key.to_vec(), value.to_vec()));
        }
        Ok(rows)
    }

    fn write(&self, batch: Batch) -> Result<()> {
        let mut write_batch = WriteBatch::default();
        for op in batch.into_ops() {
            let handle = self.cf(op.cf)?;
            write_batch.put_cf(&handle, &op.key, &op.value);
        }

        self.db
            .write(write_batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::cf;
    use tempfile::TempDir;

    #[test]
    fn batch_write_and_prefix_scan() {
        let dir = TempDir::new().unwrap();
        let backend = RocksBackend::open(dir.path()).unwrap();

        let mut batch = Batch::default();
        batch.put(cf::TRANSACTIONS_BY_USER, b"u1-a".to_vec(), Vec::new());
        batch.put(cf::TRANSACTIONS_BY_USER, b"u1-b".to_vec(), Vec::new());
        batch.put(cf::TRANSACTIONS_BY_USER, b"u2-a".to_vec(), Vec::new());
        backend.write(batch).unwrap();

        let rows = backend.scan_prefix(cf::TRANSACTIONS_BY_USER, b"u1-").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, b"u1-a");
    }

    #[test]
    fn reopen_keeps_data() {
        let dir = TempDir::new().unwrap();
        {
            let backend = RocksBackend::open(dir.path()).unwrap();
            let mut batch = Batch::default();
            batch.put(cf::BALANCES, b"user".to_vec(), b"cbor".to_vec());
            backend.write(batch).unwrap();
        }
        let backend = RocksBackend::open(dir.path()).unwrap();
        assert_eq!(backend.get(cf::BALANCES, b"user").unwrap().unwrap(), b"cbor");
    }
}
