//! Redb (Rust embedded database) backend for the prefix index.
//!
//! Every reference value is stored once under its composite key
//! (`prefix:value`) in a single table. Redb keeps `&str` keys in byte order,
//! so a prefix bucket is one contiguous range and scanning it is a seek
//! followed by a forward walk that stops at the first key outside the bucket.
//!
//! # Configuration Example
//! ```yaml
//! index:
//!   backend: "redb"
//!   path: "/data/lookup.redb"
//! ```

use crate::backend::KeyVisitor;
use crate::{IndexBackend, IndexError};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;
use std::sync::Arc;

/// Table holding composite reference keys mapped to a presence marker.
const REFERENCE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("reference_keys");

/// Redb backend implementation for persistent key storage.
///
/// # Thread Safety
/// The `Arc<Database>` wrapper allows safe sharing across threads.
/// Redb handles its own internal locking and MVCC, so any number of
/// concurrent prefix scans can run against one committed snapshot.
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Open or create a Redb database at the given path.
    ///
    /// Reopening an existing file keeps its contents; the reference table is
    /// created only if missing.
    ///
    /// # Example
    /// ```no_run
    /// use index::RedbBackend;
    ///
    /// let backend = RedbBackend::open("/tmp/lookup.redb").unwrap();
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let db = Database::create(path).map_err(|e| {
            IndexError::unavailable(format!("cannot open {}: {e}", path.display()))
        })?;

        let write_txn = db.begin_write().map_err(IndexError::unavailable)?;
        {
            // Accessing the table creates it if it doesn't exist
            let _table = write_txn
                .open_table(REFERENCE_TABLE)
                .map_err(IndexError::unavailable)?;
        }
        write_txn.commit().map_err(IndexError::unavailable)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl IndexBackend for RedbBackend {
    fn batch_put(&self, entries: &[(String, Vec<u8>)]) -> Result<(), IndexError> {
        let write_txn = self.db.begin_write().map_err(IndexError::unavailable)?;

        {
            let mut table = write_txn
                .open_table(REFERENCE_TABLE)
                .map_err(IndexError::io)?;

            for (key, value) in entries {
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(IndexError::io)?;
            }
        }

        write_txn.commit().map_err(IndexError::io)?;
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool, IndexError> {
        let read_txn = self.db.begin_read().map_err(IndexError::unavailable)?;
        let table = read_txn
            .open_table(REFERENCE_TABLE)
            .map_err(IndexError::io)?;
        Ok(table.get(key).map_err(IndexError::io)?.is_some())
    }

    fn scan_prefix(&self, prefix: &str, visitor: &mut KeyVisitor<'_>) -> Result<(), IndexError> {
        let read_txn = self.db.begin_read().map_err(IndexError::unavailable)?;
        let table = read_txn
            .open_table(REFERENCE_TABLE)
            .map_err(IndexError::io)?;

        for item in table.range(prefix..).map_err(IndexError::io)? {
            let (key, _) = item.map_err(IndexError::io)?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            if visitor(key)?.is_break() {
                break;
            }
        }

        Ok(())
    }

    fn len(&self) -> Result<u64, IndexError> {
        let read_txn = self.db.begin_read().map_err(IndexError::unavailable)?;
        let table = read_txn
            .open_table(REFERENCE_TABLE)
            .map_err(IndexError::io)?;
        table.len().map_err(IndexError::io)
    }

    fn flush(&self) -> Result<(), IndexError> {
        // Redb commits are synchronous by default, so flush is a no-op
        Ok(())
    }
}
