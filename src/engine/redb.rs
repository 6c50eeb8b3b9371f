use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use redb::{Database, ReadableTable, StorageError, TableDefinition};

use crate::{Error, KvEngine, Result};

const TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("kv");

/// On-disk engine backed by redb.
///
/// Every call runs in its own redb transaction on the blocking thread pool:
/// reads see one committed snapshot, writes and batches commit atomically.
pub struct RedbEngine {
    db: Arc<Database>,
}

impl RedbEngine {
    /// Opens or creates a database file at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        let path = path.to_path_buf();
        let db = tokio::task::spawn_blocking(move || -> Result<Database> {
            let db = Database::create(&path).map_err(|e| Error::Initialization(e.to_string()))?;

            // Create the table up front so read transactions can always open it.
            let write_txn = db.begin_write().map_err(|e| Error::Initialization(e.to_string()))?;
            {
                let _table = write_txn
                    .open_table(TABLE)
                    .map_err(|e| Error::Initialization(e.to_string()))?;
            }
            write_txn.commit().map_err(|e| Error::Initialization(e.to_string()))?;
            debug!("Opened redb store at {:?}", path);
            Ok(db)
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))??;

        Ok(Self { db: Arc::new(db) })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| Error::Internal(e.to_string()))?
    }
}

/// Writes `entries` in one transaction. A value redb refuses as too large
/// aborts the transaction and yields `Ok(false)`.
fn write_entries(db: &Database, entries: &[(Vec<u8>, Vec<u8>)]) -> Result<bool> {
    let write_txn = db.begin_write().map_err(|e| Error::Write(e.to_string()))?;
    let rejected = {
        let mut table = write_txn.open_table(TABLE).map_err(|e| Error::Write(e.to_string()))?;
        let mut rejected = None;
        for (key, value) in entries {
            match table.insert(key.as_slice(), value.as_slice()) {
                Ok(_) => {}
                Err(StorageError::ValueTooLarge(len)) => {
                    rejected = Some(len);
                    break;
                }
                Err(e) => return Err(Error::Write(e.to_string())),
            }
        }
        rejected
    };

    if let Some(len) = rejected {
        warn!("Engine rejected value of {} bytes", len);
        write_txn.abort().map_err(|e| Error::Write(e.to_string()))?;
        return Ok(false);
    }
    write_txn.commit().map_err(|e| Error::Write(e.to_string()))?;
    Ok(true)
}

#[async_trait]
impl KvEngine for RedbEngine {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let key = key.to_vec();
        self.blocking(move |db| {
            let read_txn = db.begin_read().map_err(|e| Error::Storage(e.to_string()))?;
            let table = read_txn.open_table(TABLE).map_err(|e| Error::Storage(e.to_string()))?;
            match table.get(key.as_slice()) {
                Ok(Some(val)) => Ok(Some(val.value().to_vec())),
                Ok(None) => Ok(None),
                Err(e) => Err(Error::Storage(e.to_string())),
            }
        })
        .await
    }

    async fn set(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        let entries = vec![(key.to_vec(), value.to_vec())];
        self.blocking(move |db| write_entries(db, &entries)).await
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        let key = key.to_vec();
        self.blocking(move |db| {
            let write_txn = db.begin_write().map_err(|e| Error::Write(e.to_string()))?;
            {
                let mut table = write_txn.open_table(TABLE).map_err(|e| Error::Write(e.to_string()))?;
                table.remove(key.as_slice()).map_err(|e| Error::Write(e.to_string()))?;
            }
            write_txn.commit().map_err(|e| Error::Write(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let prefix = prefix.to_vec();
        self.blocking(move |db| {
            let read_txn = db.begin_read().map_err(|e| Error::Storage(e.to_string()))?;
            let table = read_txn.open_table(TABLE).map_err(|e| Error::Storage(e.to_string()))?;

            let mut results = Vec::new();
            let iter = table
                .range(prefix.as_slice()..)
                .map_err(|e| Error::Storage(e.to_string()))?;
            for entry in iter {
                let (key, value) = entry.map_err(|e| Error::Storage(e.to_string()))?;
                let key = key.value().to_vec();
                if !key.starts_with(&prefix) {
                    break;
                }
                results.push((key, value.value().to_vec()));
            }
            Ok(results)
        })
        .await
    }

    async fn batch_set(&self, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Result<bool> {
        self.blocking(move |db| write_entries(db, &entries)).await
    }

    async fn clear_prefix(&self, prefix: &[u8]) -> Result<usize> {
        let prefix = prefix.to_vec();
        self.blocking(move |db| {
            let write_txn = db.begin_write().map_err(|e| Error::Write(e.to_string()))?;
            let removed = {
                let mut table = write_txn.open_table(TABLE).map_err(|e| Error::Write(e.to_string()))?;
                let mut keys = Vec::new();
                for entry in table
                    .range(prefix.as_slice()..)
                    .map_err(|e| Error::Write(e.to_string()))?
                {
                    let (key, _) = entry.map_err(|e| Error::Write(e.to_string()))?;
                    let key = key.value().to_vec();
                    if !key.starts_with(&prefix) {
                        break;
                    }
                    keys.push(key);
                }
                for key in &keys {
                    table.remove(key.as_slice()).map_err(|e| Error::Write(e.to_string()))?;
                }
                keys.len()
            };
            write_txn.commit().map_err(|e| Error::Write(e.to_string()))?;
            Ok(removed)
        })
        .await
    }
}
