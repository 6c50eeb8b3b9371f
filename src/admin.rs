use std::path::Path;

use log::{debug, info, warn};

use crate::archive;
use crate::config::AdminConfig;
use crate::engine::StoreHandle;
use crate::key::KeyPath;
use crate::record::{Record, Snapshot, Value};
use crate::{Error, Result};

/// The administrative operations over one [`StoreHandle`].
///
/// Isolation: `list` and `dump` read one consistent engine snapshot; `clear`
/// removes all matching keys in one commit; `restore` commits in chunks of
/// [`AdminConfig::batch_size`] records, so only restores up to that size are
/// atomic as a whole.
pub struct AdminService {
    handle: StoreHandle,
    config: AdminConfig,
}

impl AdminService {
    pub fn new(handle: StoreHandle) -> Self {
        Self::with_config(handle, AdminConfig::default())
    }

    pub fn with_config(handle: StoreHandle, config: AdminConfig) -> Self {
        Self { handle, config }
    }

    pub fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    pub fn config(&self) -> &AdminConfig {
        &self.config
    }

    /// Every record under `prefix`, in key order. The root prefix lists the whole store.
    pub async fn list(&self, prefix: &KeyPath) -> Result<Snapshot> {
        let engine = self.handle.ensure_ready()?;
        let entries = engine.scan(&prefix.encode()).await?;
        debug!("list {} -> {} records", prefix, entries.len());

        entries
            .into_iter()
            .map(|(key, value)| {
                Ok(Record {
                    key: KeyPath::decode(&key)?,
                    value: Value::decode(&value)?,
                })
            })
            .collect()
    }

    /// The value at `key`, or `None` if nothing is stored there.
    pub async fn get(&self, key: &KeyPath) -> Result<Option<Value>> {
        let engine = self.handle.ensure_ready()?;
        require_key(key)?;
        match engine.get(&key.encode()).await? {
            Some(raw) => Ok(Some(Value::decode(&raw)?)),
            None => Ok(None),
        }
    }

    /// The raw bytes at `key`, or `None` if nothing is stored there.
    ///
    /// No type check is made: for a key holding structured data the result is
    /// unspecified (currently its stored JSON text).
    pub async fn get_binary(&self, key: &KeyPath) -> Result<Option<Vec<u8>>> {
        let engine = self.handle.ensure_ready()?;
        require_key(key)?;
        match engine.get(&key.encode()).await? {
            Some(raw) => Ok(Some(Value::payload(&raw)?)),
            None => Ok(None),
        }
    }

    /// Stores structured data at `key`. `Ok(false)` means the write was refused for size.
    pub async fn set(&self, key: &KeyPath, value: serde_json::Value) -> Result<bool> {
        self.put(key, Value::Structured(value)).await
    }

    /// Stores raw bytes at `key`. `Ok(false)` means the write was refused for size.
    pub async fn set_binary(&self, key: &KeyPath, bytes: Vec<u8>) -> Result<bool> {
        self.put(key, Value::Binary(bytes)).await
    }

    /// Reads `path` and stores its contents as a binary value at `key`.
    pub async fn set_binary_from_file(&self, key: &KeyPath, path: &Path) -> Result<bool> {
        let bytes = tokio::fs::read(path).await?;
        self.set_binary(key, bytes).await
    }

    async fn put(&self, key: &KeyPath, value: Value) -> Result<bool> {
        let engine = self.handle.ensure_ready()?;
        require_key(key)?;
        let encoded = value.encode()?;
        if !self.within_limit(key, encoded.len()) {
            return Ok(false);
        }

        let ok = engine.set(&key.encode(), &encoded).await?;
        if ok {
            debug!("set {} ({} bytes)", key, encoded.len());
        } else {
            warn!("Engine refused write to {}", key);
        }
        Ok(ok)
    }

    fn within_limit(&self, key: &KeyPath, len: usize) -> bool {
        match self.config.max_value_size {
            Some(limit) if len > limit => {
                warn!("Value for {} is {} bytes, over the {} byte limit", key, len, limit);
                false
            }
            _ => true,
        }
    }

    /// Removes `key`. Deleting an absent key is a no-op.
    pub async fn delete(&self, key: &KeyPath) -> Result<()> {
        let engine = self.handle.ensure_ready()?;
        require_key(key)?;
        engine.delete(&key.encode()).await?;
        debug!("delete {}", key);
        Ok(())
    }

    /// Removes every key under `prefix` in one commit and returns how many were removed.
    pub async fn clear(&self, prefix: &KeyPath) -> Result<usize> {
        let engine = self.handle.ensure_ready()?;
        let removed = engine.clear_prefix(&prefix.encode()).await?;
        info!("Cleared {} records under {}", removed, prefix);
        Ok(removed)
    }

    /// Writes every record under `prefix` to `destination` as an archive,
    /// replacing any existing file. Returns the number of records written.
    pub async fn dump(&self, destination: &Path, prefix: &KeyPath) -> Result<usize> {
        let snapshot = self.list(prefix).await?;
        let text = archive::encode(&snapshot)?;

        let path = destination.to_path_buf();
        tokio::task::spawn_blocking(move || archive::write_file(&path, &text))
            .await
            .map_err(|e| Error::Internal(e.to_string()))??;

        info!("Dumped {} records under {} to {:?}", snapshot.len(), prefix, destination);
        Ok(snapshot.len())
    }

    /// Loads the archive at `source` and writes each record over whatever is
    /// stored at its key. Keys missing from the archive are left alone.
    ///
    /// The whole document is parsed and validated before the first write.
    /// Returns the number of records restored.
    pub async fn restore(&self, source: &Path) -> Result<usize> {
        let engine = self.handle.ensure_ready()?;
        let text = tokio::fs::read_to_string(source).await?;
        let snapshot = archive::decode(&text)?;

        let mut encoded = Vec::with_capacity(snapshot.len());
        for record in &snapshot {
            if record.key.is_root() {
                return Err(Error::ArchiveFormat("record with an empty key".to_string()));
            }
            let value = record.value.encode()?;
            if !self.within_limit(&record.key, value.len()) {
                return Err(Error::Write(format!("value for {} exceeds the size limit", record.key)));
            }
            encoded.push((record.key.encode(), value));
        }

        let total = encoded.len();
        let batch_size = self.config.batch_size.max(1);
        let mut written = 0;
        while !encoded.is_empty() {
            let rest = encoded.split_off(batch_size.min(encoded.len()));
            let chunk = std::mem::replace(&mut encoded, rest);
            let len = chunk.len();
            if !engine.batch_set(chunk).await? {
                return Err(Error::Write(format!(
                    "engine refused restore batch after {} of {} records",
                    written, total
                )));
            }
            written += len;
        }

        info!("Restored {} records from {:?}", total, source);
        Ok(total)
    }
}

fn require_key(key: &KeyPath) -> Result<()> {
    if key.is_root() {
        return Err(Error::InvalidKey("key must have at least one segment".to_string()));
    }
    Ok(())
}
