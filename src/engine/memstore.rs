use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use log::warn;

use crate::{Error, KvEngine, Result};

type StoreData = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-process engine over an ordered map. Nothing is persisted.
pub struct MemEngine {
    data: RwLock<StoreData>,
    max_value_size: Option<usize>,
}

impl MemEngine {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            max_value_size: None,
        }
    }

    /// Rejects (with `Ok(false)`) any value longer than `limit` bytes.
    pub fn with_value_limit(limit: usize) -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            max_value_size: Some(limit),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreData>> {
        self.data.read().map_err(|_| Error::Internal("memstore lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreData>> {
        self.data.write().map_err(|_| Error::Write("memstore lock poisoned".to_string()))
    }

    fn fits(&self, value: &[u8]) -> bool {
        match self.max_value_size {
            Some(limit) if value.len() > limit => {
                warn!("Rejecting value of {} bytes (limit {})", value.len(), limit);
                false
            }
            _ => true,
        }
    }

    fn with_prefix<'a>(data: &'a StoreData, prefix: &'a [u8]) -> impl Iterator<Item = (&'a Vec<u8>, &'a Vec<u8>)> + 'a {
        data.range(prefix.to_vec()..).take_while(move |(k, _)| k.starts_with(prefix))
    }
}

impl Default for MemEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvEngine for MemEngine {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.read()?.get(key).cloned())
    }

    async fn set(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        if !self.fits(value) {
            return Ok(false);
        }
        self.write()?.insert(key.to_vec(), value.to_vec());
        Ok(true)
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        self.write()?.remove(key);
        Ok(())
    }

    async fn scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let data = self.read()?;
        Ok(Self::with_prefix(&data, prefix)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn batch_set(&self, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Result<bool> {
        if !entries.iter().all(|(_, v)| self.fits(v)) {
            return Ok(false);
        }
        let mut data = self.write()?;
        data.extend(entries);
        Ok(true)
    }

    async fn clear_prefix(&self, prefix: &[u8]) -> Result<usize> {
        let mut data = self.write()?;
        let keys: Vec<Vec<u8>> = Self::with_prefix(&data, prefix).map(|(k, _)| k.clone()).collect();
        for key in &keys {
            data.remove(key);
        }
        Ok(keys.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memengine_get_set_delete() {
        let engine = MemEngine::new();
        assert!(engine.set(b"k1", b"v1").await.unwrap());
        assert_eq!(engine.get(b"k1").await.unwrap(), Some(b"v1".to_vec()));

        engine.delete(b"k1").await.unwrap();
        engine.delete(b"k1").await.unwrap();
        assert_eq!(engine.get(b"k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_scan_is_ordered_and_bounded() {
        let engine = MemEngine::new();
        for key in ["b2", "a", "b1", "c"] {
            engine.set(key.as_bytes(), b"x").await.unwrap();
        }
        let keys: Vec<Vec<u8>> = engine.scan(b"b").await.unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"b1".to_vec(), b"b2".to_vec()]);
        assert_eq!(engine.scan(b"").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_clear_prefix() {
        let engine = MemEngine::new();
        engine
            .batch_set(vec![
                (b"p/1".to_vec(), b"x".to_vec()),
                (b"p/2".to_vec(), b"y".to_vec()),
                (b"q/1".to_vec(), b"z".to_vec()),
            ])
            .await
            .unwrap();
        assert_eq!(engine.clear_prefix(b"p/").await.unwrap(), 2);
        assert_eq!(engine.scan(b"").await.unwrap(), vec![(b"q/1".to_vec(), b"z".to_vec())]);
    }

    #[tokio::test]
    async fn test_value_limit_rejects_without_writing() {
        let engine = MemEngine::with_value_limit(4);
        assert!(!engine.set(b"k", b"too long").await.unwrap());
        assert!(!engine
            .batch_set(vec![(b"a".to_vec(), b"ok".to_vec()), (b"b".to_vec(), b"too long".to_vec())])
            .await
            .unwrap());
        assert!(engine.scan(b"").await.unwrap().is_empty());
    }
}
