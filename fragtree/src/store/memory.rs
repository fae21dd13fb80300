use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::KvStore;
use crate::errors::{FragTreeError, FragTreeResult};

/// In-memory [`KvStore`].
///
/// Clones share the same underlying map, so a clone kept aside outlives the
/// tree that closed its own handle and can be handed to a new tree to
/// "reopen" the data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    map: Arc<Mutex<BTreeMap<Vec<u8>, Vec<u8>>>>,
    closed: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.map.lock().contains_key(key)
    }

    /// All keys in byte order.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.map.lock().keys().cloned().collect()
    }

    fn check_opened(&self, operation: &'static str, key: &[u8]) -> FragTreeResult<()> {
        if self.closed {
            return Err(FragTreeError::backend(operation, key, "store is closed"));
        }
        Ok(())
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> FragTreeResult<Option<Vec<u8>>> {
        self.check_opened("get", key)?;
        Ok(self.map.lock().get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) -> FragTreeResult<()> {
        self.check_opened("put", key)?;
        self.map.lock().insert(key.to_vec(), value);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> FragTreeResult<()> {
        self.check_opened("delete", key)?;
        self.map.lock().remove(key);
        Ok(())
    }

    fn flush(&mut self) -> FragTreeResult<()> {
        Ok(())
    }

    fn close(&mut self) -> FragTreeResult<()> {
        self.closed = true;
        Ok(())
    }
}
