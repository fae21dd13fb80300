use fjall::{Keyspace, PartitionHandle, PersistMode};
use fragtree::store::KvStore;
use fragtree::{FragTreeError, FragTreeResult};

use crate::config::FjallStoreConfig;

/// A persistent [`KvStore`] on one partition of a Fjall keyspace.
///
/// Writes land in the keyspace journal right away; [`KvStore::flush`]
/// makes them durable with a full sync.
pub struct FjallStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
    config: FjallStoreConfig,
    closed: bool,
}

impl FjallStore {
    /// Opens or creates the keyspace at the configured path.
    pub fn open(config: FjallStoreConfig) -> FragTreeResult<FjallStore> {
        let keyspace = match Keyspace::open(config.keyspace_config()) {
            Ok(keyspace) => keyspace,
            Err(err) => {
                log::error!("Failed to open or create keyspace: {}", err);
                return Err(FragTreeError::StoreOpen(format!(
                    "{}: {}",
                    config.db_path().display(),
                    err
                )));
            }
        };

        let partition = match keyspace.open_partition(config.partition(), config.partition_config()) {
            Ok(partition) => partition,
            Err(err) => {
                log::error!("Failed to open partition {}: {}", config.partition(), err);
                return Err(FragTreeError::StoreOpen(format!(
                    "partition {}: {}",
                    config.partition(),
                    err
                )));
            }
        };

        log::debug!(
            "Opened fjall store at {} (partition {})",
            config.db_path().display(),
            config.partition()
        );
        Ok(FjallStore {
            keyspace,
            partition,
            config,
            closed: false,
        })
    }

    pub fn config(&self) -> &FjallStoreConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of records in the partition. Scans the whole partition.
    pub fn len(&self) -> FragTreeResult<usize> {
        match self.partition.len() {
            Ok(len) => Ok(len),
            Err(err) => {
                log::error!("Failed to count records in FjallStore: {}", err);
                Err(FragTreeError::backend("len", b"", err))
            }
        }
    }

    pub fn is_empty(&self) -> FragTreeResult<bool> {
        match self.partition.is_empty() {
            Ok(empty) => Ok(empty),
            Err(err) => {
                log::error!("Failed to scan FjallStore: {}", err);
                Err(FragTreeError::backend("is_empty", b"", err))
            }
        }
    }

    fn check_opened(&self, operation: &'static str, key: &[u8]) -> FragTreeResult<()> {
        if self.closed {
            log::error!("FjallStore is closed");
            return Err(FragTreeError::backend(operation, key, "store is closed"));
        }
        Ok(())
    }

    fn persist(&self) -> FragTreeResult<()> {
        if let Err(err) = self.keyspace.persist(PersistMode::SyncAll) {
            log::error!("Failed to persist keyspace: {}", err);
            return Err(FragTreeError::backend("flush", b"", err));
        }
        Ok(())
    }
}

impl KvStore for FjallStore {
    fn get(&self, key: &[u8]) -> FragTreeResult<Option<Vec<u8>>> {
        self.check_opened("get", key)?;
        match self.partition.get(key) {
            Ok(value) => Ok(value.map(|slice| slice.to_vec())),
            Err(err) => {
                log::error!("Failed to get value from FjallStore: {}", err);
                Err(FragTreeError::backend("get", key, err))
            }
        }
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) -> FragTreeResult<()> {
        self.check_opened("put", key)?;
        if let Err(err) = self.partition.insert(key, value) {
            log::error!("Failed to put item in FjallStore: {}", err);
            return Err(FragTreeError::backend("put", key, err));
        }
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> FragTreeResult<()> {
        self.check_opened("delete", key)?;
        if let Err(err) = self.partition.remove(key) {
            log::error!("Failed to remove item from FjallStore: {}", err);
            return Err(FragTreeError::backend("delete", key, err));
        }
        Ok(())
    }

    fn flush(&mut self) -> FragTreeResult<()> {
        self.check_opened("flush", b"")?;
        self.persist()
    }

    fn close(&mut self) -> FragTreeResult<()> {
        if self.closed {
            return Ok(());
        }
        self.persist()?;
        self.closed = true;
        log::debug!("Closed fjall store at {}", self.config.db_path().display());
        Ok(())
    }
}

impl Drop for FjallStore {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.persist() {
                log::error!("Failed to persist keyspace during drop: {}", e);
            }
        }
    }
}
