use fjall::{Config, PartitionCreateOptions};
use std::path::{Path, PathBuf};

/// Partition holding the node records when none is configured.
pub const DEFAULT_PARTITION: &str = "rtree";

/// Tuning of the fjall keyspace backing a tree.
///
/// ```rust
/// use fragtree_fjall_adapter::FjallStoreConfig;
///
/// let config = FjallStoreConfig::builder()
///     .db_path("/tmp/stations")
///     .partition("stations")
///     .cache_size(16 * 1024 * 1024)
///     .build();
/// assert_eq!(config.partition(), "stations");
/// ```
#[derive(Debug, Clone)]
pub struct FjallStoreConfig {
    db_path: PathBuf,
    partition: String,
    cache_size: u64,
    fsync_ms: u16,
    bloom_filter_bits: Option<u8>,
}

impl Default for FjallStoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::new(),
            partition: DEFAULT_PARTITION.to_string(),
            // 32 MB block cache
            cache_size: 32 * 1024 * 1024,
            fsync_ms: 0,
            bloom_filter_bits: Some(10),
        }
    }
}

impl FjallStoreConfig {
    #[inline]
    pub fn builder() -> FjallStoreConfigBuilder {
        FjallStoreConfigBuilder::new()
    }

    #[inline]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    #[inline]
    pub fn partition(&self) -> &str {
        &self.partition
    }

    #[inline]
    pub fn cache_size(&self) -> u64 {
        self.cache_size
    }

    /// Interval of background fsyncs in milliseconds, `0` when disabled.
    #[inline]
    pub fn fsync_ms(&self) -> u16 {
        self.fsync_ms
    }

    #[inline]
    pub fn bloom_filter_bits(&self) -> Option<u8> {
        self.bloom_filter_bits
    }

    pub(crate) fn keyspace_config(&self) -> Config {
        let mut config = Config::new(&self.db_path).cache_size(self.cache_size);
        if self.fsync_ms > 0 {
            config = config.fsync_ms(Some(self.fsync_ms));
        }
        config
    }

    pub(crate) fn partition_config(&self) -> PartitionCreateOptions {
        PartitionCreateOptions::default().bloom_filter_bits(self.bloom_filter_bits)
    }
}

pub struct FjallStoreConfigBuilder {
    config: FjallStoreConfig,
}

impl FjallStoreConfigBuilder {
    #[inline]
    pub fn new() -> Self {
        Self {
            config: FjallStoreConfig::default(),
        }
    }

    #[inline]
    pub fn db_path(mut self, db_path: impl AsRef<Path>) -> Self {
        self.config.db_path = db_path.as_ref().to_path_buf();
        self
    }

    #[inline]
    pub fn partition(mut self, partition: &str) -> Self {
        self.config.partition = partition.to_string();
        self
    }

    #[inline]
    pub fn cache_size(mut self, cache_size: u64) -> Self {
        self.config.cache_size = cache_size;
        self
    }

    #[inline]
    pub fn fsync_ms(mut self, fsync_ms: u16) -> Self {
        self.config.fsync_ms = fsync_ms;
        self
    }

    /// Bits per key of partition bloom filters, `None` to disable them.
    #[inline]
    pub fn bloom_filter_bits(mut self, bits: Option<u8>) -> Self {
        self.config.bloom_filter_bits = bits;
        self
    }

    #[inline]
    pub fn build(self) -> FjallStoreConfig {
        self.config
    }
}

impl Default for FjallStoreConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
