use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::store::DEFAULT_CACHE_TTL;

/// Branch fan-out used when none is configured.
pub const DEFAULT_MAX_ENTRIES: usize = 9;
/// Smallest accepted branch fan-out.
pub const MIN_MAX_ENTRIES: usize = 4;
/// Node cache capacity used when none is configured.
pub const DEFAULT_CACHE_SIZE: usize = 100_000;
/// Upper bound applied to a cache capacity read back from persisted state.
pub const MAX_RESUMED_CACHE_SIZE: usize = 1_000_000;

/// Construction settings of an [`crate::RTree`].
///
/// Use [`RTreeConfig::builder`] to create one:
///
/// ```rust
/// use fragtree::RTreeConfig;
///
/// let config = RTreeConfig::builder()
///     .dir("/tmp/stations")
///     .open_existing(true)
///     .max_entries(16)
///     .build();
/// assert_eq!(config.max_entries(), 16);
/// assert_eq!(config.min_entries(), 7);
/// ```
#[derive(Debug, Clone)]
pub struct RTreeConfig {
    dir: Option<PathBuf>,
    open_existing: bool,
    require_existing: bool,
    max_entries: usize,
    cache_size: usize,
    cache_ttl: Duration,
}

impl Default for RTreeConfig {
    fn default() -> Self {
        Self {
            dir: None,
            open_existing: false,
            require_existing: false,
            max_entries: DEFAULT_MAX_ENTRIES,
            cache_size: DEFAULT_CACHE_SIZE,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl RTreeConfig {
    #[inline]
    pub fn builder() -> RTreeConfigBuilder {
        RTreeConfigBuilder::new()
    }

    /// Directory of the persistent store, if any.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Whether to resume from state already present in the store.
    pub fn open_existing(&self) -> bool {
        self.open_existing
    }

    /// Whether a missing or unreadable persisted state is an error instead of
    /// a reason to start fresh.
    pub fn require_existing(&self) -> bool {
        self.require_existing
    }

    /// Branch fan-out, never below [`MIN_MAX_ENTRIES`].
    pub fn max_entries(&self) -> usize {
        self.max_entries.max(MIN_MAX_ENTRIES)
    }

    /// Minimum branch fill: 40% of the fan-out, at least two.
    pub fn min_entries(&self) -> usize {
        min_entries_for(self.max_entries())
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size.max(1)
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }
}

pub(crate) fn min_entries_for(max_entries: usize) -> usize {
    // ceil(0.4 * max) in integer arithmetic
    ((max_entries * 2).div_ceil(5)).max(2)
}

/// Builder for [`RTreeConfig`].
pub struct RTreeConfigBuilder {
    config: RTreeConfig,
}

impl RTreeConfigBuilder {
    #[inline]
    pub fn new() -> RTreeConfigBuilder {
        RTreeConfigBuilder {
            config: RTreeConfig::default(),
        }
    }

    #[inline]
    pub fn dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.dir = Some(dir.as_ref().to_path_buf());
        self
    }

    #[inline]
    pub fn open_existing(mut self, open_existing: bool) -> Self {
        self.config.open_existing = open_existing;
        self
    }

    /// Fails opening instead of starting fresh when no valid state is found.
    /// Implies `open_existing`.
    #[inline]
    pub fn require_existing(mut self, require_existing: bool) -> Self {
        self.config.require_existing = require_existing;
        if require_existing {
            self.config.open_existing = true;
        }
        self
    }

    #[inline]
    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.config.max_entries = max_entries;
        self
    }

    #[inline]
    pub fn cache_size(mut self, cache_size: usize) -> Self {
        self.config.cache_size = cache_size;
        self
    }

    #[inline]
    pub fn cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.config.cache_ttl = cache_ttl;
        self
    }

    #[inline]
    pub fn build(self) -> RTreeConfig {
        self.config
    }
}

impl Default for RTreeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
