use fragtree::{FragTreeError, FragTreeResult, RTree, RTreeConfig};
use std::fs;
use std::ops::{Deref, DerefMut};

use crate::config::FjallStoreConfig;
use crate::store::FjallStore;

/// An [`RTree`] whose nodes live in a Fjall keyspace on disk.
///
/// ```rust,no_run
/// use fragtree::{BBox, Item, RTreeConfig};
/// use fragtree_fjall_adapter::FjallRTree;
///
/// # fn main() -> fragtree::FragTreeResult<()> {
/// let config = RTreeConfig::builder().dir("/tmp/stations").build();
/// let mut tree = FjallRTree::open(&config)?;
/// tree.insert(Item::new(BBox::point(3.72, 51.05)).with("name", "Gent"))?;
/// tree.close()?;
/// # Ok(())
/// # }
/// ```
pub struct FjallRTree {
    tree: RTree<FjallStore>,
}

impl FjallRTree {
    /// Opens a tree in `config.dir()`, creating the directory if needed.
    pub fn open(config: &RTreeConfig) -> FragTreeResult<FjallRTree> {
        Self::open_with(config, FjallStoreConfig::default())
    }

    /// Like [`FjallRTree::open`] with explicit keyspace tuning. The path of
    /// `store_config` is replaced by the tree directory.
    pub fn open_with(config: &RTreeConfig, store_config: FjallStoreConfig) -> FragTreeResult<FjallRTree> {
        let dir = match config.dir() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => {
                log::error!("No directory configured for the fjall tree");
                return Err(FragTreeError::Configuration(
                    "a target directory is required to open a fjall tree".to_string(),
                ));
            }
        };
        fs::create_dir_all(dir)?;

        let store_config = FjallStoreConfig::builder()
            .db_path(dir)
            .partition(store_config.partition())
            .cache_size(store_config.cache_size())
            .fsync_ms(store_config.fsync_ms())
            .bloom_filter_bits(store_config.bloom_filter_bits())
            .build();
        let store = FjallStore::open(store_config)?;
        let tree = RTree::with_store(config, store)?;
        Ok(FjallRTree { tree })
    }

    pub fn into_inner(self) -> RTree<FjallStore> {
        self.tree
    }
}

impl Deref for FjallRTree {
    type Target = RTree<FjallStore>;

    fn deref(&self) -> &Self::Target {
        &self.tree
    }
}

impl DerefMut for FjallRTree {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tree
    }
}
