//! Disk-backed R-tree.
//!
//! Nodes are addressed by id and paged through a [`NodeStore`]. The tree
//! itself only remembers the root id and its counters; every traversal
//! resolves nodes through the store, so any node may be evicted at any point
//! of an algorithm without affecting its outcome.
//!
//! Operations:
//! - [`RTree::insert`] / [`RTree::load`]: least-enlargement descent with
//!   R*-style splits on overflow
//! - [`RTree::search`], [`RTree::collides`], [`RTree::all`]: explicit
//!   work-list traversals
//! - [`RTree::remove`] / [`RTree::remove_with`]: iterative depth-first
//!   lookup followed by condensation of the path
//! - [`RTree::to_json`]: structural dump without ids
//! - [`RTree::to_fragments`](crate::export): paginated JSON-LD export

mod insert;
mod json;
mod remove;
mod search;

use crate::bbox::BBox;
use crate::config::{RTreeConfig, MAX_RESUMED_CACHE_SIZE, MIN_MAX_ENTRIES};
use crate::errors::{FragTreeError, FragTreeResult};
use crate::node::{Branch, Node, NodeId};
use crate::store::{KvStore, NodeStore, TreeMeta};

/// Snapshot of tree and cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RTreeStats {
    pub total_items: u64,
    pub cached_nodes: u64,
    pub cache_capacity: u64,
    pub node_reads: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub backend_reads: u64,
    pub backend_writes: u64,
    pub backend_deletes: u64,
    pub evictions: u64,
}

pub struct RTree<S: KvStore> {
    pub(crate) store: NodeStore<S>,
    pub(crate) root_id: NodeId,
    max_entries: usize,
    min_entries: usize,
    pub(crate) total_items: u64,
    cache_size: usize,
    closed: bool,
}

impl<S: KvStore> RTree<S> {
    /// Creates or resumes a tree on `backend`.
    ///
    /// With `open_existing` set, settings, counters and the root are read back
    /// from the metadata record; the configured fan-out is then ignored. If no
    /// usable record exists the tree starts fresh, unless `require_existing`
    /// is set, in which case opening fails with
    /// [`FragTreeError::MalformedState`].
    pub fn with_store(config: &RTreeConfig, backend: S) -> FragTreeResult<Self> {
        let resumed = if config.open_existing() {
            Self::resume_meta(config, &backend)?
        } else {
            None
        };

        match resumed {
            Some(meta) => Self::resume(config, backend, meta),
            None => Self::fresh(config, backend),
        }
    }

    fn fresh(config: &RTreeConfig, backend: S) -> FragTreeResult<Self> {
        let store = NodeStore::new(backend, config.cache_size(), config.cache_ttl(), 0);
        let mut tree = RTree {
            store,
            root_id: 0,
            max_entries: config.max_entries(),
            min_entries: config.min_entries(),
            total_items: 0,
            cache_size: config.cache_size(),
            closed: false,
        };
        tree.root_id = tree.create_root()?;

        log::debug!(
            "Created empty tree with max entries {} and min entries {}",
            tree.max_entries,
            tree.min_entries
        );
        Ok(tree)
    }

    fn resume(config: &RTreeConfig, backend: S, meta: TreeMeta) -> FragTreeResult<Self> {
        let cache_size = meta.cache_size.clamp(1, MAX_RESUMED_CACHE_SIZE);
        let store = NodeStore::new(backend, cache_size, config.cache_ttl(), meta.id_counter);
        let mut tree = RTree {
            store,
            root_id: meta.root_id,
            max_entries: meta.max_entries,
            min_entries: meta.min_entries,
            total_items: meta.total_items,
            cache_size,
            closed: false,
        };

        match tree.store.get_branch(meta.root_id) {
            Ok(_) => {
                log::debug!(
                    "Resumed tree with {} items, root {} and next id {}",
                    tree.total_items,
                    tree.root_id,
                    tree.store.next_id()
                );
            }
            Err(FragTreeError::NodeNotFound(id)) if !config.require_existing() => {
                log::warn!("Persisted root {} is missing, starting from an empty root", id);
                tree.root_id = tree.create_root()?;
            }
            Err(FragTreeError::NodeNotFound(id)) => {
                return Err(FragTreeError::MalformedState(format!(
                    "root node {} is missing from the store",
                    id
                )));
            }
            Err(err) => return Err(err),
        }
        Ok(tree)
    }

    /// Reads and validates the metadata record, deciding between resume and
    /// fresh start.
    fn resume_meta(config: &RTreeConfig, backend: &S) -> FragTreeResult<Option<TreeMeta>> {
        let problem = match TreeMeta::load(backend) {
            Ok(Some(meta)) => match validate_meta(&meta) {
                Ok(()) => return Ok(Some(meta)),
                Err(problem) => problem,
            },
            Ok(None) => "no tree metadata found".to_string(),
            Err(FragTreeError::Serialization(err)) => format!("unreadable tree metadata: {}", err),
            Err(err) => return Err(err),
        };

        if config.require_existing() {
            return Err(FragTreeError::MalformedState(problem));
        }
        log::warn!("Cannot resume tree ({}), starting fresh", problem);
        Ok(None)
    }

    fn create_root(&mut self) -> FragTreeResult<NodeId> {
        let id = self.store.allocate();
        self.store.insert(Branch::empty(id))?;
        Ok(id)
    }

    pub(crate) fn check_closed(&self) -> FragTreeResult<()> {
        if self.closed {
            Err(FragTreeError::Closed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn root(&mut self) -> FragTreeResult<Branch> {
        self.store.get_branch(self.root_id)
    }

    fn meta(&self) -> TreeMeta {
        TreeMeta {
            max_entries: self.max_entries,
            min_entries: self.min_entries,
            id_counter: self.store.next_id(),
            total_items: self.total_items,
            cache_size: self.cache_size,
            root_id: self.root_id,
        }
    }

    /// Persists metadata and every cached node without closing.
    pub fn flush(&mut self) -> FragTreeResult<()> {
        self.check_closed()?;
        let meta = self.meta();
        self.store.write_meta(&meta)?;
        self.store.flush()
    }

    /// Persists metadata and every cached node, then closes the store.
    /// Closing twice is a no-op.
    pub fn close(&mut self) -> FragTreeResult<()> {
        if self.closed {
            return Ok(());
        }

        let meta = self.meta();
        self.store.write_meta(&meta)?;
        self.store.close()?;
        self.closed = true;

        log::debug!("Closed tree with {} items", self.total_items);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of items inserted and not removed.
    ///
    /// Each successful [`remove`](Self::remove) decrements the count and
    /// [`clear`](Self::clear) resets it to zero. The count is persisted with
    /// the tree metadata, so a resumed tree reports the same value.
    pub fn len(&self) -> u64 {
        self.total_items
    }

    pub fn is_empty(&self) -> bool {
        self.total_items == 0
    }

    pub fn root_id(&self) -> NodeId {
        self.root_id
    }

    /// Height of the root, `1` for a tree whose root holds data nodes.
    pub fn height(&mut self) -> FragTreeResult<u32> {
        self.check_closed()?;
        Ok(self.root()?.height)
    }

    pub fn root_bbox(&mut self) -> FragTreeResult<BBox> {
        self.check_closed()?;
        Ok(self.root()?.bbox)
    }

    /// Resolves any node by id.
    pub fn node(&mut self, id: NodeId) -> FragTreeResult<Node> {
        self.check_closed()?;
        self.store.get(id)
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn min_entries(&self) -> usize {
        self.min_entries
    }

    pub fn stats(&self) -> RTreeStats {
        let store = self.store.stats();
        RTreeStats {
            total_items: self.total_items,
            cached_nodes: self.store.cached_nodes() as u64,
            cache_capacity: self.store.cache_capacity() as u64,
            node_reads: store.node_reads,
            cache_hits: store.cache_hits,
            cache_misses: store.cache_misses,
            backend_reads: store.backend_reads,
            backend_writes: store.backend_writes,
            backend_deletes: store.backend_deletes,
            evictions: store.evictions,
        }
    }

    /// The backing key-value store.
    pub fn backend(&self) -> &S {
        self.store.backend()
    }
}

fn validate_meta(meta: &TreeMeta) -> Result<(), String> {
    if meta.max_entries < MIN_MAX_ENTRIES {
        return Err(format!("max entries {} is below {}", meta.max_entries, MIN_MAX_ENTRIES));
    }
    // both halves of an overflowing branch must reach the minimum fill
    if meta.min_entries < 2 || meta.min_entries * 2 > meta.max_entries + 1 {
        return Err(format!(
            "min entries {} does not fit max entries {}",
            meta.min_entries, meta.max_entries
        ));
    }
    Ok(())
}

impl<S: KvStore> Drop for RTree<S> {
    fn drop(&mut self) {
        // Best effort flush on drop
        if !self.closed {
            if let Err(err) = self.flush() {
                log::error!("Failed to flush tree on drop: {}", err);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::node::Item;
    use crate::store::{MemoryStore, TREE_INFO_KEY};

    pub(crate) fn memory_tree(max_entries: usize) -> RTree<MemoryStore> {
        let config = RTreeConfig::builder().max_entries(max_entries).build();
        RTree::with_store(&config, MemoryStore::new()).unwrap()
    }

    pub(crate) fn point(x: f64, y: f64) -> Item {
        Item::new(BBox::point(x, y))
    }

    /// Checks box containment, child counts and heights below `root`.
    pub(crate) fn assert_structure<S: KvStore>(tree: &mut RTree<S>) {
        let root = tree.root().unwrap();
        let mut stack = vec![(root, true)];
        while let Some((branch, is_root)) = stack.pop() {
            if !is_root {
                assert!(branch.children.len() >= tree.min_entries(), "underfull branch {}", branch.id);
            }
            assert!(branch.children.len() <= tree.max_entries(), "overfull branch {}", branch.id);
            assert_eq!(branch.leaf, branch.height == 1);

            let mut union = BBox::empty();
            for &child_id in &branch.children {
                let child = tree.node(child_id).unwrap();
                assert!(branch.bbox.contains(child.bbox()));
                union.extend(child.bbox());
                match child {
                    Node::Branch(child) => {
                        assert!(!branch.leaf);
                        assert_eq!(child.height + 1, branch.height);
                        stack.push((child, false));
                    }
                    Node::Data(_) => assert!(branch.leaf),
                }
            }
            if !branch.children.is_empty() {
                assert_eq!(union, branch.bbox);
            }
        }
    }

    #[test]
    fn test_fresh_tree() {
        let mut tree = memory_tree(9);
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.height().unwrap(), 1);
        assert!(tree.root_bbox().unwrap().is_empty());
        assert_eq!(tree.max_entries(), 9);
        assert_eq!(tree.min_entries(), 4);
    }

    #[test]
    fn test_close_writes_meta_and_nodes() {
        let backend = MemoryStore::new();
        let observer = backend.clone();
        let config = RTreeConfig::builder().build();
        let mut tree = RTree::with_store(&config, backend).unwrap();
        tree.insert(point(1.0, 1.0)).unwrap();
        tree.close().unwrap();

        let meta = TreeMeta::load(&observer).unwrap().unwrap();
        assert_eq!(meta.total_items, 1);
        assert_eq!(meta.id_counter, 2);
        assert_eq!(meta.root_id, 0);
        assert!(observer.contains_key(b"0"));
        assert!(observer.contains_key(b"1"));
    }

    #[test]
    fn test_close_is_idempotent_and_blocks_operations() {
        let mut tree = memory_tree(9);
        tree.close().unwrap();
        tree.close().unwrap();
        assert!(tree.is_closed());

        assert!(matches!(tree.insert(point(0.0, 0.0)), Err(FragTreeError::Closed)));
        assert!(matches!(tree.all(), Err(FragTreeError::Closed)));
        assert!(matches!(tree.flush(), Err(FragTreeError::Closed)));
    }

    #[test]
    fn test_resume_from_closed_store() {
        let backend = MemoryStore::new();
        let shared = backend.clone();
        let config = RTreeConfig::builder().max_entries(4).cache_size(3).build();
        let mut tree = RTree::with_store(&config, backend).unwrap();
        for i in 0..30 {
            tree.insert(point(i as f64, (i % 7) as f64)).unwrap();
        }
        let height = tree.height().unwrap();
        let root_id = tree.root_id();
        tree.close().unwrap();
        let id_counter = TreeMeta::load(&shared).unwrap().unwrap().id_counter;

        let config = RTreeConfig::builder().open_existing(true).max_entries(20).build();
        let mut reopened = RTree::with_store(&config, shared).unwrap();
        assert_eq!(reopened.len(), 30);
        assert_eq!(reopened.max_entries(), 4);
        assert_eq!(reopened.root_id(), root_id);
        assert_eq!(reopened.height().unwrap(), height);
        assert_eq!(reopened.all().unwrap().len(), 30);
        assert_structure(&mut reopened);

        // ids continue after the persisted counter
        reopened.insert(point(100.0, 100.0)).unwrap();
        let found = reopened.search(&BBox::point(100.0, 100.0)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id_counter);
        assert_eq!(reopened.len(), 31);
    }

    #[test]
    fn test_open_existing_on_empty_store_starts_fresh() {
        let config = RTreeConfig::builder().open_existing(true).build();
        let mut tree = RTree::with_store(&config, MemoryStore::new()).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.height().unwrap(), 1);
    }

    #[test]
    fn test_require_existing_on_empty_store_fails() {
        let config = RTreeConfig::builder().require_existing(true).build();
        let result = RTree::with_store(&config, MemoryStore::new());
        assert!(matches!(result, Err(FragTreeError::MalformedState(_))));
    }

    #[test]
    fn test_require_existing_with_garbage_meta_fails() {
        let mut backend = MemoryStore::new();
        backend.put(TREE_INFO_KEY, b"not json".to_vec()).unwrap();

        let config = RTreeConfig::builder().require_existing(true).build();
        assert!(matches!(
            RTree::with_store(&config, backend.clone()),
            Err(FragTreeError::MalformedState(_))
        ));

        let config = RTreeConfig::builder().open_existing(true).build();
        let tree = RTree::with_store(&config, backend).unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn test_resumed_cache_size_is_clamped() {
        let mut backend = MemoryStore::new();
        let meta = TreeMeta {
            max_entries: 9,
            min_entries: 4,
            id_counter: 1,
            total_items: 0,
            cache_size: 5_000_000,
            root_id: 0,
        };
        backend.put(TREE_INFO_KEY, meta.encode().unwrap()).unwrap();
        backend
            .put(b"0", crate::store::codec::encode_node(&Node::Branch(Branch::empty(0))).unwrap())
            .unwrap();

        let config = RTreeConfig::builder().open_existing(true).build();
        let tree = RTree::with_store(&config, backend).unwrap();
        assert_eq!(tree.stats().cache_capacity, MAX_RESUMED_CACHE_SIZE as u64);
    }

    #[test]
    fn test_missing_root_falls_back_unless_required() {
        let mut backend = MemoryStore::new();
        let meta = TreeMeta {
            max_entries: 9,
            min_entries: 4,
            id_counter: 10,
            total_items: 3,
            cache_size: 100,
            root_id: 4,
        };
        backend.put(TREE_INFO_KEY, meta.encode().unwrap()).unwrap();

        let config = RTreeConfig::builder().require_existing(true).build();
        assert!(matches!(
            RTree::with_store(&config, backend.clone()),
            Err(FragTreeError::MalformedState(_))
        ));

        let config = RTreeConfig::builder().open_existing(true).build();
        let tree = RTree::with_store(&config, backend).unwrap();
        assert_eq!(tree.root_id(), 10);
    }

    #[test]
    fn test_drop_flushes() {
        let backend = MemoryStore::new();
        let observer = backend.clone();
        {
            let mut tree = RTree::with_store(&RTreeConfig::default(), backend).unwrap();
            tree.insert(point(3.0, 4.0)).unwrap();
        }
        let meta = TreeMeta::load(&observer).unwrap().unwrap();
        assert_eq!(meta.total_items, 1);
        assert!(observer.contains_key(b"1"));
    }

    #[test]
    fn test_validate_meta() {
        let mut meta = TreeMeta {
            max_entries: 9,
            min_entries: 4,
            id_counter: 0,
            total_items: 0,
            cache_size: 1,
            root_id: 0,
        };
        assert!(validate_meta(&meta).is_ok());
        meta.max_entries = 3;
        assert!(validate_meta(&meta).is_err());
        meta.max_entries = 9;
        meta.min_entries = 7;
        assert!(validate_meta(&meta).is_err());
    }
}
